//! Two-sided limit order book for one symbol: price-time priority matching.
//!
//! Each side is a price-ordered sequence of [`BookLevel`]s; each level is a
//! FIFO of orders at one price plus a per-session `(senderCompID, clOrdID)`
//! index for duplicate detection. Best ask is the lowest ask level, best bid
//! the highest bid level.

use crate::error::EngineError;
use crate::order::Order;
use crate::types::{scale2, OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};

/// All orders resting at a single price on one side of the book.
///
/// The FIFO preserves arrival order; the index mirrors the FIFO so duplicate
/// `(senderCompID, clOrdID)` submissions at this price are refused. A level
/// never persists on its side once the FIFO is empty.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BookLevel {
    px: Decimal,
    orders: VecDeque<Order>,
    index: HashMap<String, HashSet<String>>,
}

impl BookLevel {
    fn new(px: Decimal) -> Self {
        Self {
            px,
            orders: VecDeque::new(),
            index: HashMap::new(),
        }
    }

    pub fn price(&self) -> Decimal {
        self.px
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Appends an order to the FIFO and registers it in the index.
    pub fn add(&mut self, order: Order) -> Result<(), EngineError> {
        let session = self.index.entry(order.sender_comp_id.clone()).or_default();
        if !session.insert(order.cl_ord_id.clone()) {
            return Err(EngineError::Duplicate {
                sender: order.sender_comp_id.clone(),
                cl_ord_id: order.cl_ord_id.clone(),
            });
        }
        self.orders.push_back(order);
        Ok(())
    }

    /// Removes and returns the head of the FIFO after checking it carries the
    /// expected clOrdID.
    pub fn pop_front(&mut self, expected_cl_ord_id: &str) -> Result<Order, EngineError> {
        let head = self.orders.front().ok_or(EngineError::Empty)?;
        if head.cl_ord_id != expected_cl_ord_id {
            return Err(EngineError::Mismatch {
                expected: expected_cl_ord_id.to_string(),
                actual: head.cl_ord_id.clone(),
            });
        }
        Ok(self.evict_front().expect("head checked non-empty"))
    }

    /// Marks the indexed order canceled in place. The order stays in the FIFO
    /// and is expired when it reaches the front of the match walk.
    pub fn cancel(&mut self, sender: &str, cl_ord_id: &str) -> Result<(), EngineError> {
        let known = self
            .index
            .get(sender)
            .map(|ids| ids.contains(cl_ord_id))
            .unwrap_or(false);
        if !known {
            return Err(EngineError::UnknownOrder {
                sender: sender.to_string(),
                cl_ord_id: cl_ord_id.to_string(),
            });
        }
        for order in self.orders.iter_mut() {
            if order.sender_comp_id == sender && order.cl_ord_id == cl_ord_id {
                order.cancel();
                break;
            }
        }
        Ok(())
    }

    /// Sum of original quantities, for book display.
    pub fn total_visible_qty(&self) -> Decimal {
        self.orders.iter().map(|o| o.quantity).sum()
    }

    /// Sum of unfilled quantities.
    pub fn total_leaves_qty(&self) -> Decimal {
        self.orders.iter().map(|o| o.leaves_qty).sum()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn contains(&self, sender: &str, cl_ord_id: &str) -> bool {
        self.index
            .get(sender)
            .map(|ids| ids.contains(cl_ord_id))
            .unwrap_or(false)
    }

    fn evict_front(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        if let Some(session) = self.index.get_mut(&order.sender_comp_id) {
            session.remove(&order.cl_ord_id);
            if session.is_empty() {
                self.index.remove(&order.sender_comp_id);
            }
        }
        Some(order)
    }

    /// Drops canceled orders from the front of the FIFO. Cancel marks in
    /// place; expiry happens lazily when the order would be next to trade.
    fn expire_canceled(&mut self) {
        while matches!(self.orders.front(), Some(o) if !o.is_open()) {
            self.evict_front();
        }
    }
}

/// The two-sided book for one symbol.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OrderBook {
    symbol: String,
    /// Ascending by price; index 0 is the best (lowest) ask.
    ask_levels: Vec<BookLevel>,
    /// Descending by price; index 0 is the best (highest) bid.
    bid_levels: Vec<BookLevel>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ask_levels: Vec::new(),
            bid_levels: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bid_levels.first().map(|l| l.price())
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.ask_levels.first().map(|l| l.price())
    }

    pub fn bid_levels(&self) -> &[BookLevel] {
        &self.bid_levels
    }

    pub fn ask_levels(&self) -> &[BookLevel] {
        &self.ask_levels
    }

    /// Matches the incoming order against the opposite side and, for a limit
    /// order with remaining quantity, rests it on its own side.
    ///
    /// Returns the counterparty orders touched by the match, in touch order
    /// (best level first, FIFO within a level), together with the aggressor's
    /// post-match state. Residual MARKET quantity is discarded: the aggressor
    /// keeps its leaves and `Open` status in the returned snapshot but is
    /// never placed on the book.
    pub fn match_or_add(&mut self, mut order: Order) -> Result<(Vec<Order>, Order), EngineError> {
        match order.ord_type {
            OrderType::Market => {
                let matches = self.match_market(&mut order)?;
                Ok((matches, order))
            }
            OrderType::Limit => {
                let matches = self.match_limit(&mut order)?;
                if order.is_open() {
                    let resting = order.clone();
                    self.add(order)?;
                    Ok((matches, resting))
                } else {
                    Ok((matches, order))
                }
            }
            other => Err(EngineError::UnsupportedOrderType(format!("{other:?}"))),
        }
    }

    /// Cancels a resting order in place. The order is skipped by the match
    /// walk and garbage-collected when it reaches the front of its level.
    pub fn cancel_resting(
        &mut self,
        side: Side,
        price: Decimal,
        sender: &str,
        cl_ord_id: &str,
    ) -> Result<(), EngineError> {
        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        let level = levels
            .iter_mut()
            .find(|l| l.price() == price)
            .ok_or_else(|| EngineError::UnknownOrder {
                sender: sender.to_string(),
                cl_ord_id: cl_ord_id.to_string(),
            })?;
        level.cancel(sender, cl_ord_id)
    }

    fn match_market(&mut self, order: &mut Order) -> Result<Vec<Order>, EngineError> {
        let (levels, side_name) = match order.side {
            Side::Buy => (&mut self.ask_levels, "ask"),
            Side::Sell => (&mut self.bid_levels, "bid"),
        };
        if levels.is_empty() {
            return Err(EngineError::NoLiquidity { side: side_name });
        }
        let mut matches = Vec::new();
        while !levels.is_empty() {
            match_against_level(order, &mut levels[0], &mut matches)?;
            if levels[0].is_empty() {
                levels.remove(0);
            }
            if !order.is_open() {
                break;
            }
        }
        Ok(matches)
    }

    fn match_limit(&mut self, order: &mut Order) -> Result<Vec<Order>, EngineError> {
        let limit_px = order.price;
        let levels = match order.side {
            Side::Buy => &mut self.ask_levels,
            Side::Sell => &mut self.bid_levels,
        };
        let mut matches = Vec::new();
        while !levels.is_empty() {
            let level_px = levels[0].price();
            let crosses = match order.side {
                Side::Buy => level_px <= limit_px,
                Side::Sell => level_px >= limit_px,
            };
            if !crosses {
                break;
            }
            match_against_level(order, &mut levels[0], &mut matches)?;
            if levels[0].is_empty() {
                levels.remove(0);
            }
            if !order.is_open() {
                break;
            }
        }
        Ok(matches)
    }

    /// Places a limit order on its own side, joining the equal-price level or
    /// opening a new level at the sorted position.
    fn add(&mut self, order: Order) -> Result<(), EngineError> {
        let px = order.price;
        let (levels, descending) = match order.side {
            Side::Buy => (&mut self.bid_levels, true),
            Side::Sell => (&mut self.ask_levels, false),
        };
        for i in 0..levels.len() {
            let level_px = levels[i].price();
            if level_px == px {
                return levels[i].add(order);
            }
            let insert_before = if descending {
                level_px < px
            } else {
                level_px > px
            };
            if insert_before {
                let mut level = BookLevel::new(px);
                level.add(order)?;
                levels.insert(i, level);
                return Ok(());
            }
        }
        let mut level = BookLevel::new(px);
        level.add(order)?;
        levels.push(level);
        Ok(())
    }

    /// Human-readable ladder, prices and quantities at two-decimal scale.
    pub fn display(&self) -> String {
        let mut out = String::from("bid:\n");
        for level in &self.bid_levels {
            out.push_str(&format!(
                "{}: {}\n",
                scale2(level.price()),
                scale2(level.total_visible_qty())
            ));
        }
        out.push_str("\n=====\nask:\n");
        for level in &self.ask_levels {
            out.push_str(&format!(
                "{}: {}\n",
                scale2(level.price()),
                scale2(level.total_visible_qty())
            ));
        }
        out
    }
}

/// Trades the aggressor against one level until the level drains or the
/// aggressor fills.
///
/// The trade price is always the RESTING order's price; the trade quantity is
/// the smaller of the two leaves. The resting order executes first, then the
/// aggressor; filled resting orders are popped and canceled ones expire as if
/// already popped. Each touched resting order is appended to `matches`.
fn match_against_level(
    aggressor: &mut Order,
    level: &mut BookLevel,
    matches: &mut Vec<Order>,
) -> Result<(), EngineError> {
    while aggressor.is_open() {
        level.expire_canceled();
        let Some(resting) = level.orders.front_mut() else {
            break;
        };
        let trade_px = resting.price;
        let trade_qty = aggressor.leaves_qty.min(resting.leaves_qty);
        resting.execute(trade_px, trade_qty)?;
        aggressor.execute(trade_px, trade_qty)?;
        if resting.status == OrderStatus::Filled {
            let cl_ord_id = resting.cl_ord_id.clone();
            let popped = level.pop_front(&cl_ord_id)?;
            matches.push(popped);
        } else {
            matches.push(resting.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn limit(cl: &str, side: Side, px: &str, qty: i64) -> Order {
        Order::new(
            cl,
            "VALE3",
            "s1",
            "EXEC",
            side,
            OrderType::Limit,
            dec(px),
            Decimal::from(qty),
            cl,
        )
    }

    fn market(cl: &str, side: Side, qty: i64) -> Order {
        Order::new(
            cl,
            "VALE3",
            "s1",
            "EXEC",
            side,
            OrderType::Market,
            Decimal::ZERO,
            Decimal::from(qty),
            cl,
        )
    }

    fn rest(book: &mut OrderBook, order: Order) {
        let (matches, _) = book.match_or_add(order).unwrap();
        assert!(matches.is_empty(), "seed order must not cross");
    }

    /// Asks 1@46.72, 2@46.73, 3@46.74 and bids 4@46.52, 5@46.51, 6@46.50,
    /// 200 each.
    fn three_by_three() -> OrderBook {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("1", Side::Sell, "46.72", 200));
        rest(&mut book, limit("2", Side::Sell, "46.73", 200));
        rest(&mut book, limit("3", Side::Sell, "46.74", 200));
        rest(&mut book, limit("4", Side::Buy, "46.52", 200));
        rest(&mut book, limit("5", Side::Buy, "46.51", 200));
        rest(&mut book, limit("6", Side::Buy, "46.50", 200));
        book
    }

    #[test]
    fn level_rejects_duplicate_sender_cl_ord_id() {
        let mut level = BookLevel::new(dec("46.72"));
        level.add(limit("1", Side::Sell, "46.72", 100)).unwrap();
        let err = level.add(limit("1", Side::Sell, "46.72", 50)).unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));
        assert_eq!(level.order_count(), 1);
    }

    #[test]
    fn level_pop_front_checks_head_identity() {
        let mut level = BookLevel::new(dec("46.72"));
        assert!(matches!(level.pop_front("1"), Err(EngineError::Empty)));
        level.add(limit("1", Side::Sell, "46.72", 100)).unwrap();
        level.add(limit("2", Side::Sell, "46.72", 100)).unwrap();
        let err = level.pop_front("2").unwrap_err();
        assert!(matches!(err, EngineError::Mismatch { .. }));
        let popped = level.pop_front("1").unwrap();
        assert_eq!(popped.cl_ord_id, "1");
        // popped order is gone from the index, so its id can be reused
        level.add(limit("1", Side::Sell, "46.72", 10)).unwrap();
    }

    #[test]
    fn level_cancel_requires_indexed_order() {
        let mut level = BookLevel::new(dec("46.72"));
        level.add(limit("1", Side::Sell, "46.72", 100)).unwrap();
        assert!(matches!(
            level.cancel("s1", "9"),
            Err(EngineError::UnknownOrder { .. })
        ));
        level.cancel("s1", "1").unwrap();
        assert!(!level.orders().next().unwrap().is_open());
    }

    #[test]
    fn level_totals() {
        let mut level = BookLevel::new(dec("46.72"));
        let mut partly = limit("1", Side::Sell, "46.72", 200);
        partly.execute(dec("46.72"), dec("50")).unwrap();
        level.add(partly).unwrap();
        level.add(limit("2", Side::Sell, "46.72", 100)).unwrap();
        assert_eq!(level.total_visible_qty(), dec("300"));
        assert_eq!(level.total_leaves_qty(), dec("250"));
    }

    #[test]
    fn market_buy_against_empty_book_fails_and_leaves_book_untouched() {
        let mut book = OrderBook::new("VALE3");
        let before = book.display();
        let err = book.match_or_add(market("1", Side::Buy, 200)).unwrap_err();
        assert_eq!(err, EngineError::NoLiquidity { side: "ask" });
        assert_eq!(book.display(), before);
        assert!(book.best_bid().is_none() && book.best_ask().is_none());
    }

    #[test]
    fn market_sell_against_empty_bid_side_fails() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("2", Side::Sell, "46.72", 200));
        let before = book.display();
        let err = book.match_or_add(market("1", Side::Sell, 200)).unwrap_err();
        assert_eq!(err, EngineError::NoLiquidity { side: "bid" });
        assert_eq!(book.display(), before);
    }

    #[test]
    fn market_buy_fills_against_equal_size_resting_sell() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("2", Side::Sell, "46.72", 200));

        let (matches, aggressor) = book.match_or_add(market("1", Side::Buy, 200)).unwrap();

        assert_eq!(aggressor.status, OrderStatus::Filled);
        assert_eq!(aggressor.executed_quantity, dec("200"));
        assert_eq!(aggressor.last_exec_px, dec("46.72"));
        assert_eq!(aggressor.executed_notional, dec("9344.00"));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "2");
        assert_eq!(matches[0].status, OrderStatus::Filled);
        assert!(book.ask_levels().is_empty());
    }

    #[test]
    fn limit_buy_partially_fills_top_ask_and_does_not_rest() {
        let mut book = three_by_three();

        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Buy, "46.72", 100))
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "1");
        assert_eq!(matches[0].executed_quantity, dec("100"));
        assert_eq!(matches[0].leaves_qty, dec("100"));
        assert_eq!(matches[0].status, OrderStatus::Open);

        assert_eq!(aggressor.status, OrderStatus::Filled);
        assert_eq!(aggressor.executed_quantity, dec("100"));
        assert_eq!(aggressor.executed_notional, dec("4672.00"));

        let asks = book.ask_levels();
        assert_eq!(asks.len(), 3);
        assert_eq!(asks[0].price(), dec("46.72"));
        assert_eq!(asks[0].total_leaves_qty(), dec("100"));
        assert_eq!(book.bid_levels().len(), 3);
    }

    #[test]
    fn limit_buy_sweeps_top_ask_and_rests_residual_at_bid_top() {
        let mut book = three_by_three();

        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Buy, "46.72", 1000))
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "1");
        assert_eq!(matches[0].status, OrderStatus::Filled);

        assert_eq!(aggressor.status, OrderStatus::Open);
        assert_eq!(aggressor.executed_quantity, dec("200"));
        assert_eq!(aggressor.leaves_qty, dec("800"));

        let bids = book.bid_levels();
        assert_eq!(bids.len(), 4);
        assert_eq!(bids[0].price(), dec("46.72"));
        let top = bids[0].orders().next().unwrap();
        assert_eq!(top.cl_ord_id, "11");
        assert_eq!(top.quantity, dec("1000"));
        assert_eq!(top.executed_quantity, dec("200"));
        assert_eq!(top.leaves_qty, dec("800"));
        assert_eq!(bids[1].price(), dec("46.52"));
        assert_eq!(bids[2].price(), dec("46.51"));
        assert_eq!(bids[3].price(), dec("46.50"));

        let asks = book.ask_levels();
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].price(), dec("46.73"));
        assert_eq!(asks[1].price(), dec("46.74"));
    }

    #[test]
    fn limit_sell_sweeps_whole_bid_side_and_rests_ahead_of_asks() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("1", Side::Sell, "46.72", 200));
        rest(&mut book, limit("2", Side::Sell, "46.73", 200));
        rest(&mut book, limit("3", Side::Sell, "46.74", 200));
        rest(&mut book, limit("7", Side::Buy, "46.71", 200));
        rest(&mut book, limit("4", Side::Buy, "46.52", 200));
        rest(&mut book, limit("5", Side::Buy, "46.51", 200));
        rest(&mut book, limit("6", Side::Buy, "46.50", 200));

        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Sell, "46.50", 1000))
            .unwrap();

        let touched: Vec<&str> = matches.iter().map(|o| o.cl_ord_id.as_str()).collect();
        assert_eq!(touched, ["7", "4", "5", "6"]);
        assert!(matches.iter().all(|o| o.status == OrderStatus::Filled));
        assert!(matches.iter().all(|o| o.executed_quantity == dec("200")));

        assert_eq!(aggressor.leaves_qty, dec("200"));
        assert_eq!(aggressor.status, OrderStatus::Open);

        let asks = book.ask_levels();
        assert_eq!(asks.len(), 4);
        assert_eq!(asks[0].price(), dec("46.50"));
        assert_eq!(asks[0].orders().next().unwrap().cl_ord_id, "11");
        assert_eq!(asks[0].total_leaves_qty(), dec("200"));
        assert_eq!(asks[1].price(), dec("46.72"));
        assert!(book.bid_levels().is_empty());
    }

    #[test]
    fn market_sell_walks_bids_with_partial_final_fill() {
        let mut book = OrderBook::new("VALE3");
        for (cl, px) in [
            ("a1", "46.61"),
            ("a2", "46.62"),
            ("a3", "46.63"),
            ("a4", "46.64"),
            ("a5", "46.65"),
            ("a6", "46.66"),
        ] {
            rest(&mut book, limit(cl, Side::Sell, px, 200));
        }
        rest(&mut book, limit("b1", Side::Buy, "46.60", 200));
        rest(&mut book, limit("b2", Side::Buy, "46.59", 200));
        rest(&mut book, limit("b3", Side::Buy, "46.58", 100));
        rest(&mut book, limit("b4", Side::Buy, "46.57", 50));
        rest(&mut book, limit("b5", Side::Buy, "46.56", 200));
        rest(&mut book, limit("b6", Side::Buy, "46.55", 200));

        let (matches, aggressor) = book.match_or_add(market("m", Side::Sell, 525)).unwrap();

        let touched: Vec<&str> = matches.iter().map(|o| o.cl_ord_id.as_str()).collect();
        assert_eq!(touched, ["b1", "b2", "b3", "b4"]);
        assert_eq!(matches[3].last_exec_quantity, dec("25"));
        assert_eq!(matches[3].leaves_qty, dec("25"));
        assert_eq!(matches[3].status, OrderStatus::Open);
        assert_eq!(aggressor.status, OrderStatus::Filled);

        // bid top is the residual of the fourth order
        let bids = book.bid_levels();
        assert_eq!(bids[0].price(), dec("46.57"));
        assert_eq!(bids[0].total_leaves_qty(), dec("25"));
        assert_eq!(bids.len(), 3);
        assert_eq!(book.ask_levels().len(), 6);
    }

    #[test]
    fn market_residual_is_discarded_not_rested() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("1", Side::Sell, "46.72", 100));

        let (matches, aggressor) = book.match_or_add(market("m", Side::Buy, 250)).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(aggressor.executed_quantity, dec("100"));
        assert_eq!(aggressor.leaves_qty, dec("150"));
        assert_eq!(aggressor.status, OrderStatus::Open);
        // nothing rested on either side
        assert!(book.ask_levels().is_empty());
        assert!(book.bid_levels().is_empty());
    }

    #[test]
    fn trades_execute_at_the_resting_price() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("1", Side::Sell, "46.70", 100));

        // aggressive buy limit above the resting ask still trades at 46.70
        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Buy, "46.80", 100))
            .unwrap();
        assert_eq!(matches[0].last_exec_px, dec("46.70"));
        assert_eq!(aggressor.last_exec_px, dec("46.70"));
        assert_eq!(aggressor.executed_notional, dec("4670.00"));
    }

    #[test]
    fn fifo_priority_within_a_level() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("first", Side::Sell, "46.72", 100));
        rest(&mut book, limit("second", Side::Sell, "46.72", 100));

        let (matches, _) = book
            .match_or_add(limit("11", Side::Buy, "46.72", 100))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "first");
        let remaining = book.ask_levels()[0].orders().next().unwrap();
        assert_eq!(remaining.cl_ord_id, "second");
    }

    #[test]
    fn canceled_resting_order_is_skipped_and_expired() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("dead", Side::Sell, "46.72", 100));
        rest(&mut book, limit("live", Side::Sell, "46.72", 100));
        book.cancel_resting(Side::Sell, dec("46.72"), "s1", "dead")
            .unwrap();

        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Buy, "46.72", 100))
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "live");
        assert_eq!(aggressor.status, OrderStatus::Filled);
        // both the canceled and the filled order are gone; level removed
        assert!(book.ask_levels().is_empty());
    }

    #[test]
    fn level_of_only_canceled_orders_is_drained_and_removed() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("dead", Side::Sell, "46.72", 100));
        rest(&mut book, limit("deep", Side::Sell, "46.73", 100));
        book.cancel_resting(Side::Sell, dec("46.72"), "s1", "dead")
            .unwrap();

        let (matches, aggressor) = book
            .match_or_add(limit("11", Side::Buy, "46.73", 100))
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "deep");
        assert_eq!(aggressor.status, OrderStatus::Filled);
        assert!(book.ask_levels().is_empty());
    }

    #[test]
    fn non_crossing_limit_rests_exactly_once() {
        let mut book = OrderBook::new("VALE3");
        let (matches, resting) = book
            .match_or_add(limit("1", Side::Buy, "46.52", 200))
            .unwrap();
        assert!(matches.is_empty());
        assert_eq!(resting.status, OrderStatus::Open);
        assert_eq!(book.bid_levels().len(), 1);
        assert_eq!(book.bid_levels()[0].order_count(), 1);

        // same (sender, clOrdID) at the same price is refused when it rests
        let err = book
            .match_or_add(limit("1", Side::Buy, "46.52", 200))
            .unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));
        assert_eq!(book.bid_levels()[0].order_count(), 1);
    }

    #[test]
    fn duplicate_cl_ord_id_that_fully_crosses_still_trades() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("dup", Side::Buy, "46.52", 200));
        rest(&mut book, limit("a1", Side::Sell, "46.72", 200));

        // same (sender, clOrdID) as the resting bid, but priced to lift the
        // ask completely: it never rests, so it must trade, not reject
        let (matches, aggressor) = book
            .match_or_add(limit("dup", Side::Buy, "46.72", 200))
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].cl_ord_id, "a1");
        assert_eq!(matches[0].status, OrderStatus::Filled);
        assert_eq!(aggressor.status, OrderStatus::Filled);
        assert_eq!(aggressor.executed_quantity, dec("200"));
        assert!(book.ask_levels().is_empty());

        // the earlier resting duplicate is untouched
        let bids = book.bid_levels();
        assert_eq!(bids.len(), 1);
        let resting = bids[0].orders().next().unwrap();
        assert_eq!(resting.cl_ord_id, "dup");
        assert_eq!(resting.leaves_qty, dec("200"));
    }

    #[test]
    fn insertion_keeps_sides_sorted_and_prices_distinct() {
        let mut book = OrderBook::new("VALE3");
        for (cl, px) in [
            ("1", "46.70"),
            ("2", "46.50"),
            ("3", "46.60"),
            ("4", "46.60"),
            ("5", "46.80"),
        ] {
            rest(&mut book, limit(cl, Side::Buy, px, 100));
        }
        let prices: Vec<Decimal> = book.bid_levels().iter().map(|l| l.price()).collect();
        assert_eq!(
            prices,
            vec![dec("46.80"), dec("46.70"), dec("46.60"), dec("46.50")]
        );
        assert_eq!(book.bid_levels()[2].order_count(), 2);

        let mut book = OrderBook::new("VALE3");
        for (cl, px) in [("1", "47.10"), ("2", "47.30"), ("3", "47.20"), ("4", "47.00")] {
            rest(&mut book, limit(cl, Side::Sell, px, 100));
        }
        let prices: Vec<Decimal> = book.ask_levels().iter().map(|l| l.price()).collect();
        assert_eq!(
            prices,
            vec![dec("47.00"), dec("47.10"), dec("47.20"), dec("47.30")]
        );
        assert!(book.ask_levels().iter().all(|l| !l.is_empty()));
    }

    #[test]
    fn stop_orders_are_rejected_by_the_book() {
        let mut book = OrderBook::new("VALE3");
        let mut order = limit("1", Side::Buy, "46.52", 200);
        order.ord_type = OrderType::Stop;
        let err = book.match_or_add(order).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOrderType(_)));
    }

    #[test]
    fn display_renders_both_sides_at_two_decimals() {
        let mut book = OrderBook::new("VALE3");
        rest(&mut book, limit("1", Side::Sell, "46.72", 200));
        rest(&mut book, limit("4", Side::Buy, "46.5", 200));
        let repr = book.display();
        assert!(repr.contains("bid:\n46.50: 200.00\n"));
        assert!(repr.contains("ask:\n46.72: 200.00\n"));
    }
}
