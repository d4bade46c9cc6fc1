//! Matching engine facade: one book per symbol, process-wide id counters.
//!
//! The engine is single-threaded cooperative: one logical executor owns it
//! and processes submissions serially. [`Engine::submit`] is synchronous and
//! returns the full match outcome; callers serialize access (the gateway
//! holds the engine behind a mutex).

use crate::error::EngineError;
use crate::order::Order;
use crate::order_book::OrderBook;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Result of one submission: counterparty orders touched by the match, in
/// touch order, and the aggressor's post-match state.
#[derive(Clone, Debug)]
pub struct MatchOutcome {
    pub matches: Vec<Order>,
    pub aggressor: Order,
}

/// Multi-symbol matching engine. Books are created lazily on the first order
/// for a symbol and live for the process lifetime.
#[derive(Debug, Default)]
pub struct Engine {
    books: HashMap<String, OrderBook>,
    next_order_id: u64,
    next_exec_id: u64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next engine-wide order id.
    pub fn next_order_id(&mut self) -> String {
        self.next_order_id += 1;
        self.next_order_id.to_string()
    }

    /// Allocates the next engine-wide execution id.
    pub fn next_exec_id(&mut self) -> String {
        self.next_exec_id += 1;
        self.next_exec_id.to_string()
    }

    /// Runs the incoming order through its symbol's book.
    ///
    /// Assigns an order id when the caller has not, validates the quantity,
    /// and delegates to [`OrderBook::match_or_add`]. Business failures
    /// (`NoLiquidity`, `UnsupportedOrderType`, `Duplicate`, `InvalidQuantity`)
    /// leave the engine usable; invariant violations abort the submit without
    /// rollback.
    pub fn submit(&mut self, mut order: Order) -> Result<MatchOutcome, EngineError> {
        if order.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(order.quantity));
        }
        if order.order_id.is_empty() {
            order.order_id = self.next_order_id();
        }
        let book = self
            .books
            .entry(order.symbol.clone())
            .or_insert_with(|| OrderBook::new(order.symbol.clone()));
        let (matches, aggressor) = book.match_or_add(order)?;
        Ok(MatchOutcome { matches, aggressor })
    }

    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// Traded symbols, sorted for stable display.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.books.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}
