//! Deterministic synthetic order flow for replay tests and benchmarks.
//!
//! Same config (including seed) produces the same stream of orders.

use crate::order::Order;
use crate::types::{OrderType, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Configuration for the synthetic flow generator. Ranges are inclusive.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// RNG seed; same seed means the same stream.
    pub seed: u64,
    pub symbol: String,
    /// Client comp ids orders are attributed to, round-robin weighted by RNG.
    pub sessions: Vec<String>,
    /// The gateway's comp id (order target).
    pub gateway_comp_id: String,
    pub num_orders: usize,
    /// Probability of Buy; Sell otherwise.
    pub buy_ratio: f64,
    /// Probability of Limit; Market otherwise.
    pub limit_ratio: f64,
    /// Limit price range in integer cents.
    pub price_min_cents: i64,
    pub price_max_cents: i64,
    /// Quantity range in whole units.
    pub quantity_min: u64,
    pub quantity_max: u64,
    /// Probability of reusing a previously emitted (sender, clOrdID) pair
    /// instead of a fresh one, to exercise duplicate handling.
    pub duplicate_ratio: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            symbol: "VALE3".into(),
            sessions: vec!["CLIENT1".into(), "CLIENT2".into(), "CLIENT3".into()],
            gateway_comp_id: "EXEC".into(),
            num_orders: 1000,
            buy_ratio: 0.5,
            limit_ratio: 0.9,
            price_min_cents: 4_600,
            price_max_cents: 4_700,
            quantity_min: 1,
            quantity_max: 500,
            duplicate_ratio: 0.0,
        }
    }
}

/// Deterministic order stream.
pub struct FlowGenerator {
    rng: StdRng,
    config: FlowConfig,
    next_serial: u64,
    emitted: Vec<(String, String)>,
}

impl FlowGenerator {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_serial: 0,
            emitted: Vec::new(),
        }
    }

    /// Generates the next order. Fresh clOrdIDs are unique per sender
    /// session; with `duplicate_ratio > 0` an already-emitted pair may be
    /// resubmitted.
    pub fn next_order(&mut self) -> Order {
        let side = if self.rng.gen_bool(self.config.buy_ratio) {
            Side::Buy
        } else {
            Side::Sell
        };
        let ord_type = if self.rng.gen_bool(self.config.limit_ratio) {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        let price = match ord_type {
            OrderType::Limit => Decimal::new(
                self.rng
                    .gen_range(self.config.price_min_cents..=self.config.price_max_cents),
                2,
            ),
            _ => Decimal::ZERO,
        };
        let quantity = Decimal::from(
            self.rng
                .gen_range(self.config.quantity_min..=self.config.quantity_max),
        );
        let reuse = !self.emitted.is_empty() && self.rng.gen_bool(self.config.duplicate_ratio);
        let (sender, cl_ord_id) = if reuse {
            self.emitted[self.rng.gen_range(0..self.emitted.len())].clone()
        } else {
            self.next_serial += 1;
            let sender = self.config.sessions
                [self.rng.gen_range(0..self.config.sessions.len())]
            .clone();
            let cl_ord_id = format!("{sender}-{}", self.next_serial);
            self.emitted.push((sender.clone(), cl_ord_id.clone()));
            (sender, cl_ord_id)
        };
        Order::new(
            cl_ord_id,
            self.config.symbol.clone(),
            sender,
            self.config.gateway_comp_id.clone(),
            side,
            ord_type,
            price,
            quantity,
            "",
        )
    }

    /// Collects `num_orders` orders.
    pub fn all_orders(mut self) -> Vec<Order> {
        (0..self.config.num_orders).map(|_| self.next_order()).collect()
    }
}
