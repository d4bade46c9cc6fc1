//! # ordermatch
//!
//! Price-time priority matching engine for an equities-style venue, with a
//! FIX 4.4 order-entry gateway.
//!
//! ## Entry point
//!
//! [`Engine`] is the matching core: one [`OrderBook`] per symbol, created
//! lazily, driven through [`Engine::submit`]. The FIX side lives in [`fix`]:
//! the acceptor feeds parsed application messages into
//! [`fix::SessionAdapter`], which submits orders and fans execution reports
//! back out to the originating sessions.
//!
//! ## Example
//!
//! ```rust
//! use ordermatch::{Engine, Order, OrderStatus, OrderType, Side};
//! use rust_decimal::Decimal;
//!
//! let mut engine = Engine::new();
//! let sell = Order::new(
//!     "s1", "VALE3", "CLIENT1", "EXEC",
//!     Side::Sell, OrderType::Limit,
//!     "46.72".parse::<Decimal>().unwrap(), Decimal::from(200), "",
//! );
//! engine.submit(sell).unwrap();
//!
//! let buy = Order::new(
//!     "b1", "VALE3", "CLIENT2", "EXEC",
//!     Side::Buy, OrderType::Limit,
//!     "46.72".parse::<Decimal>().unwrap(), Decimal::from(200), "",
//! );
//! let outcome = engine.submit(buy).unwrap();
//! assert_eq!(outcome.matches.len(), 1);
//! assert_eq!(outcome.aggressor.status, OrderStatus::Filled);
//! ```
//!
//! All prices, quantities, and notionals are `rust_decimal::Decimal`; no
//! floating point participates in matching decisions.

pub mod api;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod fix;
pub mod order;
pub mod order_book;
pub mod order_gen;
pub mod types;

pub use engine::{Engine, MatchOutcome};
pub use error::EngineError;
pub use order::Order;
pub use order_book::{BookLevel, OrderBook};
pub use types::{Execution, OrderStatus, OrderType, Side};
