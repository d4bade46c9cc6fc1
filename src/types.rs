//! Core order-entry types (sides, order types, lifecycle status, executions).
//!
//! [`Side`], [`OrderType`], and [`OrderStatus`] define the order message and
//! lifecycle. [`Execution`] is the immutable per-fill audit record appended to
//! the order that executed.

use rust_decimal::Decimal;

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Order type as carried by the protocol. The engine matches `Market` and
/// `Limit`; the remaining variants parse but are rejected at submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Order lifecycle status.
///
/// `Filled` iff leaves quantity reached zero. `Canceled` and `Rejected` are
/// terminal: an order never transitions out of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    Open,
    Filled,
    Rejected,
    Canceled,
}

/// One fill against an order. Immutable once appended.
///
/// `is_fill` is true iff this execution brought the order's executed quantity
/// up to its full quantity.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Execution {
    pub price: Decimal,
    pub quantity: Decimal,
    pub is_fill: bool,
}

/// Renders a decimal at fixed two-decimal scale, the scale used for all
/// outbound numeric protocol fields and for book display.
pub fn scale2(value: Decimal) -> String {
    let mut v = value.round_dp(2);
    v.rescale(2);
    v.to_string()
}
