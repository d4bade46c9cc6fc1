//! Error taxonomy for the matching core and the protocol adapter.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by the matching core and the session adapter.
///
/// Business kinds (`Duplicate`, `NoLiquidity`, `UnsupportedOrderType`,
/// `InvalidQuantity`, `InvalidField`, `UnknownOrder`) are translated into
/// protocol-level rejects. Invariant-violation kinds (`Empty`, `Mismatch`,
/// `ExceedsLeaves`) indicate bugs and abort the current submit; the engine
/// does not attempt partial rollback of an in-flight match.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `(senderCompID, clOrdID)` already active on the target book level.
    #[error("order {sender}-{cl_ord_id} already exists")]
    Duplicate { sender: String, cl_ord_id: String },

    /// Pop from an empty level FIFO.
    #[error("cannot pop from empty book level")]
    Empty,

    /// Level head did not carry the expected clOrdID.
    #[error("wrong clOrdID at level head: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    /// Execution quantity larger than the order's leaves quantity.
    #[error("execution quantity {quantity} exceeds leaves {leaves}")]
    ExceedsLeaves { quantity: Decimal, leaves: Decimal },

    /// Market order arrived against an empty opposite side.
    #[error("no {side}-side liquidity to match market order")]
    NoLiquidity { side: &'static str },

    /// Order type the engine does not match (e.g. stop orders).
    #[error("order type {0} is not supported")]
    UnsupportedOrderType(String),

    /// Order quantity was zero or negative.
    #[error("order quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    /// An inbound protocol field was missing or failed to parse.
    #[error("invalid field {tag}: {reason}")]
    InvalidField { tag: u32, reason: String },

    /// Cancel target was not found in the level index.
    #[error("order {sender}-{cl_ord_id} is not resting at this level")]
    UnknownOrder { sender: String, cl_ord_id: String },
}

impl EngineError {
    /// True for kinds that indicate a broken engine invariant rather than a
    /// rejectable business condition.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            EngineError::Empty | EngineError::Mismatch { .. } | EngineError::ExceedsLeaves { .. }
        )
    }
}
