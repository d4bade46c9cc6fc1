//! Order record with per-execution accounting.
//!
//! An [`Order`] is constructed by the session adapter, handed to the engine,
//! and owned by the engine thereafter. Fills mutate it in place through
//! [`Order::execute`]; each fill appends an immutable [`Execution`] to the
//! order's audit log.

use crate::error::EngineError;
use crate::types::{Execution, OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single order and its execution accounting.
///
/// Invariants held after every engine operation:
/// - `quantity > 0`, `leaves_qty = quantity - executed_quantity`,
///   `0 <= executed_quantity <= quantity`
/// - `status == Filled` iff `leaves_qty == 0`
/// - `executed_notional` equals the sum of `price * quantity` over
///   `executions`
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Order {
    /// Client-assigned id, unique within the sender session.
    pub cl_ord_id: String,
    /// Engine-assigned id, unique per process. Empty until assigned.
    pub order_id: String,
    pub symbol: String,
    /// Session identity of the originator.
    pub sender_comp_id: String,
    /// The engine's identity on that session.
    pub target_comp_id: String,
    pub side: Side,
    pub ord_type: OrderType,
    /// Limit price; ignored for market orders.
    pub price: Decimal,
    /// Original order quantity. Strictly positive.
    pub quantity: Decimal,
    pub executed_quantity: Decimal,
    pub leaves_qty: Decimal,
    pub last_exec_quantity: Decimal,
    pub last_exec_px: Decimal,
    pub executed_notional: Decimal,
    pub status: OrderStatus,
    /// UTC creation time, milliseconds since the epoch.
    pub created_at_ms: u64,
    /// Append-only fill log.
    pub executions: Vec<Execution>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cl_ord_id: impl Into<String>,
        symbol: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
        side: Side,
        ord_type: OrderType,
        price: Decimal,
        quantity: Decimal,
        order_id: impl Into<String>,
    ) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            cl_ord_id: cl_ord_id.into(),
            order_id: order_id.into(),
            symbol: symbol.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            side,
            ord_type,
            price,
            quantity,
            executed_quantity: Decimal::ZERO,
            leaves_qty: quantity,
            last_exec_quantity: Decimal::ZERO,
            last_exec_px: Decimal::ZERO,
            executed_notional: Decimal::ZERO,
            status: OrderStatus::Open,
            created_at_ms,
            executions: Vec::new(),
        }
    }

    /// Applies one fill of `quantity` at `price`.
    ///
    /// Fails with [`EngineError::ExceedsLeaves`] if `quantity` is larger than
    /// the current leaves. Transitions to `Filled` when leaves reach zero.
    /// Not re-entrant; the engine serializes all executes on one executor.
    pub fn execute(&mut self, price: Decimal, quantity: Decimal) -> Result<(), EngineError> {
        if quantity > self.leaves_qty {
            return Err(EngineError::ExceedsLeaves {
                quantity,
                leaves: self.leaves_qty,
            });
        }
        self.executed_quantity += quantity;
        self.leaves_qty -= quantity;
        self.last_exec_quantity = quantity;
        self.last_exec_px = price;
        self.executed_notional += price * quantity;
        if self.leaves_qty.is_zero() {
            self.status = OrderStatus::Filled;
        }
        self.executions.push(Execution {
            price,
            quantity,
            is_fill: self.leaves_qty.is_zero(),
        });
        Ok(())
    }

    /// Cancels the order. Idempotent; no effect on accounting.
    ///
    /// Terminal states (`Filled`, `Rejected`, `Canceled`) are left unchanged
    /// so a canceled or rejected order never re-opens.
    pub fn cancel(&mut self) {
        if self.status == OrderStatus::Open {
            self.status = OrderStatus::Canceled;
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Volume-weighted average execution price, `None` when nothing has
    /// executed (the defined divide-by-zero behavior).
    pub fn avg_px(&self) -> Option<Decimal> {
        self.executed_notional.checked_div(self.executed_quantity)
    }

    /// Most recent execution, if any.
    pub fn last_execution(&self) -> Option<&Execution> {
        self.executions.last()
    }
}
