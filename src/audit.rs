//! Structured audit trail for order-entry activity.
//!
//! One JSON line per event. The gateway records every inbound application
//! message outcome and every failed report delivery; sinks are pluggable so
//! tests can capture events in memory.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrderSubmit,
    OrderReject,
    CancelRequest,
    MarketDataRequest,
    ReportDeliveryFailed,
}

/// How it ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Accepted,
    Rejected,
    Error,
}

/// One audit record.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    /// UTC milliseconds since the epoch.
    pub timestamp_ms: u64,
    /// Originating session (SenderCompID), or "gateway" for internal events.
    pub session: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Action-specific identifiers (symbol, clOrdID, reason, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn now(
        session: impl Into<String>,
        action: AuditAction,
        outcome: AuditOutcome,
        detail: Option<serde_json::Value>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp_ms,
            session: session.into(),
            action,
            outcome,
            detail,
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent);
}

/// One JSON line per event on stdout.
pub struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }
}

/// Captures events in memory for tests. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: std::sync::Arc<std::sync::Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &AuditEvent) {
        self.events.lock().expect("audit lock").push(event.clone());
    }
}
