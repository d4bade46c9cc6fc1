//! Session bookkeeping and the engine-to-protocol adapter.
//!
//! [`SessionRegistry`] tracks established sessions and owns per-session
//! outbound sequence numbers. [`SessionAdapter`] turns inbound application
//! messages into engine calls and engine outcomes into execution reports;
//! reports are handed to a single transmission worker over an SPSC queue so
//! fills for a given order are delivered in the order they occurred.

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
use crate::config::GatewayConfig;
use crate::engine::{Engine, MatchOutcome};
use crate::error::EngineError;
use crate::fix::message::{
    execution_report, order_from_new_order_single, reject_report, FixMessage, FixWriter,
};
use crate::order::Order;
use log::{error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// Delivery retry bounds for reports addressed to a session that is not yet
/// established.
pub const DELIVERY_ATTEMPTS: u32 = 25;
pub const DELIVERY_BACKOFF: Duration = Duration::from_millis(5);

/// Identity of one session from the gateway's perspective.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub begin_string: String,
    /// The gateway's CompID.
    pub sender_comp_id: String,
    /// The counterparty's CompID.
    pub target_comp_id: String,
}

impl SessionKey {
    pub fn fix44(sender_comp_id: impl Into<String>, target_comp_id: impl Into<String>) -> Self {
        Self {
            begin_string: "FIX.4.4".into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
        }
    }

    /// Destination session for reports about `order`: the order's sender and
    /// target comp ids, swapped for the outbound direction.
    pub fn for_order(order: &Order) -> Self {
        Self::fix44(order.target_comp_id.clone(), order.sender_comp_id.clone())
    }
}

/// Transport half of an established session.
pub trait SessionSink: Send {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()>;
}

impl SessionSink for std::net::TcpStream {
    fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.write_all(frame)
    }
}

struct SessionHandle {
    sink: Box<dyn SessionSink>,
    next_seq: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendError {
    /// No established session under that key (yet).
    NotEstablished,
    Io(String),
}

/// Established sessions, keyed by [`SessionKey`].
///
/// All outbound frames for a session go through [`SessionRegistry::send`],
/// which stamps MsgSeqNum under the registry lock so admin messages and
/// execution reports share one ordered sequence.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: SessionKey, sink: Box<dyn SessionSink>) {
        info!(
            "session established: {}->{}",
            key.sender_comp_id, key.target_comp_id
        );
        self.sessions
            .lock()
            .expect("registry lock")
            .insert(key, SessionHandle { sink, next_seq: 1 });
    }

    pub fn unregister(&self, key: &SessionKey) {
        if self
            .sessions
            .lock()
            .expect("registry lock")
            .remove(key)
            .is_some()
        {
            info!(
                "session closed: {}->{}",
                key.sender_comp_id, key.target_comp_id
            );
        }
    }

    pub fn is_established(&self, key: &SessionKey) -> bool {
        self.sessions.lock().expect("registry lock").contains_key(key)
    }

    /// Stamps MsgSeqNum and writes the frame to the session's transport.
    pub fn send(&self, key: &SessionKey, mut msg: FixWriter) -> Result<(), SendError> {
        let mut sessions = self.sessions.lock().expect("registry lock");
        let handle = sessions.get_mut(key).ok_or(SendError::NotEstablished)?;
        msg.set(34, handle.next_seq.to_string());
        let frame = msg.build();
        match handle.sink.send(&frame) {
            Ok(()) => {
                handle.next_seq += 1;
                Ok(())
            }
            Err(e) => Err(SendError::Io(e.to_string())),
        }
    }
}

/// One queued execution report.
pub struct OutboundReport {
    pub destination: SessionKey,
    pub message: FixWriter,
    pub cl_ord_id: String,
}

/// Producer side of the report queue.
#[derive(Clone)]
pub struct ReportDispatcher {
    tx: mpsc::Sender<OutboundReport>,
}

impl ReportDispatcher {
    pub fn enqueue(&self, report: OutboundReport) {
        if self.tx.send(report).is_err() {
            warn!("report worker has stopped; dropping execution report");
        }
    }
}

/// Spawns the transmission worker: a single consumer draining the queue in
/// FIFO order. A report whose destination session is not yet established is
/// retried with bounded backoff; the final failure is logged and audited but
/// never unwinds the match that produced it.
pub fn spawn_report_worker(
    registry: Arc<SessionRegistry>,
    audit: Arc<dyn AuditSink>,
) -> ReportDispatcher {
    let (tx, rx) = mpsc::channel::<OutboundReport>();
    std::thread::spawn(move || {
        for report in rx {
            deliver_with_retry(&registry, audit.as_ref(), report);
        }
    });
    ReportDispatcher { tx }
}

fn deliver_with_retry(registry: &SessionRegistry, audit: &dyn AuditSink, report: OutboundReport) {
    let mut last_err = SendError::NotEstablished;
    for _ in 0..DELIVERY_ATTEMPTS {
        match registry.send(&report.destination, report.message.clone()) {
            Ok(()) => return,
            Err(err) => {
                last_err = err;
                std::thread::sleep(DELIVERY_BACKOFF);
            }
        }
    }
    warn!(
        "execution report for clOrdID {} undeliverable to {}: {:?}",
        report.cl_ord_id, report.destination.target_comp_id, last_err
    );
    audit.emit(&AuditEvent::now(
        report.destination.target_comp_id.clone(),
        AuditAction::ReportDeliveryFailed,
        AuditOutcome::Error,
        Some(serde_json::json!({
            "cl_ord_id": report.cl_ord_id,
            "error": format!("{last_err:?}"),
        })),
    ));
}

/// Bridges the order-entry protocol to the engine.
///
/// Owns the engine (behind the executor mutex), the session registry, and
/// the report dispatcher. The acceptor calls `on_*` per inbound application
/// message.
pub struct SessionAdapter {
    engine: Arc<Mutex<Engine>>,
    registry: Arc<SessionRegistry>,
    dispatcher: ReportDispatcher,
    audit: Arc<dyn AuditSink>,
    config: GatewayConfig,
}

impl SessionAdapter {
    pub fn new(config: GatewayConfig, audit: Arc<dyn AuditSink>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = spawn_report_worker(Arc::clone(&registry), Arc::clone(&audit));
        Self {
            engine: Arc::new(Mutex::new(Engine::new())),
            registry,
            dispatcher,
            audit,
            config,
        }
    }

    pub fn engine(&self) -> Arc<Mutex<Engine>> {
        Arc::clone(&self.engine)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// NewOrderSingle: construct the order, submit, fan out report pairs.
    ///
    /// Business failures become execution-report rejects on the aggressor's
    /// session. Invariant violations are logged as errors and produce no
    /// report. A field-level parse failure is returned to the acceptor for a
    /// session-level reject.
    pub fn on_new_order_single(&self, msg: &FixMessage) -> Result<(), EngineError> {
        let order = order_from_new_order_single(msg)?;
        let session = order.sender_comp_id.clone();
        let outcome = {
            let mut engine = self.engine.lock().expect("engine lock");
            let mut submitted = order.clone();
            submitted.order_id = engine.next_order_id();
            engine.submit(submitted)
        };
        match outcome {
            Ok(outcome) => {
                self.audit.emit(&AuditEvent::now(
                    session,
                    AuditAction::OrderSubmit,
                    AuditOutcome::Accepted,
                    Some(serde_json::json!({
                        "symbol": order.symbol,
                        "cl_ord_id": order.cl_ord_id,
                        "order_id": outcome.aggressor.order_id,
                        "fills": outcome.matches.len(),
                    })),
                ));
                self.dispatch_fill_reports(&outcome);
                Ok(())
            }
            Err(err) if err.is_invariant_violation() => {
                error!(
                    "submit aborted by invariant violation for {}-{}: {err}",
                    order.sender_comp_id, order.cl_ord_id
                );
                self.audit.emit(&AuditEvent::now(
                    session,
                    AuditAction::OrderSubmit,
                    AuditOutcome::Error,
                    Some(serde_json::json!({
                        "cl_ord_id": order.cl_ord_id,
                        "error": err.to_string(),
                    })),
                ));
                Ok(())
            }
            Err(err) => {
                self.audit.emit(&AuditEvent::now(
                    session,
                    AuditAction::OrderReject,
                    AuditOutcome::Rejected,
                    Some(serde_json::json!({
                        "symbol": order.symbol,
                        "cl_ord_id": order.cl_ord_id,
                        "reason": err.to_string(),
                    })),
                ));
                let exec_id = self.engine.lock().expect("engine lock").next_exec_id();
                self.dispatcher.enqueue(OutboundReport {
                    destination: SessionKey::for_order(&order),
                    message: reject_report(&order, &exec_id, &err.to_string()),
                    cl_ord_id: order.cl_ord_id.clone(),
                });
                Ok(())
            }
        }
    }

    /// One report pair per counterparty fill: the resting order's report is
    /// built and queued first, then the aggressor's, in touch order. The
    /// aggressor's i-th execution corresponds to the i-th matched order.
    fn dispatch_fill_reports(&self, outcome: &MatchOutcome) {
        for (i, resting) in outcome.matches.iter().enumerate() {
            let Some(resting_exec) = resting.last_execution() else {
                continue;
            };
            let (resting_exec_id, aggressor_exec_id) = {
                let mut engine = self.engine.lock().expect("engine lock");
                (engine.next_exec_id(), engine.next_exec_id())
            };
            self.dispatcher.enqueue(OutboundReport {
                destination: SessionKey::for_order(resting),
                message: execution_report(resting, resting_exec, &resting_exec_id),
                cl_ord_id: resting.cl_ord_id.clone(),
            });
            if let Some(aggressor_exec) = outcome.aggressor.executions.get(i) {
                self.dispatcher.enqueue(OutboundReport {
                    destination: SessionKey::for_order(&outcome.aggressor),
                    message: execution_report(&outcome.aggressor, aggressor_exec, &aggressor_exec_id),
                    cl_ord_id: outcome.aggressor.cl_ord_id.clone(),
                });
            }
        }
    }

    /// OrderCancelRequest: accepted and acknowledged only. Cancel lookup
    /// semantics are deliberately not implemented.
    pub fn on_order_cancel_request(&self, msg: &FixMessage) {
        let session = msg.get(&49).cloned().unwrap_or_else(|| "unknown".into());
        info!(
            "cancel request from {session} for origClOrdID {:?} acknowledged (no-op)",
            msg.get(&41)
        );
        self.audit.emit(&AuditEvent::now(
            session,
            AuditAction::CancelRequest,
            AuditOutcome::Accepted,
            Some(serde_json::json!({
                "orig_cl_ord_id": msg.get(&41),
                "symbol": msg.get(&55),
            })),
        ));
    }

    /// MarketDataRequest: accepted and logged only.
    pub fn on_market_data_request(&self, msg: &FixMessage) {
        let session = msg.get(&49).cloned().unwrap_or_else(|| "unknown".into());
        info!("market data request from {session} acknowledged (no-op)");
        self.audit.emit(&AuditEvent::now(
            session,
            AuditAction::MarketDataRequest,
            AuditOutcome::Accepted,
            Some(serde_json::json!({ "md_req_id": msg.get(&262) })),
        ));
    }
}
