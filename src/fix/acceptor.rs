//! FIX 4.4 TCP acceptor: one listener, one shared adapter.
//!
//! Each connection runs on its own thread: reassemble frames, drive the
//! session handshake (Logon/Logout/Heartbeat/TestRequest), and route
//! application messages into the [`SessionAdapter`]. Logons are validated
//! against the configured session table; outbound traffic for an established
//! session goes through the registry so sequence numbers stay ordered.

use crate::fix::message::{parse_fix_message, utc_timestamp_now, FixMessage, FixWriter};
use crate::fix::session::{SessionAdapter, SessionKey};
use log::{info, warn};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

/// Accept loop. Blocks for the lifetime of the listener.
pub fn run_fix_acceptor(listener: TcpListener, adapter: Arc<SessionAdapter>) {
    for stream in listener.incoming().flatten() {
        let adapter = Arc::clone(&adapter);
        std::thread::spawn(move || {
            if let Err(e) = handle_connection(stream, adapter) {
                warn!("FIX connection error: {e}");
            }
        });
    }
}

enum Flow {
    Continue,
    Close,
}

fn handle_connection(mut stream: TcpStream, adapter: Arc<SessionAdapter>) -> Result<(), String> {
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(|e| e.to_string())?;
    stream
        .set_write_timeout(Some(Duration::from_secs(10)))
        .map_err(|e| e.to_string())?;

    let registry = adapter.registry();
    let mut session_key: Option<SessionKey> = None;
    let mut buf = vec![0u8; 4096];
    let mut filled = 0;

    let result = loop {
        if filled == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }
        let n = match stream.read(&mut buf[filled..]) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e.to_string()),
        };
        filled += n;

        let mut flow = Flow::Continue;
        while let Some((msg, consumed)) = parse_fix_message(&buf[..filled]) {
            buf.copy_within(consumed..filled, 0);
            filled -= consumed;
            match dispatch(&msg, &mut stream, &adapter, &mut session_key) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => {
                    flow = Flow::Close;
                    break;
                }
                Err(e) => {
                    warn!("dropping FIX connection: {e}");
                    flow = Flow::Close;
                    break;
                }
            }
        }
        if matches!(flow, Flow::Close) {
            break Ok(());
        }
    };

    if let Some(key) = session_key {
        registry.unregister(&key);
    }
    result
}

fn dispatch(
    msg: &FixMessage,
    stream: &mut TcpStream,
    adapter: &Arc<SessionAdapter>,
    session_key: &mut Option<SessionKey>,
) -> Result<Flow, String> {
    let msg_type = msg
        .get(&35)
        .ok_or_else(|| "missing MsgType (35)".to_string())?
        .as_str();
    match msg_type {
        "A" => handle_logon(msg, stream, adapter, session_key),
        "5" => {
            if let Some(key) = session_key.take() {
                let _ = adapter
                    .registry()
                    .send(&key, admin_message("5", &key));
                adapter.registry().unregister(&key);
            }
            Ok(Flow::Close)
        }
        "0" | "1" => {
            if let Some(key) = session_key.as_ref() {
                let mut heartbeat = admin_message("0", key);
                if let Some(test_req_id) = msg.get(&112) {
                    heartbeat.set(112, test_req_id.clone());
                }
                adapter
                    .registry()
                    .send(key, heartbeat)
                    .map_err(|e| format!("heartbeat send failed: {e:?}"))?;
            }
            Ok(Flow::Continue)
        }
        "D" => {
            let Some(key) = session_key.as_ref() else {
                warn!("NewOrderSingle before logon; ignoring");
                return Ok(Flow::Continue);
            };
            if let Err(err) = adapter.on_new_order_single(msg) {
                let mut reject = admin_message("3", key);
                reject.set(372, "D");
                reject.set(58, err.to_string());
                let _ = adapter.registry().send(key, reject);
            }
            Ok(Flow::Continue)
        }
        "F" => {
            adapter.on_order_cancel_request(msg);
            Ok(Flow::Continue)
        }
        "V" => {
            adapter.on_market_data_request(msg);
            Ok(Flow::Continue)
        }
        other => {
            warn!("unhandled FIX MsgType {other}");
            Ok(Flow::Continue)
        }
    }
}

fn handle_logon(
    msg: &FixMessage,
    stream: &mut TcpStream,
    adapter: &Arc<SessionAdapter>,
    session_key: &mut Option<SessionKey>,
) -> Result<Flow, String> {
    let client = msg.get(&49).cloned().unwrap_or_default();
    let gateway = msg.get(&56).cloned().unwrap_or_default();
    // gateway-side identity is the mirror of the client's header
    let key = SessionKey::fix44(gateway.clone(), client.clone());

    if adapter.config().session_for(&gateway, &client).is_none() {
        warn!("logon rejected for unknown session {client}->{gateway}");
        let mut logout = admin_message("5", &key);
        logout.set(34, "1");
        logout.set(58, "unknown session");
        stream
            .write_all(&logout.build())
            .map_err(|e| e.to_string())?;
        return Ok(Flow::Close);
    }

    let sink = stream.try_clone().map_err(|e| e.to_string())?;
    adapter.registry().register(key.clone(), Box::new(sink));
    let mut ack = admin_message("A", &key);
    ack.set(98, "0");
    ack.set(108, msg.get(&108).cloned().unwrap_or_else(|| "30".into()));
    adapter
        .registry()
        .send(&key, ack)
        .map_err(|e| format!("logon ack failed: {e:?}"))?;
    info!("logon accepted for {client}");
    *session_key = Some(key);
    Ok(Flow::Continue)
}

/// Header skeleton for session-level messages; MsgSeqNum is stamped by the
/// registry at send time.
fn admin_message(msg_type: &str, key: &SessionKey) -> FixWriter {
    let mut w = FixWriter::new();
    w.set(35, msg_type);
    w.set(49, key.sender_comp_id.clone());
    w.set(56, key.target_comp_id.clone());
    w.set(52, utc_timestamp_now());
    w
}
