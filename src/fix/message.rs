//! FIX 4.4 tag-value framing and mapping between FIX and engine types.
//!
//! The gateway speaks plain tag=value with SOH separators: `8=FIX.4.4` and
//! `9=BodyLength` open a frame, `10=CheckSum` closes it. Inbound
//! NewOrderSingle messages become [`Order`]s; engine outcomes become
//! ExecutionReport (35=8) field sets.

use crate::error::EngineError;
use crate::order::Order;
use crate::types::{scale2, Execution, OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub const FIX_SOH: u8 = 0x01;
const BEGIN_STRING: &[u8] = b"8=FIX.4.4\x01";

/// Parsed FIX message as tag -> value. Tags 8, 9, 10 participate in framing
/// and are present like any other field.
pub type FixMessage = HashMap<u32, String>;

fn find_byte(buf: &[u8], from: usize, needle: u8) -> Option<usize> {
    buf[from..].iter().position(|&b| b == needle).map(|p| p + from)
}

/// Parses one complete FIX 4.4 frame from the start of `buf`.
///
/// Returns the message and the number of bytes consumed, or `None` when the
/// buffer does not yet hold a complete well-formed frame.
pub fn parse_fix_message(buf: &[u8]) -> Option<(FixMessage, usize)> {
    if buf.len() < BEGIN_STRING.len() + 4 || !buf.starts_with(BEGIN_STRING) {
        return None;
    }
    let len_start = BEGIN_STRING.len();
    if !buf[len_start..].starts_with(b"9=") {
        return None;
    }
    let len_value_start = len_start + 2;
    let len_end = find_byte(buf, len_value_start, FIX_SOH)?;
    let body_len: usize = std::str::from_utf8(&buf[len_value_start..len_end])
        .ok()?
        .parse()
        .ok()?;
    let body_start = len_end + 1;
    let trailer_start = body_start.checked_add(body_len)?;
    // trailer is "10=" + 3 digits + SOH
    let frame_end = trailer_start + 7;
    if frame_end > buf.len() || &buf[trailer_start..trailer_start + 3] != b"10=" {
        return None;
    }

    let mut msg = FixMessage::new();
    let mut pos = 0;
    while pos < frame_end {
        let eq = match find_byte(buf, pos, b'=') {
            Some(e) if e < frame_end => e,
            _ => break,
        };
        let tag: u32 = std::str::from_utf8(&buf[pos..eq]).ok()?.parse().ok()?;
        let value_start = eq + 1;
        let value_end = find_byte(buf, value_start, FIX_SOH).unwrap_or(frame_end);
        let value = std::str::from_utf8(&buf[value_start..value_end]).ok()?.to_string();
        msg.insert(tag, value);
        pos = value_end + 1;
        if tag == 10 {
            break;
        }
    }
    Some((msg, frame_end))
}

/// Builds one outbound FIX frame. Tags 8, 9, and 10 are derived at build
/// time; `set` replaces an existing tag so headers can be filled in late
/// (the delivery worker stamps MsgSeqNum just before the wire).
#[derive(Clone, Debug, Default)]
pub struct FixWriter {
    fields: Vec<(u32, String)>,
}

impl FixWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tag: u32, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((tag, value)),
        }
    }

    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the frame: begin string, body length, fields, checksum.
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (tag, value) in &self.fields {
            if matches!(*tag, 8 | 9 | 10) {
                continue;
            }
            body.extend_from_slice(format!("{tag}={value}\x01").as_bytes());
        }
        let mut frame = Vec::with_capacity(body.len() + 32);
        frame.extend_from_slice(format!("8=FIX.4.4\x019={}\x01", body.len()).as_bytes());
        frame.extend_from_slice(&body);
        let checksum: u32 = frame.iter().map(|&b| b as u32).sum::<u32>() % 256;
        frame.extend_from_slice(format!("10={checksum:03}\x01").as_bytes());
        frame
    }
}

fn require<'a>(msg: &'a FixMessage, tag: u32) -> Result<&'a str, EngineError> {
    msg.get(&tag)
        .map(String::as_str)
        .ok_or(EngineError::InvalidField {
            tag,
            reason: "missing".into(),
        })
}

fn parse_decimal(msg: &FixMessage, tag: u32) -> Result<Decimal, EngineError> {
    require(msg, tag)?
        .parse()
        .map_err(|_| EngineError::InvalidField {
            tag,
            reason: format!("not a decimal: {}", msg[&tag]),
        })
}

/// NewOrderSingle (35=D) -> [`Order`]. The engine order id is left empty for
/// the adapter to assign.
pub fn order_from_new_order_single(msg: &FixMessage) -> Result<Order, EngineError> {
    let cl_ord_id = require(msg, 11)?.to_string();
    let symbol = require(msg, 55)?.to_string();
    let sender_comp_id = require(msg, 49)?.to_string();
    let target_comp_id = require(msg, 56)?.to_string();
    let side = match require(msg, 54)? {
        "1" => Side::Buy,
        "2" => Side::Sell,
        other => {
            return Err(EngineError::InvalidField {
                tag: 54,
                reason: format!("unknown side: {other}"),
            })
        }
    };
    let ord_type = match require(msg, 40)? {
        "1" => OrderType::Market,
        "2" => OrderType::Limit,
        "3" => OrderType::Stop,
        "4" => OrderType::StopLimit,
        other => {
            return Err(EngineError::InvalidField {
                tag: 40,
                reason: format!("unknown order type: {other}"),
            })
        }
    };
    let quantity = parse_decimal(msg, 38)?;
    let price = match ord_type {
        OrderType::Limit | OrderType::StopLimit => parse_decimal(msg, 44)?,
        OrderType::Market | OrderType::Stop => Decimal::ZERO,
    };
    Ok(Order::new(
        cl_ord_id,
        symbol,
        sender_comp_id,
        target_comp_id,
        side,
        ord_type,
        price,
        quantity,
        "",
    ))
}

fn side_to_fix(side: Side) -> &'static str {
    match side {
        Side::Buy => "1",
        Side::Sell => "2",
    }
}

fn ord_status_to_fix(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Open => "1",     // partially filled from this path
        OrderStatus::Filled => "2",
        OrderStatus::Canceled => "4",
        OrderStatus::Rejected => "8",
    }
}

/// ExecutionReport (35=8) for one fill against `order`.
///
/// `execution` is the fill being reported; the remaining fields carry the
/// order's current accounting. All numeric fields are emitted at scale 2.
/// MsgSeqNum (34) is a placeholder until the delivery worker stamps it.
pub fn execution_report(order: &Order, execution: &Execution, exec_id: &str) -> FixWriter {
    let mut w = FixWriter::new();
    w.set(35, "8");
    w.set(34, "0");
    w.set(49, order.target_comp_id.clone());
    w.set(56, order.sender_comp_id.clone());
    w.set(52, utc_timestamp_now());
    w.set(11, order.cl_ord_id.clone());
    w.set(37, order.order_id.clone());
    w.set(17, exec_id);
    w.set(150, if execution.is_fill { "2" } else { "1" });
    w.set(39, ord_status_to_fix(order.status));
    w.set(54, side_to_fix(order.side));
    w.set(151, scale2(order.leaves_qty));
    w.set(14, scale2(order.executed_quantity));
    w.set(6, scale2(order.avg_px().unwrap_or(Decimal::ZERO)));
    w.set(32, scale2(execution.quantity));
    w.set(31, scale2(execution.price));
    w
}

/// ExecutionReport reject (39=8, 150=8) with a Text(58) reason.
pub fn reject_report(order: &Order, exec_id: &str, reason: &str) -> FixWriter {
    let mut w = FixWriter::new();
    w.set(35, "8");
    w.set(34, "0");
    w.set(49, order.target_comp_id.clone());
    w.set(56, order.sender_comp_id.clone());
    w.set(52, utc_timestamp_now());
    w.set(11, order.cl_ord_id.clone());
    w.set(
        37,
        if order.order_id.is_empty() {
            "0"
        } else {
            order.order_id.as_str()
        },
    );
    w.set(17, exec_id);
    w.set(150, "8");
    w.set(39, "8");
    w.set(54, side_to_fix(order.side));
    w.set(151, scale2(order.leaves_qty));
    w.set(14, scale2(order.executed_quantity));
    w.set(58, reason);
    w
}

/// SendingTime (52) in FIX UTC format, seconds resolution.
pub fn utc_timestamp_now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    const SECS_PER_DAY: u64 = 86_400;
    let (y, mo, d) = civil_from_days((secs / SECS_PER_DAY) as i64);
    let t = secs % SECS_PER_DAY;
    format!(
        "{:04}{:02}{:02}-{:02}:{:02}:{:02}",
        y,
        mo,
        d,
        t / 3600,
        (t % 3600) / 60,
        t % 60
    )
}

// Howard Hinnant's civil-date algorithm, days since 1970-01-01 to (y, m, d).
fn civil_from_days(days: i64) -> (u32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = (yoe + era * 400 + i64::from(m <= 2)) as u32;
    (y, m, d)
}
