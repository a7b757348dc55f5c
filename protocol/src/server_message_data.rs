//! Codec for `server_message_data` values.
//!
//! These are Base64URL-encoded (no padding) bare proto3 messages with shape:
//! field 1 = string UUID (36 chars), field 3 = embedded Timestamp
//! (1 = varint seconds, 2 = varint nanos). Decoding classifies the payload
//! as `UUID_ONLY`, `TIMESTAMP_ONLY`, `UUID_AND_TIMESTAMP`, or `UNKNOWN` and
//! adds ISO-8601 renderings (UTC and America/New_York) when seconds are
//! present; nanos are truncated to microseconds.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Debug, Error)]
pub enum SmdError {
    #[error("base64url decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid varint")]
    InvalidVarint,
    #[error("truncated payload")]
    Truncated,
}

/// Classification of a decoded payload by which fields were present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerMessageDataKind {
    UuidOnly,
    TimestampOnly,
    UuidAndTimestamp,
    Unknown,
}

impl ServerMessageDataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UuidOnly => "UUID_ONLY",
            Self::TimestampOnly => "TIMESTAMP_ONLY",
            Self::UuidAndTimestamp => "UUID_AND_TIMESTAMP",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Structured form of a decoded `server_message_data` string.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerMessageData {
    pub uuid: Option<String>,
    pub seconds: Option<i64>,
    pub nanos: Option<i32>,
    pub iso_utc: Option<String>,
    pub iso_ny: Option<String>,
    pub kind: ServerMessageDataKind,
}

impl ServerMessageData {
    /// JSON object form used when rewriting decoded payloads into response
    /// dictionaries. Only present fields are emitted, plus `type`.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(u) = &self.uuid {
            obj.insert("uuid".into(), json!(u));
        }
        if let Some(s) = self.seconds {
            obj.insert("seconds".into(), json!(s));
        }
        if let Some(n) = self.nanos {
            obj.insert("nanos".into(), json!(n));
        }
        if let Some(s) = &self.iso_utc {
            obj.insert("iso_utc".into(), json!(s));
        }
        if let Some(s) = &self.iso_ny {
            obj.insert("iso_ny".into(), json!(s));
        }
        obj.insert("type".into(), json!(self.kind.as_str()));
        Value::Object(obj)
    }
}

fn read_varint(buf: &[u8], i: &mut usize) -> Result<u64, SmdError> {
    let mut shift = 0u32;
    let mut val = 0u64;
    while *i < buf.len() {
        let b = buf[*i];
        *i += 1;
        val |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(val);
        }
        shift += 7;
        if shift > 63 {
            break;
        }
    }
    Err(SmdError::InvalidVarint)
}

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn write_key(out: &mut Vec<u8>, field: u64, wire: u64) {
    write_varint(out, (field << 3) | wire);
}

/// Skips a value of the given wire type; unknown types end the scan.
fn skip_value(buf: &[u8], i: &mut usize, wire: u64) -> Result<bool, SmdError> {
    match wire {
        WIRE_VARINT => {
            read_varint(buf, i)?;
        }
        WIRE_LEN => {
            let len = read_varint(buf, i)? as usize;
            if *i + len > buf.len() {
                return Err(SmdError::Truncated);
            }
            *i += len;
        }
        WIRE_FIXED64 => *i += 8,
        WIRE_FIXED32 => *i += 4,
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_timestamp(buf: &[u8]) -> Result<(Option<i64>, Option<i32>), SmdError> {
    let mut i = 0;
    let mut seconds = None;
    let mut nanos = None;
    while i < buf.len() {
        let key = read_varint(buf, &mut i)?;
        let field = key >> 3;
        let wire = key & 0x07;
        if wire == WIRE_VARINT {
            let val = read_varint(buf, &mut i)?;
            match field {
                1 => seconds = Some(val as i64),
                2 => nanos = Some(val as i32),
                _ => {}
            }
        } else if !skip_value(buf, &mut i, wire)? {
            break;
        }
    }
    Ok((seconds, nanos))
}

fn encode_timestamp(seconds: Option<i64>, nanos: Option<i32>) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(s) = seconds {
        write_key(&mut out, 1, WIRE_VARINT);
        write_varint(&mut out, s as u64);
    }
    if let Some(n) = nanos {
        write_key(&mut out, 2, WIRE_VARINT);
        write_varint(&mut out, n as u64);
    }
    out
}

fn iso_renderings(seconds: i64, nanos: Option<i32>) -> (Option<String>, Option<String>) {
    let micros = nanos.unwrap_or(0).max(0) / 1000;
    let Some(dt) = Utc.timestamp_opt(seconds, (micros as u32) * 1000).single() else {
        return (None, None);
    };
    let fmt = if micros == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    let utc = dt.to_rfc3339_opts(fmt, true);
    let ny = dt
        .with_timezone(&chrono_tz::America::New_York)
        .to_rfc3339_opts(fmt, false);
    (Some(utc), Some(ny))
}

/// Decodes a Base64URL `server_message_data` string. Padding is tolerated;
/// unknown fields and skippable wire types are ignored.
pub fn decode(b64url: &str) -> Result<ServerMessageData, SmdError> {
    let raw = URL_SAFE_NO_PAD.decode(b64url.trim_end_matches('='))?;

    let mut i = 0;
    let mut uuid = None;
    let mut seconds = None;
    let mut nanos = None;

    while i < raw.len() {
        let key = read_varint(&raw, &mut i)?;
        let field = key >> 3;
        let wire = key & 0x07;
        if wire == WIRE_LEN {
            let len = read_varint(&raw, &mut i)? as usize;
            if i + len > raw.len() {
                return Err(SmdError::Truncated);
            }
            let data = &raw[i..i + len];
            i += len;
            match field {
                1 => uuid = std::str::from_utf8(data).ok().map(str::to_string),
                3 => {
                    let (s, n) = decode_timestamp(data)?;
                    if s.is_some() {
                        seconds = s;
                    }
                    if n.is_some() {
                        nanos = n;
                    }
                }
                _ => {}
            }
        } else if !skip_value(&raw, &mut i, wire)? {
            break;
        }
    }

    let (iso_utc, iso_ny) = match seconds {
        Some(s) => iso_renderings(s, nanos),
        None => (None, None),
    };

    let kind = match (&uuid, seconds.is_some() || nanos.is_some()) {
        (Some(_), true) => ServerMessageDataKind::UuidAndTimestamp,
        (Some(_), false) => ServerMessageDataKind::UuidOnly,
        (None, true) => ServerMessageDataKind::TimestampOnly,
        (None, false) => ServerMessageDataKind::Unknown,
    };

    Ok(ServerMessageData {
        uuid,
        seconds,
        nanos,
        iso_utc,
        iso_ny,
        kind,
    })
}

/// Encodes the given fields as a Base64URL string without padding.
pub fn encode(uuid: Option<&str>, seconds: Option<i64>, nanos: Option<i32>) -> String {
    let mut parts = Vec::new();
    if let Some(u) = uuid.filter(|u| !u.is_empty()) {
        write_key(&mut parts, 1, WIRE_LEN);
        write_varint(&mut parts, u.len() as u64);
        parts.extend_from_slice(u.as_bytes());
    }
    if seconds.is_some() || nanos.is_some() {
        let ts = encode_timestamp(seconds, nanos);
        write_key(&mut parts, 3, WIRE_LEN);
        write_varint(&mut parts, ts.len() as u64);
        parts.extend_from_slice(&ts);
    }
    URL_SAFE_NO_PAD.encode(parts)
}

/// Encodes a JSON object form (`{uuid?, seconds?, nanos?}`) back to the wire
/// string. Used when a request packet carries a structured payload.
pub fn encode_from_json(obj: &Map<String, Value>) -> String {
    let uuid = obj.get("uuid").and_then(Value::as_str);
    let seconds = obj.get("seconds").and_then(Value::as_i64);
    let nanos = obj.get("nanos").and_then(Value::as_i64).map(|n| n as i32);
    encode(uuid, seconds, nanos)
}
