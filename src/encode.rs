//! Sample payload encodings.
//!
//! A sample is a `(path, value, timestamp)` triple. Two wire formats are
//! supported, selected by configuration; the choice affects the payload body
//! only, never topic routing:
//!
//! - `json`: `{"ts": <ms since epoch>, "value": <native scalar>}`
//! - `line`: InfluxDB-style line protocol,
//!   `rtk,device=<id>,group=<first path segment> <rest>=<typed value> <ns since epoch>`

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Measurement name for line-protocol payloads.
const MEASUREMENT: &str = "rtk";

/// Tag group used when a sample path has no `/` separator.
const FALLBACK_GROUP: &str = "agent";

/// A single sample value. Serializes as the bare native type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Plain string rendering, used as the degraded payload when structured
    /// serialization fails.
    pub fn to_plain_string(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Json,
    Line,
}

impl PayloadFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(PayloadFormat::Json),
            "line" | "influx" => Some(PayloadFormat::Line),
            _ => None,
        }
    }

    pub fn encode(&self, device_id: &str, path: &str, value: &Scalar, ts: &DateTime<Utc>) -> String {
        match self {
            PayloadFormat::Json => encode_json(value, ts.timestamp_millis()),
            PayloadFormat::Line => encode_line(
                device_id,
                path,
                value,
                ts.timestamp_nanos_opt().unwrap_or_default(),
            ),
        }
    }
}

#[derive(Serialize)]
struct JsonPayload<'a> {
    ts: i64,
    value: &'a Scalar,
}

fn encode_json(value: &Scalar, ts_ms: i64) -> String {
    let payload = JsonPayload { ts: ts_ms, value };
    serde_json::to_string(&payload).unwrap_or_else(|_| value.to_plain_string())
}

fn encode_line(device_id: &str, path: &str, value: &Scalar, ts_ns: i64) -> String {
    let (group, field) = match path.split_once('/') {
        Some((group, rest)) => (group.to_string(), rest.replace('/', "_")),
        None => (FALLBACK_GROUP.to_string(), path.to_string()),
    };
    format!(
        "{},device={},group={} {}={} {}",
        MEASUREMENT,
        escape_key(device_id),
        escape_key(&group),
        escape_key(&field),
        field_value(value),
        ts_ns
    )
}

/// Escapes the characters with syntactic meaning in tag values and field
/// keys: space, comma and equals.
fn escape_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == ' ' || c == ',' || c == '=' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Line-protocol field values are type-suffixed: booleans render literally,
/// integers carry a trailing `i`, floats use the canonical decimal form and
/// strings are double-quoted with internal quotes escaped.
fn field_value(value: &Scalar) -> String {
    match value {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(i) => format!("{i}i"),
        Scalar::Float(f) => format!("{f}"),
        Scalar::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}
