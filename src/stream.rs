//! Decoding of the JSON log-line stream emitted by worker processes.
//!
//! Workers run with `--logging-format=json`, so every line of their combined
//! stdout/stderr is one JSON log record. Stat reports are double-encoded:
//! the record's `message` field is itself a JSON object carrying the
//! cumulative counters. Normal human-readable log lines share the same
//! stream, so decoding is tolerant by construction: a line that cannot be
//! interpreted is still surfaced as a diagnostic event, never an error.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

/// Outer log record wrapper. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    message: String,
    #[serde(default)]
    exc_info: Option<String>,
}

/// Nested stat report carried in `message` when the line is telemetry.
///
/// `eps` values are rates and only their key set matters here; `counter`
/// values are cumulative totals since the worker started.
#[derive(Debug, Deserialize)]
struct StatReport {
    eps: BTreeMap<String, f64>,
    counter: BTreeMap<String, u64>,
}

/// One decoded line from a worker's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A stat report: cumulative counter snapshot plus the keys the worker
    /// flagged for rate display.
    Counter {
        counters: BTreeMap<String, u64>,
        speed_keys: BTreeSet<String>,
    },
    /// A plain log message (the `message` field was not JSON).
    Text(String),
    /// `message` was valid JSON but not a stat report; rendered back to a
    /// string for diagnostics.
    Json(String),
    /// The line was not a valid log record (bad JSON or bad encoding);
    /// carries the original bytes decoded lossily.
    Raw(String),
}

/// Decode one raw line from a worker's combined output stream.
///
/// Total function: every possible input maps to a [`LogEvent`], malformed
/// lines included. The monitor loop relies on this never failing.
pub fn decode_line(raw: &[u8]) -> LogEvent {
    let envelope: Envelope = match serde_json::from_slice(raw) {
        Ok(envelope) => envelope,
        Err(_) => {
            return LogEvent::Raw(String::from_utf8_lossy(raw).trim_end().to_string());
        }
    };

    let mut message = envelope.message;
    if let Some(exc_info) = envelope.exc_info {
        message.push_str(&exc_info);
    }

    let nested: serde_json::Value = match serde_json::from_str(&message) {
        Ok(value) => value,
        Err(_) => return LogEvent::Text(message),
    };

    match StatReport::deserialize(&nested) {
        Ok(report) => LogEvent::Counter {
            counters: report.counter,
            speed_keys: report.eps.into_keys().collect(),
        },
        Err(_) => LogEvent::Json(nested.to_string()),
    }
}
