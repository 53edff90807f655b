use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::value::Value;

/// Textual layout of stored timestamps (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Milliseconds since the Unix epoch.
///
/// The single comparable representation every stored modification or
/// deletion time is normalized into. Ordering is plain integer ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Create a timestamp from epoch milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Epoch milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Parse text in [`TIMESTAMP_FORMAT`], reading the wall-clock as UTC.
    ///
    /// The text must match exactly; surrounding whitespace is rejected.
    pub fn parse(text: &str) -> TypeResult<Self> {
        if text.trim() != text {
            return Err(TypeError::MalformedTimestamp {
                value: text.to_string(),
                reason: "surrounding whitespace".to_string(),
            });
        }
        let naive = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map_err(|e| {
            TypeError::MalformedTimestamp {
                value: text.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self(naive.and_utc().timestamp_millis()))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format(TIMESTAMP_FORMAT)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Normalize a stored time cell into epoch milliseconds.
///
/// Returns `Ok(None)` when the cell is null or blank text, so callers decide
/// whether an absent time is acceptable. Integers are taken as milliseconds
/// already; reals are truncated to whole milliseconds. Text must match
/// [`TIMESTAMP_FORMAT`] exactly, and blobs are never timestamps.
pub fn normalize(value: &Value) -> TypeResult<Option<Timestamp>> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(ms) => Ok(Some(Timestamp(*ms))),
        Value::Real(ms) if ms.is_finite() => Ok(Some(Timestamp(ms.trunc() as i64))),
        Value::Real(ms) => Err(TypeError::MalformedTimestamp {
            value: ms.to_string(),
            reason: "non-finite number".to_string(),
        }),
        Value::Text(s) if s.trim().is_empty() => Ok(None),
        Value::Text(s) => Timestamp::parse(s).map(Some),
        Value::Blob(b) => Err(TypeError::MalformedTimestamp {
            value: format!("<{} bytes>", b.len()),
            reason: "blob is not a timestamp".to_string(),
        }),
    }
}
