//! Leveled log records and sensitive-field redaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Replacement written in place of sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Maximum nesting depth inspected by [`redact`].
pub const MAX_REDACTION_DEPTH: usize = 5;

/// Lowercase substrings that mark a key as sensitive.
const SENSITIVE_FIELDS: [&str; 8] = [
    "password",
    "token",
    "secret",
    "apikey",
    "creditcard",
    "ssn",
    "email",
    "phone",
];

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// A structured log record with an already-redacted context.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: Map<String, Value>,
}

impl LogRecord {
    /// Returns a context field by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}

/// Returns `true` when the lowercase key contains a sensitive substring.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|field| lower.contains(field))
}

/// Redacts sensitive keys at any nesting depth up to [`MAX_REDACTION_DEPTH`].
///
/// Objects are inspected key by key, arrays element-wise; scalar leaves pass
/// through unchanged. Values nested deeper than the bound are copied as-is.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use telehealth_gateway::domain::redact;
///
/// let input = json!({"password": "secret123", "name": "John Doe"});
/// assert_eq!(redact(&input), json!({"password": "[REDACTED]", "name": "John Doe"}));
/// ```
pub fn redact(value: &Value) -> Value {
    redact_at(value, 0)
}

fn redact_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_REDACTION_DEPTH {
        return value.clone();
    }

    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let redacted = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_at(v, depth + 1)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_at(v, depth + 1)).collect()),
        leaf => leaf.clone(),
    }
}
