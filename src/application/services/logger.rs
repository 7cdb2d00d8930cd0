//! Structured, redacted logging bound to the request context.
//!
//! Instead of a process-wide logger carrying ambient request state, each
//! request gets a child [`StructuredLogger`] with `requestId`, `userId` and
//! `correlationId` bound. The child is passed downward explicitly (request
//! extensions) and every record it emits carries those fields.

use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{LogLevel, LogRecord, RequestContext, redact};

/// Destination for finished log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Forwards records to `tracing` at the matching level.
///
/// The redacted context is rendered as a single JSON field so both the text
/// and JSON subscriber formats keep it intact.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        let context = Value::Object(record.context.clone()).to_string();
        match record.level {
            LogLevel::Error => tracing::error!(context = %context, "{}", record.message),
            LogLevel::Warn => tracing::warn!(context = %context, "{}", record.message),
            LogLevel::Info => tracing::info!(context = %context, "{}", record.message),
            LogLevel::Debug => tracing::debug!(context = %context, "{}", record.message),
        }
    }
}

/// Keeps records in memory. Used by tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Leveled logger with redaction, bound context and path exclusions.
#[derive(Clone)]
pub struct StructuredLogger {
    sink: Arc<dyn LogSink>,
    bindings: Map<String, Value>,
    excluded_paths: Arc<[String]>,
}

impl StructuredLogger {
    /// Creates a root logger.
    ///
    /// # Arguments
    ///
    /// - `sink` - where records go ([`TracingSink`] in production)
    /// - `excluded_paths` - paths whose request start/end logs are skipped
    pub fn new(sink: Arc<dyn LogSink>, excluded_paths: Vec<String>) -> Self {
        Self {
            sink,
            bindings: Map::new(),
            excluded_paths: excluded_paths.into(),
        }
    }

    /// Logs `message` with `context`.
    ///
    /// Bound fields are merged first; keys in `context` win on conflict.
    /// A non-object `context` is stored under the `context` key. The merged
    /// map is redacted before it reaches the sink. The message itself is
    /// never redacted.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Value) {
        let mut merged = self.bindings.clone();
        match context {
            Value::Object(map) => merged.extend(map),
            Value::Null => {}
            other => {
                merged.insert("context".to_string(), other);
            }
        }

        let context = match redact(&Value::Object(merged)) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        self.sink.write(&LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context,
        });
    }

    pub fn error(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn warn(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Warn, message, context);
    }

    pub fn info(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Info, message, context);
    }

    pub fn debug(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Debug, message, context);
    }

    /// Returns a logger with `requestId`, `userId` and `correlationId` bound.
    pub fn child(&self, ctx: &RequestContext) -> Self {
        let mut bindings = Map::new();
        bindings.insert("requestId".to_string(), json!(ctx.request_id));
        bindings.insert("correlationId".to_string(), json!(ctx.correlation_id));
        if let Some(user_id) = &ctx.user_id {
            bindings.insert("userId".to_string(), json!(user_id));
        }
        self.with_bindings(bindings)
    }

    /// Returns a logger with additional bound fields.
    pub fn with_bindings(&self, extra: Map<String, Value>) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.extend(extra);
        Self {
            sink: self.sink.clone(),
            bindings,
            excluded_paths: self.excluded_paths.clone(),
        }
    }

    pub fn bindings(&self) -> &Map<String, Value> {
        &self.bindings
    }

    /// Whether request start/end logging is skipped for `path`.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| p == path)
    }

    /// Logs the start of a request at `info`, unless the path is excluded.
    pub fn log_request_start(&self, ctx: &RequestContext, method: &str, path: &str) {
        if self.is_excluded(path) {
            return;
        }

        self.info(
            "Incoming request",
            json!({
                "requestId": ctx.request_id,
                "correlationId": ctx.correlation_id,
                "method": method,
                "path": path,
                "ip": ctx.client_ip,
                "userAgent": ctx.user_agent,
            }),
        );
    }

    /// Logs request completion, unless the path is excluded.
    ///
    /// Status `>= 400` logs at `warn`, everything else at `info`.
    pub fn log_request_end(
        &self,
        ctx: &RequestContext,
        method: &str,
        path: &str,
        status_code: u16,
        duration_ms: f64,
    ) {
        if self.is_excluded(path) {
            return;
        }

        let level = if status_code >= 400 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        self.log(
            level,
            "Request completed",
            json!({
                "requestId": ctx.request_id,
                "correlationId": ctx.correlation_id,
                "method": method,
                "path": path,
                "statusCode": status_code,
                "durationMs": duration_ms,
            }),
        );
    }
}
