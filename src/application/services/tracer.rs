//! Span lifecycle wrappers over the OpenTelemetry tracer.
//!
//! The active span travels in the OpenTelemetry [`Context`]. Wrappers such
//! as [`SpanTracer::with_span`] poll their body with the new span's context
//! attached, so nested calls parent under the enclosing span and the
//! previous context is current again once the body returns.
//!
//! Context is not inherited by spawned tasks. Use [`SpanTracer::in_span`]
//! to carry it onto a new task.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer, get_active_span};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::SdkTracer;

use crate::infrastructure::metrics;
use crate::utils::truncate_chars;

/// Maximum characters of SQL kept in `db.statement`.
pub const MAX_DB_STATEMENT_CHARS: usize = 500;

/// Ends the span of its context when dropped.
///
/// Covers every exit path of a traced operation: normal return, early
/// return, panic unwind and future cancellation. A guard dropped before
/// [`SpanGuard::complete`] marks the span as failed. Ending twice is a no-op.
pub struct SpanGuard {
    cx: Context,
    completed: bool,
}

impl SpanGuard {
    pub fn new(cx: Context) -> Self {
        Self {
            cx,
            completed: false,
        }
    }

    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Records the outcome and ends the span.
    pub fn complete<T, E: fmt::Display>(self, result: &Result<T, E>) {
        let status = match result {
            Ok(_) => Status::Ok,
            Err(e) => {
                self.cx.span().add_event("exception", exception_attributes(e));
                Status::error(e.to_string())
            }
        };
        self.end_with(status);
    }

    /// Ends the span with `status`. `Status::Unset` leaves it unset.
    pub fn end_with(mut self, status: Status) {
        if status != Status::Unset {
            self.cx.span().set_status(status);
        }
        self.completed = true;
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        let span = self.cx.span();
        if !self.completed {
            let reason = if std::thread::panicking() {
                "panicked"
            } else {
                "cancelled"
            };
            span.set_status(Status::error(reason));
        }
        span.end();
    }
}

/// Creates spans and runs work inside them.
pub struct SpanTracer {
    tracer: SdkTracer,
    db_system: String,
}

impl SpanTracer {
    pub fn new(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            db_system: "postgresql".to_string(),
        }
    }

    /// Sets the `db.system` attribute used by [`SpanTracer::trace_db_query`].
    pub fn with_db_system(mut self, db_system: impl Into<String>) -> Self {
        self.db_system = db_system.into();
        self
    }

    /// Polls `fut` with `cx` as the current context.
    pub async fn in_span<F>(cx: Context, fut: F) -> F::Output
    where
        F: Future,
    {
        fut.with_context(cx).await
    }

    /// Starts a span under `parent` and returns the context carrying it.
    ///
    /// A `parent` without a span starts a new trace.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
        parent: &Context,
    ) -> Context {
        let span = self
            .tracer
            .span_builder(name.into())
            .with_kind(kind)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    /// Starts a span parented under the current context.
    pub fn create_span(&self, name: impl Into<String>, attributes: Vec<KeyValue>) -> Context {
        self.start_span(name, SpanKind::Internal, attributes, &Context::current())
    }

    /// Runs an async operation inside a new active span.
    ///
    /// On `Ok` the status is set to ok. On `Err` the error is recorded as an
    /// exception, the status is set to error, and the same error value is
    /// returned. The span is ended exactly once on every path.
    pub async fn with_span<F, Fut, T, E>(
        &self,
        name: &str,
        attributes: Vec<KeyValue>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let cx = self.create_span(name.to_string(), attributes);
        Self::run_in_span(cx, f).await
    }

    async fn run_in_span<F, Fut, T, E>(cx: Context, f: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let guard = SpanGuard::new(cx.clone());
        let result = f(cx.clone()).with_context(cx).await;
        guard.complete(&result);
        result
    }

    /// Synchronous counterpart of [`SpanTracer::with_span`].
    pub fn with_span_sync<F, T, E>(&self, name: &str, attributes: Vec<KeyValue>, f: F) -> Result<T, E>
    where
        F: FnOnce(&Context) -> Result<T, E>,
        E: fmt::Display,
    {
        let cx = self.create_span(name.to_string(), attributes);
        let guard = SpanGuard::new(cx.clone());
        let result = {
            let _attached = cx.clone().attach();
            f(&cx)
        };
        guard.complete(&result);
        result
    }

    /// Traces a database query.
    ///
    /// Sets `db.system`, `db.operation`, `db.table`, `db.statement` (truncated
    /// to [`MAX_DB_STATEMENT_CHARS`]) and, afterwards, `db.duration_ms`.
    pub async fn trace_db_query<F, Fut, T, E>(
        &self,
        query: &str,
        operation: &str,
        table: &str,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let attributes = vec![
            KeyValue::new("db.system", self.db_system.clone()),
            KeyValue::new("db.operation", operation.to_string()),
            KeyValue::new("db.table", table.to_string()),
            KeyValue::new(
                "db.statement",
                truncate_chars(query, MAX_DB_STATEMENT_CHARS).to_string(),
            ),
        ];

        self.with_span(&format!("db.{operation}"), attributes, |cx| async move {
            let started = Instant::now();
            let result = f().await;
            let elapsed = started.elapsed();
            cx.span().set_attribute(KeyValue::new(
                "db.duration_ms",
                elapsed.as_secs_f64() * 1000.0,
            ));
            metrics::record_db_query(operation, table, elapsed, result.is_ok());
            result
        })
        .await
    }

    /// Traces an outbound call to another service.
    ///
    /// Sets `peer.service`, `http.method`, `http.url`, `span.kind=CLIENT` and,
    /// afterwards, `http.duration_ms`.
    pub async fn trace_external_call<F, Fut, T, E>(
        &self,
        service: &str,
        method: &str,
        url: &str,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let attributes = vec![
            KeyValue::new("peer.service", service.to_string()),
            KeyValue::new("http.method", method.to_string()),
            KeyValue::new("http.url", url.to_string()),
            KeyValue::new("span.kind", "CLIENT"),
        ];

        let cx = self.start_span(
            format!("external.{service}"),
            SpanKind::Client,
            attributes,
            &Context::current(),
        );

        Self::run_in_span(cx, |cx| async move {
            let started = Instant::now();
            let result = f().await;
            cx.span().set_attribute(KeyValue::new(
                "http.duration_ms",
                started.elapsed().as_secs_f64() * 1000.0,
            ));
            result
        })
        .await
    }

    /// Traces a cache lookup or write.
    ///
    /// Sets `cache.name`, `cache.key`, `cache.operation` and, afterwards,
    /// `cache.hit` (whether the operation produced a value).
    pub async fn trace_cache_operation<F, Fut, T, E>(
        &self,
        operation: &str,
        key: &str,
        cache_name: &str,
        f: F,
    ) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: fmt::Display,
    {
        let attributes = vec![
            KeyValue::new("cache.name", cache_name.to_string()),
            KeyValue::new("cache.key", key.to_string()),
            KeyValue::new("cache.operation", operation.to_string()),
        ];

        self.with_span(&format!("cache.{operation}"), attributes, |cx| async move {
            let result = f().await;
            if let Ok(value) = &result {
                let hit = value.is_some();
                cx.span().set_attribute(KeyValue::new("cache.hit", hit));
                metrics::record_cache_access(cache_name, hit);
            }
            result
        })
        .await
    }
}

fn exception_attributes<E: fmt::Display + ?Sized>(error: &E) -> Vec<KeyValue> {
    vec![KeyValue::new("exception.message", error.to_string())]
}

/// Adds an event to the active span. No-op without one.
pub fn add_span_event(name: &str, attributes: Vec<KeyValue>) {
    get_active_span(|span| span.add_event(name.to_string(), attributes));
}

/// Sets an attribute on the active span. No-op without one.
pub fn set_span_attribute(key: &str, value: impl Into<Value>) {
    let attribute = KeyValue::new(key.to_string(), value);
    get_active_span(|span| span.set_attribute(attribute));
}

/// Records an exception event on the active span. No-op without one.
pub fn record_exception<E: fmt::Display + ?Sized>(error: &E) {
    get_active_span(|span| span.add_event("exception", exception_attributes(error)));
}
