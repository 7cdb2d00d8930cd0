//! Shared application state.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::application::services::{IdentityService, LatencyTracker, SpanTracer, StructuredLogger};
use crate::domain::AuditStore;
use crate::infrastructure::counter_store::CounterStore;

/// Application state shared across all middleware and handlers.
///
/// Cloned per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Root logger; middleware derives a per-request child from it.
    pub logger: StructuredLogger,
    pub latency: Arc<LatencyTracker>,
    pub tracer: Arc<SpanTracer>,
    pub identity: Arc<IdentityService>,
    /// Rate-limit counter backend, also probed by `/health`.
    pub counter_store: Arc<dyn CounterStore>,
    pub audit: Arc<dyn AuditStore>,
    /// Prometheus render handle; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        logger: StructuredLogger,
        latency: Arc<LatencyTracker>,
        tracer: Arc<SpanTracer>,
        identity: Arc<IdentityService>,
        counter_store: Arc<dyn CounterStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            logger,
            latency,
            tracer,
            identity,
            counter_store,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
