//! Infrastructure layer for external integrations.
//!
//! Concrete implementations of the collaborator contracts defined by the
//! domain layer, plus the metrics recorder.
//!
//! # Modules
//!
//! - [`counter_store`] - Rate-limit counters (Redis and in-memory)
//! - [`telemetry`] - OpenTelemetry tracer provider and W3C propagation
//! - [`metrics`] - Prometheus recorder and recording helpers
//! - [`memory_probe`] - Process memory readings
//! - [`audit`] - Log-backed audit sink

pub mod audit;
pub mod counter_store;
pub mod memory_probe;
pub mod metrics;
pub mod telemetry;
