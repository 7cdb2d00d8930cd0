//! Domain layer containing the core observability entities and collaborator contracts.
//!
//! # Modules
//!
//! - [`request_context`] - Per-request identifiers and client metadata
//! - [`log_record`] - Leveled log records and sensitive-field redaction
//! - [`latency`] - Bounded sample buffers, percentiles and heap history
//! - [`rate_limit`] - Fixed-window counter hits
//! - [`audit`] - Audit trail sink contract
//! - [`permissions`] - Role/permission oracle contract

pub mod audit;
pub mod latency;
pub mod log_record;
pub mod permissions;
pub mod rate_limit;
pub mod request_context;

pub use audit::{AuditEntry, AuditError, AuditStore};
pub use latency::{
    HeapHistory, HeapSample, LatencyStats, LeakSignal, MemoryProbe, MemorySnapshot, MemoryStats,
    SampleBuffer, percentile,
};
pub use log_record::{LogLevel, LogRecord, REDACTED, redact};
pub use permissions::PermissionOracle;
pub use rate_limit::RateLimitHit;
pub use request_context::RequestContext;
