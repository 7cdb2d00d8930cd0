//! Audit trail sink contract.
//!
//! The audit persistence layer lives outside this crate; the gateway only
//! produces [`AuditEntry`] values and hands them to an [`AuditStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub request_id: String,
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub client_ip: String,
    pub timestamp: DateTime<Utc>,
}

/// Errors raised by an audit sink.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
    #[error("Audit entry rejected: {0}")]
    Rejected(String),
}

/// Append-only audit sink.
///
/// Callers treat `append` as fire-and-forget: failures are logged and never
/// reach the request path.
///
/// # Implementations
///
/// - [`crate::infrastructure::audit::LogAuditStore`] - writes entries to the `audit` log target
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}
