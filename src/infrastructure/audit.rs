//! Audit sink writing to the structured log.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{AuditEntry, AuditError, AuditStore};

/// Writes audit entries as `info` events on the `audit` target.
///
/// Used when no dedicated audit backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditStore;

#[async_trait]
impl AuditStore for LogAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json =
            serde_json::to_string(&entry).map_err(|e| AuditError::Rejected(e.to_string()))?;
        info!(target: "audit", entry = %json, "Audit entry recorded");
        Ok(())
    }
}
