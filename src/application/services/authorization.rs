//! Permission checks against a [`PermissionOracle`].
//!
//! The gateway's own routes are public and never call into this module. It
//! is collaborator API for downstream crates that mount guarded routes on
//! the gateway router: they build a [`StaticPermissionOracle`] (or their own
//! oracle) and call [`require_permission`] from a handler or middleware with
//! the verified role from the request context.

use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::domain::PermissionOracle;
use crate::error::AppError;

/// Grants every permission to a role.
pub const WILDCARD_PERMISSION: &str = "*";

/// Role → permission table held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticPermissionOracle {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `permissions` to `role`.
    pub fn grant<I, S>(mut self, role: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry(role.to_string())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }
}

impl PermissionOracle for StaticPermissionOracle {
    fn is_allowed(&self, role: &str, permission: &str) -> bool {
        self.grants
            .get(role)
            .is_some_and(|p| p.contains(permission) || p.contains(WILDCARD_PERMISSION))
    }
}

/// Fails with `403 Forbidden` unless `role` holds `permission`.
///
/// A missing role (anonymous caller) is always denied.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] when the oracle denies the permission.
pub fn require_permission(
    oracle: &dyn PermissionOracle,
    role: Option<&str>,
    permission: &str,
) -> Result<(), AppError> {
    match role {
        Some(role) if oracle.is_allowed(role, permission) => Ok(()),
        _ => {
            tracing::debug!(role = role.unwrap_or("-"), permission, "Permission denied");
            Err(AppError::forbidden(
                "Insufficient permissions",
                json!({"permission": permission}),
            ))
        }
    }
}
