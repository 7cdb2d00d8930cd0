//! Role/permission oracle contract.

/// Answers whether a role holds a permission.
///
/// RBAC decision tables are owned by the platform; the gateway only asks.
#[cfg_attr(test, mockall::automock)]
pub trait PermissionOracle: Send + Sync {
    fn is_allowed(&self, role: &str, permission: &str) -> bool;
}
