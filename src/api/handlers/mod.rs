//! HTTP handlers for the operational endpoints.

pub mod echo;
pub mod health;
pub mod metrics;
pub mod performance;

pub use echo::{echo_handler, not_found_handler, ping_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use performance::performance_handler;
