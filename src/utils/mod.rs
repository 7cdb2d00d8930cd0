//! Utility functions shared across layers.
//!
//! # Modules
//!
//! - [`client_ip`] - Client address resolution from proxy headers and peer socket
//! - [`text`] - Character-safe truncation and email masking

pub mod client_ip;
pub mod text;

pub use client_ip::resolve_client_ip;
pub use text::{mask_email, truncate_chars};
