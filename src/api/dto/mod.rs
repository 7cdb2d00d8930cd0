//! Data Transfer Objects for the operational endpoints.

pub mod health;
pub mod performance;
