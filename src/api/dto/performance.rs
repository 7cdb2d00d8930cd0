//! DTOs for the performance report endpoint.

use serde::Serialize;

use crate::domain::{LatencyStats, LeakSignal, MemoryStats};

/// In-process latency and memory report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResponse {
    pub sample_count: usize,
    /// Milliseconds.
    pub latency: LatencyStats,
    pub memory: MemoryStats,
    pub leak: LeakSignal,
}
