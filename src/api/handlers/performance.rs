//! Latency and memory report.

use axum::{Json, extract::State};

use crate::api::dto::performance::PerformanceResponse;
use crate::state::AppState;

/// Returns latency percentiles, memory usage and the heap-growth signal.
///
/// # Endpoint
///
/// `GET /performance`
///
/// # Response
///
/// ```json
/// {
///   "sampleCount": 11,
///   "latency": { "p50": 60.0, "p95": 200.0, "p99": 200.0, "avg": 68.2, "min": 10.0, "max": 200.0 },
///   "memory": { "heapUsedMB": 41, "heapTotalMB": 200, "externalMB": 10, "heapUsedPercent": 20, "rssMB": 52 },
///   "leak": { "isLeaking": false, "growthMB": 0, "growthPercent": 0 }
/// }
/// ```
pub async fn performance_handler(State(state): State<AppState>) -> Json<PerformanceResponse> {
    Json(PerformanceResponse {
        sample_count: state.latency.sample_count(),
        latency: state.latency.stats(),
        memory: state.latency.memory_stats(),
        leak: state.latency.leak_signal(),
    })
}
