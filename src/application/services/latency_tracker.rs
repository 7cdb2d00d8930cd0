//! In-process latency statistics and heap-growth heuristics.
//!
//! One [`LatencyTracker`] is constructed at startup and shared through
//! [`crate::state::AppState`]. The sample buffer and heap history are each
//! guarded by a mutex since request futures run on several worker threads.

use chrono::Utc;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::application::services::logger::StructuredLogger;
use crate::domain::latency::{DEFAULT_HEAP_HISTORY_CAPACITY, DEFAULT_SAMPLE_CAPACITY};
use crate::domain::{
    HeapHistory, HeapSample, LatencyStats, LeakSignal, MemoryProbe, MemoryStats, SampleBuffer,
    percentile,
};
use crate::infrastructure::metrics;
use crate::utils::truncate_chars;

/// Maximum characters of query text included in slow query logs.
pub const MAX_LOGGED_QUERY_CHARS: usize = 100;

/// Tracker thresholds and buffer sizes.
#[derive(Debug, Clone)]
pub struct LatencyTrackerConfig {
    pub sample_capacity: usize,
    pub heap_history_capacity: usize,
    /// Requests slower than this are logged at `warn` (default 1000 ms).
    pub slow_request_ms: f64,
    /// Queries slower than this are logged at `warn` (default 500 ms).
    pub slow_query_ms: f64,
}

impl Default for LatencyTrackerConfig {
    fn default() -> Self {
        Self {
            sample_capacity: DEFAULT_SAMPLE_CAPACITY,
            heap_history_capacity: DEFAULT_HEAP_HISTORY_CAPACITY,
            slow_request_ms: 1000.0,
            slow_query_ms: 500.0,
        }
    }
}

/// Outcome of [`LatencyTracker::track_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    Fast,
    Slow,
}

pub struct LatencyTracker {
    config: LatencyTrackerConfig,
    samples: Mutex<SampleBuffer>,
    heap_history: Mutex<HeapHistory>,
    probe: Arc<dyn MemoryProbe>,
    logger: StructuredLogger,
}

impl LatencyTracker {
    pub fn new(
        config: LatencyTrackerConfig,
        probe: Arc<dyn MemoryProbe>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            samples: Mutex::new(SampleBuffer::new(config.sample_capacity)),
            heap_history: Mutex::new(HeapHistory::new(config.heap_history_capacity)),
            config,
            probe,
            logger,
        }
    }

    fn samples(&self) -> MutexGuard<'_, SampleBuffer> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn heap_history(&self) -> MutexGuard<'_, HeapHistory> {
        self.heap_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &LatencyTrackerConfig {
        &self.config
    }

    /// Appends a request duration. Values are stored as given.
    pub fn record(&self, duration_ms: f64) {
        self.samples().push(duration_ms);
    }

    pub fn sample_count(&self) -> usize {
        self.samples().len()
    }

    /// Copy of the current samples in insertion order.
    pub fn samples_snapshot(&self) -> Vec<f64> {
        self.samples().snapshot()
    }

    /// Nearest-rank percentile over a snapshot of the buffer.
    pub fn percentile(&self, p: f64) -> f64 {
        percentile(&self.samples_snapshot(), p)
    }

    /// p50/p95/p99/avg/min/max; all zero when no samples exist.
    pub fn stats(&self) -> LatencyStats {
        LatencyStats::from_samples(&self.samples_snapshot())
    }

    pub fn is_slow_request(&self, duration_ms: f64) -> bool {
        duration_ms > self.config.slow_request_ms
    }

    /// Classifies and logs a database query.
    ///
    /// Slow queries log at `warn` with the query text truncated to
    /// [`MAX_LOGGED_QUERY_CHARS`]; fast queries log at `debug` without text.
    pub fn track_query(&self, query: &str, duration_ms: f64) -> QueryClass {
        if duration_ms > self.config.slow_query_ms {
            self.logger.warn(
                "Slow database query detected",
                json!({
                    "query": truncate_chars(query, MAX_LOGGED_QUERY_CHARS),
                    "durationMs": duration_ms,
                    "thresholdMs": self.config.slow_query_ms,
                }),
            );
            QueryClass::Slow
        } else {
            self.logger
                .debug("Database query executed", json!({ "durationMs": duration_ms }));
            QueryClass::Fast
        }
    }

    /// Current memory usage rounded to whole megabytes.
    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats::from(self.probe.snapshot())
    }

    /// Records a heap reading and evaluates the growth heuristic.
    ///
    /// Returns the zero signal until enough readings exist.
    pub fn check_leak(&self) -> LeakSignal {
        let snapshot = self.probe.snapshot();
        let mut history = self.heap_history();
        history.push(HeapSample {
            timestamp: Utc::now(),
            heap_used_bytes: snapshot.heap_used_bytes,
        });
        history.leak_signal()
    }

    /// Evaluates the growth heuristic over the readings taken so far.
    pub fn leak_signal(&self) -> LeakSignal {
        self.heap_history().leak_signal()
    }

    /// Clears both buffers.
    pub fn reset(&self) {
        self.samples().clear();
        self.heap_history().clear();
    }

    /// Records a completed request: sample, HTTP metrics and slow-request warning.
    ///
    /// `logger` should be the request's child logger so the warning carries
    /// its identifiers.
    pub fn observe_request(
        &self,
        logger: &StructuredLogger,
        method: &str,
        path: &str,
        status: u16,
        elapsed: Duration,
    ) {
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.record(duration_ms);
        metrics::record_http_request(method, path, status, elapsed);

        if self.is_slow_request(duration_ms) {
            logger.warn(
                "Slow request detected",
                json!({
                    "method": method,
                    "path": path,
                    "statusCode": status,
                    "durationMs": duration_ms,
                    "thresholdMs": self.config.slow_request_ms,
                }),
            );
            metrics::record_slow_request(method, path);
        }
    }
}
