//! Latency samples, percentile statistics and heap history.
//!
//! Both buffers are bounded FIFOs: once full, every push evicts the oldest
//! entry. Percentiles use nearest-rank estimation over a sorted copy, so the
//! live buffer is never reordered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of request durations retained.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 1000;

/// Default number of heap readings retained.
pub const DEFAULT_HEAP_HISTORY_CAPACITY: usize = 60;

/// Number of most recent heap readings compared by the leak heuristic.
pub const LEAK_WINDOW: usize = 10;

/// Growth over the leak window above which memory is flagged as leaking.
pub const LEAK_GROWTH_THRESHOLD_PERCENT: f64 = 10.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bounded FIFO of durations in milliseconds.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one when the buffer is full.
    pub fn push(&mut self, duration_ms: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(duration_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies the samples in insertion order.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

/// Nearest-rank percentile of `samples`.
///
/// Sorts a copy ascending and returns the value at
/// `ceil(p / 100 * n) - 1`, clamped to `[0, n - 1]`. Returns `0.0` for an
/// empty slice.
///
/// # Examples
///
/// ```
/// use telehealth_gateway::domain::percentile;
///
/// let samples = [30.0, 10.0, 20.0, 40.0];
/// assert_eq!(percentile(&samples, 50.0), 20.0);
/// assert_eq!(percentile(&samples, 99.0), 40.0);
/// assert_eq!(percentile(&[], 95.0), 0.0);
/// ```
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let index = rank.clamp(0, n as i64 - 1) as usize;

    sorted[index]
}

/// Summary statistics over the latency buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencyStats {
    /// Computes statistics over `samples`; all zero when empty.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            p50: percentile(samples, 50.0),
            p95: percentile(samples, 95.0),
            p99: percentile(samples, 99.0),
            avg: sum / samples.len() as f64,
            min,
            max,
        }
    }
}

/// Raw memory reading in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySnapshot {
    pub heap_used_bytes: u64,
    pub heap_total_bytes: u64,
    pub external_bytes: u64,
    pub rss_bytes: u64,
}

/// Source of process memory readings.
///
/// # Implementations
///
/// - [`crate::infrastructure::memory_probe::ProcMemoryProbe`] - reads `/proc/self/status`
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe: Send + Sync {
    fn snapshot(&self) -> MemorySnapshot;
}

/// Memory usage rounded to whole megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryStats {
    #[serde(rename = "heapUsedMB")]
    pub heap_used_mb: u64,
    #[serde(rename = "heapTotalMB")]
    pub heap_total_mb: u64,
    #[serde(rename = "externalMB")]
    pub external_mb: u64,
    #[serde(rename = "heapUsedPercent")]
    pub heap_used_percent: u64,
    #[serde(rename = "rssMB")]
    pub rss_mb: u64,
}

impl From<MemorySnapshot> for MemoryStats {
    fn from(s: MemorySnapshot) -> Self {
        let heap_used_percent = if s.heap_total_bytes == 0 {
            0
        } else {
            (s.heap_used_bytes as f64 / s.heap_total_bytes as f64 * 100.0).round() as u64
        };

        Self {
            heap_used_mb: to_mb(s.heap_used_bytes),
            heap_total_mb: to_mb(s.heap_total_bytes),
            external_mb: to_mb(s.external_bytes),
            heap_used_percent,
            rss_mb: to_mb(s.rss_bytes),
        }
    }
}

fn to_mb(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_MB).round() as u64
}

/// One heap reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSample {
    pub timestamp: DateTime<Utc>,
    pub heap_used_bytes: u64,
}

/// Result of the heap-growth heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakSignal {
    pub is_leaking: bool,
    #[serde(rename = "growthMB")]
    pub growth_mb: i64,
    pub growth_percent: i64,
}

/// Bounded FIFO of heap readings.
#[derive(Debug, Clone)]
pub struct HeapHistory {
    samples: VecDeque<HeapSample>,
    capacity: usize,
}

impl HeapHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: HeapSample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Compares the oldest and newest of the last [`LEAK_WINDOW`] readings.
    ///
    /// Returns the zero signal until at least [`LEAK_WINDOW`] readings exist.
    pub fn leak_signal(&self) -> LeakSignal {
        if self.samples.len() < LEAK_WINDOW {
            return LeakSignal::default();
        }

        let start = self.samples.len() - LEAK_WINDOW;
        let oldest = self.samples[start].heap_used_bytes as f64;
        let newest = self.samples[self.samples.len() - 1].heap_used_bytes as f64;

        let growth = newest - oldest;
        let growth_percent = if oldest > 0.0 {
            growth / oldest * 100.0
        } else {
            0.0
        };

        LeakSignal {
            is_leaking: growth_percent > LEAK_GROWTH_THRESHOLD_PERCENT,
            growth_mb: (growth / BYTES_PER_MB).round() as i64,
            growth_percent: growth_percent.round() as i64,
        }
    }
}

impl Default for HeapHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HEAP_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(bytes: u64) -> HeapSample {
        HeapSample {
            timestamp: Utc::now(),
            heap_used_bytes: bytes,
        }
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buf = SampleBuffer::new(1000);
        for i in 0..1500 {
            buf.push(i as f64);
        }

        assert_eq!(buf.len(), 1000);
        let snapshot = buf.snapshot();
        assert_eq!(snapshot[0], 500.0);
        assert_eq!(snapshot[999], 1499.0);
    }

    #[test]
    fn test_percentile_index_math() {
        let samples = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 200.0];

        // ceil(0.50 * 11) - 1 = 5
        assert_eq!(percentile(&samples, 50.0), 60.0);
        // ceil(0.95 * 11) - 1 = 10
        assert_eq!(percentile(&samples, 95.0), 200.0);
        assert_eq!(percentile(&samples, 0.0), 10.0);
        assert_eq!(percentile(&samples, 100.0), 200.0);
    }

    #[test]
    fn test_percentile_does_not_mutate_input() {
        let samples = vec![3.0, 1.0, 2.0];
        let _ = percentile(&samples, 50.0);
        assert_eq!(samples, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_percentiles_are_monotonic() {
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut buf = SampleBuffer::default();
        for _ in 0..2500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            buf.push((seed % 5000) as f64 / 3.0);
        }

        let s = buf.snapshot();
        let (p50, p95, p99) = (
            percentile(&s, 50.0),
            percentile(&s, 95.0),
            percentile(&s, 99.0),
        );
        assert!(p50 <= p95 && p95 <= p99);
    }

    #[test]
    fn test_stats_empty_is_zero() {
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
    }

    #[test]
    fn test_stats_scenario() {
        let samples = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 200.0];
        let stats = LatencyStats::from_samples(&samples);

        assert_eq!(stats.p50, 60.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 200.0);
        assert!((stats.avg - 750.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_memory_stats_rounding() {
        let stats = MemoryStats::from(MemorySnapshot {
            heap_used_bytes: 50 * 1024 * 1024 + 600 * 1024,
            heap_total_bytes: 100 * 1024 * 1024,
            external_bytes: 0,
            rss_bytes: 120 * 1024 * 1024,
        });

        assert_eq!(stats.heap_used_mb, 51);
        assert_eq!(stats.heap_total_mb, 100);
        assert_eq!(stats.heap_used_percent, 51);
        assert_eq!(stats.rss_mb, 120);
    }

    #[test]
    fn test_leak_signal_needs_ten_samples() {
        let mut history = HeapHistory::default();
        for i in 0..9 {
            history.push(heap(100 * (i + 1) * 1024 * 1024));
        }

        assert_eq!(history.leak_signal(), LeakSignal::default());
    }

    #[test]
    fn test_leak_signal_uses_last_ten() {
        let mb = 1024 * 1024;
        let mut history = HeapHistory::default();
        // old readings that must be ignored
        for _ in 0..5 {
            history.push(heap(10 * mb));
        }
        for i in 0..10 {
            history.push(heap((100 + i * 5) * mb));
        }

        let signal = history.leak_signal();
        assert!(signal.is_leaking);
        assert_eq!(signal.growth_mb, 45);
        assert_eq!(signal.growth_percent, 45);
    }

    #[test]
    fn test_leak_signal_stable_heap() {
        let mut history = HeapHistory::default();
        for _ in 0..10 {
            history.push(heap(200 * 1024 * 1024));
        }

        let signal = history.leak_signal();
        assert!(!signal.is_leaking);
        assert_eq!(signal.growth_percent, 0);
    }

    #[test]
    fn test_heap_history_bounded() {
        let mut history = HeapHistory::default();
        for i in 0..100 {
            history.push(heap(i));
        }
        assert_eq!(history.len(), DEFAULT_HEAP_HISTORY_CAPACITY);
    }
}
