//! Health monitoring and metrics for the capture pipeline

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the frame source task and the recorder.
///
/// All fields use atomic operations for thread-safe access.
#[derive(Debug, Default)]
pub struct PipelineHealth {
    /// Snapshots produced by the frame source
    pub snapshots_emitted: AtomicU64,

    /// Snapshots thrown away because the consumer lagged
    pub snapshots_dropped: AtomicU64,

    /// Snapshots the sampler kept
    pub samples_accepted: AtomicU64,

    /// Snapshots whose payload could not be decoded
    pub decode_failures: AtomicU64,

    /// Total bytes appended to the session buffer
    pub bytes_buffered: AtomicU64,
}

impl PipelineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_snapshot(&self) {
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_drop(&self) {
        self.snapshots_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample(&self, size: usize) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
        self.bytes_buffered.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn snapshots_emitted(&self) -> u64 {
        self.snapshots_emitted.load(Ordering::Relaxed)
    }

    pub fn snapshots_dropped(&self) -> u64 {
        self.snapshots_dropped.load(Ordering::Relaxed)
    }

    pub fn samples_accepted(&self) -> u64 {
        self.samples_accepted.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn bytes_buffered(&self) -> u64 {
        self.bytes_buffered.load(Ordering::Relaxed)
    }

    /// Percentage of emitted snapshots that never reached the sampler
    pub fn drop_rate(&self) -> f64 {
        let emitted = self.snapshots_emitted();
        if emitted == 0 {
            return 0.0;
        }
        (self.snapshots_dropped() as f64 / emitted as f64) * 100.0
    }

    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            snapshots_emitted: self.snapshots_emitted(),
            snapshots_dropped: self.snapshots_dropped(),
            samples_accepted: self.samples_accepted(),
            decode_failures: self.decode_failures(),
            bytes_buffered: self.bytes_buffered(),
            drop_rate: self.drop_rate(),
        }
    }
}

/// Point-in-time copy of the counters, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSummary {
    pub snapshots_emitted: u64,
    pub snapshots_dropped: u64,
    pub samples_accepted: u64,
    pub decode_failures: u64,
    pub bytes_buffered: u64,
    pub drop_rate: f64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "snapshots={} dropped={} ({:.1}%) samples={} decode_failures={} buffered={}KB",
            self.snapshots_emitted,
            self.snapshots_dropped,
            self.drop_rate,
            self.samples_accepted,
            self.decode_failures,
            self.bytes_buffered / 1024
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let health = PipelineHealth::new();
        for _ in 0..4 {
            health.record_snapshot();
        }
        health.record_snapshot_drop();
        health.record_sample(2048);
        health.record_sample(1024);
        health.record_decode_failure();

        let summary = health.summary();
        assert_eq!(summary.snapshots_emitted, 4);
        assert_eq!(summary.snapshots_dropped, 1);
        assert_eq!(summary.samples_accepted, 2);
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.bytes_buffered, 3072);
        assert!((summary.drop_rate - 25.0).abs() < f64::EPSILON);
        assert!(summary.to_string().contains("buffered=3KB"));
    }

    #[test]
    fn test_drop_rate_without_snapshots() {
        assert_eq!(PipelineHealth::new().drop_rate(), 0.0);
    }
}
