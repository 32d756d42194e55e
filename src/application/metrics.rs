//! Counters for rate limiting decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Rate limiter statistics.
///
/// Cloning shares the counters. All updates are relaxed atomics; the numbers
/// are for monitoring, not for decisions.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Requests admitted by the window
    admitted: AtomicU64,
    /// Requests rejected by the window
    rejected: AtomicU64,
    /// Requests admitted because storage failed or the circuit was open
    failed_open: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_open(&self) {
        self.inner.failed_open.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests admitted by the window (including while disabled).
    pub fn admitted(&self) -> u64 {
        self.inner.admitted.load(Ordering::Relaxed)
    }

    /// Requests rejected by the window.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    /// Requests admitted because of a storage failure.
    pub fn failed_open(&self) -> u64 {
        self.inner.failed_open.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted(),
            rejected: self.rejected(),
            failed_open: self.failed_open(),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.admitted.store(0, Ordering::Relaxed);
        self.inner.rejected.store(0, Ordering::Relaxed);
        self.inner.failed_open.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub rejected: u64,
    pub failed_open: u64,
}

impl MetricsSnapshot {
    /// Total number of decisions.
    pub fn total(&self) -> u64 {
        self.admitted
            .saturating_add(self.rejected)
            .saturating_add(self.failed_open)
    }

    /// Fraction of decisions that rejected (0.0 when nothing was decided).
    pub fn rejection_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.rejected as f64 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.total(), 0);
        assert_eq!(snapshot.rejection_rate(), 0.0);
    }

    #[test]
    fn test_snapshot() {
        let metrics = Metrics::new();
        metrics.record_admitted();
        metrics.record_admitted();
        metrics.record_rejected();
        metrics.record_failed_open();

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                admitted: 2,
                rejected: 1,
                failed_open: 1,
            }
        );
        assert_eq!(snapshot.total(), 4);
        assert!((snapshot.rejection_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clone_shares_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        other.record_rejected();
        assert_eq!(metrics.rejected(), 1);

        metrics.reset();
        assert_eq!(other.rejected(), 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Metrics::new();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_admitted();
                        m.record_rejected();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.admitted(), 1000);
        assert_eq!(metrics.rejected(), 1000);
    }
}
