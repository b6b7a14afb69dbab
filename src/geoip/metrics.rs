//! Instrumentation hooks for build and lookup outcomes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::{BuildError, LookupError};
use crate::loader::LoadError;

/// Sink for lifecycle events. All methods default to no-ops so
/// implementations only override what they record.
pub trait Metrics: Send + Sync {
    fn build_succeeded(&self, _segments: usize, _skipped: usize) {}

    fn build_failed(&self, _error: &BuildError) {}

    /// Input could not be read or decoded before rows reached the builder
    fn load_failed(&self, _error: &LoadError) {}

    fn lookup_found(&self) {}

    fn lookup_not_found(&self) {}

    /// Lookup errors other than not-found
    fn lookup_failed(&self, _error: &LookupError) {}
}

/// Default sink that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl Metrics for NoMetrics {}

/// Atomic counters for every event kind
#[derive(Debug, Default)]
pub struct CounterMetrics {
    builds: AtomicU64,
    build_failures: AtomicU64,
    segments_loaded: AtomicU64,
    rows_skipped: AtomicU64,
    lookups_found: AtomicU64,
    lookups_not_found: AtomicU64,
    lookups_failed: AtomicU64,
}

/// Point-in-time copy of [`CounterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub builds: u64,
    pub build_failures: u64,
    /// Segment count of the most recent successful build
    pub segments_loaded: u64,
    /// Rows skipped by the most recent successful build
    pub rows_skipped: u64,
    pub lookups_found: u64,
    pub lookups_not_found: u64,
    pub lookups_failed: u64,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            builds: self.builds.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            segments_loaded: self.segments_loaded.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            lookups_found: self.lookups_found.load(Ordering::Relaxed),
            lookups_not_found: self.lookups_not_found.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
        }
    }
}

impl Metrics for CounterMetrics {
    fn build_succeeded(&self, segments: usize, skipped: usize) {
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.segments_loaded.store(segments as u64, Ordering::Relaxed);
        self.rows_skipped.store(skipped as u64, Ordering::Relaxed);
    }

    fn build_failed(&self, _error: &BuildError) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn load_failed(&self, _error: &LoadError) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn lookup_found(&self) {
        self.lookups_found.fetch_add(1, Ordering::Relaxed);
    }

    fn lookup_not_found(&self) {
        self.lookups_not_found.fetch_add(1, Ordering::Relaxed);
    }

    fn lookup_failed(&self, _error: &LookupError) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_snapshot() {
        let metrics = CounterMetrics::new();
        metrics.build_succeeded(12, 3);
        metrics.lookup_found();
        metrics.lookup_found();
        metrics.lookup_not_found();
        metrics.lookup_failed(&LookupError::NotInitialized);

        let snap = metrics.snapshot();
        assert_eq!(snap.builds, 1);
        assert_eq!(snap.segments_loaded, 12);
        assert_eq!(snap.rows_skipped, 3);
        assert_eq!(snap.lookups_found, 2);
        assert_eq!(snap.lookups_not_found, 1);
        assert_eq!(snap.lookups_failed, 1);
        assert_eq!(snap.build_failures, 0);
    }
}
