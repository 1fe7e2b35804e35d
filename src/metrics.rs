//! Pipeline metrics.
//!
//! Process-wide counters for provider traffic, degraded batch items,
//! variable mismatches and extraction races.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Global pipeline metrics singleton.
pub struct PipelineMetrics {
    /// Requests sent to the translation provider (single or batch)
    provider_calls: AtomicUsize,

    /// Provider requests that failed after retries
    provider_failures: AtomicUsize,

    /// Batch items that fell back to their original text
    degraded_items: AtomicUsize,

    /// Translations whose variables did not survive the round trip
    variable_mismatches: AtomicUsize,

    /// Inserts that lost the (project, source hash) race and were merged
    extraction_conflicts: AtomicUsize,
}

static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

impl PipelineMetrics {
    fn new() -> Self {
        Self {
            provider_calls: AtomicUsize::new(0),
            provider_failures: AtomicUsize::new(0),
            degraded_items: AtomicUsize::new(0),
            variable_mismatches: AtomicUsize::new(0),
            extraction_conflicts: AtomicUsize::new(0),
        }
    }

    pub fn global() -> &'static PipelineMetrics {
        METRICS.get_or_init(PipelineMetrics::new)
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded_items(&self, count: usize) {
        self.degraded_items.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_variable_mismatch(&self) {
        self.variable_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extraction_conflict(&self) {
        self.extraction_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let calls = self.provider_calls.load(Ordering::Relaxed);
        let failures = self.provider_failures.load(Ordering::Relaxed);
        let provider_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
            degraded_items: self.degraded_items.load(Ordering::Relaxed),
            variable_mismatches: self.variable_mismatches.load(Ordering::Relaxed),
            extraction_conflicts: self.extraction_conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub provider_calls: usize,
    pub provider_failures: usize,
    /// Percentage of provider calls that succeeded (0.0 when none were made)
    pub provider_success_rate: f64,
    pub degraded_items: usize,
    pub variable_mismatches: usize,
    pub extraction_conflicts: usize,
}
