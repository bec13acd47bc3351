//! Listing fetch metrics collection and reporting
//!
//! Tracks latency percentiles and success rates for listing fetches, and
//! counts refresh cycles.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of fetch metrics for one data source
#[derive(Debug, Clone)]
pub struct FetchMetrics {
    /// Name of the data source
    pub source_name: String,
    /// 50th percentile latency of successful fetches in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful fetches in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of listing fetches
    pub total_fetches: u64,
    /// Number of listing fetches that failed
    pub failed_fetches: u64,
    /// Refresh cycles that got past the manifest
    pub completed_cycles: u64,
    /// Refresh cycles skipped because the manifest failed
    pub skipped_cycles: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_fetches: 0,
            failed_fetches: 0,
            completed_cycles: 0,
            skipped_cycles: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    total_fetches: u64,
    failed_fetches: u64,
    completed_cycles: u64,
    skipped_cycles: u64,
}

/// Collects and computes metrics for a data source
pub struct MetricsCollector {
    source_name: String,
    /// Rolling window of latency samples
    samples: RwLock<VecDeque<LatencySample>>,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a data source
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Records a listing fetch with its duration and outcome
    pub async fn record_fetch(&self, duration: Duration, success: bool) {
        {
            let mut counters = self.counters.write().await;
            counters.total_fetches += 1;
            if !success {
                counters.failed_fetches += 1;
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Records the end of a refresh cycle
    pub async fn record_cycle(&self, completed: bool) {
        let mut counters = self.counters.write().await;
        if completed {
            counters.completed_cycles += 1;
        } else {
            counters.skipped_cycles += 1;
        }
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> FetchMetrics {
        let samples = self.samples.read().await;
        let counters = self.counters.read().await;

        let mut metrics = FetchMetrics::empty(&self.source_name);
        metrics.completed_cycles = counters.completed_cycles;
        metrics.skipped_cycles = counters.skipped_cycles;
        if samples.is_empty() {
            return metrics;
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        metrics.latency_p50_ms = percentile(&latencies, 50.0);
        metrics.latency_p99_ms = percentile(&latencies, 99.0);
        metrics.total_fetches = counters.total_fetches;
        metrics.failed_fetches = counters.failed_fetches;
        metrics.success_rate = if counters.total_fetches > 0 {
            (counters.total_fetches - counters.failed_fetches) as f64
                / counters.total_fetches as f64
        } else {
            1.0
        };
        metrics
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
