//! Performance counters for the engine facade

use std::time::Duration;

use grove_core::CacheStats;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Snapshot published by `getPerformanceMetrics` and the periodic refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub index_build_ms: f64,
    pub file_count: usize,
    pub symbol_count: usize,
    pub relationship_count: usize,
    pub query_count: u64,
    pub average_query_ms: f64,
    pub cached_queries: usize,
    pub layout_count: u64,
    pub last_layout_ms: f64,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub uptime_secs: f64,
}

#[derive(Debug, Default)]
struct Counters {
    index_build_ms: f64,
    query_count: u64,
    total_query_ms: f64,
    layout_count: u64,
    last_layout_ms: f64,
}

/// Accumulates timings as operations complete.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    counters: Mutex<Counters>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_index_build(&self, elapsed_ms: f64) {
        self.counters.lock().await.index_build_ms = elapsed_ms;
    }

    pub async fn record_query(&self, elapsed_ms: f64) {
        let mut counters = self.counters.lock().await;
        counters.query_count += 1;
        counters.total_query_ms += elapsed_ms;
    }

    pub async fn record_layout(&self, elapsed_ms: f64) {
        let mut counters = self.counters.lock().await;
        counters.layout_count += 1;
        counters.last_layout_ms = elapsed_ms;
    }

    /// Fill the timing fields of `metrics` from the counters.
    pub async fn fill(&self, metrics: &mut PerformanceMetrics, uptime: Duration) {
        let counters = self.counters.lock().await;
        metrics.index_build_ms = counters.index_build_ms;
        metrics.query_count = counters.query_count;
        metrics.average_query_ms = if counters.query_count == 0 {
            0.0
        } else {
            counters.total_query_ms / counters.query_count as f64
        };
        metrics.layout_count = counters.layout_count;
        metrics.last_layout_ms = counters.last_layout_ms;
        metrics.uptime_secs = uptime.as_secs_f64();
    }

    pub async fn reset(&self) {
        *self.counters.lock().await = Counters::default();
    }
}
