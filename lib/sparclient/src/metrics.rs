//! Query metrics collaborators.
//!
//! Every [`Endpoint::query`](crate::Endpoint::query) reports its duration and outcome
//! to a [`QueryMetrics`] sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Receives the timing and outcome of each query.
pub trait QueryMetrics: Send + Sync {
    fn record_timing(&self, duration: Duration);

    fn record_success(&self);

    fn record_failure(&self);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl QueryMetrics for NoopMetrics {
    fn record_timing(&self, _: Duration) {}

    fn record_success(&self) {}

    fn record_failure(&self) {}
}

/// Lock-free counters, exportable in the Prometheus text format.
#[derive(Debug, Default)]
pub struct AtomicQueryMetrics {
    queries: AtomicU64,
    failures: AtomicU64,
    duration_sum_ms: AtomicU64,
}

impl AtomicQueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed queries, successful or not.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Sum of the recorded durations.
    pub fn duration_sum(&self) -> Duration {
        Duration::from_millis(self.duration_sum_ms.load(Ordering::Relaxed))
    }

    /// Export metrics in Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let queries = self.queries();
        let failures = self.failures();
        let duration = self.duration_sum_ms.load(Ordering::Relaxed);
        format!(
            "# HELP sparclient_queries_total Total number of SPARQL queries sent\n\
             # TYPE sparclient_queries_total counter\n\
             sparclient_queries_total {queries}\n\
             # HELP sparclient_query_failures_total Total number of failed SPARQL queries\n\
             # TYPE sparclient_query_failures_total counter\n\
             sparclient_query_failures_total {failures}\n\
             # HELP sparclient_query_duration_sum_ms Total query time in milliseconds\n\
             # TYPE sparclient_query_duration_sum_ms counter\n\
             sparclient_query_duration_sum_ms {duration}\n"
        )
    }
}

impl QueryMetrics for AtomicQueryMetrics {
    fn record_timing(&self, duration: Duration) {
        self.duration_sum_ms.fetch_add(
            duration.as_millis().try_into().unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    fn record_success(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = AtomicQueryMetrics::new();

        metrics.record_timing(Duration::from_millis(100));
        metrics.record_success();
        assert_eq!(metrics.queries(), 1);
        assert_eq!(metrics.failures(), 0);

        metrics.record_timing(Duration::from_millis(50));
        metrics.record_failure();
        assert_eq!(metrics.queries(), 2);
        assert_eq!(metrics.failures(), 1);
        assert_eq!(metrics.duration_sum(), Duration::from_millis(150));
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = AtomicQueryMetrics::new();
        metrics.record_timing(Duration::from_millis(7));
        metrics.record_failure();

        let output = metrics.to_prometheus_format();
        assert!(output.contains("sparclient_queries_total 1\n"));
        assert!(output.contains("sparclient_query_failures_total 1\n"));
        assert!(output.contains("sparclient_query_duration_sum_ms 7\n"));
    }
}
