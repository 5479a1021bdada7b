//! Per-function execution metrics.
//!
//! [`MetricsCollector`] keeps counters for every function name it has seen
//! and derives cold-start statistics from the gap between executions: an
//! invocation is a cold start when it is the first one recorded, or when the
//! previous one happened more than the configured gap (5 minutes by default)
//! earlier.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use tracing::trace;

/// Default idle gap after which an invocation counts as a cold start.
pub const DEFAULT_COLD_START_GAP: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct FunctionStats {
    execution_count: u64,
    total_duration: Duration,
    error_count: u64,
    last_execution: Option<SystemTime>,
    cold_start_count: u64,
    cold_start_total_latency: Duration,
}

impl FunctionStats {
    fn snapshot(&self, name: &str) -> FunctionMetrics {
        FunctionMetrics {
            name: name.to_string(),
            execution_count: self.execution_count,
            average_duration: average(self.total_duration, self.execution_count),
            error_count: self.error_count,
            last_execution_time: self.last_execution.unwrap_or(UNIX_EPOCH),
            cold_start_count: self.cold_start_count,
            avg_cold_start_latency: average(self.cold_start_total_latency, self.cold_start_count),
        }
    }
}

/// Point-in-time metrics for one function.
///
/// Durations serialize as integer nanoseconds and the timestamp as
/// milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionMetrics {
    pub name: String,
    pub execution_count: u64,
    #[serde(serialize_with = "as_nanos")]
    pub average_duration: Duration,
    pub error_count: u64,
    #[serde(serialize_with = "as_unix_millis")]
    pub last_execution_time: SystemTime,
    pub cold_start_count: u64,
    #[serde(serialize_with = "as_nanos")]
    pub avg_cold_start_latency: Duration,
}

/// Collects execution metrics for all functions.
#[derive(Debug)]
pub struct MetricsCollector {
    stats: RwLock<HashMap<String, FunctionStats>>,
    cold_start_gap: Duration,
}

impl MetricsCollector {
    /// Create a collector with the default 5 minute cold-start gap.
    pub fn new() -> Self {
        Self::with_cold_start_gap(DEFAULT_COLD_START_GAP)
    }

    /// Create a collector with a custom cold-start gap.
    pub fn with_cold_start_gap(cold_start_gap: Duration) -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
            cold_start_gap,
        }
    }

    /// Record one execution of `name` that took `duration`.
    ///
    /// `error` is the failure the execution ended with, if any.
    pub fn record_execution(
        &self,
        name: &str,
        duration: Duration,
        error: Option<&dyn std::error::Error>,
    ) {
        self.record_execution_at(name, duration, error.is_some(), SystemTime::now());
    }

    fn record_execution_at(&self, name: &str, duration: Duration, failed: bool, now: SystemTime) {
        let mut stats = self.stats.write();
        let entry = stats.entry(name.to_string()).or_default();

        entry.execution_count += 1;
        entry.total_duration += duration;
        if failed {
            entry.error_count += 1;
        }

        // A clock that moved backwards never yields a cold start
        let cold_start = entry.last_execution.is_none_or(|last| {
            now.duration_since(last)
                .is_ok_and(|gap| gap > self.cold_start_gap)
        });
        if cold_start {
            entry.cold_start_count += 1;
            entry.cold_start_total_latency += duration;
        }

        entry.last_execution = Some(now);

        trace!(
            function = name,
            duration_us = duration.as_micros(),
            failed,
            cold_start,
            "Execution recorded"
        );
    }

    /// Metrics for every function with at least one recorded execution.
    pub fn get_metrics(&self) -> HashMap<String, FunctionMetrics> {
        self.stats
            .read()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot(name)))
            .collect()
    }

    /// Metrics for `name`, or `None` if it has never been recorded.
    pub fn get_function_metrics(&self, name: &str) -> Option<FunctionMetrics> {
        self.stats.read().get(name).map(|stats| stats.snapshot(name))
    }

    /// The configured cold-start gap.
    pub fn cold_start_gap(&self) -> Duration {
        self.cold_start_gap
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn as_nanos<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_nanos())
}

fn as_unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    serializer.serialize_u128(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn test_record_execution() {
        let collector = MetricsCollector::new();
        collector.record_execution("test-function", MS_100, None);

        let metrics = collector.get_function_metrics("test-function").unwrap();
        assert_eq!(metrics.name, "test-function");
        assert_eq!(metrics.execution_count, 1);
        assert_eq!(metrics.average_duration, MS_100);
        assert_eq!(metrics.error_count, 0);
        assert_eq!(metrics.cold_start_count, 1);
        assert_eq!(metrics.avg_cold_start_latency, MS_100);

        collector.record_execution("test-function", MS_100, None);
        let metrics = collector.get_function_metrics("test-function").unwrap();
        assert_eq!(metrics.execution_count, 2);
        assert_eq!(metrics.average_duration, MS_100);
        assert_eq!(metrics.cold_start_count, 1);
    }

    #[test]
    fn test_record_error() {
        let collector = MetricsCollector::new();
        let err = io::Error::other("test error");

        collector.record_execution("f", MS_100, None);
        collector.record_execution("f", MS_100, Some(&err));

        let metrics = collector.get_function_metrics("f").unwrap();
        assert_eq!(metrics.execution_count, 2);
        assert_eq!(metrics.error_count, 1);
    }

    #[test]
    fn test_cold_start_after_gap() {
        let collector = MetricsCollector::new();
        let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        collector.record_execution_at("f", MS_100, false, t0);
        collector.record_execution_at("f", Duration::from_millis(20), false, t0 + Duration::from_secs(1));

        let metrics = collector.get_function_metrics("f").unwrap();
        assert_eq!(metrics.execution_count, 2);
        assert_eq!(metrics.cold_start_count, 1);
        assert_eq!(metrics.avg_cold_start_latency, MS_100);

        // Six minutes of silence
        let t2 = t0 + Duration::from_secs(1 + 6 * 60);
        collector.record_execution_at("f", Duration::from_millis(300), false, t2);

        let metrics = collector.get_function_metrics("f").unwrap();
        assert_eq!(metrics.cold_start_count, 2);
        assert_eq!(metrics.avg_cold_start_latency, Duration::from_millis(200));
        assert_eq!(metrics.last_execution_time, t2);
    }

    #[test]
    fn test_gap_exactly_at_threshold_is_warm() {
        let collector = MetricsCollector::new();
        let t0 = UNIX_EPOCH + Duration::from_secs(1_000);

        collector.record_execution_at("f", MS_100, false, t0);
        collector.record_execution_at("f", MS_100, false, t0 + DEFAULT_COLD_START_GAP);

        assert_eq!(collector.get_function_metrics("f").unwrap().cold_start_count, 1);
    }

    #[test]
    fn test_clock_moving_backwards_is_warm() {
        let collector = MetricsCollector::new();
        let t0 = UNIX_EPOCH + Duration::from_secs(10_000);

        collector.record_execution_at("f", MS_100, false, t0);
        collector.record_execution_at("f", MS_100, false, t0 - Duration::from_secs(3_600));

        assert_eq!(collector.get_function_metrics("f").unwrap().cold_start_count, 1);
    }

    #[test]
    fn test_custom_cold_start_gap() {
        let collector = MetricsCollector::with_cold_start_gap(Duration::from_secs(10));
        let t0 = UNIX_EPOCH + Duration::from_secs(1_000);

        collector.record_execution_at("f", MS_100, false, t0);
        collector.record_execution_at("f", MS_100, false, t0 + Duration::from_secs(11));

        assert_eq!(collector.get_function_metrics("f").unwrap().cold_start_count, 2);
    }

    #[test]
    fn test_get_metrics() {
        let collector = MetricsCollector::new();
        let err = io::Error::other("test error");

        collector.record_execution("function1", Duration::from_millis(100), None);
        collector.record_execution("function2", Duration::from_millis(200), None);
        collector.record_execution("function3", Duration::from_millis(300), Some(&err));

        let metrics = collector.get_metrics();
        assert_eq!(metrics.len(), 3);

        assert_eq!(metrics["function1"].average_duration, Duration::from_millis(100));
        assert_eq!(metrics["function2"].average_duration, Duration::from_millis(200));
        assert_eq!(metrics["function3"].average_duration, Duration::from_millis(300));

        assert_eq!(metrics["function1"].error_count, 0);
        assert_eq!(metrics["function3"].error_count, 1);
    }

    #[test]
    fn test_unknown_function() {
        let collector = MetricsCollector::new();
        assert!(collector.get_function_metrics("non-existent").is_none());
        assert!(collector.get_metrics().is_empty());
    }

    #[test]
    fn test_metrics_json_shape() {
        let collector = MetricsCollector::new();
        let t0 = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        collector.record_execution_at("f", Duration::from_micros(1500), false, t0);

        let value = serde_json::to_value(collector.get_function_metrics("f").unwrap()).unwrap();
        assert_eq!(value["execution_count"], 1);
        assert_eq!(value["average_duration"], 1_500_000);
        assert_eq!(value["last_execution_time"], 1_700_000_000_123_u64);
        assert_eq!(value["cold_start_count"], 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let collector = std::sync::Arc::new(MetricsCollector::new());

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        collector.record_execution("shared", MS_100, None);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        let metrics = collector.get_function_metrics("shared").unwrap();
        assert_eq!(metrics.execution_count, 1000);
        assert_eq!(metrics.cold_start_count, 1);
    }
}
