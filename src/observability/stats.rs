//! Process-lifetime response statistics.
//!
//! Every completed request reports its elapsed time here; `/Status` renders
//! the totals as human-readable strings.

use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Sentinel for "no nonzero duration seen yet".
const NO_SHORTEST: u64 = 9_999_999_999;

/// Human-readable statistics, as reported by `/Status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatsSummary {
    pub start_time: String,
    pub running_time: String,
    pub longest_response: String,
    pub shortest_response: String,
    pub average_response: String,
    pub last_response: String,
    pub response_count: String,
}

/// Raw totals, mainly for tests and metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub response_count: u64,
    pub longest_ns: u64,
    pub shortest_ns: Option<u64>,
    pub average_ns: f64,
}

#[derive(Debug)]
struct Totals {
    response_count: u64,
    longest_ns: u64,
    shortest_ns: u64,
    average_ns: f64,
    last_response: Option<(DateTime<Utc>, Instant)>,
}

/// Aggregates response durations under a single lock.
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: DateTime<Utc>,
    started: Instant,
    totals: Mutex<Totals>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            totals: Mutex::new(Totals {
                response_count: 0,
                longest_ns: 0,
                shortest_ns: NO_SHORTEST,
                average_ns: 0.0,
                last_response: None,
            }),
        }
    }

    /// Record a response that started at `start` and finished now.
    pub fn add_response(&self, start: Instant) {
        self.record(start.elapsed());
    }

    /// Record a response with a known duration.
    ///
    /// The running average uses `avg * (n-1)/n + duration/n` where the second
    /// division is on integer nanoseconds. Reported averages depend on this
    /// exact formula, truncation included.
    pub fn record(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        let mut totals = self.totals.lock();
        totals.response_count += 1;
        let n = totals.response_count;
        totals.last_response = Some((Utc::now(), Instant::now()));
        totals.average_ns =
            totals.average_ns * ((n - 1) as f64 / n as f64) + (duration_ns / n) as f64;
        if duration_ns > totals.longest_ns {
            totals.longest_ns = duration_ns;
        }
        if duration_ns < totals.shortest_ns && duration_ns != 0 {
            totals.shortest_ns = duration_ns;
        }
    }

    /// Copy of the raw totals.
    pub fn snapshot(&self) -> StatsSnapshot {
        let totals = self.totals.lock();
        StatsSnapshot {
            response_count: totals.response_count,
            longest_ns: totals.longest_ns,
            shortest_ns: (totals.shortest_ns != NO_SHORTEST).then_some(totals.shortest_ns),
            average_ns: totals.average_ns,
        }
    }

    /// Render the totals for humans.
    pub fn summary(&self) -> StatsSummary {
        let running = self.started.elapsed();
        let totals = self.totals.lock();

        let last_response = match totals.last_response {
            Some((at, instant)) => format!(
                "{}, ({:?} ago)",
                at.to_rfc3339_opts(SecondsFormat::Millis, true),
                instant.elapsed()
            ),
            None => "no requests made yet".to_string(),
        };
        let shortest_response = if totals.shortest_ns == NO_SHORTEST {
            "n/a".to_string()
        } else {
            as_millis(totals.shortest_ns as f64)
        };

        StatsSummary {
            start_time: self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            running_time: format!("{running:?}"),
            longest_response: as_millis(totals.longest_ns as f64),
            shortest_response,
            average_response: as_millis(totals.average_ns),
            last_response,
            response_count: totals.response_count.to_string(),
        }
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn as_millis(ns: f64) -> String {
    format!("{:.2}ms", ns / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn tracks_count_extremes_and_incremental_average() {
        let stats = StatsAggregator::new();
        for ms in [10, 5, 20] {
            stats.record(Duration::from_millis(ms));
        }

        let snap = stats.snapshot();
        assert_eq!(snap.response_count, 3);
        assert_eq!(snap.longest_ns, 20 * MS);
        assert_eq!(snap.shortest_ns, Some(5 * MS));

        // 10ms → 10_000_000; then 7_500_000; then 5_000_000 + 20_000_000 / 3 (truncated).
        let mut expected = 0.0_f64;
        for (n, d) in [(1u64, 10 * MS), (2, 5 * MS), (3, 20 * MS)] {
            expected = expected * ((n - 1) as f64 / n as f64) + (d / n) as f64;
        }
        assert_eq!(snap.average_ns, expected);
        assert_eq!(snap.average_ns, 11_666_666.0);
        // Not the arithmetic mean.
        assert_ne!(snap.average_ns, (35 * MS) as f64 / 3.0);
    }

    #[test]
    fn zero_duration_never_becomes_shortest() {
        let stats = StatsAggregator::new();
        stats.record(Duration::ZERO);
        assert_eq!(stats.snapshot().shortest_ns, None);
        assert_eq!(stats.summary().shortest_response, "n/a");

        stats.record(Duration::from_millis(3));
        assert_eq!(stats.snapshot().shortest_ns, Some(3 * MS));
    }

    #[test]
    fn summary_before_any_request() {
        let summary = StatsAggregator::new().summary();
        assert_eq!(summary.response_count, "0");
        assert_eq!(summary.last_response, "no requests made yet");
        assert_eq!(summary.longest_response, "0.00ms");
        assert_eq!(summary.average_response, "0.00ms");
    }

    #[test]
    fn summary_renders_milliseconds() {
        let stats = StatsAggregator::new();
        stats.record(Duration::from_micros(12_346));

        let summary = stats.summary();
        assert_eq!(summary.response_count, "1");
        assert_eq!(summary.longest_response, "12.35ms");
        assert_eq!(summary.average_response, "12.35ms");
        assert!(summary.last_response.ends_with(" ago)"));
    }

    #[test]
    fn add_response_measures_elapsed() {
        let stats = StatsAggregator::new();
        let start = Instant::now() - Duration::from_millis(2);
        stats.add_response(start);
        assert!(stats.snapshot().longest_ns >= 2 * MS);
    }

    #[test]
    fn summary_serializes_pascal_case() {
        let json = serde_json::to_value(StatsAggregator::new().summary()).unwrap();
        assert!(json.get("ResponseCount").is_some());
        assert!(json.get("AverageResponse").is_some());
    }
}
