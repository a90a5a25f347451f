//! Caller statistics

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How a single `resolve` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A value was returned, computed by this caller or shared from another one.
    Resolved,
    /// The computation ran on this caller and failed.
    Failed,
    /// The caller gave up waiting for another caller's computation.
    TimedOut,
}

/// Report for each caller
#[derive(Debug, Clone)]
pub struct Report {
    id: usize,
    key: String,
    outcome: Outcome,
    elapsed: Duration,
}

impl Report {
    /// Creates a new report for caller `id`.
    pub fn new(id: usize, key: String, outcome: Outcome, elapsed: Duration) -> Self {
        Report {
            id,
            key,
            outcome,
            elapsed,
        }
    }

    /// The caller that sent the report.
    pub fn id(&self) -> usize {
        self.id
    }

    /// How the caller's `resolve` ended.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}

/// Aggregated outcomes of the callers of one key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyStatistics {
    /// Callers that got a value.
    pub resolved: usize,
    /// Callers whose computation failed.
    pub failed: usize,
    /// Callers that timed out waiting.
    pub timed_out: usize,
    /// Slowest `resolve` observed.
    pub max_latency: Duration,
}

impl KeyStatistics {
    /// Total number of callers.
    pub fn callers(&self) -> usize {
        self.resolved + self.failed + self.timed_out
    }
}

/// Caller statistics, per key.
#[derive(Debug, Default)]
pub struct Statistics {
    keys: BTreeMap<String, KeyStatistics>,
}

impl Statistics {
    /// Add a report to the statistics.
    pub fn add_report(&mut self, report: Report) {
        let stats = self.keys.entry(report.key).or_default();
        match report.outcome {
            Outcome::Resolved => stats.resolved += 1,
            Outcome::Failed => stats.failed += 1,
            Outcome::TimedOut => stats.timed_out += 1,
        }
        stats.max_latency = stats.max_latency.max(report.elapsed);
    }

    /// Statistics of `key`, if any caller reported it.
    pub fn key(&self, key: &str) -> Option<&KeyStatistics> {
        self.keys.get(key)
    }

    /// Per-key statistics, ordered by key.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &KeyStatistics)> {
        self.keys.iter().map(|(key, stats)| (key.as_str(), stats))
    }

    /// Total number of reports.
    pub fn callers(&self) -> usize {
        self.keys.values().map(KeyStatistics::callers).sum()
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, stats) in self.keys() {
            writeln!(
                f,
                "{key:?}: {} callers, {} resolved, {} failed, {} timed out, slowest {:?}",
                stats.callers(),
                stats.resolved,
                stats.failed,
                stats.timed_out,
                stats.max_latency,
            )?;
        }
        Ok(())
    }
}
