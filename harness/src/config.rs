//! Command line configuration of the harness.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

/// An invalid [`HarnessConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `--callers` was 0.
    #[error("at least one caller is required")]
    NoCallers,
    /// `--workers` was 0.
    #[error("at least one worker thread is required")]
    NoWorkers,
    /// `--keys` was empty or contained an empty key.
    #[error("keys must be non-empty")]
    EmptyKey,
    /// `--failure-rate` was outside of `[0, 1]`.
    #[error("failure rate must be between 0 and 1, got {0}")]
    FailureRate(String),
}

/// Drives a coalescing cache with many concurrent callers and counts the computations.
#[derive(Debug, Clone, Parser)]
#[command(name = "dedup-harness", version)]
pub struct HarnessConfig {
    /// Number of simulated callers.
    #[arg(long, default_value_t = 100)]
    pub callers: usize,

    /// Keys to resolve; caller `i` uses the `i % len`-th key.
    #[arg(long, value_delimiter = ',', default_value = "G")]
    pub keys: Vec<String>,

    /// How long a computed value stays fresh.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "100ms")]
    pub ttl: Duration,

    /// Pause between starting two callers.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "100ms")]
    pub spawn_interval: Duration,

    /// Lower bound of the simulated computation time.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0ms")]
    pub min_delay: Duration,

    /// Upper bound (exclusive) of the simulated computation time.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub max_delay: Duration,

    /// Worker threads running callers. Defaults to one per caller.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Probability that a computation fails.
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Stop waiting for another caller's computation after this long.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl HarnessConfig {
    /// Checks the values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callers == 0 {
            return Err(ConfigError::NoCallers);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::NoWorkers);
        }
        if self.keys.is_empty() || self.keys.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyKey);
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::FailureRate(self.failure_rate.to_string()));
        }
        Ok(())
    }

    /// Number of worker threads for the callers.
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(self.callers).max(1)
    }

    /// The key caller `id` resolves.
    pub fn key_for(&self, id: usize) -> &str {
        &self.keys[id % self.keys.len()]
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, HarnessConfig};
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> HarnessConfig {
        HarnessConfig::try_parse_from(std::iter::once("dedup-harness").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.callers, 100);
        assert_eq!(config.keys, vec!["G".to_string()]);
        assert_eq!(config.ttl, Duration::from_millis(100));
        assert_eq!(config.spawn_interval, Duration::from_millis(100));
        assert_eq!(config.min_delay, Duration::ZERO);
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.workers(), 100);
        assert_eq!(config.timeout, None);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn keys_and_durations() {
        let config = parse(&[
            "--callers",
            "5",
            "--keys",
            "A,B",
            "--ttl",
            "1s 500ms",
            "--timeout",
            "2s",
            "--workers",
            "2",
        ]);
        assert_eq!(config.ttl, Duration::from_millis(1500));
        assert_eq!(config.timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.workers(), 2);
        assert_eq!(config.key_for(0), "A");
        assert_eq!(config.key_for(1), "B");
        assert_eq!(config.key_for(4), "A");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(HarnessConfig::try_parse_from(["dedup-harness", "--ttl", "soon"]).is_err());
        assert_eq!(
            parse(&["--callers", "0"]).validate(),
            Err(ConfigError::NoCallers)
        );
        assert_eq!(
            parse(&["--workers", "0"]).validate(),
            Err(ConfigError::NoWorkers)
        );
        assert_eq!(
            parse(&["--keys", "A,,B"]).validate(),
            Err(ConfigError::EmptyKey)
        );
        assert_eq!(
            parse(&["--failure-rate", "1.5"]).validate(),
            Err(ConfigError::FailureRate("1.5".to_string()))
        );
    }
}
