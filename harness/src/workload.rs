//! The simulated expensive computation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::info;

/// Failure injected by [`Workload::compute`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("computation for key {key:?} failed")]
pub struct WorkloadError {
    /// The key that was being computed.
    pub key: String,
}

/// Computes the result for a key. So expensive, much wow.
///
/// Each invocation sleeps for a random time below `max_delay`, and at least `min_delay`, then
/// echoes the key back. The
/// invocation counter is shared by clones, so the caller that owns the cache can read it.
#[derive(Debug, Clone)]
pub struct Workload {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
    invocations: Arc<AtomicUsize>,
}

impl Workload {
    /// Creates a workload that sleeps below `max_delay` and fails with probability
    /// `failure_rate`, clamped to `[0, 1]` (NaN counts as 0).
    pub fn new(max_delay: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            min_delay: Duration::ZERO,
            max_delay,
            failure_rate,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never sleeps less than `min_delay`. A `min_delay` at or above the maximum makes every
    /// delay exactly `min_delay`.
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// How many times [`Workload::compute`] ran so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Runs the computation for `key`.
    pub fn compute(&self, key: &str) -> Result<String, WorkloadError> {
        let call = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;

        let mut rng = rand::thread_rng();
        let delay = self.random_delay(&mut rng);
        info!(%key, call, ?delay, "computing");
        thread::sleep(delay);

        if rng.gen_bool(self.failure_rate) {
            return Err(WorkloadError {
                key: key.to_owned(),
            });
        }
        Ok(key.to_owned())
    }

    /// A delay in `[min_delay, max_delay)`.
    ///
    /// The random part is drawn in whole seconds when it spans two seconds or more, in whole
    /// milliseconds otherwise.
    fn random_delay(&self, rng: &mut impl Rng) -> Duration {
        let span = self.max_delay.saturating_sub(self.min_delay);
        let jitter = if span >= Duration::from_secs(2) {
            Duration::from_secs(rng.gen_range(0..span.as_secs()))
        } else {
            match span.as_millis() as u64 {
                0 => Duration::ZERO,
                millis => Duration::from_millis(rng.gen_range(0..millis)),
            }
        };
        self.min_delay + jitter
    }
}
