//! Per-key slot and its single-flight protocol.
//!
//! An [`Entry`] is either idle or has exactly one caller computing its value. Callers that find
//! it computing sleep on the entry's condition variable and re-check the slot on every wake-up,
//! so a fresh value published by the computing caller is shared, and a failed (or panicked)
//! computation hands the job over to whichever waiter re-acquires the lock first.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::sync::{lock, Condvar, Mutex, MutexGuard};

/// A value together with the instant it goes stale.
#[derive(Debug)]
struct Cached<V> {
    value: V,
    /// `None` if the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

#[derive(Debug)]
struct Slot<V> {
    /// `None` until the first successful computation, i.e. "already expired".
    cached: Option<Cached<V>>,
    in_progress: bool,
}

impl<V: Clone> Slot<V> {
    fn fresh(&self, now: Instant) -> Option<V> {
        self.cached
            .as_ref()
            .filter(|cached| cached.expires_at.map_or(true, |expires_at| now < expires_at))
            .map(|cached| cached.value.clone())
    }
}

/// The waiter could not get a value before its deadline.
#[derive(Debug)]
pub(crate) struct TimedOut;

/// Outcome of waiting for the slot to settle.
enum Claim<'a, V> {
    /// Someone already computed a value that is still fresh.
    Fresh(V),
    /// The caller now owns the computation.
    Compute(Computing<'a, V>),
}

/// Ownership of an entry's computation.
///
/// Dropping it clears `in_progress` and wakes every waiter, whether the computation returned,
/// failed or unwound.
struct Computing<'a, V> {
    entry: &'a Entry<V>,
    result: Option<Cached<V>>,
}

impl<V> Computing<'_, V> {
    fn publish(mut self, value: V, ttl: Duration) {
        self.result = Some(Cached {
            value,
            expires_at: Instant::now().checked_add(ttl),
        });
    }
}

impl<V> Drop for Computing<'_, V> {
    fn drop(&mut self) {
        let mut slot = lock(&self.entry.slot);
        match self.result.take() {
            Some(cached) => {
                debug!("computation finished");
                slot.cached = Some(cached);
            }
            None => debug!("computation did not produce a value, entry stays stale"),
        }
        slot.in_progress = false;
        drop(slot);
        self.entry.ready.notify_all();
    }
}

/// Cached value of a single key plus the coordination state of its computation.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    slot: Mutex<Slot<V>>,
    ready: Condvar,
}

impl<V: Clone> Entry<V> {
    /// Creates an idle entry that has never been computed.
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                cached: None,
                in_progress: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Returns the cached value if it is fresh, otherwise computes it with `compute`.
    ///
    /// At most one caller runs `compute` at a time. Everybody else arriving meanwhile waits
    /// for it and then takes its value. If `compute` fails, its error goes to the caller that
    /// ran it and the entry is left stale.
    pub(crate) fn get_or_compute<E>(
        &self,
        ttl: Duration,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let claim = match self.claim(|slot| Ok::<_, Infallible>(self.wait(slot))) {
            Ok(claim) => claim,
            Err(never) => match never {},
        };
        Self::settle(claim, ttl, compute)
    }

    /// Like [`Entry::get_or_compute`], but gives up waiting for another caller's computation at
    /// `deadline`.
    ///
    /// The deadline only bounds waiting. A computation this caller claims runs to completion.
    pub(crate) fn get_or_compute_until<E>(
        &self,
        ttl: Duration,
        deadline: Instant,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Result<V, E>, TimedOut> {
        let claim = self.claim(|slot| {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|remaining| !remaining.is_zero())
                .ok_or(TimedOut)?;
            Ok(self.wait_timeout(slot, remaining))
        })?;
        Ok(Self::settle(claim, ttl, compute))
    }

    /// Returns `true` if the entry holds a value that has not expired yet.
    pub(crate) fn is_fresh(&self) -> bool {
        lock(&self.slot).fresh(Instant::now()).is_some()
    }

    /// Returns `true` while some caller is running the computation.
    pub(crate) fn is_computing(&self) -> bool {
        lock(&self.slot).in_progress
    }

    /// Waits until the slot is either fresh or idle. In the latter case the caller becomes the
    /// one computing.
    ///
    /// `wait` blocks on the condition variable. An error from it stops waiting altogether.
    fn claim<'a, T>(
        &'a self,
        mut wait: impl FnMut(MutexGuard<'a, Slot<V>>) -> Result<MutexGuard<'a, Slot<V>>, T>,
    ) -> Result<Claim<'a, V>, T> {
        let mut slot = lock(&self.slot);
        loop {
            if let Some(value) = slot.fresh(Instant::now()) {
                trace!("fresh value");
                return Ok(Claim::Fresh(value));
            }
            if !slot.in_progress {
                slot.in_progress = true;
                debug!("stale entry, computing");
                return Ok(Claim::Compute(Computing {
                    entry: self,
                    result: None,
                }));
            }
            // Wake-ups may be spurious or lose the race to another waiter; the loop re-checks.
            trace!("computation in flight, waiting");
            slot = wait(slot)?;
        }
    }

    fn settle<E>(
        claim: Claim<'_, V>,
        ttl: Duration,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        match claim {
            Claim::Fresh(value) => Ok(value),
            Claim::Compute(computing) => {
                // `computing` is dropped on error or unwind, releasing the waiters.
                let value = compute()?;
                computing.publish(value.clone(), ttl);
                Ok(value)
            }
        }
    }

    fn wait<'a>(&self, slot: MutexGuard<'a, Slot<V>>) -> MutexGuard<'a, Slot<V>> {
        self.ready
            .wait(slot)
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &self,
        slot: MutexGuard<'a, Slot<V>>,
        timeout: Duration,
    ) -> MutexGuard<'a, Slot<V>> {
        match self.ready.wait_timeout(slot, timeout) {
            Ok((slot, _)) => slot,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}
