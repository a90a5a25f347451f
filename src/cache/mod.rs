//! Thread-safe coalescing cache.

mod entry;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::debug_span;

use self::entry::Entry;
use crate::error::ResolveError;
use crate::sync::{lock, Arc, Mutex};

/// Cache that remembers the result of `compute` for each key for `ttl`.
///
/// The map from keys to entries is only locked to find or insert an entry. Computations, and
/// waiting for them, happen under the entry's own lock, so different keys never block each
/// other. Entries are created on first use and never removed.
pub struct Coalescer<K, V, F> {
    entries: Mutex<HashMap<K, Arc<Entry<V>>>>,
    ttl: Duration,
    compute: F,
}

impl<K, V, F> Coalescer<K, V, F> {
    /// Creates a cache whose values stay fresh for `ttl` after they are computed.
    pub fn new(ttl: Duration, compute: F) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            compute,
        }
    }

    /// The freshness window applied to every key.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of keys ever resolved.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns `true` if no key was resolved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V: Clone, F> Coalescer<K, V, F> {
    /// Retrieves the value for `key`, computing it if it is missing or stale.
    ///
    /// An invocation of this function does not block an invocation with a different key. For
    /// example, if a thread calls `resolve(key1)` and another thread calls `resolve(key2)`
    /// (`key1≠key2`) concurrently while both are stale, `compute(key1)` and `compute(key2)` run
    /// concurrently.
    ///
    /// On the other hand, since `compute` may consume a lot of resources, the work is never
    /// duplicated: for concurrent invocations of `resolve(key)` while `key` is stale, `compute`
    /// is called only once and every invocation returns its result.
    ///
    /// If `compute` fails, the error is returned to the caller that ran it and the entry stays
    /// stale; callers that were waiting retry, one at a time.
    pub fn resolve<E>(&self, key: K) -> Result<V, E>
    where
        F: Fn(&K) -> Result<V, E>,
    {
        let _span = debug_span!("resolve").entered();
        self.entry(&key)
            .get_or_compute(self.ttl, || (self.compute)(&key))
    }

    /// Like [`Coalescer::resolve`], but stops waiting for another caller's computation of the
    /// same key after `timeout`.
    ///
    /// On [`ResolveError::Timeout`] the other computation keeps running and still fills the
    /// cache. The timeout does not apply to a computation this call runs itself.
    pub fn resolve_timeout<E>(&self, key: K, timeout: Duration) -> Result<V, ResolveError<E>>
    where
        F: Fn(&K) -> Result<V, E>,
    {
        let _span = debug_span!("resolve", ?timeout).entered();
        // A timeout too large to represent is no timeout at all.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.resolve(key).map_err(ResolveError::Compute);
        };
        self.entry(&key)
            .get_or_compute_until(self.ttl, deadline, || (self.compute)(&key))
            .map_err(|_| ResolveError::Timeout(timeout))?
            .map_err(ResolveError::Compute)
    }

    /// Finds the entry for `key`, inserting a never-computed one if needed.
    ///
    /// The map lock is released before returning.
    fn entry(&self, key: &K) -> Arc<Entry<V>> {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(key) {
            return entry.clone();
        }
        let entry = Arc::new(Entry::new());
        let _ = entries.insert(key.clone(), entry.clone());
        entry
    }
}

impl<K: Eq + Hash, V: Clone, F> Coalescer<K, V, F> {
    /// Returns `true` if `key` has a value that has not expired yet.
    pub fn is_fresh(&self, key: &K) -> bool {
        let entry = lock(&self.entries).get(key).cloned();
        entry.is_some_and(|entry| entry.is_fresh())
    }

    /// Returns `true` while some caller is computing the value for `key`.
    pub fn is_computing(&self, key: &K) -> bool {
        let entry = lock(&self.entries).get(key).cloned();
        entry.is_some_and(|entry| entry.is_computing())
    }
}

impl<K, V, F> fmt::Debug for Coalescer<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
