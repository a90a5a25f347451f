//! Errors returned by the deadline-bounded resolve.

use std::time::Duration;

use thiserror::Error;

/// Failure of [`Coalescer::resolve_timeout`](crate::Coalescer::resolve_timeout).
///
/// Plain [`Coalescer::resolve`](crate::Coalescer::resolve) never wraps anything: it hands back
/// the computation's own error as is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError<E> {
    /// The computation ran on this caller and failed.
    #[error("computation failed: {0}")]
    Compute(E),

    /// Another caller was still computing the value when the deadline passed.
    ///
    /// That computation keeps running and its result is cached for later callers.
    #[error("timed out after {0:?} waiting for an in-flight computation")]
    Timeout(Duration),
}

impl<E> ResolveError<E> {
    /// Returns `true` if this is a [`ResolveError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
