//! Synchronization primitives, swapped for `loom`'s when model checking.

#[cfg(not(feature = "check-loom"))]
pub(crate) use std::sync::{Arc, Condvar, Mutex, MutexGuard};

#[cfg(feature = "check-loom")]
pub(crate) use loom::sync::{Arc, Condvar, Mutex, MutexGuard};

use std::sync::PoisonError;

/// Locks `mutex`, ignoring poisoning.
///
/// No code path panics while holding one of our locks (the user computation always runs
/// unlocked), so the protected state is consistent even if some other thread unwound.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
