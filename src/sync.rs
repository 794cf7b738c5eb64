//! Shared mutual exclusion for bar state.
//!
//! [`SyncGuard`] is a cloneable handle around one lock. Every clone guards the
//! same value, so mutations made through one handle are seen by all others,
//! and only one of them runs at a time. Access goes through a closure: the lock
//! is released when the closure returns, on early return through `?`, and
//! while unwinding from a panic alike.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

/// Cloneable, lock-protected shared value.
pub struct SyncGuard<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SyncGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SyncGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGuard")
            .field("handles", &Arc::strong_count(&self.inner))
            .field("locked", &self.inner.is_locked())
            .finish()
    }
}

impl<T> SyncGuard<T> {
    /// Places `value` behind a new lock.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// Must not be re-entered from inside `f` on the same guard; that deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Whether two handles guard the same value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
