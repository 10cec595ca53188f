//! Synchronization primitives for cooperative interruption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation token threaded into every long-running operation.
///
/// The controller clears it before starting a search; the input sender and
/// the deadline timer raise it; the search polls it at its checkpoints.
/// Wraps `Arc<AtomicBool>` so clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a new flag (initially not raised).
    #[must_use]
    pub fn new() -> Self {
        InterruptFlag(Arc::new(AtomicBool::new(false)))
    }

    /// Check whether the flag has been raised.
    #[inline]
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Raise the flag. The active operation should wind down at its next
    /// checkpoint.
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Clear the flag before starting a new operation.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}
