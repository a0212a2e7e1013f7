//! Interrupt handles for long-running store operations.
//!
//! Stores are driven from a single worker thread while holding their own
//! lock, so callers cannot reach them to abort a query. Each store instead
//! hands out an [`Interrupter`] up front; invoking it from any thread asks the
//! in-flight operation to return early.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::StoreError;

/// Detached, thread-safe request to abort the current store operation.
///
/// Interrupting is advisory. An operation that already finished, or that has
/// no interruptible section, simply ignores the request.
#[derive(Clone)]
pub struct Interrupter {
    signal: Arc<dyn Fn() + Send + Sync>,
}

impl Interrupter {
    /// Wrap a closure that performs the interrupt.
    pub fn new<F>(signal: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            signal: Arc::new(signal),
        }
    }

    /// An interrupter for stores that cannot be interrupted.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Combine two interrupters; both fire on [`Interrupter::interrupt`].
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::new(move || {
            self.interrupt();
            other.interrupt();
        })
    }

    /// Ask the store to abandon the in-flight operation.
    pub fn interrupt(&self) {
        (self.signal)();
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupter").finish_non_exhaustive()
    }
}

/// Cooperative interrupt flag polled by scanning loops.
///
/// Operations call [`InterruptFlag::reset`] when they start and
/// [`InterruptFlag::check`] between units of work.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Lower the flag before a new operation starts.
    pub fn reset(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Return `true` if an interrupt was requested.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Fail with [`StoreError::Interrupted`] if the flag is raised.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_raised() {
            Err(StoreError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// An [`Interrupter`] that raises this flag.
    pub fn interrupter(&self) -> Interrupter {
        let raised = Arc::clone(&self.raised);
        Interrupter::new(move || raised.store(true, Ordering::Release))
    }
}
