//! Counting completion signal for batches of producers.
//!
//! A [`CompletionCounter`] tracks how many producers are still running. Each producer holds a
//! [`CompletionGuard`] obtained from [`CompletionCounter::register`] before it is launched and
//! the guard releases its slot when dropped, so every exit path of a producer (success, error,
//! panic, or task abort) decrements the counter exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct CompletionInner {
    pending: AtomicUsize,
    idle: Notify,
}

/// Concurrency-safe counter of outstanding producers.
///
/// Cloning the counter yields another handle to the same count.
#[derive(Debug, Clone, Default)]
pub struct CompletionCounter {
    inner: Arc<CompletionInner>,
}

impl CompletionCounter {
    /// Creates a counter with no pending producers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one pending producer and returns the guard that releases it.
    ///
    /// The guard must be created before the producer starts so the counter can never reach
    /// zero while a launched producer has not registered yet.
    pub fn register(&self) -> CompletionGuard {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);

        CompletionGuard {
            inner: self.inner.clone(),
        }
    }

    /// Returns the number of producers that have not released their slot yet.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Waits until every registered producer has released its slot.
    ///
    /// Returns immediately if nothing is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking the count, otherwise a release happening
            // between the check and the await would be missed.
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }

            notified.await;
        }
    }
}

/// Scoped release of one pending completion.
///
/// Dropping the guard decrements the [`CompletionCounter`] it was registered with. The last
/// guard to be dropped wakes every task waiting in [`CompletionCounter::wait_idle`].
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the completion slot"]
pub struct CompletionGuard {
    inner: Arc<CompletionInner>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let previous = self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "completion counter released more than registered");

        if previous == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
