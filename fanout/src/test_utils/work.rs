use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::error::{ErrorKind, FanOutResult};
use crate::fanout_error;
use crate::workers::base::Work;

/// Work returning the square of its index.
pub fn squares() -> impl Work<usize> {
    |index: usize| async move { Ok(index * index) }
}

/// Work returning the square of its index after a random delay of at most `max_delay`.
pub fn delayed_squares(max_delay: Duration) -> impl Work<usize> {
    move |index: usize| async move {
        let millis = rand::thread_rng().gen_range(0..=max_delay.as_millis() as u64);
        sleep(Duration::from_millis(millis)).await;

        Ok(index * index)
    }
}

/// Work returning its index, except for `failing_index` which fails with [`ErrorKind::WorkFailed`].
pub fn failing_at(failing_index: usize) -> impl Work<usize> {
    move |index: usize| async move {
        if index == failing_index {
            return Err(fanout_error!(
                ErrorKind::WorkFailed,
                "Work item failed",
                format!("item {index} failed on purpose")
            ));
        }

        Ok(index)
    }
}

/// Work returning its index, except for `panicking_index` which panics.
pub fn panicking_at(panicking_index: usize) -> impl Work<usize> {
    move |index: usize| async move {
        if index == panicking_index {
            panic!("item {index} panicked on purpose");
        }

        Ok(index)
    }
}

/// Work that never completes.
pub fn stalled() -> impl Work<usize> {
    |_index: usize| async move { pending::<FanOutResult<usize>>().await }
}

/// Work blocked until released, which records how many items run at the same time.
#[derive(Debug, Clone, Default)]
pub struct GatedWork {
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
    release: Arc<Notify>,
    progress: Arc<Notify>,
}

impl GatedWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases every blocked item, items starting afterwards complete right away.
    pub fn release_all(&self) {
        self.released.store(true, Ordering::Release);
        self.release.notify_waiters();
    }

    /// Returns the highest number of items observed running at the same time.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::Acquire)
    }

    /// Returns the number of items that have started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    /// Returns the number of items currently running.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Waits until at least `count` items have started.
    pub async fn wait_started(&self, count: usize) {
        loop {
            let notified = self.progress.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.started.load(Ordering::Acquire) >= count {
                return;
            }

            notified.await;
        }
    }

    async fn wait_released(&self) {
        loop {
            let notified = self.release.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.released.load(Ordering::Acquire) {
                return;
            }

            notified.await;
        }
    }
}

impl Work<usize> for GatedWork {
    async fn run(&self, index: usize) -> FanOutResult<usize> {
        let running = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_running.fetch_max(running, Ordering::AcqRel);
        self.started.fetch_add(1, Ordering::AcqRel);
        self.progress.notify_waiters();

        self.wait_released().await;

        self.running.fetch_sub(1, Ordering::AcqRel);

        Ok(index)
    }
}
