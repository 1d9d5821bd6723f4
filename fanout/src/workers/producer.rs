use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::concurrency::completion::CompletionGuard;
use crate::concurrency::handoff::HandoffSender;
use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested};
use crate::error::{ErrorKind, FanOutResult};
use crate::failpoints::{PRODUCER_BEFORE_SEND, PRODUCER_BEFORE_WORK, fanout_fail_point};
use crate::fanout_error;
use crate::types::{BatchId, BatchItem};
use crate::workers::base::Work;

/// How a producer ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// The outcome was handed over to the consumer.
    Delivered,
    /// The consumer went away, the outcome was discarded.
    Discarded,
    /// Shutdown was requested while the producer waited for a concurrency slot, so its work
    /// never ran.
    NotStarted,
}

/// A single producer of a batch.
///
/// The producer owns the [`CompletionGuard`] registered for it by the coordinator, so its
/// completion slot is released on every exit path, including when its task is aborted.
pub struct Producer<T, W> {
    batch_id: BatchId,
    index: usize,
    work: Arc<W>,
    sender: HandoffSender<BatchItem<T>>,
    guard: CompletionGuard,
    permits: Option<Arc<Semaphore>>,
    shutdown_rx: ShutdownRx,
}

impl<T, W> Producer<T, W>
where
    T: Send + 'static,
    W: Work<T>,
{
    pub fn new(
        batch_id: BatchId,
        index: usize,
        work: Arc<W>,
        sender: HandoffSender<BatchItem<T>>,
        guard: CompletionGuard,
        permits: Option<Arc<Semaphore>>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            batch_id,
            index,
            work,
            sender,
            guard,
            permits,
            shutdown_rx,
        }
    }

    /// Runs the work and hands its outcome to the consumer.
    ///
    /// Failures of the work are delivered as failed items and do not fail the producer. An
    /// error is only returned when the result could not be handed over, for example when the
    /// channel protocol was violated.
    ///
    /// When the batch is bounded by a concurrency limit, a producer still waiting for its slot
    /// when shutdown is requested exits with [`ProducerExit::NotStarted`] without running its
    /// work or sending anything.
    pub async fn run(self) -> FanOutResult<ProducerExit> {
        let Producer {
            batch_id,
            index,
            work,
            sender,
            guard: _guard,
            permits,
            shutdown_rx,
        } = self;

        let _permit = match permits {
            Some(permits) => {
                // The coordinator closes the limiter on shutdown, which fails pending acquires.
                let permit = permits.acquire_owned().await.ok();
                if permit.is_none() || is_shutdown_requested(&shutdown_rx) {
                    debug!(%batch_id, index, "shutdown requested before the producer started");
                    return Ok(ProducerExit::NotStarted);
                }

                permit
            }
            None => None,
        };

        debug!(%batch_id, index, "producer started");

        let outcome = execute(work.as_ref(), index).await;

        // A failure injected between the work and the handoff replaces the work's outcome.
        let outcome = fanout_fail_point(PRODUCER_BEFORE_SEND).and(outcome);
        if let Err(err) = &outcome {
            warn!(%batch_id, index, error = %err, "work item failed");
        }

        match sender.send(BatchItem { index, outcome }).await {
            Ok(()) => {
                debug!(%batch_id, index, "producer delivered its result");
                Ok(ProducerExit::Delivered)
            }
            Err(err) if err.kind() == ErrorKind::ConsumerGone => {
                debug!(%batch_id, index, "consumer went away, result discarded");
                Ok(ProducerExit::Discarded)
            }
            Err(err) => {
                error!(%batch_id, index, error = %err, "producer violated the channel protocol");
                Err(err)
            }
        }
    }
}

/// Executes the work for `index`, converting a panic into a failed outcome.
async fn execute<T, W>(work: &W, index: usize) -> FanOutResult<T>
where
    W: Work<T>,
{
    fanout_fail_point(PRODUCER_BEFORE_WORK)?;

    match AssertUnwindSafe(work.run(index)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(fanout_error!(
            ErrorKind::WorkerPanic,
            "Work item panicked",
            panic_message(panic.as_ref())
        )),
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
