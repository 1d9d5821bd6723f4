use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;

use fanout_config::shared::FanOutConfig;
use futures::Stream;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::concurrency::completion::CompletionCounter;
use crate::concurrency::handoff::{self, HandoffCloser};
use crate::concurrency::shutdown::{
    ShutdownRx, create_shutdown_channel, is_shutdown_requested, wait_for_shutdown,
};
use crate::concurrency::signal::{PhaseRx, PhaseTx, create_phase_signal};
use crate::concurrency::stream::FanOutStream;
use crate::error::{ErrorKind, FanOutResult};
use crate::fanout_error;
use crate::types::{BatchId, BatchItem, BatchPhase, BatchSummary};
use crate::workers::base::{Work, WorkerHandle};
use crate::workers::producer::{Producer, ProducerExit};

/// Runs `count` work items concurrently with the default [`FanOutConfig`].
///
/// Returns the results as a [`FanOut`] stream which ends once every producer has finished and
/// the channel has been closed. Use [`FanOutPool::run`] for custom configuration or
/// cancellation support.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub fn run_fan_out<T, W>(count: usize, work: W) -> FanOut<T>
where
    T: Send + 'static,
    W: Work<T>,
{
    // Without a transmitter the batch can never be cancelled.
    let (_, shutdown_rx) = create_shutdown_channel();
    FanOutPool::default().run(count, work, shutdown_rx)
}

/// Coordinator of fan-out batches.
///
/// [`FanOutPool`] launches one producer per work item, waits for all of them off the consumer's
/// task and closes the results channel once, after the last producer released its completion
/// slot.
#[derive(Debug, Clone, Default)]
pub struct FanOutPool {
    config: Arc<FanOutConfig>,
}

impl FanOutPool {
    /// Creates a pool from a validated configuration.
    pub fn new(config: FanOutConfig) -> FanOutResult<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Starts a batch of `count` work items.
    ///
    /// The coordinator runs in its own task. When `shutdown_rx` is signaled, no further
    /// producers are launched and producers still waiting for a concurrency slot never start
    /// their work. Producers already running get the configured grace period and are aborted
    /// afterwards, then the channel is closed.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn run<T, W>(&self, count: usize, work: W, shutdown_rx: ShutdownRx) -> FanOut<T>
    where
        T: Send + 'static,
        W: Work<T>,
    {
        let batch_id = BatchId::random();
        let (closer, receiver) = handoff::channel(self.config.channel_capacity);
        let counter = CompletionCounter::new();
        let (phase_tx, phase_rx) = create_phase_signal();
        let phase_tx = Arc::new(phase_tx);

        let coordinator = Coordinator {
            batch_id,
            count,
            work: Arc::new(work),
            closer,
            counter: counter.clone(),
            phase: phase_tx.clone(),
            shutdown_rx,
            config: self.config.clone(),
        };

        let span = info_span!("fan_out_batch", %batch_id, count);
        let join = tokio::spawn(coordinator.run().instrument(span));

        FanOut {
            stream: FanOutStream::new(batch_id, receiver, phase_tx),
            handle: FanOutHandle {
                batch_id,
                phase_rx,
                counter,
                join,
            },
        }
    }
}

/// Coordinator task state of a single batch.
struct Coordinator<T, W> {
    batch_id: BatchId,
    count: usize,
    work: Arc<W>,
    closer: HandoffCloser<BatchItem<T>>,
    counter: CompletionCounter,
    phase: Arc<PhaseTx>,
    shutdown_rx: ShutdownRx,
    config: Arc<FanOutConfig>,
}

impl<T, W> Coordinator<T, W>
where
    T: Send + 'static,
    W: Work<T>,
{
    async fn run(self) -> FanOutResult<BatchSummary> {
        let Coordinator {
            batch_id,
            count,
            work,
            closer,
            counter,
            phase,
            mut shutdown_rx,
            config,
        } = self;

        info!(
            count,
            channel_capacity = config.channel_capacity,
            max_concurrency = config.max_concurrency,
            "starting fan-out batch"
        );

        let permits =
            (config.max_concurrency > 0).then(|| Arc::new(Semaphore::new(config.max_concurrency)));

        let mut join_set = JoinSet::new();
        let mut launched = 0;
        let mut cancelled = false;

        for index in 0..count {
            if is_shutdown_requested(&shutdown_rx) {
                info!(launched, "shutdown requested, no further producers are launched");
                cancelled = true;
                break;
            }

            // The slot is registered before the producer exists so the counter cannot reach
            // zero while a launched producer is still running.
            let producer = Producer::new(
                batch_id,
                index,
                work.clone(),
                closer.sender(),
                counter.register(),
                permits.clone(),
                shutdown_rx.clone(),
            );
            join_set.spawn(producer.run().instrument(info_span!("producer", index)));
            launched += 1;
        }

        phase.advance(BatchPhase::Running);
        debug!(launched, pending = counter.pending(), "producers launched");

        if !cancelled {
            tokio::select! {
                _ = counter.wait_idle() => {}
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!(pending = counter.pending(), "shutdown requested while producers are running");
                    cancelled = true;
                }
            }
        }

        if cancelled {
            // Producers still waiting for a slot must not start their work.
            if let Some(permits) = &permits {
                permits.close();
            }

            if timeout(config.shutdown_grace(), counter.wait_idle()).await.is_err() {
                warn!(
                    pending = counter.pending(),
                    grace_ms = config.shutdown_grace_ms,
                    "shutdown grace period elapsed, aborting remaining producers"
                );
                join_set.abort_all();
            }
        }

        let mut aborted = 0;
        let mut not_started = 0;
        let mut errors = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(ProducerExit::NotStarted)) => not_started += 1,
                Ok(Ok(ProducerExit::Delivered | ProducerExit::Discarded)) => {}
                Ok(Err(err)) => errors.push(err),
                Err(join_err) if join_err.is_cancelled() => {
                    debug!("producer task was aborted");
                    aborted += 1;
                }
                Err(join_err) => {
                    error!(error = %join_err, "producer task panicked");
                    errors.push(fanout_error!(
                        ErrorKind::WorkerPanic,
                        "Producer task panicked outside of its work",
                        join_err
                    ));
                }
            }
        }

        // Every producer task has ended, so every guard has been dropped.
        counter.wait_idle().await;
        phase.advance(BatchPhase::Draining);

        closer.close();
        phase.advance(BatchPhase::Closed);

        let summary = BatchSummary {
            batch_id,
            requested: count,
            launched,
            not_started,
            aborted,
            cancelled,
        };
        info!(
            launched,
            not_started,
            aborted,
            cancelled,
            failed_producers = errors.len(),
            "fan-out batch closed"
        );

        if errors.is_empty() {
            Ok(summary)
        } else {
            Err(errors.into())
        }
    }
}

/// Handle over the coordinator of a running batch.
#[derive(Debug)]
pub struct FanOutHandle {
    batch_id: BatchId,
    phase_rx: PhaseRx,
    counter: CompletionCounter,
    join: JoinHandle<FanOutResult<BatchSummary>>,
}

impl FanOutHandle {
    /// Returns the identifier of the batch.
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Returns the number of producers that have not finished yet.
    pub fn pending(&self) -> usize {
        self.counter.pending()
    }

    /// Waits until the batch has reached at least `phase`.
    pub async fn wait_for_phase(&mut self, phase: BatchPhase) -> BatchPhase {
        self.phase_rx.wait_for(phase).await
    }
}

impl WorkerHandle<BatchPhase, BatchSummary> for FanOutHandle {
    fn state(&self) -> BatchPhase {
        self.phase_rx.current()
    }

    /// Waits for the coordinator to close the channel and returns its summary.
    ///
    /// Fails if a producer violated the channel protocol or died outside of its work.
    async fn wait(self) -> FanOutResult<BatchSummary> {
        match self.join.await {
            Ok(result) => result,
            Err(join_err) => Err(fanout_error!(
                ErrorKind::InvalidState,
                "Fan-out coordinator did not complete",
                join_err
            )),
        }
    }
}

/// A running batch: the stream of its results together with the coordinator handle.
///
/// [`FanOut`] is itself a [`Stream`] of [`BatchItem`]s, use [`FanOut::split`] to drain the
/// results and observe the coordinator separately.
#[derive(Debug)]
pub struct FanOut<T> {
    stream: FanOutStream<T>,
    handle: FanOutHandle,
}

impl<T> FanOut<T> {
    /// Returns the coordinator handle.
    pub fn handle(&self) -> &FanOutHandle {
        &self.handle
    }

    /// Splits the batch into its results stream and coordinator handle.
    pub fn split(self) -> (FanOutStream<T>, FanOutHandle) {
        (self.stream, self.handle)
    }

    /// Drains every result and waits for the coordinator.
    pub async fn collect_all(self) -> FanOutResult<(Vec<BatchItem<T>>, BatchSummary)> {
        use futures::StreamExt;

        let (stream, handle) = self.split();
        let items = stream.collect::<Vec<_>>().await;
        let summary = handle.wait().await?;

        Ok((items, summary))
    }
}

impl<T> Stream for FanOut<T> {
    type Item = BatchItem<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}
