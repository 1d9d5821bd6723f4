use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;

use futures::Stream;
use futures::stream::FusedStream;
use pin_project_lite::pin_project;
use tracing::debug;

use crate::concurrency::handoff::HandoffReceiver;
use crate::concurrency::signal::PhaseTx;
use crate::types::{BatchId, BatchItem, BatchPhase};

pin_project! {
    /// Drain loop over the results of one batch.
    ///
    /// Yields every [`BatchItem`] handed over by the producers, in arrival order, and ends once
    /// the coordinator has closed the channel and no value is left. The stream is single pass
    /// and stays ended after yielding [`None`].
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct FanOutStream<T> {
        batch_id: BatchId,
        receiver: HandoffReceiver<BatchItem<T>>,
        phase: Arc<PhaseTx>,
        received: usize,
        terminated: bool,
    }
}

impl<T> FanOutStream<T> {
    /// Creates a new [`FanOutStream`] draining `receiver`.
    pub(crate) fn new(
        batch_id: BatchId,
        receiver: HandoffReceiver<BatchItem<T>>,
        phase: Arc<PhaseTx>,
    ) -> Self {
        Self {
            batch_id,
            receiver,
            phase,
            received: 0,
            terminated: false,
        }
    }

    /// Returns how many items have been yielded so far.
    pub fn received(&self) -> usize {
        self.received
    }
}

impl<T> Stream for FanOutStream<T> {
    type Item = BatchItem<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.terminated {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                *this.received += 1;
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                *this.terminated = true;

                // Observing the end of the channel implies the coordinator closed it.
                this.phase.advance(BatchPhase::Closed);
                this.phase.advance(BatchPhase::Done);

                debug!(batch_id = %this.batch_id, received = *this.received, "batch drained");

                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> FusedStream for FanOutStream<T> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
