//! Multi-producer, single-consumer handoff channel with an explicit, single close.
//!
//! The channel is built on a tokio mpsc channel but splits the sending side in two:
//!
//! - [`HandoffCloser`] owns the only strong sender. The channel stays open exactly as long as
//!   the closer is alive and [`HandoffCloser::close`] consumes it, so a channel cannot be closed
//!   twice.
//! - [`HandoffSender`] handles given to producers hold a weak reference. They never keep the
//!   channel open on their own and a send attempted after the close is reported as a
//!   [`ErrorKind::ProtocolViolation`] instead of being silently accepted.
//!
//! With a capacity of zero the channel behaves as a rendezvous point: a send completes only
//! once the consumer has taken the value. With a positive capacity up to that many values can
//! be parked without a waiting receiver.

use std::task::{Context, Poll, ready};

use futures::future::poll_fn;
use tokio::sync::{mpsc, oneshot};

use crate::bail;
use crate::error::{ErrorKind, FanOutResult};

/// A value in flight together with the acknowledgement expected by a rendezvous sender.
#[derive(Debug)]
struct Delivery<T> {
    value: T,
    ack: Option<oneshot::Sender<()>>,
}

impl<T> Delivery<T> {
    /// Hands the value over to the consumer, acknowledging the sender if it waits for it.
    ///
    /// Returns [`None`] if a rendezvous sender stopped waiting, in which case its send never
    /// completed and the value must not be observed.
    fn accept(self) -> Option<T> {
        match self.ack {
            Some(ack) => ack.send(()).ok().map(|()| self.value),
            None => Some(self.value),
        }
    }
}

/// Creates a new handoff channel.
///
/// A `capacity` of `0` creates a rendezvous channel, any other value a buffered one.
pub fn channel<T>(capacity: usize) -> (HandoffCloser<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closer = HandoffCloser {
        tx,
        rendezvous: capacity == 0,
    };

    (closer, HandoffReceiver { rx })
}

/// Owner of the channel's open state.
///
/// Only the holder of the closer can close the channel and it can do so once.
#[derive(Debug)]
pub struct HandoffCloser<T> {
    tx: mpsc::Sender<Delivery<T>>,
    rendezvous: bool,
}

impl<T> HandoffCloser<T> {
    /// Returns a new sender handle for a producer.
    pub fn sender(&self) -> HandoffSender<T> {
        HandoffSender {
            tx: self.tx.downgrade(),
            rendezvous: self.rendezvous,
        }
    }

    /// Closes the channel.
    ///
    /// Values already handed to the channel remain available to the receiver, which observes
    /// the end of the channel once they are drained.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Producer side of a handoff channel.
#[derive(Debug)]
pub struct HandoffSender<T> {
    tx: mpsc::WeakSender<Delivery<T>>,
    rendezvous: bool,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rendezvous: self.rendezvous,
        }
    }
}

impl<T> HandoffSender<T> {
    /// Sends `value` to the consumer.
    ///
    /// Fails with [`ErrorKind::ProtocolViolation`] if the channel was already closed and with
    /// [`ErrorKind::ConsumerGone`] if the receiver was dropped before taking the value.
    pub async fn send(&self, value: T) -> FanOutResult<()> {
        let Some(tx) = self.tx.upgrade() else {
            bail!(
                ErrorKind::ProtocolViolation,
                "Send attempted on a closed handoff channel"
            );
        };

        let (ack, acked) = if self.rendezvous {
            let (ack_tx, ack_rx) = oneshot::channel();
            (Some(ack_tx), Some(ack_rx))
        } else {
            (None, None)
        };

        if tx.send(Delivery { value, ack }).await.is_err() {
            bail!(
                ErrorKind::ConsumerGone,
                "The consumer stopped receiving before the value was sent"
            );
        }

        // The value is queued, holding the strong sender any longer would delay the close.
        drop(tx);

        if let Some(acked) = acked {
            if acked.await.is_err() {
                bail!(
                    ErrorKind::ConsumerGone,
                    "The consumer stopped receiving before the value was taken"
                );
            }
        }

        Ok(())
    }

    /// Returns `true` if the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.tx.strong_count() == 0
    }
}

/// Consumer side of a handoff channel.
#[derive(Debug)]
pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<Delivery<T>>,
}

impl<T> HandoffReceiver<T> {
    /// Receives the next value, returning [`None`] once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Polls for the next value, returning [`None`] once the channel is closed and drained.
    ///
    /// Values of rendezvous senders that were cancelled while waiting are skipped.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            let Some(delivery) = ready!(self.rx.poll_recv(cx)) else {
                return Poll::Ready(None);
            };

            if let Some(value) = delivery.accept() {
                return Poll::Ready(Some(value));
            }
        }
    }
}
