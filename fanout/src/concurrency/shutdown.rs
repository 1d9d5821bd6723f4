//! Broadcast shutdown signal for cancelling batches.
//!
//! A single [`ShutdownTx`] can stop any number of coordinators. Receivers created before or
//! after the signal observe it, since the channel retains the last value.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Requests every subscribed coordinator to stop.
    pub fn shutdown(&self) {
        // Infallible send so that shutting down works even without any subscriber.
        self.0.send_replace(true);
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a new shutdown channel in the running state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), rx)
}

/// Returns `true` if shutdown has already been requested on `rx`.
pub fn is_shutdown_requested(rx: &ShutdownRx) -> bool {
    *rx.borrow()
}

/// Waits until shutdown is requested.
///
/// Returns immediately if the signal was already sent. If the transmitter is dropped without
/// signaling, shutdown can never happen and the returned future stays pending.
pub async fn wait_for_shutdown(rx: &mut ShutdownRx) {
    if rx.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
