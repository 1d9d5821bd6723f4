//! Batch phase signaling.
//!
//! The coordinator publishes every [`BatchPhase`] transition of its batch on a watch channel.
//! Observers only ever see the latest phase, but since phases move forward monotonically a
//! waiter asking for a phase is released by that phase or any later one.

use tokio::sync::watch;

use crate::types::BatchPhase;

/// Transmitter side of a batch phase signal.
#[derive(Debug)]
pub struct PhaseTx(watch::Sender<BatchPhase>);

impl PhaseTx {
    /// Moves the batch to `phase`.
    ///
    /// Transitions to an earlier phase are ignored.
    pub fn advance(&self, phase: BatchPhase) {
        self.0.send_if_modified(|current| {
            if phase > *current {
                *current = phase;
                true
            } else {
                false
            }
        });
    }

    /// Returns the current phase.
    pub fn current(&self) -> BatchPhase {
        *self.0.borrow()
    }

    /// Creates a new phase receiver subscription.
    pub fn subscribe(&self) -> PhaseRx {
        PhaseRx(self.0.subscribe())
    }
}

/// Receiver side of a batch phase signal.
#[derive(Debug, Clone)]
pub struct PhaseRx(watch::Receiver<BatchPhase>);

impl PhaseRx {
    /// Returns the latest published phase.
    pub fn current(&self) -> BatchPhase {
        *self.0.borrow()
    }

    /// Waits until the batch has reached at least `phase`.
    ///
    /// Returns the phase that was observed, or the last published phase if the transmitter
    /// went away first.
    pub async fn wait_for(&mut self, phase: BatchPhase) -> BatchPhase {
        let observed = self
            .0
            .wait_for(|current| *current >= phase)
            .await
            .map(|current| *current);

        observed.unwrap_or_else(|_| *self.0.borrow())
    }
}

/// Creates a phase signal starting at [`BatchPhase::Created`].
pub fn create_phase_signal() -> (PhaseTx, PhaseRx) {
    let (tx, rx) = watch::channel(BatchPhase::Created);
    (PhaseTx(tx), PhaseRx(rx))
}
