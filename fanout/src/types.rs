use std::fmt;

use rand::random;

use crate::error::FanOutResult;

/// Identifier attached to every log line emitted on behalf of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

impl BatchId {
    /// Creates a new random batch identifier.
    pub fn random() -> Self {
        Self(random())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One result delivered to the consumer of a batch.
///
/// Failed work is delivered as an `Err` outcome rather than being dropped, so the consumer sees
/// exactly one item per producer that ran its work and was not aborted.
#[derive(Debug)]
pub struct BatchItem<T> {
    /// Index of the work item that produced this result.
    pub index: usize,
    /// Value computed by the work function, or the reason it failed.
    pub outcome: FanOutResult<T>,
}

impl<T> BatchItem<T> {
    /// Returns `true` if the work item completed successfully.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Converts the item into its outcome, discarding the index.
    pub fn into_outcome(self) -> FanOutResult<T> {
        self.outcome
    }
}

/// Lifecycle of a single batch.
///
/// Phases only move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatchPhase {
    /// Channel and completion counter exist, no producer launched yet.
    Created,
    /// Producers have been launched and may still be running.
    Running,
    /// Every producer has released its slot, the channel is still open.
    Draining,
    /// The coordinator closed the channel.
    Closed,
    /// The consumer observed the end of the channel.
    Done,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Created => "created",
            BatchPhase::Running => "running",
            BatchPhase::Draining => "draining",
            BatchPhase::Closed => "closed",
            BatchPhase::Done => "done",
        };

        f.write_str(name)
    }
}

/// Report produced by the coordinator once a batch has been closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Identifier of the batch.
    pub batch_id: BatchId,
    /// Number of work items requested by the caller.
    pub requested: usize,
    /// Number of producers actually launched.
    pub launched: usize,
    /// Number of launched producers that skipped their work because shutdown was requested
    /// while they waited for a concurrency slot.
    pub not_started: usize,
    /// Number of producers aborted after the shutdown grace period elapsed.
    ///
    /// A value whose producer was aborted before the consumer took it is discarded.
    pub aborted: usize,
    /// Whether a shutdown signal cut the batch short.
    pub cancelled: bool,
}

impl BatchSummary {
    /// Returns `true` if every requested item was launched and ran to completion.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.launched == self.requested
            && self.not_started == 0
            && self.aborted == 0
    }
}
