use std::future::Future;

use crate::error::FanOutResult;

/// Unit of work executed by every producer of a batch.
///
/// The work receives the index of its item and resolves to the value handed to the consumer.
/// Errors are not swallowed: they are delivered to the consumer as failed items.
///
/// Any `Fn(usize) -> impl Future<Output = FanOutResult<T>>` closure implements [`Work`].
pub trait Work<T>: Send + Sync + 'static {
    /// Runs the work for item `index`.
    fn run(&self, index: usize) -> impl Future<Output = FanOutResult<T>> + Send;
}

impl<T, F, Fut> Work<T> for F
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FanOutResult<T>> + Send,
{
    fn run(&self, index: usize) -> impl Future<Output = FanOutResult<T>> + Send {
        (self)(index)
    }
}

/// Handle for monitoring and waiting on a running worker.
///
/// The generic parameter `S` represents the state observable through the handle while the
/// worker runs and `R` the report returned once it completes.
pub trait WorkerHandle<S, R> {
    /// Returns the current state of the worker.
    ///
    /// The state is a snapshot, holding it does not prevent the worker from progressing.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns its final report.
    fn wait(self) -> impl Future<Output = FanOutResult<R>> + Send;
}
