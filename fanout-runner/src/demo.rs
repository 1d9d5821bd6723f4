use fanout::FanOutPool;
use fanout::concurrency::shutdown::ShutdownRx;
use fanout::error::FanOutResult;
use fanout::types::BatchSummary;
use fanout::workers::base::WorkerHandle;
use futures::StreamExt;
use tracing::{info, warn};

/// Work computing the square of the item index.
pub async fn square(index: usize) -> FanOutResult<usize> {
    Ok(index * index)
}

/// Runs a batch of `count` squares and logs every result as it arrives.
pub async fn run_demo_batch(
    pool: &FanOutPool,
    count: usize,
    shutdown_rx: ShutdownRx,
) -> FanOutResult<BatchSummary> {
    let (mut stream, handle) = pool.run(count, square, shutdown_rx).split();
    let batch_id = handle.batch_id();

    while let Some(item) = stream.next().await {
        match item.outcome {
            Ok(value) => info!(%batch_id, index = item.index, value, "demo result received"),
            Err(err) => warn!(%batch_id, index = item.index, error = %err, "demo item failed"),
        }
    }

    let summary = handle.wait().await?;
    info!(
        %batch_id,
        received = stream.received(),
        launched = summary.launched,
        not_started = summary.not_started,
        aborted = summary.aborted,
        cancelled = summary.cancelled,
        "demo batch finished"
    );

    Ok(summary)
}
