use fanout::FanOutPool;
use fanout::concurrency::shutdown::create_shutdown_channel;
use fanout_config::shared::RunnerConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};

use crate::demo::run_demo_batch;
use crate::startup::Application;

/// Runs the demonstration batch, then serves HTTP until a shutdown signal arrives.
///
/// On `SIGINT` or `SIGTERM` the server stops accepting connections and every running batch is
/// asked to shut down.
pub async fn start_runner(config: RunnerConfig) -> anyhow::Result<()> {
    info!(
        channel_capacity = config.fanout.channel_capacity,
        max_concurrency = config.fanout.max_concurrency,
        demo_batch_size = config.demo_batch_size,
        "starting fan-out runner"
    );

    let pool = FanOutPool::new(config.fanout.clone())?;
    let (shutdown_tx, _shutdown_rx) = create_shutdown_channel();

    if config.demo_batch_size > 0 {
        run_demo_batch(&pool, config.demo_batch_size, shutdown_tx.subscribe()).await?;
    }

    let application = Application::build(&config, pool, shutdown_tx.clone())?;
    info!(port = application.port(), "http server listening");

    let server_handle = application.handle();
    let shutdown_handle = tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to register SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down runner");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down runner");
            }
        }

        shutdown_tx.shutdown();
        server_handle.stop(true).await;
    });

    let result = application.run_until_stopped().await;

    // The server may also stop on its own, in which case the signal task is still waiting.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result?;
    info!("fan-out runner stopped");

    Ok(())
}
