use fanout_runner::config::load_runner_config;
use fanout_runner::core::start_runner;
use fanout_telemetry::tracing::init_tracing;
use tracing::error;

/// Entry point for the fan-out runner.
///
/// Loads configuration, initializes tracing, starts the async runtime and serves until a
/// shutdown signal is received.
fn main() -> anyhow::Result<()> {
    let runner_config = load_runner_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), runner_config.log_dir.as_deref())?;

    // We start the runtime.
    actix_web::rt::System::new().block_on(async {
        if let Err(err) = start_runner(runner_config).await {
            error!("{err:#}");
            return Err(err);
        }

        Ok(())
    })?;

    Ok(())
}
