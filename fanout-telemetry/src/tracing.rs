//! Tracing subscriber setup for binaries and tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to forward `log` records to tracing: {0}")]
    LogTracer(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to create the log directory `{path}`: {source}")]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Flushes buffered log lines to the log file when dropped.
///
/// Must be held for the lifetime of the program, otherwise lines written to the log file may
/// be lost.
#[must_use = "dropping the flusher stops writing logs to the log file"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber for the binary `app_name`.
///
/// Logs are written to stdout and, when `log_dir` is set, also to a daily rolling file named
/// after the application. The level is controlled by `RUST_LOG` and defaults to `info`.
/// Records emitted through the `log` crate are forwarded to tracing.
pub fn init_tracing(app_name: &str, log_dir: Option<&Path>) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|source| TracingError::LogDirectory {
                path: log_dir.to_path_buf(),
                source,
            })?;

            let appender = tracing_appender::rolling::daily(log_dir, format!("{app_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing through the test harness, once per process.
///
/// Safe to call from every test, only the first call has an effect.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // Another subscriber may already be installed by the harness.
        let _ = fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .try_init();
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }

    #[test]
    fn test_tracing_error_reports_log_directory() {
        let err = TracingError::LogDirectory {
            path: PathBuf::from("/does/not/exist"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(err.to_string().contains("/does/not/exist"));
    }
}
