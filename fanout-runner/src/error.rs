use fanout_config::LoadConfigError;
use fanout_config::shared::ValidationError;
use thiserror::Error;

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors raised while preparing the runner configuration.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to load configuration: {0}")]
    LoadConfig(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}
