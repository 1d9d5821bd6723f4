use std::path::PathBuf;

use serde::Deserialize;

use crate::Config;
use crate::shared::{FanOutConfig, ProxyConfig, ValidationError};

/// Configuration of the runner service.
#[derive(Clone, Debug, Deserialize)]
pub struct RunnerConfig {
    /// Settings applied to every fan-out batch.
    #[serde(default)]
    pub fanout: FanOutConfig,
    /// HTTP server and upstream settings.
    pub proxy: ProxyConfig,
    /// Number of items of the demonstration batch run at startup, `0` to skip it.
    #[serde(default)]
    pub demo_batch_size: usize,
    /// Directory for rolling log files, logs only go to stdout when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl RunnerConfig {
    /// Validates every nested configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.fanout.validate()?;
        self.proxy.validate()?;

        Ok(())
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
