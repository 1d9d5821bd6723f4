use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of the HTTP proxy endpoint and its bounded upstream call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProxyConfig {
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to, `0` to pick a free one.
    pub port: u16,
    /// URL requested by the proxy endpoint.
    pub upstream_url: String,
    /// Deadline, in milliseconds, for the whole upstream call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProxyConfig {
    /// Default upstream deadline in milliseconds.
    pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

    /// Returns the upstream deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates proxy configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyField("proxy.host".to_string()));
        }

        if self.upstream_url.trim().is_empty() {
            return Err(ValidationError::EmptyField("proxy.upstream_url".to_string()));
        }

        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "proxy.timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    ProxyConfig::DEFAULT_TIMEOUT_MS
}
