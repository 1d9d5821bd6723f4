use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, FanOutResult};
use crate::fanout_error;

/// Status of a completed upstream call.
///
/// A non-success status is not an error of the client: the caller decides how to surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// Numeric HTTP status code.
    pub status: u16,
    /// Status code followed by its canonical reason, for example `200 OK`.
    pub status_line: String,
}

impl UpstreamResponse {
    fn from_status(status: StatusCode) -> Self {
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_str()),
            None => status.as_str().to_owned(),
        };

        Self {
            status: status.as_u16(),
            status_line,
        }
    }

    /// Returns `true` if the upstream answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client whose calls are bounded by a deadline covering the whole exchange.
///
/// When the deadline elapses the in-flight request is dropped, which cancels it, and the call
/// fails with [`ErrorKind::RequestTimedOut`].
#[derive(Debug, Clone)]
pub struct BoundedHttpClient {
    client: reqwest::Client,
    deadline: Duration,
}

impl BoundedHttpClient {
    /// Creates a client whose calls must complete within `deadline`.
    pub fn new(deadline: Duration) -> FanOutResult<Self> {
        let client = reqwest::Client::builder().build().map_err(|err| {
            fanout_error!(
                ErrorKind::RequestFailed,
                "Failed to create the HTTP client",
                source: err
            )
        })?;

        Ok(Self { client, deadline })
    }

    /// Issues a `GET` request to `url`.
    ///
    /// Fails with [`ErrorKind::InvalidRequest`] if `url` cannot be turned into a request, with
    /// [`ErrorKind::RequestTimedOut`] if no response arrived before the deadline and with
    /// [`ErrorKind::RequestFailed`] for any other transport failure.
    pub async fn get(&self, url: &str) -> FanOutResult<UpstreamResponse> {
        let request = self.client.get(url).build().map_err(|err| {
            fanout_error!(
                ErrorKind::InvalidRequest,
                "Failed to create request",
                err.to_string(),
                source: err
            )
        })?;

        debug!(%url, deadline_ms = self.deadline.as_millis() as u64, "sending upstream request");

        let response = match timeout(self.deadline, self.client.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) if err.is_timeout() => {
                warn!(%url, error = %err, "upstream request timed out");
                bail!(
                    ErrorKind::RequestTimedOut,
                    "Request timed out",
                    err.to_string()
                );
            }
            Ok(Err(err)) => {
                warn!(%url, error = %err, "upstream request failed");
                return Err(fanout_error!(
                    ErrorKind::RequestFailed,
                    "Request failed",
                    err.to_string(),
                    source: err
                ));
            }
            Err(_) => {
                warn!(%url, deadline_ms = self.deadline.as_millis() as u64, "upstream request timed out");
                bail!(
                    ErrorKind::RequestTimedOut,
                    "Request timed out",
                    format!("No response within {} ms", self.deadline.as_millis())
                );
            }
        };

        let response = UpstreamResponse::from_status(response.status());
        debug!(%url, status = response.status, "upstream request completed");

        Ok(response)
    }
}
