use actix_web::http::StatusCode;
use actix_web::web::{Data, Json};
use actix_web::{HttpResponse, ResponseError, get};
use fanout::clients::BoundedHttpClient;
use fanout::error::{ErrorKind, FanOutError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routes::error_response;

/// Upstream called by the proxy endpoint.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub upstream_url: String,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to create request")]
    CreateRequest(#[source] FanOutError),

    #[error("Request timed out")]
    TimedOut(#[source] FanOutError),

    #[error("Request failed")]
    RequestFailed(#[source] FanOutError),

    #[error("Upstream request failed")]
    Upstream(u16),
}

impl From<FanOutError> for ProxyError {
    fn from(err: FanOutError) -> Self {
        match err.kind() {
            ErrorKind::InvalidRequest => ProxyError::CreateRequest(err),
            ErrorKind::RequestTimedOut => ProxyError::TimedOut(err),
            _ => ProxyError::RequestFailed(err),
        }
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::CreateRequest(_) | ProxyError::RequestFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::TimedOut(_) => StatusCode::REQUEST_TIMEOUT,
            ProxyError::Upstream(status) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status_code(), self.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub message: String,
    pub status: String,
}

/// Calls the configured upstream within the client deadline and reports its status.
#[get("/proxy")]
pub async fn proxy(
    client: Data<BoundedHttpClient>,
    target: Data<ProxyTarget>,
) -> Result<Json<ProxyResponse>, ProxyError> {
    let response = client.get(&target.upstream_url).await?;

    if response.status != StatusCode::OK.as_u16() {
        return Err(ProxyError::Upstream(response.status));
    }

    Ok(Json(ProxyResponse {
        message: "Request successful".to_string(),
        status: response.status_line,
    }))
}
