use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};

pub mod health_check;
pub mod proxy;
pub mod squares;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

/// Builds a JSON error response with the given status.
pub(crate) fn error_response(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorMessage { error: message })
}
