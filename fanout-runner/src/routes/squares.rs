use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Query};
use actix_web::{HttpResponse, ResponseError, get};
use fanout::FanOutPool;
use fanout::concurrency::shutdown::ShutdownTx;
use fanout::error::FanOutError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::demo::square;
use crate::routes::error_response;

/// Largest batch a single request may start.
pub const MAX_SQUARES_COUNT: usize = 10_000;

#[derive(Debug, Error)]
pub enum SquaresError {
    #[error("count must be at most {MAX_SQUARES_COUNT}, got {0}")]
    TooManyItems(usize),

    #[error("the fan-out batch failed")]
    Batch(#[from] FanOutError),
}

impl ResponseError for SquaresError {
    fn status_code(&self) -> StatusCode {
        match self {
            SquaresError::TooManyItems(_) => StatusCode::BAD_REQUEST,
            SquaresError::Batch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        error_response(self.status_code(), self.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct SquaresQuery {
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SquaresResponse {
    pub batch_id: String,
    /// Squares ordered by item index.
    pub values: Vec<usize>,
    pub failed: usize,
}

/// Runs a fan-out batch computing `index * index` for every index below `count`.
#[get("/squares")]
pub async fn squares(
    pool: Data<FanOutPool>,
    shutdown_tx: Data<ShutdownTx>,
    query: Query<SquaresQuery>,
) -> Result<Json<SquaresResponse>, SquaresError> {
    let count = query.count;
    if count > MAX_SQUARES_COUNT {
        return Err(SquaresError::TooManyItems(count));
    }

    let fan_out = pool.run(count, square, shutdown_tx.subscribe());
    let batch_id = fan_out.handle().batch_id();
    let (items, summary) = fan_out.collect_all().await?;

    let mut values = Vec::with_capacity(items.len());
    let mut failed = 0;
    for item in items {
        match item.outcome {
            Ok(value) => values.push((item.index, value)),
            Err(_) => failed += 1,
        }
    }
    values.sort_unstable_by_key(|(index, _)| *index);

    info!(%batch_id, count, failed, cancelled = summary.cancelled, "squares batch served");

    Ok(Json(SquaresResponse {
        batch_id: batch_id.to_string(),
        values: values.into_iter().map(|(_, value)| value).collect(),
        failed,
    }))
}
