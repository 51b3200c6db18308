use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ingest_engine::EngineError;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the ingest path, split by who caused them: bad
/// payloads map to 400, storage failures to 500.
#[derive(Debug, Error)]
pub enum IngestError {
  #[error("{0}")]
  Invalid(#[from] EngineError),
  #[error("{0}")]
  Store(#[from] StoreError),
}

impl IngestError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      IngestError::Invalid(_) => StatusCode::BAD_REQUEST,
      IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for IngestError {
  fn into_response(self) -> Response {
    // Database errors carry connection strings and table names; clients get
    // an opaque message while the detail goes to the log.
    let message = match &self {
      IngestError::Invalid(err) => err.to_string(),
      IngestError::Store(_) => "storage failure".to_string(),
    };
    let body = Json(json!({
      "status": "error",
      "message": message,
    }));
    (self.status_code(), body).into_response()
  }
}
