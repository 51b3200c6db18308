use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::IngestError;
use crate::ingest;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
  Json(json!({ "status": "healthy" }))
}

/// Webhook receiver. Applies every event in the payload, then acknowledges
/// with a per-event summary so senders can see what happened to each one.
pub async fn pagerduty(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<Value>,
) -> Response {
  match ingest::apply_payload(state.store.as_ref(), &state.audit_actor, &payload).await {
    Ok(applied) => Json(json!({
      "status": "ok",
      "received": applied.len(),
      "applied": applied,
    }))
    .into_response(),
    Err(err) => {
      match &err {
        IngestError::Invalid(_) => tracing::warn!(%err, "payload rejected"),
        IngestError::Store(_) => tracing::error!(%err, "write failed"),
      }
      err.into_response()
    }
  }
}
