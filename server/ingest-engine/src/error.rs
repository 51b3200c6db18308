//! Structured error types for the ingest engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  /// Prefix the field path, used when an error surfaces from a batch entry.
  pub fn in_context(self, prefix: &str) -> Self {
    match self {
      Self::Validation { field, reason } => Self::Validation {
        field: format!("{}.{}", prefix, field),
        reason,
      },
      other => other,
    }
  }
}
