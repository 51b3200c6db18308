//! Shared application state.

use std::sync::Arc;

use crate::store::IncidentStore;

/// State shared across request handlers. The store is injected so the same
/// pipeline runs against Postgres in production and the in-memory store in
/// tests.
pub struct AppState {
  pub store: Arc<dyn IncidentStore>,
  pub audit_actor: String,
}
