//! Binary entrypoint for the warehouse sync service.

use axum::{routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use warehouse_sync::store::PgStore;
use warehouse_sync::{AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warehouse_sync=info".into()),
    )
    .init();

  let config = Config::from_env();

  let store = PgStore::connect(&config.database_url).await?;
  store.ensure_schema().await?;

  let state = Arc::new(AppState {
    store: Arc::new(store),
    audit_actor: config.audit_actor.clone(),
  });

  let app = Router::new()
    .route("/health", get(warehouse_sync::health))
    .route("/pagerduty", post(warehouse_sync::pagerduty))
    .layer(CorsLayer::permissive())
    .with_state(state);

  let addr = SocketAddr::new(config.bind_addr, config.port);
  tracing::info!("warehouse-sync listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
