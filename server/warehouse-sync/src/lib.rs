//! PagerDuty Warehouse Sync
//!
//! HTTP service that receives PagerDuty webhooks on `/pagerduty` and keeps
//! one reconciled row per incident in the `pagerduty_incidents` table.
//! Binds to `BIND_ADDR:PORT` (default 127.0.0.1:5005).

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod state;
pub mod store;

pub use config::Config;
pub use handlers::{health, pagerduty};
pub use state::AppState;
