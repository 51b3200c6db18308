//! PagerDuty Ingest Engine: deterministic webhook reconciliation.
//!
//! Normalizes incident webhook payloads that arrive in several envelope
//! shapes, extracts structured RCA fields from free-form resolution notes,
//! and plans insert / update / merge-redirect writes against the stored
//! incident record. Effects are idempotent under at-least-once, unordered,
//! duplicate delivery.
//!
//! No DB, no network; pure computation over JSON values.

pub mod error;
pub mod merge;
pub mod normalize;
pub mod rca;
pub mod reconcile;
pub mod types;

pub use error::EngineError;
pub use types::{IncidentEvent, IncidentRecord, NormalizedEvent};
