//! Core types for the ingest engine (canonical events + the stored record).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Event classification
// ---------------------------------------------------------------------------

/// Broad classification of a provider event type string.
///
/// Only `Resolved` and `Annotated` get special treatment (RCA extraction);
/// every other kind, including `Other`, takes the generic update path so the
/// record stays current even for event types the engine does not interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  Triggered,
  Acknowledged,
  Escalated,
  Reopened,
  Annotated,
  Resolved,
  Other,
}

impl EventKind {
  /// Accepts both the past-tense (v3) and imperative (v2) spellings.
  pub fn from_event_type(s: &str) -> Self {
    match s {
      "incident.triggered" | "incident.trigger" => Self::Triggered,
      "incident.acknowledged" | "incident.acknowledge" => Self::Acknowledged,
      "incident.escalated" | "incident.escalate" => Self::Escalated,
      "incident.reopened" | "incident.reopen" => Self::Reopened,
      "incident.annotated" | "incident.annotate" => Self::Annotated,
      "incident.resolved" | "incident.resolve" => Self::Resolved,
      _ => Self::Other,
    }
  }
}

// ---------------------------------------------------------------------------
// Status enum (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
  Triggered,
  Acknowledged,
  Resolved,
}

impl IncidentStatus {
  /// Unknown spellings yield `None`; the status column keeps a closed
  /// vocabulary and the raw payload still carries the original string.
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "triggered" => Some(Self::Triggered),
      "acknowledged" | "acked" | "ack" => Some(Self::Acknowledged),
      "resolved" | "closed" => Some(Self::Resolved),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Triggered => "triggered",
      Self::Acknowledged => "acknowledged",
      Self::Resolved => "resolved",
    }
  }
}

// ---------------------------------------------------------------------------
// RCA fields
// ---------------------------------------------------------------------------

/// Root-cause fields extracted from resolution notes or structured details.
/// All optional; an empty set is normal, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcaFields {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rca1: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rca2: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub business_justification: Option<String>,
}

impl RcaFields {
  pub fn is_empty(&self) -> bool {
    self.rca1.is_none() && self.rca2.is_none() && self.business_justification.is_none()
  }
}

// ---------------------------------------------------------------------------
// Canonical event
// ---------------------------------------------------------------------------

/// Resolve-reason descriptor attached to a resolved event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveReason {
  /// Free-text resolution note.
  Note(String),
  /// The referenced incident was consolidated into the event's own incident.
  /// The referenced id is the subsumed one; the event's id is the primary.
  Merged { subsumed_id: String },
}

/// Partial view of incident attributes carried by one notification.
/// Every member is optional; absent means "this event said nothing about it".
#[derive(Debug, Clone, Default)]
pub struct IncidentFields {
  pub title: Option<String>,
  pub status: Option<IncidentStatus>,
  pub service: Option<String>,
  pub urgency: Option<String>,
  pub priority: Option<String>,
  pub assignee: Option<String>,
  /// Full assignments array, stored verbatim.
  pub assignments: Option<Value>,
  pub incident_type: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  /// When the provider says the change happened (envelope timestamp).
  pub occurred_at: Option<DateTime<Utc>>,
  pub is_mergeable: Option<bool>,
}

/// Canonical event after normalization. Constructed from one raw payload
/// entry, consumed once by the reconciler, never persisted itself.
#[derive(Debug, Clone)]
pub struct IncidentEvent {
  /// Raw provider event type string (kept for acks and audit).
  pub event_type: String,
  pub kind: EventKind,
  pub incident_id: String,
  pub fields: IncidentFields,
  pub resolve_reason: Option<ResolveReason>,
  /// Structured rca keys lifted from `body.details`, when present.
  pub details_rca: RcaFields,
  /// Free text chosen by the normalizer for RCA parsing (resolved and
  /// annotation events only).
  pub note_text: Option<String>,
  /// Verbatim payload this event was normalized from.
  pub raw_payload: Value,
}

/// Outcome of normalizing one payload entry.
#[derive(Debug, Clone)]
pub enum NormalizedEvent {
  /// A full incident lifecycle event.
  Incident(IncidentEvent),
  /// Liveness ping; acknowledged without touching storage.
  Ping,
  /// Service-scoped (non-incident) event; acknowledged and discarded.
  ServiceScoped { event_type: String },
}

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// Durable record, one row per external incident id.
///
/// `rca1` / `rca2` / `business_justification` are sticky: once set they are
/// never cleared by an event that does not supply a value. `closed_at` is set
/// at most once. `is_merged` / `merged_into_id` are set by the merge path
/// only and never cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
  pub incident_id: String,
  pub title: Option<String>,
  pub status: Option<IncidentStatus>,
  pub service: Option<String>,
  pub urgency: Option<String>,
  pub priority: Option<String>,
  pub assignee: Option<String>,
  pub assignments: Option<Value>,
  pub incident_type: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub last_change_at: Option<DateTime<Utc>>,
  pub is_mergeable: Option<bool>,
  pub rca1: Option<String>,
  pub rca2: Option<String>,
  pub business_justification: Option<String>,
  pub is_merged: bool,
  pub merged_into_id: Option<String>,
  pub closed_at: Option<DateTime<Utc>>,
  /// Latest event payload, byte-preserved modulo JSON re-serialization.
  pub raw_payload: Value,
  pub inserted_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub inserted_by: String,
  pub updated_by: String,
}

// ---------------------------------------------------------------------------
// Reconciliation outcomes
// ---------------------------------------------------------------------------

/// What a planned upsert did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Inserted,
  Updated,
}

/// A merge-redirect decision. `subsumed_id` is the incident the event's
/// resolve reason references; `primary_id` is the event's own incident.
/// Only the subsumed record is ever written for such an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRedirect {
  pub subsumed_id: String,
  pub primary_id: String,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageDisposition {
  Incident,
  Ping,
  Service,
}

/// Per-entry triage line emitted by the CLI surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct TriageLine {
  pub disposition: TriageDisposition,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub incident_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<IncidentStatus>,
  /// Set when the event consolidates the named incident into this one.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subsumes: Option<String>,
  #[serde(skip_serializing_if = "RcaFields::is_empty")]
  pub rca: RcaFields,
}

/// Structured error output for rejected payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
