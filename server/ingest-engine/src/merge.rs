//! Field-level merge policy for incident records.
//!
//! The whole policy lives in this module so it stays one reviewable artifact:
//!
//! | field                                    | policy                                   |
//! |------------------------------------------|------------------------------------------|
//! | title, service, urgency, priority,       | overwrite when the event supplies a      |
//! | assignee, assignments, incident_type,    | value, else keep the stored value        |
//! | created_at, last_change_at, is_mergeable |                                          |
//! | status                                   | same, except pinned to resolved once the |
//! |                                          | record is merged                         |
//! | raw_payload                              | overwrite on every event                 |
//! | rca1, rca2, business_justification       | keep existing unless incoming is non-null|
//! | closed_at                                | set once, never cleared                  |
//! | is_merged, merged_into_id                | set by the merge path only, never cleared|
//! | inserted_at, inserted_by                 | set on insert, never touched again       |
//! | updated_at, updated_by                   | refreshed on every write                 |
//!
//! Structural fields restate current truth, so last write wins. RCA fields
//! are knowledge accumulated piecemeal across annotations and must never
//! regress to null.

use chrono::{DateTime, Utc};

use crate::types::{IncidentEvent, IncidentRecord, IncidentStatus, RcaFields};

/// Build a brand-new record from the first event seen for an incident id.
pub fn insert_record(
  event: &IncidentEvent,
  rca: &RcaFields,
  now: DateTime<Utc>,
  actor: &str,
) -> IncidentRecord {
  let f = &event.fields;
  let closed_at = match f.status {
    Some(IncidentStatus::Resolved) => Some(f.occurred_at.unwrap_or(now)),
    _ => None,
  };
  IncidentRecord {
    incident_id: event.incident_id.clone(),
    title: f.title.clone(),
    status: f.status,
    service: f.service.clone(),
    urgency: f.urgency.clone(),
    priority: f.priority.clone(),
    assignee: f.assignee.clone(),
    assignments: f.assignments.clone(),
    incident_type: f.incident_type.clone(),
    created_at: f.created_at,
    last_change_at: Some(f.occurred_at.unwrap_or(now)),
    is_mergeable: f.is_mergeable,
    rca1: rca.rca1.clone(),
    rca2: rca.rca2.clone(),
    business_justification: rca.business_justification.clone(),
    is_merged: false,
    merged_into_id: None,
    closed_at,
    raw_payload: event.raw_payload.clone(),
    inserted_at: now,
    updated_at: now,
    inserted_by: actor.to_string(),
    updated_by: actor.to_string(),
  }
}

/// Merge an event into an existing record per the policy table above.
pub fn merge_record(
  existing: &IncidentRecord,
  event: &IncidentEvent,
  rca: &RcaFields,
  now: DateTime<Utc>,
  actor: &str,
) -> IncidentRecord {
  let f = &event.fields;

  // Merged is terminal: the record keeps reporting resolved no matter what
  // a later generic event claims.
  let status = if existing.is_merged {
    Some(IncidentStatus::Resolved)
  } else {
    f.status.or(existing.status)
  };

  let closed_at = existing.closed_at.or(match status {
    Some(IncidentStatus::Resolved) => Some(f.occurred_at.unwrap_or(now)),
    _ => None,
  });

  IncidentRecord {
    incident_id: existing.incident_id.clone(),
    title: f.title.clone().or_else(|| existing.title.clone()),
    status,
    service: f.service.clone().or_else(|| existing.service.clone()),
    urgency: f.urgency.clone().or_else(|| existing.urgency.clone()),
    priority: f.priority.clone().or_else(|| existing.priority.clone()),
    assignee: f.assignee.clone().or_else(|| existing.assignee.clone()),
    assignments: f.assignments.clone().or_else(|| existing.assignments.clone()),
    incident_type: f
      .incident_type
      .clone()
      .or_else(|| existing.incident_type.clone()),
    created_at: f.created_at.or(existing.created_at),
    last_change_at: f.occurred_at.or(existing.last_change_at),
    is_mergeable: f.is_mergeable.or(existing.is_mergeable),
    rca1: rca.rca1.clone().or_else(|| existing.rca1.clone()),
    rca2: rca.rca2.clone().or_else(|| existing.rca2.clone()),
    business_justification: rca
      .business_justification
      .clone()
      .or_else(|| existing.business_justification.clone()),
    is_merged: existing.is_merged,
    merged_into_id: existing.merged_into_id.clone(),
    closed_at,
    raw_payload: event.raw_payload.clone(),
    inserted_at: existing.inserted_at,
    updated_at: now,
    inserted_by: existing.inserted_by.clone(),
    updated_by: actor.to_string(),
  }
}

/// Build the subsumed record for an incident consolidated into another.
///
/// Touches only status, the merge link, closed_at and the audit columns;
/// the rest of the record is left exactly as stored. An absent record is
/// inserted already merged (the merge event can arrive before any event for
/// the subsumed incident).
pub fn merged_record(
  existing: Option<&IncidentRecord>,
  subsumed_id: &str,
  primary_id: &str,
  event: &IncidentEvent,
  now: DateTime<Utc>,
  actor: &str,
) -> IncidentRecord {
  let merge_time = event.fields.occurred_at.unwrap_or(now);
  match existing {
    Some(existing) => IncidentRecord {
      status: Some(IncidentStatus::Resolved),
      is_merged: true,
      merged_into_id: Some(primary_id.to_string()),
      closed_at: existing.closed_at.or(Some(merge_time)),
      updated_at: now,
      updated_by: actor.to_string(),
      ..existing.clone()
    },
    None => IncidentRecord {
      incident_id: subsumed_id.to_string(),
      title: None,
      status: Some(IncidentStatus::Resolved),
      service: None,
      urgency: None,
      priority: None,
      assignee: None,
      assignments: None,
      incident_type: None,
      created_at: None,
      last_change_at: Some(merge_time),
      is_mergeable: None,
      rca1: None,
      rca2: None,
      business_justification: None,
      is_merged: true,
      merged_into_id: Some(primary_id.to_string()),
      closed_at: Some(merge_time),
      raw_payload: event.raw_payload.clone(),
      inserted_at: now,
      updated_at: now,
      inserted_by: actor.to_string(),
      updated_by: actor.to_string(),
    },
  }
}
