//! Reconciliation planning: insert vs update vs merge-redirect.
//!
//! Everything here is a pure function. The caller owns the store lookup and
//! the write; redelivered or reordered events converge because the planned
//! record depends only on (existing record, event), and the merge policy
//! never regresses sticky fields.

use chrono::{DateTime, Utc};

use crate::merge;
use crate::rca;
use crate::types::*;

/// Detect whether this event consolidates another incident into its own.
/// The referenced incident is the subsumed one; the event's own incident is
/// the primary and is never written by the merge path.
pub fn merge_redirect(event: &IncidentEvent) -> Option<MergeRedirect> {
  match &event.resolve_reason {
    Some(ResolveReason::Merged { subsumed_id }) => Some(MergeRedirect {
      subsumed_id: subsumed_id.clone(),
      primary_id: event.incident_id.clone(),
    }),
    _ => None,
  }
}

/// Extract RCA fields for this event. Only resolved and annotation events
/// contribute; structured `body.details` keys take precedence over the text
/// grammars and the two sources are never mixed.
pub fn resolve_rca(event: &IncidentEvent) -> RcaFields {
  match event.kind {
    EventKind::Resolved | EventKind::Annotated => {
      if !event.details_rca.is_empty() {
        return event.details_rca.clone();
      }
      match &event.note_text {
        Some(text) => rca::parse(text),
        None => RcaFields::default(),
      }
    }
    _ => RcaFields::default(),
  }
}

/// Plan the stored record for a non-merge event.
pub fn plan_upsert(
  existing: Option<&IncidentRecord>,
  event: &IncidentEvent,
  now: DateTime<Utc>,
  actor: &str,
) -> (IncidentRecord, Action) {
  let rca = resolve_rca(event);
  match existing {
    None => (merge::insert_record(event, &rca, now, actor), Action::Inserted),
    Some(existing) => (
      merge::merge_record(existing, event, &rca, now, actor),
      Action::Updated,
    ),
  }
}

/// Plan the subsumed record for a merge-redirect.
pub fn plan_merge(
  existing: Option<&IncidentRecord>,
  redirect: &MergeRedirect,
  event: &IncidentEvent,
  now: DateTime<Utc>,
  actor: &str,
) -> IncidentRecord {
  merge::merged_record(
    existing,
    &redirect.subsumed_id,
    &redirect.primary_id,
    event,
    now,
    actor,
  )
}

/// Summarize what the reconciler would do with a normalized entry, without
/// touching any store. Used by the CLI surfaces.
pub fn triage(normalized: &NormalizedEvent) -> TriageLine {
  match normalized {
    NormalizedEvent::Ping => TriageLine {
      disposition: TriageDisposition::Ping,
      event_type: None,
      incident_id: None,
      status: None,
      subsumes: None,
      rca: RcaFields::default(),
    },
    NormalizedEvent::ServiceScoped { event_type } => TriageLine {
      disposition: TriageDisposition::Service,
      event_type: Some(event_type.clone()),
      incident_id: None,
      status: None,
      subsumes: None,
      rca: RcaFields::default(),
    },
    NormalizedEvent::Incident(event) => TriageLine {
      disposition: TriageDisposition::Incident,
      event_type: Some(event.event_type.clone()),
      incident_id: Some(event.incident_id.clone()),
      status: event.fields.status,
      subsumes: merge_redirect(event).map(|r| r.subsumed_id),
      rca: resolve_rca(event),
    },
  }
}
