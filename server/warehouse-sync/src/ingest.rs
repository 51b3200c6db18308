//! Payload application: normalize a webhook body, then fold each event into
//! the store through the reconciliation planner.

use chrono::Utc;
use ingest_engine::reconcile;
use ingest_engine::types::{Action, MergeRedirect, NormalizedEvent};
use ingest_engine::IncidentEvent;
use serde::Serialize;
use serde_json::Value;

use crate::error::IngestError;
use crate::store::IncidentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedAction {
  Inserted,
  Updated,
  Merged,
  Ping,
  Discarded,
}

/// One line of the acknowledgement body: what happened to each event.
#[derive(Debug, Serialize)]
pub struct Applied {
  pub action: AppliedAction,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub incident_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub merged_into: Option<String>,
}

impl Applied {
  fn ping() -> Self {
    Self {
      action: AppliedAction::Ping,
      incident_id: None,
      event_type: None,
      merged_into: None,
    }
  }

  fn discarded(event_type: &str) -> Self {
    Self {
      action: AppliedAction::Discarded,
      incident_id: None,
      event_type: Some(event_type.to_string()),
      merged_into: None,
    }
  }

  fn incident(event: &IncidentEvent, action: Action) -> Self {
    Self {
      action: match action {
        Action::Inserted => AppliedAction::Inserted,
        Action::Updated => AppliedAction::Updated,
      },
      incident_id: Some(event.incident_id.clone()),
      event_type: Some(event.event_type.clone()),
      merged_into: None,
    }
  }

  fn merged(redirect: &MergeRedirect) -> Self {
    Self {
      action: AppliedAction::Merged,
      incident_id: Some(redirect.subsumed_id.clone()),
      event_type: None,
      merged_into: Some(redirect.primary_id.clone()),
    }
  }
}

/// Normalize and apply one webhook payload. Normalization runs over the
/// whole body first, so one malformed batch entry rejects the payload
/// before any write lands.
pub async fn apply_payload(
  store: &dyn IncidentStore,
  actor: &str,
  payload: &Value,
) -> Result<Vec<Applied>, IngestError> {
  let events = ingest_engine::normalize::normalize(payload)?;

  let mut applied = Vec::with_capacity(events.len());
  for event in &events {
    applied.push(apply_event(store, actor, event).await?);
  }
  Ok(applied)
}

async fn apply_event(
  store: &dyn IncidentStore,
  actor: &str,
  event: &NormalizedEvent,
) -> Result<Applied, IngestError> {
  let event = match event {
    NormalizedEvent::Ping => return Ok(Applied::ping()),
    NormalizedEvent::ServiceScoped { event_type } => {
      tracing::debug!(event_type = %event_type, "service-scoped event discarded");
      return Ok(Applied::discarded(event_type));
    }
    NormalizedEvent::Incident(event) => event,
  };
  let now = Utc::now();

  if let Some(redirect) = reconcile::merge_redirect(event) {
    let existing = store.fetch(&redirect.subsumed_id).await?;
    let record = reconcile::plan_merge(existing.as_ref(), &redirect, event, now, actor);
    store.upsert(&record).await?;
    tracing::info!(
      subsumed = %redirect.subsumed_id,
      primary = %redirect.primary_id,
      "incident merged"
    );
    return Ok(Applied::merged(&redirect));
  }

  let existing = store.fetch(&event.incident_id).await?;
  let (record, action) = reconcile::plan_upsert(existing.as_ref(), event, now, actor);
  store.upsert(&record).await?;
  tracing::info!(
    incident_id = %event.incident_id,
    event_type = %event.event_type,
    ?action,
    "event applied"
  );
  Ok(Applied::incident(event, action))
}
