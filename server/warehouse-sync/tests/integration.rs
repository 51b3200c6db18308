//! Integration tests for the warehouse sync ingest path.
//!
//! Payloads are applied through `ingest::apply_payload` against the
//! in-memory store, which mirrors the Postgres conflict arms.

use chrono::{TimeZone, Utc};
use ingest_engine::types::IncidentStatus;
use serde_json::Value;
use warehouse_sync::error::IngestError;
use warehouse_sync::ingest::{self, AppliedAction};
use warehouse_sync::store::MemStore;

const ACTOR: &str = "warehouse-sync";

fn fixture_triggered() -> Value {
  serde_json::from_str(
    r#"{
      "event": {
        "event_type": "incident.triggered",
        "occurred_at": "2025-03-01T12:00:00Z",
        "data": {
          "id": "I1",
          "title": "Checkout latency above SLO",
          "status": "triggered",
          "urgency": "high",
          "service": {"summary": "checkout-api"},
          "priority": {"summary": "P1"},
          "assignments": [{"assignee": {"summary": "Dana Ortiz"}}],
          "created_at": "2025-03-01T11:59:40Z"
        }
      }
    }"#,
  )
  .unwrap()
}

fn fixture_resolved() -> Value {
  serde_json::from_str(
    r#"{
      "event": {
        "event_type": "incident.resolved",
        "occurred_at": "2025-03-01T12:30:00Z",
        "data": {
          "id": "I1",
          "status": "resolved",
          "resolve_reason": "rca1: connection pool exhausted rca2: pool size raised business_justification: checkout revenue"
        }
      }
    }"#,
  )
  .unwrap()
}

fn fixture_escalated() -> Value {
  serde_json::from_str(
    r#"{
      "event": {
        "event_type": "incident.escalated",
        "occurred_at": "2025-03-01T12:45:00Z",
        "data": {
          "id": "I1",
          "assignments": [{"assignee": {"summary": "Raj Patel"}}]
        }
      }
    }"#,
  )
  .unwrap()
}

fn fixture_merge() -> Value {
  serde_json::from_str(
    r#"{
      "event": {
        "event_type": "incident.resolved",
        "occurred_at": "2025-03-01T13:00:00Z",
        "data": {
          "id": "I2",
          "title": "Duplicate checkout page alert",
          "status": "resolved",
          "resolve_reason": {
            "type": "merge_resolve_reason",
            "incident": {"id": "I1"}
          }
        }
      }
    }"#,
  )
  .unwrap()
}

#[tokio::test]
async fn triggered_payload_creates_a_record() {
  let store = MemStore::new();
  let applied = ingest::apply_payload(&store, ACTOR, &fixture_triggered())
    .await
    .unwrap();

  assert_eq!(applied.len(), 1);
  assert_eq!(applied[0].action, AppliedAction::Inserted);
  assert_eq!(applied[0].incident_id.as_deref(), Some("I1"));

  let record = store.get("I1").unwrap();
  assert_eq!(record.title.as_deref(), Some("Checkout latency above SLO"));
  assert_eq!(record.service.as_deref(), Some("checkout-api"));
  assert_eq!(record.assignee.as_deref(), Some("Dana Ortiz"));
  assert_eq!(record.urgency.as_deref(), Some("high"));
  assert!(record.closed_at.is_none());
  assert_eq!(record.inserted_by, ACTOR);
}

#[tokio::test]
async fn resolved_payload_sets_rca_and_closes() {
  let store = MemStore::new();
  ingest::apply_payload(&store, ACTOR, &fixture_triggered())
    .await
    .unwrap();
  let applied = ingest::apply_payload(&store, ACTOR, &fixture_resolved())
    .await
    .unwrap();
  assert_eq!(applied[0].action, AppliedAction::Updated);

  let record = store.get("I1").unwrap();
  assert_eq!(record.rca1.as_deref(), Some("connection pool exhausted"));
  assert_eq!(record.rca2.as_deref(), Some("pool size raised"));
  assert_eq!(
    record.business_justification.as_deref(),
    Some("checkout revenue")
  );
  // Close time comes from the envelope, not from receipt time.
  assert_eq!(
    record.closed_at,
    Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap())
  );
}

#[tokio::test]
async fn later_event_keeps_resolution_fields() {
  let store = MemStore::new();
  ingest::apply_payload(&store, ACTOR, &fixture_triggered())
    .await
    .unwrap();
  ingest::apply_payload(&store, ACTOR, &fixture_resolved())
    .await
    .unwrap();
  ingest::apply_payload(&store, ACTOR, &fixture_escalated())
    .await
    .unwrap();

  let record = store.get("I1").unwrap();
  assert_eq!(record.assignee.as_deref(), Some("Raj Patel"));
  assert_eq!(record.rca1.as_deref(), Some("connection pool exhausted"));
  assert_eq!(
    record.closed_at,
    Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap())
  );
}

#[tokio::test]
async fn merge_targets_the_referenced_incident() {
  let store = MemStore::new();
  ingest::apply_payload(&store, ACTOR, &fixture_triggered())
    .await
    .unwrap();
  let applied = ingest::apply_payload(&store, ACTOR, &fixture_merge())
    .await
    .unwrap();

  assert_eq!(applied[0].action, AppliedAction::Merged);
  assert_eq!(applied[0].incident_id.as_deref(), Some("I1"));
  assert_eq!(applied[0].merged_into.as_deref(), Some("I2"));

  // I1 is the subsumed side; the event's own incident gets no row.
  let record = store.get("I1").unwrap();
  assert!(record.is_merged);
  assert_eq!(record.merged_into_id.as_deref(), Some("I2"));
  assert_eq!(record.status, Some(IncidentStatus::Resolved));
  assert_eq!(
    record.closed_at,
    Some(Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap())
  );
  // The stored snapshot still describes I1, not the merge event.
  assert_eq!(record.title.as_deref(), Some("Checkout latency above SLO"));
  assert_eq!(record.raw_payload, fixture_triggered());
  assert!(store.get("I2").is_none());
}

#[tokio::test]
async fn merge_creates_a_born_merged_record() {
  let store = MemStore::new();
  let applied = ingest::apply_payload(&store, ACTOR, &fixture_merge())
    .await
    .unwrap();
  assert_eq!(applied[0].action, AppliedAction::Merged);

  let record = store.get("I1").unwrap();
  assert!(record.is_merged);
  assert_eq!(record.merged_into_id.as_deref(), Some("I2"));
  assert!(record.title.is_none(), "merge event fields describe I2");
  assert_eq!(record.raw_payload, fixture_merge());
  assert!(store.get("I2").is_none());
}

#[tokio::test]
async fn replaying_a_payload_is_idempotent() {
  let store = MemStore::new();
  ingest::apply_payload(&store, ACTOR, &fixture_triggered())
    .await
    .unwrap();
  ingest::apply_payload(&store, ACTOR, &fixture_resolved())
    .await
    .unwrap();
  let first = store.get("I1").unwrap();

  ingest::apply_payload(&store, ACTOR, &fixture_resolved())
    .await
    .unwrap();
  let mut second = store.get("I1").unwrap();

  // Only the write audit time may move on a replay.
  second.updated_at = first.updated_at;
  assert_eq!(second, first);
}

#[tokio::test]
async fn batch_applies_every_entry_in_order() {
  let store = MemStore::new();
  let payload: Value = serde_json::from_str(
    r#"{
      "messages": [
        {"event": {"event_type": "incident.triggered", "data": {"id": "B1", "title": "first in batch", "status": "triggered"}}},
        {"event": {"event_type": "incident.acknowledged", "data": {"id": "B2", "title": "second in batch", "status": "acknowledged"}}}
      ]
    }"#,
  )
  .unwrap();

  let applied = ingest::apply_payload(&store, ACTOR, &payload).await.unwrap();
  assert_eq!(applied.len(), 2);
  assert!(applied.iter().all(|a| a.action == AppliedAction::Inserted));
  assert_eq!(store.len(), 2);
  let second = store.get("B2").unwrap();
  assert_eq!(second.status, Some(IncidentStatus::Acknowledged));
}

#[tokio::test]
async fn ping_acknowledges_without_writing() {
  let store = MemStore::new();
  let payload: Value =
    serde_json::from_str(r#"{"event": {"event_type": "pagey.ping", "data": {}}}"#).unwrap();

  let applied = ingest::apply_payload(&store, ACTOR, &payload).await.unwrap();
  assert_eq!(applied.len(), 1);
  assert_eq!(applied[0].action, AppliedAction::Ping);
  assert!(store.is_empty());
}

#[tokio::test]
async fn service_events_are_discarded_without_writing() {
  let store = MemStore::new();
  let payload: Value = serde_json::from_str(
    r#"{"event": {"event_type": "service.updated", "data": {"id": "SVC1"}}}"#,
  )
  .unwrap();

  let applied = ingest::apply_payload(&store, ACTOR, &payload).await.unwrap();
  assert_eq!(applied[0].action, AppliedAction::Discarded);
  assert_eq!(applied[0].event_type.as_deref(), Some("service.updated"));
  assert!(store.is_empty());
}

#[tokio::test]
async fn malformed_batch_entry_writes_nothing() {
  let store = MemStore::new();
  let payload: Value = serde_json::from_str(
    r#"{
      "messages": [
        {"event": {"event_type": "incident.triggered", "data": {"id": "B1", "title": "good entry"}}},
        {"event": {"event_type": "incident.triggered", "data": {"title": "no id"}}}
      ]
    }"#,
  )
  .unwrap();

  let err = ingest::apply_payload(&store, ACTOR, &payload).await.unwrap_err();
  assert!(matches!(err, IngestError::Invalid(_)));
  assert!(err.to_string().contains("messages[1]"));
  // The good first entry must not have landed either.
  assert!(store.is_empty());
}
