//! Incident store: trait plus Postgres and in-memory implementations.
//!
//! The write path is a single conditional upsert on `incident_id`. Its
//! conflict arms restate the sticky parts of the merge policy in SQL, so two
//! deliveries for one id that interleave between read and write still cannot
//! regress RCA fields, clear the merge link, move `closed_at`, or reopen a
//! merged record.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ingest_engine::types::{IncidentRecord, IncidentStatus};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database: {0}")]
  Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
  /// Fetch the stored record for an incident id, if any.
  async fn fetch(&self, incident_id: &str) -> Result<Option<IncidentRecord>, StoreError>;

  /// Write a record in one atomic statement (insert, or conflict-update on
  /// incident_id). Nothing partial is ever visible.
  async fn upsert(&self, record: &IncidentRecord) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pagerduty_incidents (
  incident_id TEXT PRIMARY KEY,
  title TEXT,
  status TEXT,
  service TEXT,
  urgency TEXT,
  priority TEXT,
  assignee TEXT,
  assignments JSONB,
  incident_type TEXT,
  created_at TIMESTAMPTZ,
  last_change_at TIMESTAMPTZ,
  is_mergeable BOOLEAN,
  rca_1 TEXT,
  rca_2 TEXT,
  business_justification TEXT,
  is_merged BOOLEAN NOT NULL DEFAULT FALSE,
  merged_into_id TEXT,
  closed_at TIMESTAMPTZ,
  raw_payload JSONB NOT NULL,
  inserted_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL,
  inserted_by TEXT NOT NULL,
  updated_by TEXT NOT NULL
)
"#;

pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    let pool = PgPool::connect(database_url).await?;
    Ok(Self { pool })
  }

  /// Create the incidents table if it does not exist yet.
  pub async fn ensure_schema(&self) -> Result<(), StoreError> {
    sqlx::query(SCHEMA).execute(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl IncidentStore for PgStore {
  async fn fetch(&self, incident_id: &str) -> Result<Option<IncidentRecord>, StoreError> {
    let row = sqlx::query(
      r#"
      SELECT incident_id, title, status, service, urgency, priority, assignee,
             assignments, incident_type, created_at, last_change_at, is_mergeable,
             rca_1, rca_2, business_justification, is_merged, merged_into_id,
             closed_at, raw_payload, inserted_at, updated_at, inserted_by, updated_by
      FROM pagerduty_incidents
      WHERE incident_id = $1
      "#,
    )
    .bind(incident_id)
    .fetch_optional(&self.pool)
    .await?;

    match row {
      Some(row) => Ok(Some(row_to_record(&row)?)),
      None => Ok(None),
    }
  }

  async fn upsert(&self, record: &IncidentRecord) -> Result<(), StoreError> {
    sqlx::query(
      r#"
      INSERT INTO pagerduty_incidents
        (incident_id, title, status, service, urgency, priority, assignee,
         assignments, incident_type, created_at, last_change_at, is_mergeable,
         rca_1, rca_2, business_justification, is_merged, merged_into_id,
         closed_at, raw_payload, inserted_at, updated_at, inserted_by, updated_by)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
              $16, $17, $18, $19, $20, $21, $22, $23)
      ON CONFLICT (incident_id) DO UPDATE SET
        title = EXCLUDED.title,
        status = CASE WHEN pagerduty_incidents.is_merged
                      THEN pagerduty_incidents.status
                      ELSE EXCLUDED.status END,
        service = EXCLUDED.service,
        urgency = EXCLUDED.urgency,
        priority = EXCLUDED.priority,
        assignee = EXCLUDED.assignee,
        assignments = EXCLUDED.assignments,
        incident_type = EXCLUDED.incident_type,
        created_at = EXCLUDED.created_at,
        last_change_at = EXCLUDED.last_change_at,
        is_mergeable = EXCLUDED.is_mergeable,
        rca_1 = COALESCE(EXCLUDED.rca_1, pagerduty_incidents.rca_1),
        rca_2 = COALESCE(EXCLUDED.rca_2, pagerduty_incidents.rca_2),
        business_justification = COALESCE(EXCLUDED.business_justification, pagerduty_incidents.business_justification),
        is_merged = pagerduty_incidents.is_merged OR EXCLUDED.is_merged,
        merged_into_id = COALESCE(pagerduty_incidents.merged_into_id, EXCLUDED.merged_into_id),
        closed_at = COALESCE(pagerduty_incidents.closed_at, EXCLUDED.closed_at),
        raw_payload = EXCLUDED.raw_payload,
        updated_at = EXCLUDED.updated_at,
        updated_by = EXCLUDED.updated_by
      "#,
    )
    .bind(&record.incident_id)
    .bind(&record.title)
    .bind(record.status.map(IncidentStatus::as_str))
    .bind(&record.service)
    .bind(&record.urgency)
    .bind(&record.priority)
    .bind(&record.assignee)
    .bind(&record.assignments)
    .bind(&record.incident_type)
    .bind(record.created_at)
    .bind(record.last_change_at)
    .bind(record.is_mergeable)
    .bind(&record.rca1)
    .bind(&record.rca2)
    .bind(&record.business_justification)
    .bind(record.is_merged)
    .bind(&record.merged_into_id)
    .bind(record.closed_at)
    .bind(&record.raw_payload)
    .bind(record.inserted_at)
    .bind(record.updated_at)
    .bind(&record.inserted_by)
    .bind(&record.updated_by)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

fn row_to_record(row: &PgRow) -> Result<IncidentRecord, sqlx::Error> {
  let status: Option<String> = row.try_get("status")?;
  Ok(IncidentRecord {
    incident_id: row.try_get("incident_id")?,
    title: row.try_get("title")?,
    status: status.as_deref().and_then(IncidentStatus::from_str_loose),
    service: row.try_get("service")?,
    urgency: row.try_get("urgency")?,
    priority: row.try_get("priority")?,
    assignee: row.try_get("assignee")?,
    assignments: row.try_get("assignments")?,
    incident_type: row.try_get("incident_type")?,
    created_at: row.try_get("created_at")?,
    last_change_at: row.try_get("last_change_at")?,
    is_mergeable: row.try_get("is_mergeable")?,
    rca1: row.try_get("rca_1")?,
    rca2: row.try_get("rca_2")?,
    business_justification: row.try_get("business_justification")?,
    is_merged: row.try_get("is_merged")?,
    merged_into_id: row.try_get("merged_into_id")?,
    closed_at: row.try_get("closed_at")?,
    raw_payload: row.try_get("raw_payload")?,
    inserted_at: row.try_get("inserted_at")?,
    updated_at: row.try_get("updated_at")?,
    inserted_by: row.try_get("inserted_by")?,
    updated_by: row.try_get("updated_by")?,
  })
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and offline runs. Mirrors the SQL conflict
/// arms so the sticky columns behave identically to Postgres.
#[derive(Default)]
pub struct MemStore {
  records: Mutex<HashMap<String, IncidentRecord>>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot a stored record.
  pub fn get(&self, incident_id: &str) -> Option<IncidentRecord> {
    self.records.lock().unwrap().get(incident_id).cloned()
  }

  pub fn len(&self) -> usize {
    self.records.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.lock().unwrap().is_empty()
  }
}

#[async_trait]
impl IncidentStore for MemStore {
  async fn fetch(&self, incident_id: &str) -> Result<Option<IncidentRecord>, StoreError> {
    Ok(self.records.lock().unwrap().get(incident_id).cloned())
  }

  async fn upsert(&self, record: &IncidentRecord) -> Result<(), StoreError> {
    let mut records = self.records.lock().unwrap();
    let next = match records.get(&record.incident_id) {
      Some(prev) => conflict_update(prev, record),
      None => record.clone(),
    };
    records.insert(record.incident_id.clone(), next);
    Ok(())
  }
}

/// The conflict arms of the SQL upsert, in Rust: sticky columns stay
/// monotonic even when the caller did not re-read before writing.
fn conflict_update(prev: &IncidentRecord, incoming: &IncidentRecord) -> IncidentRecord {
  IncidentRecord {
    status: if prev.is_merged { prev.status } else { incoming.status },
    rca1: incoming.rca1.clone().or_else(|| prev.rca1.clone()),
    rca2: incoming.rca2.clone().or_else(|| prev.rca2.clone()),
    business_justification: incoming
      .business_justification
      .clone()
      .or_else(|| prev.business_justification.clone()),
    is_merged: prev.is_merged || incoming.is_merged,
    merged_into_id: prev
      .merged_into_id
      .clone()
      .or_else(|| incoming.merged_into_id.clone()),
    closed_at: prev.closed_at.or(incoming.closed_at),
    inserted_at: prev.inserted_at,
    inserted_by: prev.inserted_by.clone(),
    ..incoming.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  fn make_record(id: &str) -> IncidentRecord {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    IncidentRecord {
      incident_id: id.into(),
      title: Some("DB down".into()),
      status: Some(IncidentStatus::Triggered),
      service: None,
      urgency: None,
      priority: None,
      assignee: None,
      assignments: None,
      incident_type: None,
      created_at: None,
      last_change_at: Some(now),
      is_mergeable: None,
      rca1: None,
      rca2: None,
      business_justification: None,
      is_merged: false,
      merged_into_id: None,
      closed_at: None,
      raw_payload: json!({}),
      inserted_at: now,
      updated_at: now,
      inserted_by: "test".into(),
      updated_by: "test".into(),
    }
  }

  #[tokio::test]
  async fn mem_store_round_trips() {
    let store = MemStore::new();
    assert!(store.fetch("I1").await.unwrap().is_none());
    store.upsert(&make_record("I1")).await.unwrap();
    let fetched = store.fetch("I1").await.unwrap().unwrap();
    assert_eq!(fetched.title.as_deref(), Some("DB down"));
  }

  #[tokio::test]
  async fn conflict_arms_keep_sticky_columns() {
    let store = MemStore::new();
    let mut first = make_record("I1");
    first.rca1 = Some("disk full".into());
    first.closed_at = Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap());
    store.upsert(&first).await.unwrap();

    // A stale write with nulls must not regress what is already stored.
    let stale = make_record("I1");
    store.upsert(&stale).await.unwrap();

    let fetched = store.get("I1").unwrap();
    assert_eq!(fetched.rca1.as_deref(), Some("disk full"));
    assert_eq!(fetched.closed_at, first.closed_at);
  }

  #[tokio::test]
  async fn conflict_arms_never_unmerge() {
    let store = MemStore::new();
    let mut merged = make_record("I1");
    merged.status = Some(IncidentStatus::Resolved);
    merged.is_merged = true;
    merged.merged_into_id = Some("I2".into());
    store.upsert(&merged).await.unwrap();

    store.upsert(&make_record("I1")).await.unwrap();

    let fetched = store.get("I1").unwrap();
    assert!(fetched.is_merged);
    assert_eq!(fetched.merged_into_id.as_deref(), Some("I2"));
    assert_eq!(fetched.status, Some(IncidentStatus::Resolved));
  }
}
