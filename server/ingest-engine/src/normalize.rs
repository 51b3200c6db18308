//! Normalize raw webhook payloads into canonical incident events.
//!
//! Recognized envelope shapes, tried in order per entry:
//!   1. v3 single-event: `{"event": {"event_type", "data", ...}}`, where
//!      annotation events wrap the incident as `{"incident": {...}, "content"}`.
//!   2. flat: top-level `event_type` (or a string-valued `event`, the v2
//!      message spelling) plus a top-level `incident` object.
//!   3. batch: `{"messages": [...]}`, each entry normalized independently via
//!      shapes 1 and 2, in receipt order.
//!
//! Liveness pings and service-scoped event types are classified before an
//! incident id is required. A payload with no resolvable incident id, or no
//! matching shape, is a validation failure; unknown event types are not.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::EngineError;
use crate::types::*;

/// Normalize one payload into its entries. A batch yields one entry per
/// message; any malformed entry fails the whole payload before the caller
/// writes anything.
pub fn normalize(payload: &Value) -> Result<Vec<NormalizedEvent>, EngineError> {
  if is_entry_shape(payload) {
    return Ok(vec![normalize_entry(payload)?]);
  }

  if let Some(messages) = payload.get("messages").and_then(Value::as_array) {
    let mut events = Vec::with_capacity(messages.len());
    for (i, entry) in messages.iter().enumerate() {
      let event =
        normalize_entry(entry).map_err(|e| e.in_context(&format!("messages[{}]", i)))?;
      events.push(event);
    }
    return Ok(events);
  }

  Err(EngineError::validation("payload", "unrecognized envelope shape"))
}

fn is_entry_shape(payload: &Value) -> bool {
  payload.get("event").is_some() || payload.get("event_type").is_some()
}

/// Normalize a single entry (shapes 1 and 2).
fn normalize_entry(entry: &Value) -> Result<NormalizedEvent, EngineError> {
  if !entry.is_object() {
    return Err(EngineError::validation("payload", "expected a JSON object"));
  }

  // Shape 1: v3 envelope with an event object.
  if let Some(event) = entry.get("event").filter(|v| v.is_object()) {
    let event_type = event
      .get("event_type")
      .and_then(Value::as_str)
      .ok_or_else(|| EngineError::validation("event.event_type", "missing or not a string"))?;
    if let Some(special) = classify_special(event_type) {
      return Ok(special);
    }
    let data = event
      .get("data")
      .filter(|v| v.is_object())
      .ok_or_else(|| EngineError::validation("event.data", "missing event data"))?;
    // Annotation events wrap the incident next to the note content.
    let (incident, content) = match data.get("incident").filter(|v| v.is_object()) {
      Some(incident) => (incident, data.get("content").and_then(Value::as_str)),
      None => (data, None),
    };
    let occurred_at = event
      .get("occurred_at")
      .and_then(Value::as_str)
      .and_then(parse_ts);
    return build_incident(entry, event_type, incident, content, occurred_at);
  }

  // Shape 2: flat envelope; v2 messages spell the type as a string `event`.
  let flat_type = entry
    .get("event_type")
    .and_then(Value::as_str)
    .or_else(|| entry.get("event").and_then(Value::as_str));
  if let Some(event_type) = flat_type {
    if let Some(special) = classify_special(event_type) {
      return Ok(special);
    }
    let incident = entry
      .get("incident")
      .filter(|v| v.is_object())
      .ok_or_else(|| EngineError::validation("incident", "missing incident object"))?;
    let content = entry.get("content").and_then(Value::as_str);
    let occurred_at = entry
      .get("occurred_at")
      .and_then(Value::as_str)
      .and_then(parse_ts);
    return build_incident(entry, event_type, incident, content, occurred_at);
  }

  Err(EngineError::validation("payload", "unrecognized envelope shape"))
}

/// Liveness pings and service-scoped events short-circuit before any
/// incident id lookup.
fn classify_special(event_type: &str) -> Option<NormalizedEvent> {
  if event_type == "pagey.ping" || event_type == "ping" {
    return Some(NormalizedEvent::Ping);
  }
  if event_type.starts_with("service.") {
    return Some(NormalizedEvent::ServiceScoped {
      event_type: event_type.to_string(),
    });
  }
  None
}

fn build_incident(
  raw: &Value,
  event_type: &str,
  incident: &Value,
  content: Option<&str>,
  occurred_at: Option<DateTime<Utc>>,
) -> Result<NormalizedEvent, EngineError> {
  let incident_id = incident
    .get("id")
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| EngineError::validation("incident.id", "missing incident identifier"))?;

  let kind = EventKind::from_event_type(event_type);

  let fields = IncidentFields {
    title: str_field(incident, "title"),
    status: incident
      .get("status")
      .and_then(Value::as_str)
      .and_then(IncidentStatus::from_str_loose),
    service: nested_summary(incident, "service"),
    urgency: str_field(incident, "urgency"),
    priority: nested_summary(incident, "priority"),
    assignee: first_assignee(incident),
    assignments: incident.get("assignments").filter(|v| v.is_array()).cloned(),
    incident_type: incident
      .get("incident_type")
      .and_then(|v| v.get("name"))
      .and_then(Value::as_str)
      .map(str::to_string),
    created_at: incident
      .get("created_at")
      .and_then(Value::as_str)
      .and_then(parse_ts),
    occurred_at,
    is_mergeable: incident.get("is_mergeable").and_then(Value::as_bool),
  };

  let resolve_reason = parse_resolve_reason(incident.get("resolve_reason"));
  let details_rca = details_rca(incident);
  let note_text = select_note_text(kind, content, &resolve_reason, incident);

  Ok(NormalizedEvent::Incident(IncidentEvent {
    event_type: event_type.to_string(),
    kind,
    incident_id: incident_id.to_string(),
    fields,
    resolve_reason,
    details_rca,
    note_text,
    raw_payload: raw.clone(),
  }))
}

/// The resolve reason arrives either as a bare note string or as an object;
/// a `merge_resolve_reason` object names the incident consolidated into this
/// one. A merge object without an incident id degrades to its note, if any.
fn parse_resolve_reason(value: Option<&Value>) -> Option<ResolveReason> {
  let value = value?;
  if let Some(s) = value.as_str() {
    if s.is_empty() {
      return None;
    }
    return Some(ResolveReason::Note(s.to_string()));
  }
  let obj = value.as_object()?;
  if obj.get("type").and_then(Value::as_str) == Some("merge_resolve_reason") {
    if let Some(subsumed) = obj
      .get("incident")
      .and_then(|i| i.get("id"))
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
    {
      return Some(ResolveReason::Merged {
        subsumed_id: subsumed.to_string(),
      });
    }
  }
  obj
    .get("note")
    .or_else(|| obj.get("content"))
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .map(|s| ResolveReason::Note(s.to_string()))
}

/// Structured rca keys carried inside `body.details`.
fn details_rca(incident: &Value) -> RcaFields {
  let details = match incident.get("body").and_then(|b| b.get("details")) {
    Some(d) if d.is_object() => d,
    _ => return RcaFields::default(),
  };
  let lift = |keys: &[&str]| {
    keys
      .iter()
      .find_map(|k| details.get(*k).and_then(Value::as_str))
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
  };
  RcaFields {
    rca1: lift(&["rca_1", "rca1"]),
    rca2: lift(&["rca_2", "rca2"]),
    business_justification: lift(&["business_justification", "business"]),
  }
}

/// Pick the note text the RCA parser will see. Resolved events read their
/// resolve-reason note, annotation events their content; when the canonical
/// field is missing, fall back to a concatenation of free-text candidates
/// found in the incident. Other kinds carry no note.
fn select_note_text(
  kind: EventKind,
  content: Option<&str>,
  resolve_reason: &Option<ResolveReason>,
  incident: &Value,
) -> Option<String> {
  match kind {
    EventKind::Resolved => match resolve_reason {
      Some(ResolveReason::Note(note)) => Some(note.clone()),
      _ => fallback_note_text(incident),
    },
    EventKind::Annotated => content
      .map(str::to_string)
      .or_else(|| fallback_note_text(incident)),
    _ => None,
  }
}

fn fallback_note_text(incident: &Value) -> Option<String> {
  let mut parts: Vec<&str> = Vec::new();
  push_text(incident.get("description"), &mut parts);
  push_text(incident.get("body"), &mut parts);
  push_text(incident.get("body").and_then(|b| b.get("details")), &mut parts);
  push_text(
    incident.get("status_update").and_then(|u| u.get("message")),
    &mut parts,
  );
  if let Some(requests) = incident.get("responder_requests").and_then(Value::as_array) {
    for request in requests {
      push_text(request.get("message"), &mut parts);
    }
  }
  if parts.is_empty() {
    None
  } else {
    Some(parts.join("\n"))
  }
}

fn push_text<'a>(value: Option<&'a Value>, parts: &mut Vec<&'a str>) {
  if let Some(s) = value.and_then(Value::as_str) {
    if !s.trim().is_empty() {
      parts.push(s);
    }
  }
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
  obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn nested_summary(obj: &Value, key: &str) -> Option<String> {
  obj
    .get(key)
    .and_then(|v| v.get("summary"))
    .and_then(Value::as_str)
    .map(str::to_string)
}

fn first_assignee(incident: &Value) -> Option<String> {
  incident
    .get("assignments")
    .and_then(Value::as_array)
    .and_then(|a| a.first())
    .and_then(|a| a.get("assignee"))
    .and_then(|a| a.get("summary"))
    .and_then(Value::as_str)
    .map(str::to_string)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}
