//! Binary entrypoint: read JSON payloads from stdin, write JSON lines to stdout.
//!
//! Each input line is one webhook payload in any recognized envelope shape
//! (single event, flat, or batch). Output lines are either:
//! - A TriageLine per normalized entry (incident / ping / service)
//! - An ErrorOutput (when the payload is rejected)

use ingest_engine::types::ErrorOutput;
use ingest_engine::{normalize, reconcile, EngineError};
use std::io::{self, BufRead, Write};

fn main() {
  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        let _ = writeln!(io::stderr(), "ingest-engine: read error: {}", e);
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let payload: serde_json::Value = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        let err = ErrorOutput::new(format!("json parse: {}", e));
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
        continue;
      }
    };

    match normalize::normalize(&payload) {
      Ok(events) => {
        for event in &events {
          let _ = serde_json::to_writer(&mut out, &reconcile::triage(event));
          let _ = writeln!(out);
        }
      }
      Err(e) => {
        let err = match &e {
          EngineError::Validation { field, reason } => {
            ErrorOutput::new(reason.clone()).with_field(field.clone())
          }
          _ => ErrorOutput::new(e.to_string()),
        };
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
      }
    }
  }

  let _ = out.flush();
}
