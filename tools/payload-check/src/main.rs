//! payload-check: offline triage for PagerDuty webhook payloads
//!
//! Usage:
//!   payload-check <file...>          # triage one JSON payload per file
//!   payload-check --lines <file...>  # triage one JSON payload per line
//!   payload-check                    # read a single payload from stdin
//!   payload-check -q <file...>       # quiet: exit code only
//!
//! Prints one JSON line per normalized event (disposition, event type,
//! incident id, merge target, parsed RCA fields). Use on captured payloads
//! to see how each event will land before pointing a webhook at the sync
//! service. Exit codes: 0 all payloads accepted, 1 any rejected, 2 I/O error.

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process;

use ingest_engine::types::ErrorOutput;
use ingest_engine::{normalize, reconcile, EngineError};

fn read_input(path: &str) -> String {
    if path == "-" {
        let mut buf = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buf) {
            eprintln!("payload-check: cannot read stdin: {}", e);
            process::exit(2);
        }
        return buf;
    }
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("payload-check: cannot read {}: {}", path, e);
        process::exit(2);
    })
}

fn emit<T: serde::Serialize>(value: &T) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = serde_json::to_writer(&mut out, value);
    let _ = writeln!(out);
}

/// Triage one payload document. Returns false when the payload is rejected.
fn check_payload(text: &str, quiet: bool) -> bool {
    let payload: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            if !quiet {
                emit(&ErrorOutput::new(format!("json parse: {}", e)));
            }
            return false;
        }
    };
    match normalize::normalize(&payload) {
        Ok(events) => {
            if !quiet {
                for event in &events {
                    emit(&reconcile::triage(event));
                }
            }
            true
        }
        Err(e) => {
            if !quiet {
                let err = match &e {
                    EngineError::Validation { field, reason } => {
                        ErrorOutput::new(reason.clone()).with_field(field.clone())
                    }
                    _ => ErrorOutput::new(e.to_string()),
                };
                emit(&err);
            }
            false
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let quiet = args.iter().any(|a| a == "-q" || a == "--quiet");
    let lines_mode = args.iter().any(|a| a == "--lines");
    let files: Vec<&String> = args
        .iter()
        .skip(1)
        .filter(|a| *a == "-" || !a.starts_with('-'))
        .collect();

    let stdin_only = vec![String::from("-")];
    let inputs: Vec<&String> = if files.is_empty() {
        stdin_only.iter().collect()
    } else {
        files
    };

    let mut all_ok = true;
    for path in inputs {
        let text = read_input(path);
        if lines_mode {
            for line in text.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                all_ok &= check_payload(trimmed, quiet);
            }
        } else {
            all_ok &= check_payload(&text, quiet);
        }
    }

    process::exit(if all_ok { 0 } else { 1 });
}
