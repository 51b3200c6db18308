//! Resolution-note parsing: extract structured RCA fields from free text.
//!
//! Grammars are tried in a fixed order (colon form, then equals form). The
//! first grammar that yields at least one field wins outright; fields from
//! different grammars are never mixed. No match at all is not an error, it
//! just means "no structured RCA present".

use regex::Regex;
use std::sync::OnceLock;

use crate::types::RcaFields;

/// Colon assignments: `rca1: disk full`.
fn colon_re() -> &'static Regex {
  static COLON_RE: OnceLock<Regex> = OnceLock::new();
  COLON_RE.get_or_init(|| {
    Regex::new(r"(?i)\b(rca_?1|rca_?2|business_justification|business)\s*:\s*")
      .expect("valid colon label regex")
  })
}

/// Equals assignments: `rca1 = disk full`.
fn equals_re() -> &'static Regex {
  static EQUALS_RE: OnceLock<Regex> = OnceLock::new();
  EQUALS_RE.get_or_init(|| {
    Regex::new(r"(?i)\b(rca_?1|rca_?2|business_justification|business)\s*=\s*")
      .expect("valid equals label regex")
  })
}

/// Any recognized label in either spelling; terminates a value capture.
fn boundary_re() -> &'static Regex {
  static BOUNDARY_RE: OnceLock<Regex> = OnceLock::new();
  BOUNDARY_RE.get_or_init(|| {
    Regex::new(r"(?i)\b(rca_?1|rca_?2|business_justification|business)\s*[:=]\s*")
      .expect("valid boundary label regex")
  })
}

/// Parse free-form note text into RCA fields.
pub fn parse(text: &str) -> RcaFields {
  for grammar in [colon_re(), equals_re()] {
    let fields = extract(text, grammar);
    if !fields.is_empty() {
      return fields;
    }
  }
  RcaFields::default()
}

/// Run one grammar over the text. Values capture up to the next recognized
/// label (either spelling) or end of string, across line breaks. When the
/// same label appears twice, the first match wins.
fn extract(text: &str, labels: &Regex) -> RcaFields {
  let mut fields = RcaFields::default();
  for caps in labels.captures_iter(text) {
    let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
      continue;
    };
    let value_start = whole.end();
    let value_end = boundary_re()
      .find_at(text, value_start)
      .map(|b| b.start())
      .unwrap_or(text.len());
    let value = text[value_start..value_end].trim();
    if value.is_empty() {
      continue;
    }
    let slot = match label.as_str().to_ascii_lowercase().as_str() {
      "rca1" | "rca_1" => &mut fields.rca1,
      "rca2" | "rca_2" => &mut fields.rca2,
      "business_justification" | "business" => &mut fields.business_justification,
      _ => continue,
    };
    if slot.is_none() {
      *slot = Some(value.to_string());
    }
  }
  fields
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn colon_form_extracts_all_three() {
    let fields = parse("rca1: disk full\nrca2: no alert\nbusiness_justification: customer SLA");
    assert_eq!(fields.rca1.as_deref(), Some("disk full"));
    assert_eq!(fields.rca2.as_deref(), Some("no alert"));
    assert_eq!(fields.business_justification.as_deref(), Some("customer SLA"));
  }

  #[test]
  fn equals_form_used_when_colon_absent() {
    let fields = parse("rca1 = disk full\nrca2=no alert");
    assert_eq!(fields.rca1.as_deref(), Some("disk full"));
    assert_eq!(fields.rca2.as_deref(), Some("no alert"));
    assert!(fields.business_justification.is_none());
  }

  #[test]
  fn colon_grammar_wins_without_mixing() {
    // Both forms present: the colon grammar's values win entirely, the
    // equals-form rca2 must not leak in.
    let fields = parse("rca1: disk full\nrca2 = should be ignored");
    assert_eq!(fields.rca1.as_deref(), Some("disk full"));
    assert!(fields.rca2.is_none());
  }

  #[test]
  fn duplicate_label_first_match_wins() {
    let fields = parse("rca1: first cause\nrca1: second cause");
    assert_eq!(fields.rca1.as_deref(), Some("first cause"));
  }

  #[test]
  fn value_captures_across_line_breaks() {
    let fields = parse("rca1: disk filled up\nover the weekend\nrca2: no alert");
    assert_eq!(fields.rca1.as_deref(), Some("disk filled up\nover the weekend"));
    assert_eq!(fields.rca2.as_deref(), Some("no alert"));
  }

  #[test]
  fn labels_are_case_insensitive() {
    let fields = parse("RCA1: Disk Full\nBUSINESS: keep the lights on");
    assert_eq!(fields.rca1.as_deref(), Some("Disk Full"));
    assert_eq!(fields.business_justification.as_deref(), Some("keep the lights on"));
  }

  #[test]
  fn underscore_spellings_accepted() {
    let fields = parse("rca_1: one\nrca_2: two");
    assert_eq!(fields.rca1.as_deref(), Some("one"));
    assert_eq!(fields.rca2.as_deref(), Some("two"));
  }

  #[test]
  fn missing_label_does_not_disqualify_the_rest() {
    let fields = parse("rca2: secondary only");
    assert!(fields.rca1.is_none());
    assert_eq!(fields.rca2.as_deref(), Some("secondary only"));
  }

  #[test]
  fn empty_value_does_not_claim_the_label() {
    let fields = parse("rca1:\nrca2: found");
    assert!(fields.rca1.is_none());
    assert_eq!(fields.rca2.as_deref(), Some("found"));
  }

  #[test]
  fn unlabeled_text_yields_nothing() {
    assert!(parse("restarted the pods, everything recovered").is_empty());
    assert!(parse("").is_empty());
  }
}
