use crate::settings::Slot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
  Screenshot,
  Clipboard,
  Manual,
  Image,
}

impl InputSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      InputSource::Screenshot => "screenshot",
      InputSource::Clipboard => "clipboard",
      InputSource::Manual => "manual",
      InputSource::Image => "image",
    }
  }
}

/// One styled reply draft, keyed by the slot that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  pub id: String,
  pub text: String,
}

/// A completed generation run. `slots` is a snapshot of the slot list at the
/// time of the run, so later edits never rewrite what history shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub id: String,
  pub created_at: String,
  pub input: String,
  pub source: InputSource,
  pub candidates: Vec<Candidate>,
  pub slots: Vec<Slot>,
}

impl HistoryEntry {
  pub fn new(
    input: impl Into<String>,
    source: InputSource,
    candidates: Vec<Candidate>,
    slots: Vec<Slot>,
  ) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      created_at: Utc::now().to_rfc3339(),
      input: input.into(),
      source,
      candidates,
      slots,
    }
  }
}

/// Newest first. The entry past `limit` falls off the end.
pub fn prepend_entry(history: &mut Vec<HistoryEntry>, entry: HistoryEntry, limit: usize) {
  history.insert(0, entry);
  history.truncate(limit);
}

pub fn remove_entry(history: &mut Vec<HistoryEntry>, id: &str) -> bool {
  let before = history.len();
  history.retain(|entry| entry.id != id);
  history.len() != before
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(input: &str) -> HistoryEntry {
    HistoryEntry::new(input, InputSource::Manual, Vec::new(), Vec::new())
  }

  #[test]
  fn prepend_keeps_newest_first() {
    let mut history = Vec::new();
    prepend_entry(&mut history, entry("first"), 10);
    prepend_entry(&mut history, entry("second"), 10);
    assert_eq!(history[0].input, "second");
    assert_eq!(history[1].input, "first");
  }

  #[test]
  fn prepend_at_capacity_drops_the_oldest() {
    let mut history = Vec::new();
    for n in 0..3 {
      prepend_entry(&mut history, entry(&format!("e{}", n)), 3);
    }
    prepend_entry(&mut history, entry("e3"), 3);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].input, "e3");
    assert!(history.iter().all(|e| e.input != "e0"));
  }

  #[test]
  fn remove_reports_whether_anything_matched() {
    let mut history = Vec::new();
    prepend_entry(&mut history, entry("keep"), 10);
    let id = history[0].id.clone();
    assert!(remove_entry(&mut history, &id));
    assert!(!remove_entry(&mut history, &id));
    assert!(history.is_empty());
  }

  #[test]
  fn entries_serialize_with_camel_case_timestamps() {
    let json = serde_json::to_string(&entry("hi")).unwrap();
    assert!(json.contains("\"createdAt\""));
    assert!(json.contains("\"source\":\"manual\""));
  }

  #[test]
  fn entry_ids_are_unique() {
    assert_ne!(entry("a").id, entry("b").id);
  }
}
