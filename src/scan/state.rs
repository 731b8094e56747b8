//! Mutable state of one scan run
//!
//! Owned by the sequential phase of the scan. Worker threads never touch it; they return
//! values that the joining thread records here.

use super::hint::RebuildHint;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A non-fatal problem hit while scanning one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
  pub name: String,
  pub issue: String,
}

impl Issue {
  pub fn new(name: impl Into<String>, issue: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      issue: issue.into(),
    }
  }
}

#[derive(Debug, Default)]
pub struct ScanState {
  /// Qualified keys of components that will be rebuilt
  changing: BTreeSet<String>,
  /// (qualified key, rebuild) → first reason recorded for that outcome
  reasons: BTreeMap<(String, bool), String>,
  issues: Vec<Issue>,
}

impl ScanState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add to the changing set. Returns true if the component was not already there.
  pub fn mark_changing(&mut self, qualified_key: &str) -> bool {
    self.changing.insert(qualified_key.to_string())
  }

  /// Record a reason unless one already exists for this component and outcome
  pub fn add_reason(&mut self, qualified_key: &str, hint: &RebuildHint) {
    self
      .reasons
      .entry((qualified_key.to_string(), hint.rebuild()))
      .or_insert_with(|| hint.reason.clone());
  }

  pub fn is_changing(&self, qualified_key: &str) -> bool {
    self.changing.contains(qualified_key)
  }

  pub fn reason(&self, qualified_key: &str, rebuild: bool) -> Option<&str> {
    self
      .reasons
      .get(&(qualified_key.to_string(), rebuild))
      .map(String::as_str)
  }

  pub fn changing(&self) -> &BTreeSet<String> {
    &self.changing
  }

  pub fn changing_count(&self) -> usize {
    self.changing.len()
  }

  pub fn add_issue(&mut self, issue: Issue) {
    self.issues.push(issue);
  }

  pub fn issues(&self) -> &[Issue] {
    &self.issues
  }
}
