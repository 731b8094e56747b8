//! Build records and the stores that serve them
//!
//! The scan only ever asks two questions of a build system: "what is the most recent
//! build matching these criteria?" and "which builds match?". Every backend answers
//! through the `BuildRecordStore` trait so the decision engine never sees a client type.

pub mod file_store;

use crate::core::error::ScanResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use file_store::JsonBuildStore;

/// Build system a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
  #[default]
  Konflux,
  Brew,
}

impl fmt::Display for Engine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Engine::Konflux => write!(f, "konflux"),
      Engine::Brew => write!(f, "brew"),
    }
  }
}

/// Final state of a build attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
  Success,
  Failure,
  Pending,
}

/// One build attempt, as recorded by the build system. Never mutated by the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
  /// Component (distgit key)
  pub name: String,
  pub nvr: String,
  pub group: String,
  pub assembly: String,
  pub engine: Engine,
  /// Target variant, e.g. "el9"
  #[serde(default)]
  pub el_target: Option<String>,
  pub outcome: BuildOutcome,
  pub start_time: DateTime<Utc>,
  /// Upstream commit the build was made from
  pub commitish: String,
  /// Release field; embeds the rebase timestamp and short commit
  pub release: String,
  /// Distgit source the build was made from
  #[serde(default)]
  pub source_url: Option<String>,
}

impl BuildRecord {
  /// Value of a searchable field, for pattern matching
  pub fn field(&self, name: &str) -> Option<&str> {
    match name {
      "name" => Some(&self.name),
      "nvr" => Some(&self.nvr),
      "commitish" => Some(&self.commitish),
      "release" => Some(&self.release),
      "source_url" => self.source_url.as_deref(),
      "el_target" => self.el_target.as_deref(),
      _ => None,
    }
  }
}

impl fmt::Display for BuildRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.nvr, self.start_time.to_rfc3339())
  }
}

/// Search criteria for build records.
///
/// `outcome` defaults to `Success`: "the latest build" means the latest successful one
/// unless a caller asks for failures explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildQuery {
  pub name: String,
  pub group: String,
  pub assembly: String,
  pub engine: Engine,
  /// None matches every target
  pub el_target: Option<String>,
  /// Field name → regex that must match somewhere in the field
  pub patterns: BTreeMap<String, String>,
  /// None matches every outcome
  pub outcome: Option<BuildOutcome>,
}

impl BuildQuery {
  pub fn new(
    name: impl Into<String>,
    group: impl Into<String>,
    assembly: impl Into<String>,
    engine: Engine,
    el_target: Option<String>,
  ) -> Self {
    Self {
      name: name.into(),
      group: group.into(),
      assembly: assembly.into(),
      engine,
      el_target,
      patterns: BTreeMap::new(),
      outcome: Some(BuildOutcome::Success),
    }
  }

  /// Require `field` to match `pattern`
  pub fn with_pattern(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
    self.patterns.insert(field.into(), pattern.into());
    self
  }

  pub fn with_outcome(mut self, outcome: Option<BuildOutcome>) -> Self {
    self.outcome = outcome;
    self
  }
}

/// Narrow capability set of a build system client.
pub trait BuildRecordStore: Send + Sync {
  /// All records matching the query, newest first
  fn list_builds(&self, query: &BuildQuery) -> ScanResult<Vec<BuildRecord>>;

  /// Most recent matching record, if any
  fn get_latest_build(&self, query: &BuildQuery) -> ScanResult<Option<BuildRecord>> {
    Ok(self.list_builds(query)?.into_iter().next())
  }
}
