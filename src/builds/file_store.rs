//! Build-record store backed by a JSON export of the build database

use super::{BuildQuery, BuildRecord, BuildRecordStore};
use crate::core::error::{LookupError, ResultExt, ScanError, ScanResult};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Build records loaded from a JSON array of records.
pub struct JsonBuildStore {
  records: Vec<BuildRecord>,
}

impl JsonBuildStore {
  /// Load records from a JSON file
  pub fn load(path: &Path) -> ScanResult<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read build records from {}", path.display()))?;
    let records: Vec<BuildRecord> =
      serde_json::from_str(&content).with_context(|| format!("Failed to parse build records in {}", path.display()))?;
    tracing::debug!(path = %path.display(), records = records.len(), "loaded build records");
    Ok(Self::from_records(records))
  }

  pub fn from_records(records: Vec<BuildRecord>) -> Self {
    Self { records }
  }

  fn compile(query: &BuildQuery) -> ScanResult<Vec<(&str, Regex)>> {
    query
      .patterns
      .iter()
      .map(|(field, pattern)| {
        Regex::new(pattern).map(|re| (field.as_str(), re)).map_err(|e| {
          ScanError::Lookup(LookupError::BuildStore {
            detail: format!("invalid pattern for {}: {}", field, e),
          })
        })
      })
      .collect()
  }

  fn matches(record: &BuildRecord, query: &BuildQuery, patterns: &[(&str, Regex)]) -> bool {
    if record.name != query.name
      || record.group != query.group
      || record.assembly != query.assembly
      || record.engine != query.engine
    {
      return false;
    }

    if let Some(target) = &query.el_target
      && record.el_target.as_ref() != Some(target)
    {
      return false;
    }

    if let Some(outcome) = query.outcome
      && record.outcome != outcome
    {
      return false;
    }

    patterns
      .iter()
      .all(|(field, re)| record.field(field).is_some_and(|value| re.is_match(value)))
  }
}

impl BuildRecordStore for JsonBuildStore {
  fn list_builds(&self, query: &BuildQuery) -> ScanResult<Vec<BuildRecord>> {
    let patterns = Self::compile(query)?;

    let mut found: Vec<BuildRecord> = self
      .records
      .iter()
      .filter(|record| Self::matches(record, query, &patterns))
      .cloned()
      .collect();

    found.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    Ok(found)
  }
}
