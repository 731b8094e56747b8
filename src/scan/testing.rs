//! Fixtures shared by the scan unit tests

use crate::builds::{BuildOutcome, BuildRecord, Engine};
use crate::catalog::Component;
use crate::core::config::{BranchConfig, FallbackPolicy, GroupConfig, ScanConfig, SourceConfig};
use crate::core::error::{LookupError, ScanError, ScanResult};
use crate::source::UpstreamSourceResolver;
use chrono::{DateTime, Utc};

pub(crate) fn group() -> GroupConfig {
  ScanConfig::from_toml("[group]\nname = \"openshift-4.17\"\n")
    .unwrap()
    .group
}

pub(crate) fn record(
  name: &str,
  nvr: &str,
  start_time: DateTime<Utc>,
  outcome: BuildOutcome,
  commit: &str,
  target: Option<&str>,
) -> BuildRecord {
  let short = commit.get(..7).unwrap_or(commit);
  BuildRecord {
    name: name.to_string(),
    nvr: nvr.to_string(),
    group: "openshift-4.17".to_string(),
    assembly: "stream".to_string(),
    engine: Engine::Konflux,
    el_target: target.map(String::from),
    outcome,
    start_time,
    commitish: commit.to_string(),
    release: format!("{}.p0.g{}.assembly.stream", start_time.format("%Y%m%d%H%M%S"), short),
    source_url: None,
  }
}

pub(crate) fn with_source(mut component: Component) -> Component {
  component.config.source = Some(SourceConfig {
    url: format!("https://example.com/org/{}", component.key),
    branch: BranchConfig {
      target: "release-4.17".to_string(),
      fallback: None,
      stage: None,
    },
    public_branch: None,
  });
  component
}

/// Every source resolves to the same commit, or every lookup fails
pub(crate) struct FixedResolver {
  commit: Option<String>,
}

impl FixedResolver {
  pub(crate) fn new(commit: &str) -> Self {
    Self {
      commit: Some(commit.to_string()),
    }
  }

  pub(crate) fn failing() -> Self {
    Self { commit: None }
  }
}

impl UpstreamSourceResolver for FixedResolver {
  fn detect_remote_source_branch(
    &self,
    source: &SourceConfig,
    _stage: bool,
    _fallback: FallbackPolicy,
  ) -> ScanResult<(String, String)> {
    match &self.commit {
      Some(commit) => Ok((source.branch.target.clone(), commit.clone())),
      None => Err(ScanError::Lookup(LookupError::UpstreamUnresolved {
        source: source.url.clone(),
        detail: "connection timed out".to_string(),
      })),
    }
  }
}
