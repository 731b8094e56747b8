//! Image checks beyond upstream commits: newer dependency builds and config digest drift

use super::hint::{RebuildHint, RebuildHintCode};
use crate::builds::{BuildQuery, BuildRecord, BuildRecordStore};
use crate::catalog::{Component, MetadataCatalog};
use crate::core::config::GroupConfig;
use crate::core::error::ScanResult;
use crate::core::lookup::Lookup;
use crate::core::vcs::SystemGit;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Path of the recorded digest inside a distgit repository
pub const CONFIG_DIGEST_PATH: &str = ".oit/config_digest";

/// Rebase time embedded in a release string (`YYYYMMDDHHMMSS`)
pub fn release_timestamp(release: &str) -> Option<DateTime<Utc>> {
  static TIMESTAMP: OnceLock<Option<Regex>> = OnceLock::new();
  let re = TIMESTAMP
    .get_or_init(|| Regex::new(r"(?:^|[^0-9])([0-9]{14})(?:[^0-9]|$)").ok())
    .as_ref()?;
  let digits = re.captures(release)?.get(1)?.as_str();
  NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
    .ok()
    .map(|naive| naive.and_utc())
}

pub struct ImageChecks<'a> {
  store: &'a dyn BuildRecordStore,
  catalog: &'a MetadataCatalog,
  group: &'a GroupConfig,
}

impl<'a> ImageChecks<'a> {
  pub fn new(store: &'a dyn BuildRecordStore, catalog: &'a MetadataCatalog, group: &'a GroupConfig) -> Self {
    Self { store, catalog, group }
  }

  /// Latest successful build of a component across all targets
  pub fn latest_build(&self, key: &str) -> ScanResult<Option<BuildRecord>> {
    let query = BuildQuery::new(
      key,
      self.group.name.as_str(),
      self.group.assembly.as_str(),
      self.group.engine,
      None,
    );
    self.store.get_latest_build(&query)
  }

  /// `DEPENDENCY_NEWER` when any member dependency was rebased after this image's build
  pub fn dependency_newer(&self, component: &Component, build: &BuildRecord) -> ScanResult<Option<RebuildHint>> {
    let Some(rebase_time) = release_timestamp(&build.release) else {
      return Ok(None);
    };

    for dep_key in self.catalog.dependencies(&component.key).into_iter().flatten() {
      if self.catalog.get(dep_key).is_none() {
        tracing::warn!(component = %component.key, dependency = %dep_key, "unknown dependency; is it excluded?");
        continue;
      }

      let Some(dep_build) = self.latest_build(dep_key)? else {
        continue;
      };

      if release_timestamp(&dep_build.release).is_some_and(|dep_time| dep_time > rebase_time) {
        tracing::info!(component = %component.key, dependency = %dep_key, nvr = %dep_build.nvr, "dependency has a newer build");
        return Ok(Some(RebuildHint::new(
          RebuildHintCode::DependencyNewer,
          "Dependency has a newer build",
        )));
      }
    }

    Ok(None)
  }

  /// `CONFIG_CHANGE` when the digest recorded for this build differs from the current config.
  ///
  /// A digest that cannot be fetched asks for a rebuild; one that does not exist skips the check.
  pub fn config_changed(&self, component: &Component, build: &BuildRecord) -> Option<RebuildHint> {
    let Some(distgit) = component.config.distgit.as_deref() else {
      tracing::debug!(component = %component.key, "no distgit clone configured; skipping config check");
      return None;
    };

    let current = component.config_digest(&self.group.name);
    match recorded_digest(distgit, build) {
      Lookup::Found(previous) if previous.trim() != current.trim() => {
        tracing::info!(component = %component.key, previous = %previous.trim(), current = %current, "config digest differs");
        Some(RebuildHint::new(
          RebuildHintCode::ConfigChange,
          "Metadata configuration change",
        ))
      }
      Lookup::Found(_) => None,
      Lookup::NotFound => {
        tracing::warn!(component = %component.key, "config_digest not found; skipping config check");
        None
      }
      Lookup::Failed(detail) => {
        tracing::info!(component = %component.key, %detail, "config_digest cannot be retrieved; requesting a build");
        Some(RebuildHint::new(
          RebuildHintCode::ConfigChange,
          "Unable to retrieve config_digest",
        ))
      }
    }
  }
}

/// Digest committed alongside the build, read at the build's distgit commit
fn recorded_digest(distgit: &Path, build: &BuildRecord) -> Lookup<String> {
  // source_url looks like git://host/containers/name#<commit>
  let Some(commit) = build.source_url.as_deref().and_then(|url| url.split_once('#')).map(|(_, c)| c) else {
    return Lookup::NotFound;
  };

  let git = match SystemGit::open(distgit) {
    Ok(git) => git,
    Err(e) => return Lookup::Failed(e.to_string()),
  };

  git
    .read_file_at_commit(commit, Path::new(CONFIG_DIGEST_PATH))
    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
