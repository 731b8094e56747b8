//! Rebuild decision engine
//!
//! One `RebuildHint` per (component, target). The rules form a priority cascade: the first
//! rule that applies decides, later rules are never consulted.

use super::hint::{RebuildHint, RebuildHintCode};
use crate::builds::{BuildOutcome, BuildQuery, BuildRecord, BuildRecordStore};
use crate::catalog::Component;
use crate::core::config::GroupConfig;
use crate::core::error::ScanResult;
use crate::source::UpstreamSourceResolver;
use chrono::{DateTime, TimeDelta, Utc};

pub struct RebuildDecisionEngine<'a> {
  store: &'a dyn BuildRecordStore,
  resolver: &'a dyn UpstreamSourceResolver,
  group: &'a GroupConfig,
  now: DateTime<Utc>,
}

impl<'a> RebuildDecisionEngine<'a> {
  /// `now` is fixed for the whole scan so every component sees the same clock
  pub fn new(
    store: &'a dyn BuildRecordStore,
    resolver: &'a dyn UpstreamSourceResolver,
    group: &'a GroupConfig,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      store,
      resolver,
      group,
      now,
    }
  }

  /// Decision for a whole component.
  ///
  /// Targets are checked in declaration order and the first one that needs a rebuild, or
  /// is being held off after a failure, stands for the component. Otherwise the last
  /// target's hint is returned.
  pub fn evaluate_component(&self, component: &Component) -> ScanResult<RebuildHint> {
    let mut last = None;
    for target in &component.targets {
      let hint = self.evaluate(component, Some(target))?;
      if hint.is_decisive() {
        return Ok(hint);
      }
      last = Some(hint);
    }

    match last {
      Some(hint) => Ok(hint),
      None => self.evaluate(component, None),
    }
  }

  /// Decision for one target variant of a component (`None` for untargeted components)
  pub fn evaluate(&self, component: &Component, target: Option<&str>) -> ScanResult<RebuildHint> {
    let Some(latest_build) = self.store.get_latest_build(&self.query(component, target))? else {
      return Ok(RebuildHint::new(
        RebuildHintCode::NoLatestBuild,
        format!(
          "Component {} has no latest build for assembly {} and target {}",
          component.key,
          self.group.assembly,
          target.unwrap_or("default")
        ),
      ));
    };
    tracing::debug!(component = %component.key, start_time = %latest_build.start_time, "latest build");

    let Some(source) = component.config.source.as_ref() else {
      return Ok(RebuildHint::new(
        RebuildHintCode::BuildIsUpToDate,
        format!("No upstream source to compare with latest build {}", latest_build),
      ));
    };

    let (_, upstream_commit) =
      self
        .resolver
        .detect_remote_source_branch(source, self.group.stage, self.group.use_source_fallback_branch)?;
    tracing::debug!(component = %component.key, commit = %upstream_commit, "upstream commit");

    let commit_query = self.query(component, target).with_pattern("commitish", upstream_commit.as_str());
    let Some(commit_build) = self.store.get_latest_build(&commit_query)? else {
      return self.missing_commit_build(component, target, &upstream_commit);
    };

    if latest_build.nvr != commit_build.nvr {
      return Ok(RebuildHint::new(
        RebuildHintCode::UpstreamCommitMismatch,
        format!(
          "Latest build {} does not match upstream commit build {}; commit reverted?",
          latest_build.nvr, commit_build.nvr
        ),
      ));
    }

    Ok(RebuildHint::new(
      RebuildHintCode::BuildIsUpToDate,
      format!(
        "Build already exists for current upstream commit {}: {}",
        upstream_commit, latest_build
      ),
    ))
  }

  /// No build of the current upstream commit: either it is new, or building it failed.
  fn missing_commit_build(
    &self,
    component: &Component,
    target: Option<&str>,
    upstream_commit: &str,
  ) -> ScanResult<RebuildHint> {
    let threshold = self.group.threshold_hours();
    let short = upstream_commit.get(..7).unwrap_or(upstream_commit);

    let failed_query = self
      .query(component, target)
      .with_pattern("release", format!(".g*{}", short))
      .with_outcome(Some(BuildOutcome::Failure));

    let Some(failed) = self.store.get_latest_build(&failed_query)? else {
      return Ok(RebuildHint::new(
        RebuildHintCode::NewUpstreamCommit,
        "A new upstream commit exists and needs to be built",
      ));
    };

    if self.cooldown_elapsed(&failed, threshold) {
      return Ok(RebuildHint::new(
        RebuildHintCode::LastBuildFailed,
        format!("It has been {} hours since last failed build attempt", threshold),
      ));
    }

    Ok(RebuildHint::new(
      RebuildHintCode::DelayingNextAttempt,
      format!(
        "Last build of upstream commit {} failed, but holding off for at least {} hours before next attempt",
        upstream_commit, threshold
      ),
    ))
  }

  fn cooldown_elapsed(&self, failed: &BuildRecord, threshold_hours: u32) -> bool {
    self.now - failed.start_time >= TimeDelta::hours(i64::from(threshold_hours))
  }

  fn query(&self, component: &Component, target: Option<&str>) -> BuildQuery {
    BuildQuery::new(
      component.key.as_str(),
      self.group.name.as_str(),
      self.group.assembly.as_str(),
      self.group.engine,
      target.map(String::from),
    )
  }
}
