//! Rebuild decisions

use serde::Serialize;
use std::fmt;

/// Why a component does or does not need a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebuildHintCode {
  NoLatestBuild,
  NewUpstreamCommit,
  LastBuildFailed,
  DelayingNextAttempt,
  UpstreamCommitMismatch,
  BuildIsUpToDate,
  AncestorChanging,
  BuilderChanging,
  DependencyNewer,
  ConfigChange,
}

impl RebuildHintCode {
  /// Whether this code asks for a rebuild
  pub fn rebuild(self) -> bool {
    !matches!(self, RebuildHintCode::DelayingNextAttempt | RebuildHintCode::BuildIsUpToDate)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      RebuildHintCode::NoLatestBuild => "NO_LATEST_BUILD",
      RebuildHintCode::NewUpstreamCommit => "NEW_UPSTREAM_COMMIT",
      RebuildHintCode::LastBuildFailed => "LAST_BUILD_FAILED",
      RebuildHintCode::DelayingNextAttempt => "DELAYING_NEXT_ATTEMPT",
      RebuildHintCode::UpstreamCommitMismatch => "UPSTREAM_COMMIT_MISMATCH",
      RebuildHintCode::BuildIsUpToDate => "BUILD_IS_UP_TO_DATE",
      RebuildHintCode::AncestorChanging => "ANCESTOR_CHANGING",
      RebuildHintCode::BuilderChanging => "BUILDER_CHANGING",
      RebuildHintCode::DependencyNewer => "DEPENDENCY_NEWER",
      RebuildHintCode::ConfigChange => "CONFIG_CHANGE",
    }
  }
}

impl fmt::Display for RebuildHintCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One decision for one (component, target) evaluation. `rebuild` is derived from the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildHint {
  pub code: RebuildHintCode,
  pub reason: String,
}

impl RebuildHint {
  pub fn new(code: RebuildHintCode, reason: impl Into<String>) -> Self {
    Self {
      code,
      reason: reason.into(),
    }
  }

  pub fn rebuild(&self) -> bool {
    self.code.rebuild()
  }

  /// A rebuild now, or an explicit hold-off on a failing commit
  pub fn is_decisive(&self) -> bool {
    self.rebuild() || self.code == RebuildHintCode::DelayingNextAttempt
  }
}

impl fmt::Display for RebuildHint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.code, self.reason)
  }
}
