//! Upstream source resolution
//!
//! Answers "which commit is the component's source branch at right now?" and maps
//! private mirrors to their public upstreams for reconciliation.

use crate::core::config::{FallbackPolicy, PublicUpstream, SourceConfig};
use crate::core::error::{GitError, LookupError, ScanError, ScanResult};
use crate::core::lookup::Lookup;
use crate::core::retry::RetryPolicy;
use crate::core::vcs::{SystemGit, convert_remote_to_https, is_commit_sha};

/// Resolves the latest upstream commit of a component's source.
pub trait UpstreamSourceResolver: Send + Sync {
  /// Returns `(branch_name, commit_hash)` for the branch the component builds from.
  fn detect_remote_source_branch(
    &self,
    source: &SourceConfig,
    stage: bool,
    fallback: FallbackPolicy,
  ) -> ScanResult<(String, String)>;
}

/// Resolver backed by `git ls-remote`, retrying failed lookups.
pub struct GitSourceResolver {
  retry: RetryPolicy,
}

impl GitSourceResolver {
  pub fn new(retry: RetryPolicy) -> Self {
    Self { retry }
  }

  fn lookup(&self, url: &str, branch: &str) -> Lookup<String> {
    let attempt = self.retry.run("git ls-remote", || match SystemGit::ls_remote(url, branch) {
      Lookup::Failed(detail) => Err(ScanError::message(detail)),
      answered => Ok(answered),
    });
    attempt.unwrap_or_else(|e| Lookup::Failed(e.to_string()))
  }
}

impl UpstreamSourceResolver for GitSourceResolver {
  fn detect_remote_source_branch(
    &self,
    source: &SourceConfig,
    stage: bool,
    fallback: FallbackPolicy,
  ) -> ScanResult<(String, String)> {
    select_branch(source, stage, fallback, |url, branch| self.lookup(url, branch))
  }
}

/// Pick the branch to build from and resolve its commit.
///
/// - stage mode with a stage branch: the stage branch replaces the target
/// - a 40-hex target is already a commit and is not looked up
/// - `Always`: the fallback branch wins whenever it exists
/// - `Yes`: the fallback branch is used only if the target is missing
/// - `Never`: a missing target is an error
pub fn select_branch(
  source: &SourceConfig,
  stage: bool,
  policy: FallbackPolicy,
  lookup: impl Fn(&str, &str) -> Lookup<String>,
) -> ScanResult<(String, String)> {
  let url = source.url.as_str();
  let target = match (stage, source.branch.stage.as_deref()) {
    (true, Some(stage_branch)) => stage_branch,
    _ => source.branch.target.as_str(),
  };

  if is_commit_sha(target) {
    return Ok((target.to_string(), target.to_string()));
  }

  let fallback = source.branch.fallback.as_deref();

  if policy == FallbackPolicy::Always
    && let Some(fallback_branch) = fallback
    && let Some(sha) = resolved(url, fallback_branch, lookup(url, fallback_branch))?
  {
    return Ok((fallback_branch.to_string(), sha));
  }

  if let Some(sha) = resolved(url, target, lookup(url, target))? {
    return Ok((target.to_string(), sha));
  }

  if policy == FallbackPolicy::Yes
    && let Some(fallback_branch) = fallback
  {
    tracing::info!(url, target, fallback = fallback_branch, "target branch missing; trying fallback");
    if let Some(sha) = resolved(url, fallback_branch, lookup(url, fallback_branch))? {
      return Ok((fallback_branch.to_string(), sha));
    }
  }

  Err(ScanError::Git(GitError::BranchNotFound {
    url: url.to_string(),
    branch: target.to_string(),
  }))
}

fn resolved(url: &str, branch: &str, lookup: Lookup<String>) -> ScanResult<Option<String>> {
  match lookup {
    Lookup::Found(sha) => Ok(Some(sha)),
    Lookup::NotFound => Ok(None),
    Lookup::Failed(detail) => Err(ScanError::Lookup(LookupError::UpstreamUnresolved {
      source: format!("{} ({})", url, branch),
      detail,
    })),
  }
}

/// Public counterpart of a private source URL.
///
/// The longest matching `private` prefix wins. Returns None when no mapping applies.
pub fn public_upstream(private_url: &str, mappings: &[PublicUpstream]) -> Option<String> {
  let url = convert_remote_to_https(private_url);

  mappings
    .iter()
    .filter_map(|m| {
      let prefix = convert_remote_to_https(&m.private);
      let rest = url.strip_prefix(prefix.as_str())?;
      (rest.is_empty() || rest.starts_with('/')).then(|| (prefix.len(), m, rest.to_string()))
    })
    .max_by_key(|(len, _, _)| *len)
    .map(|(_, m, rest)| format!("{}{}", convert_remote_to_https(&m.public), rest))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::BranchConfig;
  use std::collections::HashMap;

  fn source(target: &str, fallback: Option<&str>, stage: Option<&str>) -> SourceConfig {
    SourceConfig {
      url: "https://example.com/org/repo".to_string(),
      branch: BranchConfig {
        target: target.to_string(),
        fallback: fallback.map(String::from),
        stage: stage.map(String::from),
      },
      public_branch: None,
    }
  }

  fn remote(branches: &[(&str, &str)]) -> impl Fn(&str, &str) -> Lookup<String> {
    let map: HashMap<String, String> = branches.iter().map(|(b, s)| (b.to_string(), s.to_string())).collect();
    move |_url, branch| match map.get(branch) {
      Some(sha) => Lookup::Found(sha.clone()),
      None => Lookup::NotFound,
    }
  }

  #[test]
  fn test_target_branch_resolves() {
    let src = source("release-4.17", Some("main"), None);
    let (branch, sha) =
      select_branch(&src, false, FallbackPolicy::Yes, remote(&[("release-4.17", "t1"), ("main", "m1")])).unwrap();
    assert_eq!((branch.as_str(), sha.as_str()), ("release-4.17", "t1"));
  }

  #[test]
  fn test_fallback_when_target_missing() {
    let src = source("release-4.17", Some("main"), None);
    let (branch, sha) = select_branch(&src, false, FallbackPolicy::Yes, remote(&[("main", "m1")])).unwrap();
    assert_eq!((branch.as_str(), sha.as_str()), ("main", "m1"));
  }

  #[test]
  fn test_always_prefers_fallback() {
    let src = source("release-4.17", Some("main"), None);
    let (branch, _) =
      select_branch(&src, false, FallbackPolicy::Always, remote(&[("release-4.17", "t1"), ("main", "m1")])).unwrap();
    assert_eq!(branch, "main");
  }

  #[test]
  fn test_never_errors_on_missing_target() {
    let src = source("release-4.17", Some("main"), None);
    let err = select_branch(&src, false, FallbackPolicy::Never, remote(&[("main", "m1")])).unwrap_err();
    assert!(matches!(err, ScanError::Git(GitError::BranchNotFound { .. })));
  }

  #[test]
  fn test_stage_branch_and_sha_target() {
    let src = source("release-4.17", None, Some("stage-4.17"));
    let (branch, _) = select_branch(&src, true, FallbackPolicy::Yes, remote(&[("stage-4.17", "s1")])).unwrap();
    assert_eq!(branch, "stage-4.17");

    let sha = "0123456789abcdef0123456789abcdef01234567";
    let src = source(sha, None, None);
    let lookup = |_: &str, _: &str| -> Lookup<String> { panic!("a commit target must not be looked up") };
    assert_eq!(
      select_branch(&src, false, FallbackPolicy::Yes, lookup).unwrap(),
      (sha.to_string(), sha.to_string())
    );
  }

  #[test]
  fn test_failed_lookup_is_an_error_not_a_miss() {
    let src = source("release-4.17", Some("main"), None);
    let err = select_branch(&src, false, FallbackPolicy::Yes, |_, _| Lookup::Failed("timeout".into())).unwrap_err();
    assert!(matches!(err, ScanError::Lookup(LookupError::UpstreamUnresolved { .. })));
  }

  #[test]
  fn test_public_upstream_longest_prefix() {
    let mappings = vec![
      PublicUpstream {
        private: "https://github.com/openshift-priv".to_string(),
        public: "https://github.com/openshift".to_string(),
      },
      PublicUpstream {
        private: "https://github.com/openshift-priv/special".to_string(),
        public: "https://github.com/other/special".to_string(),
      },
    ];
    assert_eq!(
      public_upstream("git@github.com:openshift-priv/installer.git", &mappings).as_deref(),
      Some("https://github.com/openshift/installer")
    );
    assert_eq!(
      public_upstream("https://github.com/openshift-priv/special", &mappings).as_deref(),
      Some("https://github.com/other/special")
    );
    assert_eq!(public_upstream("https://github.com/openshift-privileged/x", &mappings), None);
    assert_eq!(public_upstream("https://gitlab.com/x/y", &mappings), None);
  }

  #[test]
  fn test_git_resolver_against_local_repo() {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
      let status = std::process::Command::new("git")
        .current_dir(dir.path())
        .args(args)
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .unwrap();
      assert!(status.success());
    };
    run(&["init", "--initial-branch=main"]);
    run(&["commit", "--allow-empty", "-m", "init"]);

    let mut src = source("main", None, None);
    src.url = dir.path().display().to_string();
    let resolver = GitSourceResolver::new(RetryPolicy::once());
    let (branch, sha) = resolver
      .detect_remote_source_branch(&src, false, FallbackPolicy::Never)
      .unwrap();
    assert_eq!(branch, "main");
    assert_eq!(sha.len(), 40);

    src.branch.target = "missing".to_string();
    assert!(
      resolver
        .detect_remote_source_branch(&src, false, FallbackPolicy::Yes)
        .is_err()
    );
  }
}
