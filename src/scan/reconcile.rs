//! Reconciliation of private mirrors with their public upstreams
//!
//! Per component: compare branch heads (`InSync` when equal), otherwise clone the private
//! mirror and check ancestry (`InSync` when private already contains public), otherwise
//! `Reconcile`: fast-forward, else merge commit, then push. Failures become issues. A dry run
//! still merges in the local clone and stops before the push.

use super::state::Issue;
use crate::catalog::Component;
use crate::core::config::GroupConfig;
use crate::core::lookup::Lookup;
use crate::core::retry::RetryPolicy;
use crate::core::vcs::{SystemGit, convert_remote_to_https, is_commit_sha, repo_name};
use crate::source::public_upstream;
use rayon::prelude::*;
use std::path::PathBuf;

const PUBLIC_REMOTE: &str = "public_upstream";

pub const ISSUE_MANUAL_RECONCILIATION: &str = "Could not rebase into -priv as it needs manual reconciliation";
pub const ISSUE_PUSH_FAILED: &str = "Failed pushing to openshift-priv";

/// Everything needed to reconcile one component, resolved up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob {
  pub key: String,
  pub priv_url: String,
  pub priv_branch: String,
  pub public_url: String,
  pub public_branch: String,
}

impl ReconcileJob {
  /// None when the component has nothing to reconcile
  pub fn plan(component: &Component, group: &GroupConfig) -> Option<Self> {
    if !component.enabled() {
      tracing::warn!(component = %component.key, "disabled: skipping rebase");
      return None;
    }

    let Some(source) = component.config.source.as_ref() else {
      tracing::warn!(component = %component.key, "no upstream source: skipping openshift-priv rebase");
      return None;
    };

    let Some(public_url) = public_upstream(&source.url, &group.public_upstreams) else {
      tracing::warn!(component = %component.key, "no public upstream: skipping openshift-priv rebase");
      return None;
    };

    let priv_branch = source.branch.target.clone();
    if is_commit_sha(&priv_branch) {
      tracing::warn!(component = %component.key, "target branch is a SHA: skipping rebase");
      return None;
    }

    if convert_remote_to_https(&source.url) == public_url {
      tracing::warn!(component = %component.key, "private and public upstreams are the same: skipping rebase");
      return None;
    }

    Some(Self {
      key: component.key.clone(),
      priv_url: source.url.clone(),
      public_branch: source.public_branch.clone().unwrap_or_else(|| priv_branch.clone()),
      priv_branch,
      public_url,
    })
  }
}

/// Where reconciliation of one component ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
  /// Heads are equal, or private already contains public
  InSync,
  /// Merged locally; push skipped
  DryRun,
  /// Merged and pushed
  Reconciled,
  /// Left untouched; needs a human
  Failed(Issue),
}

enum Step {
  CompareHeads,
  CheckAncestry(SystemGit),
  Reconcile(SystemGit),
  Done(ReconcileOutcome),
}

pub struct Reconciler {
  workdir: PathBuf,
  dry_run: bool,
  ls_remote: RetryPolicy,
  push: RetryPolicy,
}

impl Reconciler {
  pub fn new(workdir: impl Into<PathBuf>, dry_run: bool, ls_remote: RetryPolicy, push: RetryPolicy) -> Self {
    Self {
      workdir: workdir.into(),
      dry_run,
      ls_remote,
      push,
    }
  }

  /// Reconcile every job on the pool; each job is independent
  pub fn reconcile_all(&self, pool: &rayon::ThreadPool, jobs: &[ReconcileJob]) -> Vec<(String, ReconcileOutcome)> {
    pool.install(|| {
      jobs
        .par_iter()
        .map(|job| (job.key.clone(), self.reconcile(job)))
        .collect()
    })
  }

  pub fn reconcile(&self, job: &ReconcileJob) -> ReconcileOutcome {
    let mut step = Step::CompareHeads;
    loop {
      step = match step {
        Step::CompareHeads => self.compare_heads(job),
        Step::CheckAncestry(git) => self.check_ancestry(job, git),
        Step::Reconcile(git) => self.merge_and_push(job, &git),
        Step::Done(outcome) => return outcome,
      };
    }
  }

  fn compare_heads(&self, job: &ReconcileJob) -> Step {
    let public = self.head(&job.public_url, &job.public_branch);
    let private = self.head(&job.priv_url, &job.priv_branch);

    let (Some(public), Some(private)) = (public, private) else {
      tracing::warn!(component = %job.key, url = %job.public_url, "could not fetch latest commit SHAs: skipping rebase");
      return Step::Done(ReconcileOutcome::InSync);
    };

    if public == private {
      tracing::info!(component = %job.key, commit = %public, "latest commits match on public and private upstreams");
      return Step::Done(ReconcileOutcome::InSync);
    }

    tracing::info!(component = %job.key, public = %public, private = %private, "latest commits differ");
    match self.prepare_clone(job) {
      Ok(git) => Step::CheckAncestry(git),
      Err(detail) => {
        tracing::warn!(component = %job.key, %detail, "could not prepare source clone");
        Step::Done(ReconcileOutcome::Failed(Issue::new(&job.key, ISSUE_MANUAL_RECONCILIATION)))
      }
    }
  }

  fn check_ancestry(&self, job: &ReconcileJob, git: SystemGit) -> Step {
    let public_ref = format!("{}/{}", PUBLIC_REMOTE, job.public_branch);
    let private_ref = format!("origin/{}", job.priv_branch);

    match git.is_ancestor(&public_ref, &private_ref) {
      Ok(true) => {
        tracing::info!(component = %job.key, "private upstream already contains public: no need to rebase");
        Step::Done(ReconcileOutcome::InSync)
      }
      Ok(false) => {
        tracing::info!(component = %job.key, "public upstream is ahead of private: reconciling");
        Step::Reconcile(git)
      }
      Err(e) => {
        tracing::warn!(component = %job.key, error = %e, "could not determine ancestry");
        Step::Done(ReconcileOutcome::Failed(Issue::new(&job.key, ISSUE_MANUAL_RECONCILIATION)))
      }
    }
  }

  fn merge_and_push(&self, job: &ReconcileJob, git: &SystemGit) -> Step {
    let public_ref = format!("{}/{}", PUBLIC_REMOTE, job.public_branch);

    let reconciled = if git.pull_ff_only(PUBLIC_REMOTE, &job.public_branch) {
      tracing::info!(component = %job.key, from = %public_ref, "fast-forwarded");
      true
    } else {
      let message = format!("Reconciled {} with public upstream", repo_name(&job.priv_url));
      let merged = git.merge(&public_ref, &message);
      if merged {
        tracing::info!(component = %job.key, from = %public_ref, "merged");
      }
      merged
    };

    if !reconciled {
      tracing::warn!(component = %job.key, "failed rebasing from public upstream: needs manual reconciliation");
      return Step::Done(ReconcileOutcome::Failed(Issue::new(&job.key, ISSUE_MANUAL_RECONCILIATION)));
    }

    if self.dry_run {
      tracing::info!(component = %job.key, repo = repo_name(&job.priv_url), branch = %job.priv_branch, "would have pushed reconciliation");
      return Step::Done(ReconcileOutcome::DryRun);
    }

    match self.push.run("git push", || git.push("origin", &job.priv_branch)) {
      Ok(()) => {
        let head = git.head_commit().unwrap_or_default();
        tracing::info!(component = %job.key, commit = %head, "reconciled with public upstream");
        Step::Done(ReconcileOutcome::Reconciled)
      }
      Err(e) => {
        tracing::warn!(component = %job.key, error = %e, "failed pushing to private upstream");
        Step::Done(ReconcileOutcome::Failed(Issue::new(&job.key, ISSUE_PUSH_FAILED)))
      }
    }
  }

  /// Branch head on a remote; None when it cannot be determined
  fn head(&self, url: &str, branch: &str) -> Option<String> {
    let lookup = self.ls_remote.run("git ls-remote", || match SystemGit::ls_remote(url, branch) {
      Lookup::Failed(detail) => Err(detail.into()),
      answered => Ok(answered),
    });
    lookup.ok().and_then(Lookup::found)
  }

  fn prepare_clone(&self, job: &ReconcileJob) -> Result<SystemGit, String> {
    let dest = self.clone_path(&job.key);
    let git = SystemGit::clone_or_fetch(&job.priv_url, &job.priv_branch, &dest).map_err(|e| e.to_string())?;
    git
      .ensure_remote(PUBLIC_REMOTE, &job.public_url)
      .map_err(|e| e.to_string())?;
    self
      .ls_remote
      .run("git fetch", || git.fetch(PUBLIC_REMOTE))
      .map_err(|e| e.to_string())?;
    Ok(git)
  }

  fn clone_path(&self, key: &str) -> PathBuf {
    self.workdir.join(key)
  }
}
