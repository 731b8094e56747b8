//! Remote-facing operations for SystemGit (ref listing, ancestry, merge, push)

use super::system_git::{SystemGit, isolated_git};
use crate::core::error::{GitError, ResultExt, ScanError, ScanResult};
use crate::core::lookup::Lookup;

impl SystemGit {
  /// Look up the commit a branch points to on a remote, without a local clone.
  ///
  /// `NotFound` means the remote answered and has no such branch.
  pub fn ls_remote(url: &str, branch: &str) -> Lookup<String> {
    let refname = format!("refs/heads/{}", branch);
    let output = match isolated_git().args(["ls-remote", url, &refname]).output() {
      Ok(output) => output,
      Err(e) => return Lookup::Failed(format!("failed to run git ls-remote: {}", e)),
    };

    if !output.status.success() {
      return Lookup::Failed(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Format: "<sha>\trefs/heads/<branch>"
    stdout
      .lines()
      .filter_map(|line| line.split_once('\t'))
      .find(|(_, name)| *name == refname)
      .map(|(sha, _)| Lookup::Found(sha.trim().to_string()))
      .unwrap_or(Lookup::NotFound)
  }

  /// Add a remote, or repoint it if it already exists
  pub fn ensure_remote(&self, name: &str, url: &str) -> ScanResult<()> {
    let output = self
      .git_cmd()
      .args(["remote", "add", name, url])
      .output()
      .context("Failed to add remote")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("already exists") {
        self.run(&["remote", "set-url", name, url], "git remote set-url")?;
        return Ok(());
      }
      return Err(ScanError::Git(GitError::CommandFailed {
        command: "git remote add".to_string(),
        stderr: stderr.to_string(),
      }));
    }

    Ok(())
  }

  /// Fetch from remote
  pub fn fetch(&self, remote_name: &str) -> ScanResult<()> {
    tracing::debug!(remote = remote_name, repo = %self.repo_path.display(), "fetching");
    self.run(&["fetch", remote_name], "git fetch")?;
    Ok(())
  }

  /// Is `ancestor` an ancestor of (or equal to) `descendant`?
  ///
  /// `merge-base --is-ancestor` exits 0 for yes, 1 for no, anything else for an error.
  pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> ScanResult<bool> {
    let output = self
      .git_cmd()
      .args(["merge-base", "--is-ancestor", ancestor, descendant])
      .output()
      .context("Failed to execute git merge-base")?;

    match output.status.code() {
      Some(0) => Ok(true),
      Some(1) => Ok(false),
      _ => Err(ScanError::Git(GitError::AncestryUnknown {
        repo: self.repo_path.display().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      })),
    }
  }

  /// Fast-forward the current branch to `remote/branch`. Returns whether it worked.
  pub fn pull_ff_only(&self, remote: &str, branch: &str) -> bool {
    self.run(&["pull", "--ff-only", remote, branch], "git pull --ff-only").is_ok()
  }

  /// Create a merge commit of `rev` into the current branch. Returns whether it worked.
  ///
  /// A failed merge is aborted so the clone is left as it was.
  pub fn merge(&self, rev: &str, message: &str) -> bool {
    match self.run(&["merge", "--no-edit", rev, "-m", message], "git merge") {
      Ok(_) => true,
      Err(e) => {
        tracing::debug!(rev, error = %e, "merge failed");
        if let Err(e) = self.run(&["merge", "--abort"], "git merge --abort") {
          tracing::warn!(repo = %self.repo_path.display(), error = %e, "could not abort failed merge; clone left mid-merge");
        }
        false
      }
    }
  }

  /// Push a branch to a remote
  pub fn push(&self, remote_name: &str, branch: &str) -> ScanResult<()> {
    let output = self
      .git_cmd()
      .args(["push", remote_name, branch])
      .output()
      .context("Failed to push")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ScanError::Git(GitError::PushFailed {
        remote: remote_name.to_string(),
        branch: branch.to_string(),
        reason: stderr.to_string(),
      }));
    }

    tracing::info!(remote = remote_name, branch, "pushed");
    Ok(())
  }
}
