//! System git backend
//!
//! Uses git porcelain/plumbing commands through a subprocess with an isolated
//! environment. Every method is a single blocking call; retries live with the caller.

use crate::core::error::{GitError, ResultExt, ScanError, ScanResult};
use crate::core::lookup::Lookup;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variables passed through to git; everything else is cleared
const ENV_WHITELIST: &[&str] = &[
  "PATH",
  "HOME",
  "GIT_SSH_COMMAND",
  "GIT_AUTHOR_NAME",
  "GIT_AUTHOR_EMAIL",
  "GIT_COMMITTER_NAME",
  "GIT_COMMITTER_EMAIL",
];

/// Git backend using system git (zero crate dependencies)
pub struct SystemGit {
  /// Repository working directory
  pub(crate) repo_path: PathBuf,
}

impl SystemGit {
  /// Open an existing git repository
  pub fn open(path: &Path) -> ScanResult<Self> {
    let output = isolated_git()
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") || !path.exists() {
        return Err(ScanError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(ScanError::message(format!("Failed to open git repository: {}", stderr)));
    }

    Ok(Self {
      repo_path: path.to_path_buf(),
    })
  }

  /// Clone `url` at `branch` into `dest`, or fetch `origin` if `dest` is already a clone.
  pub fn clone_or_fetch(url: &str, branch: &str, dest: &Path) -> ScanResult<Self> {
    if dest.join(".git").exists() {
      let git = Self::open(dest)?;
      git.fetch("origin")?;
      git.run(&["checkout", "-B", branch, &format!("origin/{}", branch)], "git checkout")?;
      return Ok(git);
    }

    if let Some(parent) = dest.parent() {
      std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let output = isolated_git()
      .args(["clone", "--branch", branch, url])
      .arg(dest)
      .output()
      .context("Failed to execute git clone")?;

    if !output.status.success() {
      return Err(ScanError::Git(GitError::CommandFailed {
        command: format!("git clone {}", url),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Self::open(dest)
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> ScanResult<String> {
    self.rev_parse("HEAD")
  }

  /// Resolve any revision to a commit SHA
  pub fn rev_parse(&self, rev: &str) -> ScanResult<String> {
    let stdout = self.run(&["rev-parse", "--verify", &format!("{}^{{commit}}", rev)], "git rev-parse")?;
    Ok(stdout.trim().to_string())
  }

  /// Read a file at a specific commit
  ///
  /// `NotFound` when the commit exists but the file doesn't; `Failed` when the commit
  /// itself is unknown to this clone or git could not be run.
  pub fn read_file_at_commit(&self, commit_sha: &str, path: &Path) -> Lookup<Vec<u8>> {
    let spec = format!("{}:{}", commit_sha, path.display());

    let output = match self.git_cmd().args(["show", &spec]).output() {
      Ok(output) => output,
      Err(e) => return Lookup::Failed(format!("failed to run git show: {}", e)),
    };

    if output.status.success() {
      return Lookup::Found(output.stdout);
    }

    match self.rev_parse(commit_sha) {
      Ok(_) => Lookup::NotFound,
      Err(e) => Lookup::Failed(e.to_string()),
    }
  }

  /// Run a git command, returning stdout or a `CommandFailed` error
  pub(crate) fn run(&self, args: &[&str], label: &str) -> ScanResult<String> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute {}", label))?;

    if !output.status.success() {
      return Err(ScanError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Create a safe git command rooted at the repository
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = isolated_git();
    cmd.arg("-C").arg(&self.repo_path);
    cmd
  }

  pub fn path(&self) -> &Path {
    &self.repo_path
  }
}

/// Create a git command with isolated environment
///
/// - Clears environment variables
/// - Whitelists PATH, HOME, ssh and identity variables
/// - Adds safe configuration overrides
pub(crate) fn isolated_git() -> Command {
  let mut cmd = Command::new("git");

  cmd.env_clear();
  for var in ENV_WHITELIST {
    if let Ok(value) = std::env::var(var) {
      cmd.env(var, value);
    }
  }
  // Never block on a credential prompt
  cmd.env("GIT_TERMINAL_PROMPT", "0");

  cmd.arg("-c").arg("protocol.version=2");
  cmd.arg("-c").arg("advice.detachedHead=false");
  cmd.arg("-c").arg("core.quotePath=false");

  cmd
}
