//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Commit author and committer for every repository the tests create
const IDENTITY: &[(&str, &str)] = &[
  ("GIT_AUTHOR_NAME", "Test User"),
  ("GIT_AUTHOR_EMAIL", "test@example.com"),
  ("GIT_COMMITTER_NAME", "Test User"),
  ("GIT_COMMITTER_EMAIL", "test@example.com"),
];

/// A group directory holding scan.toml, builds.json and the source repositories
pub struct TestGroup {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestGroup {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().canonicalize()?;
    Ok(Self { _root: root, path })
  }

  /// Create a bare upstream repository `<dir>/<name>` with one commit on `branch`.
  /// Returns the repository path and the commit.
  pub fn add_upstream(&self, dir: &str, name: &str, branch: &str) -> Result<(PathBuf, String)> {
    let work = self.work_tree(name, branch)?;
    let bare = self.path.join(dir).join(name);
    std::fs::create_dir_all(bare.parent().context("bare repo has no parent")?)?;
    git(&self.path, &["clone", "--bare", path_str(&work)?, path_str(&bare)?])?;
    let head = rev_parse(&work, "HEAD")?;
    Ok((bare, head))
  }

  /// Mirror an existing bare repository under another directory, as-is
  pub fn mirror(&self, source: &Path, dir: &str, name: &str) -> Result<PathBuf> {
    let bare = self.path.join(dir).join(name);
    std::fs::create_dir_all(bare.parent().context("bare repo has no parent")?)?;
    git(&self.path, &["clone", "--bare", path_str(source)?, path_str(&bare)?])?;
    Ok(bare)
  }

  /// Add a commit on top of `branch` of `repo` and push it there. Returns the new commit.
  pub fn advance(&self, repo: &Path, branch: &str, file: &str) -> Result<String> {
    let work = self.path.join("work").join(format!("advance-{}", file));
    git(&self.path, &["clone", "--branch", branch, path_str(repo)?, path_str(&work)?])?;
    std::fs::write(work.join(file), format!("{}\n", file))?;
    git(&work, &["add", "."])?;
    git(&work, &["commit", "-m", &format!("Add {}", file)])?;
    git(&work, &["push", "origin", branch])?;
    rev_parse(&work, "HEAD")
  }

  pub fn write(&self, file: &str, content: &str) -> Result<()> {
    std::fs::write(self.path.join(file), content)?;
    Ok(())
  }

  /// Write builds.json from `(name, commit)` pairs; every build succeeded an hour ago
  pub fn write_builds(&self, group: &str, builds: &[(&str, &str)]) -> Result<()> {
    let start = chrono::Utc::now() - chrono::TimeDelta::hours(1);
    let records: Vec<serde_json::Value> = builds
      .iter()
      .map(|(name, commit)| {
        serde_json::json!({
          "name": name,
          "nvr": format!("{}-4.17.0-1", name),
          "group": group,
          "assembly": "stream",
          "engine": "konflux",
          "outcome": "success",
          "start_time": start.to_rfc3339(),
          "commitish": commit,
          "release": format!("{}.p0.g{}.assembly.stream", start.format("%Y%m%d%H%M%S"), &commit[..7]),
        })
      })
      .collect();
    self.write("builds.json", &serde_json::to_string_pretty(&records)?)
  }

  fn work_tree(&self, name: &str, branch: &str) -> Result<PathBuf> {
    let work = self.path.join("work").join(name);
    std::fs::create_dir_all(&work)?;
    git(&work, &["init", &format!("--initial-branch={}", branch)])?;
    std::fs::write(work.join("README.md"), format!("# {}\n", name))?;
    git(&work, &["add", "."])?;
    git(&work, &["commit", "-m", "Initial commit"])?;
    Ok(work)
  }
}

fn path_str(path: &Path) -> Result<&str> {
  path.to_str().context("non-UTF-8 path")
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .envs(IDENTITY.iter().copied())
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

pub fn rev_parse(repo: &Path, rev: &str) -> Result<String> {
  let output = git(repo, &["rev-parse", rev])?;
  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run scan-sources, returning its output whatever the exit status
pub fn scan_sources(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_scan-sources");

  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .envs(IDENTITY.iter().copied())
    .env_remove("RUST_LOG")
    .output()
    .context("Failed to run scan-sources")
}

/// Run scan-sources and require success
pub fn run_scan_sources(cwd: &Path, args: &[&str]) -> Result<String> {
  let output = scan_sources(cwd, args)?;

  if !output.status.success() {
    anyhow::bail!(
      "scan-sources {} failed\nstdout: {}\nstderr: {}",
      args.join(" "),
      String::from_utf8_lossy(&output.stdout),
      String::from_utf8_lossy(&output.stderr)
    );
  }

  Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
