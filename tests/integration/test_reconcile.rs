//! Tests for `scan --rebase-priv`: reconciling private mirrors with public upstreams

use crate::helpers::*;
use anyhow::Result;
use std::path::{Path, PathBuf};

fn scan_toml(group: &TestGroup, priv_url: &Path) -> String {
  format!(
    r#"[group]
name = "openshift-4.17"

[[group.public_upstreams]]
private = "{priv_prefix}"
public = "{public_prefix}"

[scan]
builds = "builds.json"
workdir = "sources"

[scan.retry]
ls_remote_attempts = 1
ls_remote_delay_secs = 0
push_attempts = 1
push_delay_secs = 0

[[components]]
key = "cli"
kind = "image"
source = {{ url = "{priv_url}", branch = {{ target = "main" }} }}
"#,
    priv_prefix = group.path.join("priv").display(),
    public_prefix = group.path.join("public").display(),
    priv_url = priv_url.display(),
  )
}

/// Private mirror of `cli` with the public upstream one commit ahead
fn diverged(group: &TestGroup) -> Result<(PathBuf, String, String)> {
  let (public, _) = group.add_upstream("public", "cli", "main")?;
  let private = group.mirror(&public, "priv", "cli")?;
  let before = rev_parse(&private, "main")?;
  let public_head = group.advance(&public, "main", "upstream-fix.txt")?;
  group.write("scan.toml", &scan_toml(group, &private))?;
  group.write_builds("openshift-4.17", &[])?;
  Ok((private, before, public_head))
}

#[test]
fn test_public_commits_are_pushed_to_private_mirror() -> Result<()> {
  let group = TestGroup::new()?;
  let (private, before, public_head) = diverged(&group)?;
  assert_ne!(before, public_head);

  let stdout = run_scan_sources(&group.path, &["scan", "--rebase-priv"])?;

  assert_eq!(rev_parse(&private, "main")?, public_head);
  assert!(stdout.ends_with("ISSUES:\n"));
  // The scan itself runs against the reconciled mirror
  assert!(stdout.contains("  cli is changed (reason: Component cli has no latest build"));
  Ok(())
}

#[test]
fn test_dry_run_leaves_private_mirror_alone() -> Result<()> {
  let group = TestGroup::new()?;
  let (private, before, _) = diverged(&group)?;

  run_scan_sources(&group.path, &["scan", "--rebase-priv", "--dry-run"])?;

  assert_eq!(rev_parse(&private, "main")?, before);
  Ok(())
}

#[test]
fn test_mirror_in_sync_is_untouched() -> Result<()> {
  let group = TestGroup::new()?;
  let (public, _) = group.add_upstream("public", "cli", "main")?;
  let private = group.mirror(&public, "priv", "cli")?;
  let head = rev_parse(&private, "main")?;
  group.write("scan.toml", &scan_toml(&group, &private))?;
  group.write_builds("openshift-4.17", &[("cli", &head)])?;

  let stdout = run_scan_sources(&group.path, &["scan", "--rebase-priv"])?;

  assert_eq!(rev_parse(&private, "main")?, head);
  assert!(!group.path.join("sources").join("cli").exists());
  assert_eq!(stdout, "ISSUES:\n");
  Ok(())
}

/// Diverged mirror whose private-only commit conflicts with the public one
fn conflicting(group: &TestGroup) -> Result<(PathBuf, String)> {
  let (private, _, _) = diverged(group)?;
  let work = group.path.join("work").join("private-edit");
  git(
    &group.path,
    &[
      "clone",
      "--branch",
      "main",
      private.to_str().expect("utf-8 path"),
      work.to_str().expect("utf-8 path"),
    ],
  )?;
  std::fs::write(work.join("upstream-fix.txt"), "private change\n")?;
  git(&work, &["add", "."])?;
  git(&work, &["commit", "-m", "Private change"])?;
  git(&work, &["push", "origin", "main"])?;
  let private_head = rev_parse(&private, "main")?;
  Ok((private, private_head))
}

#[test]
fn test_diverged_mirror_is_reported_as_issue() -> Result<()> {
  let group = TestGroup::new()?;
  let (private, private_head) = conflicting(&group)?;

  let stdout = run_scan_sources(&group.path, &["scan", "--rebase-priv"])?;

  assert_eq!(rev_parse(&private, "main")?, private_head);
  assert!(stdout.contains("ISSUES:\n   cli: Could not rebase into -priv as it needs manual reconciliation\n"));
  Ok(())
}

#[test]
fn test_dry_run_still_reports_conflicts() -> Result<()> {
  let group = TestGroup::new()?;
  let (private, private_head) = conflicting(&group)?;

  let stdout = run_scan_sources(&group.path, &["scan", "--rebase-priv", "--dry-run"])?;

  assert_eq!(rev_parse(&private, "main")?, private_head);
  assert!(stdout.contains("ISSUES:\n   cli: Could not rebase into -priv as it needs manual reconciliation\n"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_rejected_push_is_reported_as_issue() -> Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let group = TestGroup::new()?;
  let (private, before, _) = diverged(&group)?;
  let hook = private.join("hooks").join("pre-receive");
  std::fs::write(&hook, "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n")?;
  std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))?;

  let stdout = run_scan_sources(&group.path, &["scan", "--rebase-priv"])?;

  assert_eq!(rev_parse(&private, "main")?, before);
  assert!(stdout.contains("ISSUES:\n   cli: Failed pushing to openshift-priv\n"));
  // The scan still reports on the component
  assert!(stdout.contains("  cli is changed (reason: Component cli has no latest build"));
  Ok(())
}
