//! Tests for the `scan` command

use crate::helpers::*;
use anyhow::Result;
use std::path::Path;

const GROUP: &str = "openshift-4.17";

fn scan_toml(components: &str) -> String {
  format!(
    r#"[group]
name = "{GROUP}"

[scan]
builds = "builds.json"
concurrency = 2

[scan.retry]
ls_remote_attempts = 1
ls_remote_delay_secs = 0

{components}"#
  )
}

fn image(key: &str, url: &Path, deps: &[&str]) -> String {
  let deps: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
  format!(
    r#"
[[components]]
key = "{key}"
kind = "image"
dependencies = [{}]
source = {{ url = "{}", branch = {{ target = "main" }} }}
"#,
    deps.join(", "),
    url.display()
  )
}

#[test]
fn test_unbuilt_component_changes_its_dependents() -> Result<()> {
  let group = TestGroup::new()?;
  let (base, _) = group.add_upstream("upstream", "base", "main")?;
  let (cli, cli_commit) = group.add_upstream("upstream", "cli", "main")?;
  group.write("scan.toml", &scan_toml(&(image("base", &base, &[]) + &image("cli", &cli, &["base"]))))?;
  group.write_builds(GROUP, &[("cli", &cli_commit)])?;

  let stdout = run_scan_sources(&group.path, &["scan"])?;

  assert!(stdout.starts_with("IMAGES:\n"));
  assert!(stdout.contains("  base is changed (reason: Component base has no latest build"));
  assert!(stdout.contains("  cli is changed (reason: Ancestor base is changing)\n"));
  assert!(!stdout.contains("RPMS:"));
  assert!(stdout.ends_with("ISSUES:\n"));
  Ok(())
}

#[test]
fn test_new_upstream_commit_in_json() -> Result<()> {
  let group = TestGroup::new()?;
  let (cli, built) = group.add_upstream("upstream", "cli", "main")?;
  let (docs, docs_commit) = group.add_upstream("upstream", "docs", "main")?;
  group.write("scan.toml", &scan_toml(&(image("cli", &cli, &[]) + &image("docs", &docs, &[]))))?;
  group.write_builds(GROUP, &[("cli", &built), ("docs", &docs_commit)])?;

  let head = group.advance(&cli, "main", "feature.txt")?;
  assert_ne!(head, built);

  let stdout = run_scan_sources(&group.path, &["scan", "--format", "json"])?;
  let report: serde_json::Value = serde_json::from_str(&stdout)?;

  let images = report["images"].as_array().expect("images array");
  assert_eq!(images.len(), 1);
  assert_eq!(images[0]["name"], "cli");
  assert_eq!(images[0]["changed"], true);
  assert_eq!(images[0]["reason"], "A new upstream commit exists and needs to be built");
  assert_eq!(report["rpms"].as_array().map(Vec::len), Some(0));
  assert!(report.get("rhcos").is_none());
  Ok(())
}

#[test]
fn test_up_to_date_group_in_yaml() -> Result<()> {
  let group = TestGroup::new()?;
  let (cli, commit) = group.add_upstream("upstream", "cli", "main")?;
  group.write("scan.toml", &scan_toml(&image("cli", &cli, &[])))?;
  group.write_builds(GROUP, &[("cli", &commit)])?;

  let stdout = run_scan_sources(&group.path, &["scan", "--yaml"])?;

  assert!(stdout.starts_with("---\n"));
  let report: serde_yaml::Value = serde_yaml::from_str(&stdout)?;
  assert_eq!(report["images"].as_sequence().map(Vec::len), Some(0));
  assert_eq!(report["issues"].as_sequence().map(Vec::len), Some(0));
  Ok(())
}

#[test]
fn test_missing_build_store_is_a_user_error() -> Result<()> {
  let group = TestGroup::new()?;
  group.write("scan.toml", &format!("[group]\nname = \"{GROUP}\"\n"))?;

  let output = scan_sources(&group.path, &["scan"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("scan.builds"));
  assert!(output.stdout.is_empty());
  Ok(())
}

#[test]
fn test_unreachable_upstream_aborts_the_scan() -> Result<()> {
  let group = TestGroup::new()?;
  let missing = group.path.join("upstream").join("gone");
  group.write("scan.toml", &scan_toml(&image("cli", &missing, &[])))?;
  group.write_builds(GROUP, &[("cli", "abcdef1234567890abcdef1234567890abcdef12")])?;

  let output = scan_sources(&group.path, &["scan"])?;

  assert_eq!(output.status.code(), Some(2));
  assert!(output.stdout.is_empty());
  Ok(())
}

#[test]
fn test_explicit_config_path() -> Result<()> {
  let group = TestGroup::new()?;
  let (cli, _) = group.add_upstream("upstream", "cli", "main")?;
  std::fs::create_dir_all(group.path.join("conf"))?;
  group.write("conf/group.toml", &scan_toml(&image("cli", &cli, &[])).replace("builds.json", "../builds.json"))?;
  group.write_builds(GROUP, &[])?;

  let outside = tempfile::TempDir::new()?;
  let config = group.path.join("conf/group.toml");
  let stdout = run_scan_sources(outside.path(), &["scan", "--config", config.to_str().expect("utf-8 path")])?;

  assert!(stdout.contains("  cli is changed (reason: Component cli has no latest build"));
  Ok(())
}
