//! Tests for the `components` command

use crate::helpers::*;
use anyhow::Result;

const SCAN_TOML: &str = r#"[group]
name = "openshift-4.17"

[[components]]
key = "base"
kind = "image"

[[components]]
key = "golang-builder"
kind = "image"

[[components]]
key = "cli"
kind = "image"
from = { member = "base", builders = [{ member = "golang-builder" }, { image = "registry.example.com/ubi9" }] }

[[components]]
key = "cli-artifacts"
kind = "image"
dependencies = ["cli"]

[[components]]
key = "openshift-clients"
kind = "rpm"
source = { url = "https://example.com/org/oc", branch = { target = "release-4.17" } }

[[components]]
key = "retired"
kind = "image"
mode = "disabled"
"#;

#[test]
fn test_components_json_lists_edges() -> Result<()> {
  let group = TestGroup::new()?;
  group.write("scan.toml", SCAN_TOML)?;

  let stdout = run_scan_sources(&group.path, &["components", "--json"])?;
  let listing: Vec<serde_json::Value> = serde_json::from_str(&stdout)?;

  let keys: Vec<&str> = listing.iter().filter_map(|c| c["key"].as_str()).collect();
  assert_eq!(keys, vec!["base", "cli", "cli-artifacts", "golang-builder", "openshift-clients"]);

  let base = &listing[0];
  assert_eq!(base["descendants"], serde_json::json!(["cli", "cli-artifacts"]));

  let builder = &listing[3];
  assert_eq!(builder["descendants"], serde_json::json!([]));
  assert_eq!(builder["builder_for"], serde_json::json!(["cli"]));

  let rpm = &listing[4];
  assert_eq!(rpm["kind"], "rpm");
  assert_eq!(rpm["source"], "https://example.com/org/oc#release-4.17");
  Ok(())
}

#[test]
fn test_components_text_includes_disabled_when_loaded() -> Result<()> {
  let group = TestGroup::new()?;
  group.write(
    "scan.toml",
    &SCAN_TOML.replace("name = \"openshift-4.17\"", "name = \"openshift-4.17\"\nload_disabled = true"),
  )?;

  let stdout = run_scan_sources(&group.path, &["components"])?;

  assert!(stdout.starts_with("openshift-4.17 (6 components)\n"));
  assert!(stdout.contains("  retired [image] (disabled)\n"));
  assert!(stdout.contains("    descendants: cli, cli-artifacts\n"));
  assert!(stdout.contains("    builder for: cli\n"));
  Ok(())
}

#[test]
fn test_missing_config_is_a_user_error() -> Result<()> {
  let group = TestGroup::new()?;

  let output = scan_sources(&group.path, &["components"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("scan.toml"));
  Ok(())
}
