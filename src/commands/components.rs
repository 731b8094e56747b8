//! `scan-sources components`: list the catalog with its dependency edges

use crate::catalog::graph::EdgeKind;
use crate::core::context::ScanContext;
use crate::core::error::ScanResult;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ComponentListing {
  key: String,
  kind: String,
  mode: String,
  dependencies: Vec<String>,
  descendants: Vec<String>,
  /// Components built with this one as a builder image
  builder_for: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  source: Option<String>,
}

/// Run the components command
pub fn run_components(ctx: &ScanContext, json: bool) -> ScanResult<()> {
  let catalog = &ctx.catalog;

  let listings: Vec<ComponentListing> = catalog
    .all_components()
    .map(|c| ComponentListing {
      key: c.key.clone(),
      kind: c.kind.to_string(),
      mode: format!("{:?}", c.mode).to_lowercase(),
      dependencies: c.dependencies.iter().cloned().collect(),
      descendants: catalog.descendants(&c.key).map(|d| d.key.clone()).collect(),
      builder_for: catalog
        .graph()
        .direct_dependents(&c.key, EdgeKind::Builder)
        .into_iter()
        .collect(),
      source: c.config.source.as_ref().map(|s| format!("{}#{}", s.url, s.branch.target)),
    })
    .collect();

  for cycle in catalog.graph().find_cycles() {
    tracing::warn!(cycle = %cycle.join(" -> "), "dependency cycle");
  }

  if json {
    println!("{}", serde_json::to_string_pretty(&listings)?);
    return Ok(());
  }

  println!("{} ({} components)", ctx.config.group.name, listings.len());
  for listing in &listings {
    println!("  {} [{}] ({})", listing.key, listing.kind, listing.mode);
    if let Some(source) = &listing.source {
      println!("    source: {}", source);
    }
    if !listing.dependencies.is_empty() {
      println!("    depends on: {}", listing.dependencies.join(", "));
    }
    if !listing.descendants.is_empty() {
      println!("    descendants: {}", listing.descendants.join(", "));
    }
    if !listing.builder_for.is_empty() {
      println!("    builder for: {}", listing.builder_for.join(", "));
    }
  }
  Ok(())
}
