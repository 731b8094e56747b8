//! Scan report: what changes, why, and what went wrong along the way

use super::state::{Issue, ScanState};
use crate::catalog::{ComponentKind, MetadataCatalog};
use crate::core::error::ScanResult;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write as _;

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
  #[default]
  Text,
  Yaml,
  Json,
}

/// One changing component (or RHCOS stream)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
  pub name: String,
  pub changed: bool,
  pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
  pub rpms: Vec<ReportEntry>,
  pub images: Vec<ReportEntry>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rhcos: Option<Vec<ReportEntry>>,
  pub issues: Vec<Issue>,
}

impl Report {
  /// Changing components only, sorted by name
  pub fn from_state(state: &ScanState, catalog: &MetadataCatalog, rhcos: Option<Vec<ReportEntry>>) -> Self {
    let mut report = Report {
      rhcos,
      issues: state.issues().to_vec(),
      ..Default::default()
    };

    for component in catalog.all_components() {
      let key = component.qualified_key();
      if !state.is_changing(&key) {
        continue;
      }
      let entry = ReportEntry {
        name: component.key.clone(),
        changed: true,
        reason: state.reason(&key, true).unwrap_or_default().to_string(),
      };
      match component.kind {
        ComponentKind::Image => report.images.push(entry),
        ComponentKind::Rpm => report.rpms.push(entry),
        ComponentKind::Unknown(_) => {}
      }
    }

    report.images.sort_by(|a, b| a.name.cmp(&b.name));
    report.rpms.sort_by(|a, b| a.name.cmp(&b.name));
    report
  }

  pub fn render(&self, format: ReportFormat) -> ScanResult<String> {
    match format {
      ReportFormat::Text => Ok(self.to_text()),
      ReportFormat::Yaml => Ok(format!("---\n{}", serde_yaml::to_string(self)?)),
      ReportFormat::Json => Ok(serde_json::to_string_pretty(self)? + "\n"),
    }
  }

  fn to_text(&self) -> String {
    let mut out = String::new();
    let sections = [
      ("RPMS", Some(&self.rpms)),
      ("IMAGES", Some(&self.images)),
      ("RHCOS", self.rhcos.as_ref()),
    ];

    for (title, entries) in sections {
      let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        continue;
      };
      let _ = writeln!(out, "{}:", title);
      for entry in entries {
        let _ = writeln!(
          out,
          "  {} is {} (reason: {})",
          entry.name,
          if entry.changed { "changed" } else { "the same" },
          entry.reason
        );
      }
    }

    let _ = writeln!(out, "ISSUES:");
    for issue in &self.issues {
      let _ = writeln!(out, "   {}: {}", issue.name, issue.issue);
    }
    out
  }
}
