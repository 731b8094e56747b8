//! Metadata catalog: every buildable component of the group
//!
//! Built once from scan.toml and immutable for the rest of the run. Descendant sets are
//! precomputed here so that propagation never walks the graph itself.

pub mod graph;

use crate::core::config::{ComponentConfig, Mode};
use crate::core::error::{ConfigError, ScanError, ScanResult};
use graph::{ComponentGraph, EdgeKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What a component builds into
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
  Image,
  Rpm,
  /// Kept so the catalog can still be listed; scanning one is an invariant violation
  Unknown(String),
}

impl From<&str> for ComponentKind {
  fn from(kind: &str) -> Self {
    match kind {
      "image" => ComponentKind::Image,
      "rpm" => ComponentKind::Rpm,
      other => ComponentKind::Unknown(other.to_string()),
    }
  }
}

impl fmt::Display for ComponentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ComponentKind::Image => write!(f, "image"),
      ComponentKind::Rpm => write!(f, "rpm"),
      ComponentKind::Unknown(kind) => write!(f, "{}", kind),
    }
  }
}

/// A buildable component ("meta")
#[derive(Debug, Clone)]
pub struct Component {
  /// Distgit key
  pub key: String,
  pub kind: ComponentKind,
  pub mode: Mode,
  /// Explicit dependencies ∪ base member ∪ builder members
  pub dependencies: BTreeSet<String>,
  /// Builder images that are members of the group
  pub builder_members: Vec<String>,
  pub targets: Vec<String>,
  pub config: ComponentConfig,
}

impl Component {
  pub fn from_config(config: &ComponentConfig) -> Self {
    let builder_members: Vec<String> = config.from.builders.iter().filter_map(|b| b.member.clone()).collect();

    let mut dependencies: BTreeSet<String> = config.dependencies.iter().cloned().collect();
    dependencies.extend(config.from.member.iter().cloned());
    dependencies.extend(builder_members.iter().cloned());

    Self {
      key: config.key.clone(),
      kind: ComponentKind::from(config.kind.as_str()),
      mode: config.mode,
      dependencies,
      builder_members,
      targets: config.targets.clone(),
      config: config.clone(),
    }
  }

  /// Kind-qualified key, unique across images and rpms
  pub fn qualified_key(&self) -> String {
    format!("{}:{}", self.kind, self.key)
  }

  pub fn enabled(&self) -> bool {
    self.mode == Mode::Enabled
  }

  /// Enabled components always take part; disabled ones only when asked to
  pub fn in_scope(&self, load_disabled: bool) -> bool {
    self.enabled() || (self.mode == Mode::Disabled && load_disabled)
  }

  /// SHA-256 over the canonical JSON form of the component config and its group
  pub fn config_digest(&self, group: &str) -> String {
    let canonical = serde_json::to_string(&DigestInput {
      group,
      component: &self.config,
    })
    .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
  }
}

#[derive(Serialize)]
struct DigestInput<'a> {
  group: &'a str,
  component: &'a ComponentConfig,
}

/// Every component of the group, with precomputed descendant sets.
pub struct MetadataCatalog {
  components: BTreeMap<String, Component>,
  descendants: BTreeMap<String, BTreeSet<String>>,
  graph: ComponentGraph,
}

impl MetadataCatalog {
  pub fn from_components(components: impl IntoIterator<Item = Component>) -> ScanResult<Self> {
    let mut by_key = BTreeMap::new();
    for component in components {
      let key = component.key.clone();
      if by_key.insert(key.clone(), component).is_some() {
        return Err(ScanError::Config(ConfigError::InvalidValue {
          field: "components.key".to_string(),
          reason: format!("duplicate component '{}'", key),
        }));
      }
    }

    let mut graph = ComponentGraph::new(by_key.keys().map(String::as_str));
    for component in by_key.values() {
      let base = component.config.from.member.as_deref();
      for dep in &component.dependencies {
        let kind = if Some(dep.as_str()) == base {
          EdgeKind::Base
        } else if component.config.dependencies.contains(dep) {
          EdgeKind::Dependency
        } else {
          EdgeKind::Builder
        };
        if !graph.add_edge(&component.key, dep, kind) {
          tracing::warn!(component = %component.key, dependency = %dep, "unknown dependency; is it excluded?");
        }
      }
    }

    let descendants = by_key
      .keys()
      .map(|key| (key.clone(), graph.transitive_dependents(key)))
      .collect();

    Ok(Self {
      components: by_key,
      descendants,
      graph,
    })
  }

  /// All components, ordered by key
  pub fn all_components(&self) -> impl Iterator<Item = &Component> {
    self.components.values()
  }

  pub fn get(&self, key: &str) -> Option<&Component> {
    self.components.get(key)
  }

  pub fn require(&self, key: &str) -> ScanResult<&Component> {
    self.get(key).ok_or_else(|| {
      ScanError::Config(ConfigError::ComponentNotFound {
        name: key.to_string(),
      })
    })
  }

  /// Transitive runtime descendants of `key` (empty for unknown keys)
  pub fn descendants(&self, key: &str) -> impl Iterator<Item = &Component> {
    self
      .descendants
      .get(key)
      .into_iter()
      .flatten()
      .filter_map(|k| self.components.get(k))
  }

  /// Declared dependency keys of `key`: explicit, base member and builder members
  pub fn dependencies(&self, key: &str) -> Option<&BTreeSet<String>> {
    self.components.get(key).map(|c| &c.dependencies)
  }

  pub fn graph(&self) -> &ComponentGraph {
    &self.graph
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }
}
