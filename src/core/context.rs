//! Scan context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   ScanContext::build() -> &ScanContext
//!   |
//!   v
//! commands/scan.rs, components.rs:
//!   fn run_*(ctx: &ScanContext, ...)
//! ```

use crate::catalog::MetadataCatalog;
use crate::core::config::ScanConfig;
use crate::core::error::{ResultExt, ScanResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration and catalog shared by every phase of a run.
///
/// The catalog holds the components in scope for this group: enabled ones, plus
/// disabled ones when `load_disabled` is set.
#[derive(Clone)]
pub struct ScanContext {
  /// Directory the config was found in (absolute path)
  pub root: PathBuf,

  pub config: Arc<ScanConfig>,

  pub catalog: Arc<MetadataCatalog>,
}

impl ScanContext {
  /// Load config from `config_path`, or search for it under `root`
  pub fn build(root: &Path, config_path: Option<&Path>) -> ScanResult<Self> {
    let config = match config_path {
      Some(path) => ScanConfig::load_file(path)?,
      None => ScanConfig::load(root)?,
    };
    let root = match config_path.and_then(Path::parent) {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => root.to_path_buf(),
    };
    let root = root
      .canonicalize()
      .with_context(|| format!("Failed to resolve {}", root.display()))?;
    Self::from_config(root, config)
  }

  pub fn from_config(root: PathBuf, config: ScanConfig) -> ScanResult<Self> {
    let load_disabled = config.group.load_disabled;
    let in_scope = config
      .components
      .iter()
      .map(crate::catalog::Component::from_config)
      .filter(|c| c.in_scope(load_disabled));
    let catalog = MetadataCatalog::from_components(in_scope)?;
    tracing::debug!(group = %config.group.name, components = catalog.len(), "catalog loaded");

    Ok(Self {
      root,
      config: Arc::new(config),
      catalog: Arc::new(catalog),
    })
  }
}
