use crate::builds::Engine;
use crate::core::error::{ConfigError, ResultExt, ScanError, ScanResult};
use crate::core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cooldown between attempts at a commit whose last build failed
pub const DEFAULT_THRESHOLD_HOURS: u32 = 6;

/// Configuration for scan-sources
/// Searched in order: scan.toml, .scan.toml, .config/scan.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
  pub group: GroupConfig,
  #[serde(default)]
  pub scan: ScanOptions,
  #[serde(default)]
  pub rhcos: Option<RhcosConfig>,
  #[serde(default)]
  pub components: Vec<ComponentConfig>,
}

/// Group-wide settings shared by every component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
  /// Group name, e.g. "openshift-4.17"
  pub name: String,

  /// Assembly used to select build records
  #[serde(default = "default_assembly")]
  pub assembly: String,

  /// Build system whose records are consulted
  #[serde(default)]
  pub engine: Engine,

  /// Architectures built for this group
  #[serde(default)]
  pub arches: Vec<String>,

  /// Also scan components in `disabled` mode
  #[serde(default)]
  pub load_disabled: bool,

  /// Prefer `stage` source branches when configured
  #[serde(default)]
  pub stage: bool,

  /// When to fall back from the target branch to the fallback branch
  #[serde(default)]
  pub use_source_fallback_branch: FallbackPolicy,

  #[serde(default)]
  pub scan_freshness: ScanFreshness,

  /// Private → public remote mappings used by reconciliation
  #[serde(default)]
  pub public_upstreams: Vec<PublicUpstream>,
}

fn default_assembly() -> String {
  "stream".to_string()
}

impl GroupConfig {
  /// Minor version encoded in the group name ("openshift-4.17" → "4.17")
  pub fn minor_version(&self) -> Option<&str> {
    let version = self.name.rsplit('-').next()?;
    let mut parts = version.split('.');
    let valid = parts.next().is_some_and(|p| p.parse::<u32>().is_ok())
      && parts.next().is_some_and(|p| p.parse::<u32>().is_ok())
      && parts.next().is_none();
    valid.then_some(version)
  }

  pub fn threshold_hours(&self) -> u32 {
    self.scan_freshness.threshold_hours
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFreshness {
  /// Hours to wait after a failed build attempt before retrying the same commit
  #[serde(default = "default_threshold_hours")]
  pub threshold_hours: u32,
}

fn default_threshold_hours() -> u32 {
  DEFAULT_THRESHOLD_HOURS
}

impl Default for ScanFreshness {
  fn default() -> Self {
    Self {
      threshold_hours: DEFAULT_THRESHOLD_HOURS,
    }
  }
}

/// Source branch fallback behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
  /// Use the fallback branch whenever it exists
  Always,
  /// Use the fallback branch only if the target branch is missing
  #[default]
  Yes,
  /// A missing target branch is an error
  Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUpstream {
  /// Private remote prefix, e.g. "https://github.com/openshift-priv"
  pub private: String,
  /// Public remote prefix, e.g. "https://github.com/openshift"
  pub public: String,
}

/// Scan run options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
  /// Build-record store (JSON export); a scan cannot run without it
  #[serde(default)]
  pub builds: Option<PathBuf>,

  /// Where source repositories are cloned for reconciliation
  #[serde(default = "default_workdir")]
  pub workdir: PathBuf,

  /// Worker pool size for lookups and reconciliation
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,

  /// Mark images whose member dependencies have newer builds
  #[serde(default)]
  pub check_dependents: bool,

  /// Compare config digests against the ones recorded in distgit
  #[serde(default)]
  pub check_config_changes: bool,

  #[serde(default)]
  pub retry: RetryConfig,
}

fn default_workdir() -> PathBuf {
  PathBuf::from(".scan/sources")
}

fn default_concurrency() -> usize {
  20
}

impl Default for ScanOptions {
  fn default() -> Self {
    Self {
      builds: None,
      workdir: default_workdir(),
      concurrency: default_concurrency(),
      check_dependents: false,
      check_config_changes: false,
      retry: RetryConfig::default(),
    }
  }
}

/// Retry counts and delays for remote git operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_ls_remote_attempts")]
  pub ls_remote_attempts: u32,
  #[serde(default = "default_delay_secs")]
  pub ls_remote_delay_secs: u64,
  #[serde(default = "default_push_attempts")]
  pub push_attempts: u32,
  #[serde(default = "default_delay_secs")]
  pub push_delay_secs: u64,
}

fn default_ls_remote_attempts() -> u32 {
  5
}

fn default_push_attempts() -> u32 {
  3
}

fn default_delay_secs() -> u64 {
  5
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      ls_remote_attempts: default_ls_remote_attempts(),
      ls_remote_delay_secs: default_delay_secs(),
      push_attempts: default_push_attempts(),
      push_delay_secs: default_delay_secs(),
    }
  }
}

impl RetryConfig {
  pub fn ls_remote(&self) -> RetryPolicy {
    RetryPolicy::new(self.ls_remote_attempts, Duration::from_secs(self.ls_remote_delay_secs))
  }

  pub fn push(&self) -> RetryPolicy {
    RetryPolicy::new(self.push_attempts, Duration::from_secs(self.push_delay_secs))
  }
}

/// RHCOS imagestream comparison settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhcosConfig {
  /// Container name of the primary RHCOS image in the payload
  #[serde(default = "default_rhcos_container")]
  pub container: String,

  /// Namespace base of payload imagestreams
  #[serde(default = "default_namespace_base")]
  pub namespace_base: String,

  /// Path template of the RHCOS builds index; `{version}`, `{arch}` and `{priv}` are substituted
  pub builds_index: String,
}

fn default_rhcos_container() -> String {
  "rhel-coreos".to_string()
}

fn default_namespace_base() -> String {
  "ocp".to_string()
}

/// One buildable component as declared in scan.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
  /// Distgit key
  pub key: String,

  /// `image` or `rpm`
  pub kind: String,

  #[serde(default)]
  pub mode: Mode,

  /// Explicit dependencies (operands, bundled images, ...)
  #[serde(default)]
  pub dependencies: Vec<String>,

  /// Build target variants, e.g. ["el8", "el9"]
  #[serde(default)]
  pub targets: Vec<String>,

  #[serde(default)]
  pub from: FromConfig,

  /// Upstream source; absent for distgit-only components
  #[serde(default)]
  pub source: Option<SourceConfig>,

  /// Local distgit clone holding `.oit/config_digest`
  #[serde(default, skip_serializing)]
  pub distgit: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  Enabled,
  Disabled,
  Wip,
}

/// Parent and builder images
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FromConfig {
  /// Base image that is a member of this group
  #[serde(default)]
  pub member: Option<String>,

  #[serde(default)]
  pub builders: Vec<BuilderRef>,
}

/// A builder image: either a group member or an external pullspec
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuilderRef {
  #[serde(default)]
  pub member: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
  pub url: String,
  pub branch: BranchConfig,
  /// Branch name on the public upstream, when it differs from the target branch
  #[serde(default)]
  pub public_branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
  pub target: String,
  #[serde(default)]
  pub fallback: Option<String>,
  #[serde(default)]
  pub stage: Option<String>,
}

impl ScanConfig {
  /// Find config file in search order: scan.toml, .scan.toml, .config/scan.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("scan.toml"),
      path.join(".scan.toml"),
      path.join(".config").join("scan.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from a directory (searches multiple locations)
  pub fn load(path: &Path) -> ScanResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      ScanError::Config(ConfigError::NotFound {
        search_root: path.to_path_buf(),
      })
    })?;
    Self::load_file(&config_path)
  }

  /// Load config from an explicit file
  pub fn load_file(config_path: &Path) -> ScanResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let mut config = Self::from_toml(&content).with_context(|| format!("Invalid config in {}", config_path.display()))?;

    // Relative paths are relative to the config file
    if let Some(base) = config_path.parent() {
      config.resolve_paths(base);
    }

    Ok(config)
  }

  /// Parse and validate config text
  pub fn from_toml(content: &str) -> ScanResult<Self> {
    let config: ScanConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate cross-field constraints
  pub fn validate(&self) -> ScanResult<()> {
    if self.group.name.trim().is_empty() {
      return Err(ScanError::Config(ConfigError::MissingField {
        field: "group.name".to_string(),
      }));
    }

    if self.group.scan_freshness.threshold_hours == 0 {
      return Err(ScanError::Config(ConfigError::InvalidValue {
        field: "group.scan_freshness.threshold_hours".to_string(),
        reason: "must be at least 1".to_string(),
      }));
    }

    if self.scan.concurrency == 0 {
      return Err(ScanError::Config(ConfigError::InvalidValue {
        field: "scan.concurrency".to_string(),
        reason: "must be at least 1".to_string(),
      }));
    }

    let mut seen = HashSet::new();
    for component in &self.components {
      if component.key.trim().is_empty() {
        return Err(ScanError::Config(ConfigError::MissingField {
          field: "components.key".to_string(),
        }));
      }
      if !seen.insert(component.key.as_str()) {
        return Err(ScanError::Config(ConfigError::InvalidValue {
          field: "components.key".to_string(),
          reason: format!("duplicate component '{}'", component.key),
        }));
      }
    }

    Ok(())
  }

  /// Path of the build-record store. Missing store is fatal for a scan.
  pub fn require_builds(&self) -> ScanResult<&Path> {
    self.scan.builds.as_deref().ok_or_else(|| {
      ScanError::Config(ConfigError::MissingField {
        field: "scan.builds".to_string(),
      })
    })
  }

  fn resolve_paths(&mut self, base: &Path) {
    if let Some(builds) = self.scan.builds.as_mut()
      && builds.is_relative()
    {
      *builds = base.join(&*builds);
    }
    if self.scan.workdir.is_relative() {
      self.scan.workdir = base.join(&self.scan.workdir);
    }
    for component in &mut self.components {
      if let Some(distgit) = component.distgit.as_mut()
        && distgit.is_relative()
      {
        *distgit = base.join(&*distgit);
      }
    }
  }
}
