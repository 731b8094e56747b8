//! Error types for scan-sources with contextual messages and exit codes
//!
//! Every fatal error carries a category (which decides the exit code) and, where one
//! exists, a suggestion for the operator. Per-component problems that must not abort a
//! scan are not errors at all: they are recorded as `Issue`s in the scan state.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for scan-sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O, external lookups)
  System = 2,
  /// Data-model invariant violated upstream of the scan
  Invariant = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for scan-sources
#[derive(Debug)]
pub enum ScanError {
  /// Configuration errors (always fatal)
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// External lookup errors (build records, upstream sources)
  Lookup(LookupError),

  /// Invariant violation in the data handed to the scan
  Invariant { message: String },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ScanError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ScanError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ScanError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Create an invariant violation
  pub fn invariant(msg: impl Into<String>) -> Self {
    ScanError::Invariant { message: msg.into() }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ScanError::Message { message, context, help } => ScanError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ScanError::Io(err) => ScanError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ScanError::Config(_) => ExitCode::User,
      ScanError::Git(_) => ExitCode::System,
      ScanError::Lookup(_) => ExitCode::System,
      ScanError::Invariant { .. } => ExitCode::Invariant,
      ScanError::Io(_) => ExitCode::System,
      ScanError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ScanError::Config(e) => e.help_message(),
      ScanError::Git(e) => e.help_message(),
      ScanError::Lookup(e) => e.help_message(),
      ScanError::Invariant { .. } => {
        Some("The component metadata is inconsistent; fix the group configuration before rescanning.".to_string())
      }
      ScanError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ScanError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScanError::Config(e) => write!(f, "{}", e),
      ScanError::Git(e) => write!(f, "{}", e),
      ScanError::Lookup(e) => write!(f, "{}", e),
      ScanError::Invariant { message } => write!(f, "Invariant violation: {}", message),
      ScanError::Io(e) => write!(f, "I/O error: {}", e),
      ScanError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ScanError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ScanError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ScanError {
  fn from(err: io::Error) -> Self {
    ScanError::Io(err)
  }
}

impl From<String> for ScanError {
  fn from(msg: String) -> Self {
    ScanError::message(msg)
  }
}

impl From<&str> for ScanError {
  fn from(msg: &str) -> Self {
    ScanError::message(msg)
  }
}

impl From<toml_edit::de::Error> for ScanError {
  fn from(err: toml_edit::de::Error) -> Self {
    ScanError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for ScanError {
  fn from(err: serde_json::Error) -> Self {
    ScanError::message(format!("JSON error: {}", err))
  }
}

impl From<serde_yaml::Error> for ScanError {
  fn from(err: serde_yaml::Error) -> Self {
    ScanError::message(format!("YAML error: {}", err))
  }
}

impl From<regex::Error> for ScanError {
  fn from(err: regex::Error) -> Self {
    ScanError::message(format!("Invalid build record pattern: {}", err))
  }
}

impl From<chrono::ParseError> for ScanError {
  fn from(err: chrono::ParseError) -> Self {
    ScanError::message(format!("Timestamp parse error: {}", err))
  }
}

impl From<rayon::ThreadPoolBuildError> for ScanError {
  fn from(err: rayon::ThreadPoolBuildError) -> Self {
    ScanError::message(format!("Failed to build worker pool: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ScanError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ScanError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// scan.toml not found
  NotFound { search_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Invalid value for a field
  InvalidValue { field: String, reason: String },

  /// Component not found in the catalog
  ComponentNotFound { name: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create a scan.toml describing the group, or pass --config <path>.".to_string())
      }
      ConfigError::MissingField { field } if field.starts_with("scan.builds") => {
        Some("Point [scan] builds at the build-record store exported for this group.".to_string())
      }
      ConfigError::ComponentNotFound { .. } => {
        Some("List known components with `scan-sources components`.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { search_root } => {
        write!(
          f,
          "No scan-sources configuration found.\nExpected file: {}/scan.toml",
          search_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::InvalidValue { field, reason } => {
        write!(f, "Invalid value for '{}': {}", field, reason)
      }
      ConfigError::ComponentNotFound { name } => {
        write!(f, "Component '{}' not found in the catalog", name)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Branch does not exist on the remote
  BranchNotFound { url: String, branch: String },

  /// Ancestry between two refs could not be determined
  AncestryUnknown { repo: String, stderr: String },

  /// Push failed
  PushFailed {
    remote: String,
    branch: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote has commits you don't have; the mirror needs manual reconciliation.".to_string())
        } else if reason.contains("permission denied") || reason.contains("403") {
          Some("Check the credentials used to push to the private remote.".to_string())
        } else {
          None
        }
      }
      GitError::BranchNotFound { .. } => Some(
        "Check source.branch in the component config, or allow a fallback branch with use_source_fallback_branch."
          .to_string(),
      ),
      GitError::RepoNotFound { path } => Some(format!("Check the clone path: {}", path.display())),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::BranchNotFound { url, branch } => {
        write!(f, "Branch '{}' not found on {}", branch, url)
      }
      GitError::AncestryUnknown { repo, stderr } => {
        write!(
          f,
          "Could not determine ancestry between public and private upstreams for {}: {}",
          repo, stderr
        )
      }
      GitError::PushFailed { remote, branch, reason } => {
        write!(f, "Push to {}/{} failed: {}", remote, branch, reason)
      }
    }
  }
}

/// External lookup errors
#[derive(Debug)]
pub enum LookupError {
  /// Upstream commit could not be resolved after retries
  UpstreamUnresolved { source: String, detail: String },

  /// Build record store could not be queried
  BuildStore { detail: String },
}

impl LookupError {
  fn help_message(&self) -> Option<String> {
    match self {
      LookupError::UpstreamUnresolved { .. } => {
        Some("The scan refuses to guess: rerun once the upstream remote is reachable.".to_string())
      }
      LookupError::BuildStore { .. } => None,
    }
  }
}

impl fmt::Display for LookupError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LookupError::UpstreamUnresolved { source, detail } => {
        write!(f, "Could not resolve upstream commit for {}: {}", source, detail)
      }
      LookupError::BuildStore { detail } => write!(f, "Build record lookup failed: {}", detail),
    }
  }
}

/// Result type alias for scan-sources
pub type ScanResult<T> = Result<T, ScanError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ScanResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ScanResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ScanError>,
{
  fn context(self, ctx: impl Into<String>) -> ScanResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ScanResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ScanError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

impl From<anyhow::Error> for ScanError {
  fn from(err: anyhow::Error) -> Self {
    ScanError::message(err.to_string())
  }
}
