//! RHCOS status: is the build tagged into the payload imagestream the latest one?

use super::report::ReportEntry;
use crate::core::config::RhcosConfig;
use crate::core::error::{ScanError, ScanResult};
use crate::core::lookup::Lookup;
use crate::core::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;

/// Where RHCOS build ids come from
pub trait RhcosSource: Send + Sync {
  /// Build id of the RHCOS image tagged into the payload imagestream
  fn tagged_build_id(&self, version: &str, arch: &str, private: bool) -> Lookup<String>;

  /// Most recent RHCOS build id
  fn latest_build_id(&self, version: &str, arch: &str, private: bool) -> Lookup<String>;
}

/// Imagestream naming suffix of an architecture (none for x86_64)
pub fn arch_suffix(arch: &str) -> &'static str {
  match arch {
    "aarch64" | "arm64" => "-arm64",
    "ppc64le" => "-ppc64le",
    "s390x" => "-s390x",
    "multi" => "-multi",
    _ => "",
  }
}

/// Namespace and name of the payload imagestream for an arch
pub fn payload_imagestream(namespace_base: &str, version: &str, arch: &str, private: bool) -> (String, String) {
  let suffix = arch_suffix(arch);
  let private = if private { "-priv" } else { "" };
  (
    format!("{}{}{}", namespace_base, suffix, private),
    format!("{}-art-latest{}{}", version, suffix, private),
  )
}

/// Status entries for every arch and visibility whose RHCOS build changed.
///
/// Lookup failures never fail the scan; they count as "no change".
pub fn detect_rhcos_status(source: &dyn RhcosSource, version: &str, arches: &[String]) -> Vec<ReportEntry> {
  let mut statuses = Vec::new();

  for arch in arches {
    for private in [false, true] {
      let name = format!("{}-{}{}", version, arch, if private { "-priv" } else { "" });

      let latest = match source.latest_build_id(version, arch, private) {
        Lookup::Found(id) => id,
        Lookup::NotFound => {
          tracing::debug!(%name, "no RHCOS build found");
          continue;
        }
        Lookup::Failed(detail) => {
          tracing::warn!(%name, %detail, "could not find an RHCOS build to sync");
          continue;
        }
      };

      let tagged = match source.tagged_build_id(version, arch, private) {
        Lookup::Found(id) => Some(id),
        Lookup::NotFound => None,
        Lookup::Failed(detail) => {
          tracing::warn!(%name, %detail, "could not read RHCOS imagestream tag");
          continue;
        }
      };

      if tagged.as_deref() == Some(latest.as_str()) {
        tracing::debug!(%name, build = %latest, "latest RHCOS build is still tagged");
        continue;
      }

      statuses.push(ReportEntry {
        name,
        changed: true,
        reason: format!(
          "latest RHCOS build is {} which differs from istag {}",
          latest,
          tagged.as_deref().unwrap_or("none")
        ),
      });
    }
  }

  statuses
}

/// Reads tags with `oc get istag` and latest builds from a builds index file
pub struct OcRhcosSource {
  kubeconfig: PathBuf,
  config: RhcosConfig,
  retry: RetryPolicy,
}

impl OcRhcosSource {
  pub fn new(kubeconfig: PathBuf, config: RhcosConfig, retry: RetryPolicy) -> Self {
    Self {
      kubeconfig,
      config,
      retry,
    }
  }

  fn builds_index_path(&self, version: &str, arch: &str, private: bool) -> PathBuf {
    PathBuf::from(
      self
        .config
        .builds_index
        .replace("{version}", version)
        .replace("{arch}", arch)
        .replace("{priv}", if private { "-priv" } else { "" }),
    )
  }

  fn oc_get_istag(&self, namespace: &str, tag: &str) -> ScanResult<String> {
    let output = Command::new("oc")
      .arg("--kubeconfig")
      .arg(&self.kubeconfig)
      .args(["--namespace", namespace, "get", "istag", tag, "-o", "json"])
      .output()?;

    if !output.status.success() {
      return Err(ScanError::message(format!(
        "oc get istag {} failed: {}",
        tag,
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }
    Ok(String::from_utf8(output.stdout)?)
  }
}

impl RhcosSource for OcRhcosSource {
  fn tagged_build_id(&self, version: &str, arch: &str, private: bool) -> Lookup<String> {
    let (namespace, name) = payload_imagestream(&self.config.namespace_base, version, arch, private);
    let tag = format!("{}:{}", name, self.config.container);

    match self.retry.run("oc get istag", || self.oc_get_istag(&namespace, &tag)) {
      Ok(stdout) => build_id_from_istag(&stdout),
      Err(e) => Lookup::Failed(e.to_string()),
    }
  }

  fn latest_build_id(&self, version: &str, arch: &str, private: bool) -> Lookup<String> {
    let path = self.builds_index_path(version, arch, private);
    match std::fs::read_to_string(&path) {
      Ok(content) => latest_from_index(&content),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Lookup::NotFound,
      Err(e) => Lookup::Failed(format!("{}: {}", path.display(), e)),
    }
  }
}

#[derive(Deserialize)]
struct IstagLabels {
  image: IstagImage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IstagImage {
  docker_image_metadata: DockerImageMetadata,
}

#[derive(Deserialize)]
struct DockerImageMetadata {
  #[serde(rename = "Config")]
  config: DockerConfig,
}

#[derive(Deserialize)]
struct DockerConfig {
  #[serde(rename = "Labels", default)]
  labels: std::collections::BTreeMap<String, String>,
}

/// `org.opencontainers.image.version`, falling back to `version`
pub fn build_id_from_istag(json: &str) -> Lookup<String> {
  let parsed: IstagLabels = match serde_json::from_str(json) {
    Ok(parsed) => parsed,
    Err(e) => return Lookup::Failed(format!("no image labels in istag: {}", e)),
  };
  let labels = parsed.image.docker_image_metadata.config.labels;

  labels
    .get("org.opencontainers.image.version")
    .filter(|v| !v.is_empty())
    .or_else(|| labels.get("version"))
    .filter(|v| !v.is_empty())
    .map(|v| Lookup::Found(v.clone()))
    .unwrap_or(Lookup::NotFound)
}

#[derive(Deserialize)]
struct BuildsIndex {
  builds: Vec<IndexEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexEntry {
  Id(String),
  Build { id: String },
}

/// First build of a builds index (`{"builds": [...]}`, newest first)
pub fn latest_from_index(json: &str) -> Lookup<String> {
  match serde_json::from_str::<BuildsIndex>(json) {
    Ok(index) => match index.builds.into_iter().next() {
      Some(IndexEntry::Id(id)) | Some(IndexEntry::Build { id }) => Lookup::Found(id),
      None => Lookup::NotFound,
    },
    Err(e) => Lookup::Failed(format!("malformed builds index: {}", e)),
  }
}
