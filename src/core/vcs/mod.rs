pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

/// Convert a git remote URL to its https form
///
/// `git@github.com:org/repo.git` and `https://github.com/org/repo.git` both become
/// `https://github.com/org/repo`. Local paths and other schemes pass through unchanged.
pub fn convert_remote_to_https(url: &str) -> String {
  let trimmed = url.trim_end_matches('/');
  let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

  if let Some(rest) = trimmed.strip_prefix("git@")
    && let Some((host, path)) = rest.split_once(':')
  {
    return format!("https://{}/{}", host, path);
  }

  if let Some(rest) = trimmed.strip_prefix("ssh://") {
    let rest = rest.split_once('@').map(|(_, r)| r).unwrap_or(rest);
    let (host, path) = match rest.split_once('/') {
      Some((host, path)) => (host, format!("/{}", path)),
      None => (rest, String::new()),
    };
    // The ssh port means nothing over https
    let host = match host.rsplit_once(':') {
      Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
      _ => host,
    };
    return format!("https://{}{}", host, path);
  }

  if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
    return trimmed.to_string();
  }

  url.to_string()
}

/// Last path segment of a remote URL, without `.git`
pub fn repo_name(url: &str) -> &str {
  let trimmed = url.trim_end_matches('/');
  let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
  trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed)
}

/// Whether a branch name is really a full commit SHA
pub fn is_commit_sha(name: &str) -> bool {
  name.len() == 40 && name.chars().all(|c| c.is_ascii_hexdigit())
}
