//! `scan-sources scan`: decide what needs a rebuild and print the report

use crate::builds::JsonBuildStore;
use crate::core::context::ScanContext;
use crate::core::error::{ScanError, ScanResult};
use crate::scan::report::ReportFormat;
use crate::scan::rhcos::OcRhcosSource;
use crate::scan::{ScanRequest, Scanner};
use crate::source::GitSourceResolver;
use std::path::PathBuf;

/// Options of the scan command
#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
  pub format: ReportFormat,
  pub rebase_priv: bool,
  pub dry_run: bool,
  pub ci_kubeconfig: Option<PathBuf>,
  pub progress: bool,
}

/// Run the scan command
pub fn run_scan(ctx: &ScanContext, args: ScanArgs) -> ScanResult<()> {
  let config = &ctx.config;

  // Without build records there is nothing to compare against
  let store = JsonBuildStore::load(config.require_builds()?)?;
  let resolver = GitSourceResolver::new(config.scan.retry.ls_remote());

  if let Some(kubeconfig) = &args.ci_kubeconfig
    && !kubeconfig.is_file()
  {
    return Err(ScanError::with_help(
      format!("Kubeconfig not found: {}", kubeconfig.display()),
      "Pass the kubeconfig of the CI cluster that hosts the RHCOS imagestreams, or drop --ci-kubeconfig",
    ));
  }

  let rhcos = match (&args.ci_kubeconfig, &config.rhcos) {
    (Some(kubeconfig), Some(rhcos)) => Some(OcRhcosSource::new(
      kubeconfig.clone(),
      rhcos.clone(),
      config.scan.retry.ls_remote(),
    )),
    (Some(_), None) => {
      tracing::warn!("--ci-kubeconfig given but scan.toml has no [rhcos] section; skipping RHCOS status");
      None
    }
    _ => None,
  };

  let mut scanner = Scanner::new(ctx, &store, &resolver);
  if let Some(rhcos) = rhcos.as_ref() {
    scanner = scanner.with_rhcos(rhcos);
  }

  let request = ScanRequest {
    rebase_priv: args.rebase_priv,
    dry_run: args.dry_run,
    progress: args.progress,
  };
  let report = scanner.run(&request)?;

  print!("{}", report.render(args.format)?);
  Ok(())
}
