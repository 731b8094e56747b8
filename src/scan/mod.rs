//! The scan: decide which components need a rebuild and why
//!
//! Phases, in order:
//! 1. optional reconciliation of private mirrors (parallel, failures become issues)
//! 2. per-component rebuild decisions (parallel, joined before anything is recorded)
//! 3. propagation of changes to descendants (sequential)
//! 4. optional dependency-age and config-digest checks, propagated the same way
//! 5. builder fixed point, RHCOS status, report
//!
//! Only the calling thread writes to `ScanState`.

pub mod checks;
pub mod decision;
pub mod hint;
pub mod propagate;
pub mod reconcile;
pub mod report;
pub mod rhcos;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use crate::builds::BuildRecordStore;
use crate::catalog::{Component, ComponentKind};
use crate::core::context::ScanContext;
use crate::core::error::ScanResult;
use crate::source::UpstreamSourceResolver;
use crate::ui::progress::ScanProgress;
use checks::ImageChecks;
use chrono::{DateTime, Utc};
use decision::RebuildDecisionEngine;
use hint::RebuildHint;
use propagate::ChangePropagator;
use rayon::prelude::*;
use reconcile::{ReconcileJob, ReconcileOutcome, Reconciler};
use report::Report;
use rhcos::RhcosSource;
use state::ScanState;

/// Per-run switches that do not belong in scan.toml
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
  /// Reconcile public upstreams into private mirrors before scanning
  pub rebase_priv: bool,
  /// Log reconciliation instead of merging and pushing
  pub dry_run: bool,
  /// Show progress bars on stderr
  pub progress: bool,
}

pub struct Scanner<'a> {
  ctx: &'a ScanContext,
  store: &'a dyn BuildRecordStore,
  resolver: &'a dyn UpstreamSourceResolver,
  rhcos: Option<&'a dyn RhcosSource>,
  now: DateTime<Utc>,
}

impl<'a> Scanner<'a> {
  pub fn new(ctx: &'a ScanContext, store: &'a dyn BuildRecordStore, resolver: &'a dyn UpstreamSourceResolver) -> Self {
    Self {
      ctx,
      store,
      resolver,
      rhcos: None,
      now: Utc::now(),
    }
  }

  pub fn with_rhcos(mut self, rhcos: &'a dyn RhcosSource) -> Self {
    self.rhcos = Some(rhcos);
    self
  }

  /// Clock used for cooldown decisions
  pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
    self.now = now;
    self
  }

  pub fn run(&self, request: &ScanRequest) -> ScanResult<Report> {
    let config = &self.ctx.config;
    let catalog = &self.ctx.catalog;
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(config.scan.concurrency)
      .build()?;
    let mut state = ScanState::new();

    if request.rebase_priv {
      self.rebase_into_priv(&pool, request, &mut state);
    }

    let propagator = ChangePropagator::new(catalog);

    let hints = self.evaluate_all(&pool, request)?;
    propagator.propagate(&mut state, hints)?;

    if config.scan.check_dependents || config.scan.check_config_changes {
      let hints = self.check_images(&pool, &state)?;
      propagator.propagate(&mut state, hints)?;
    }

    let rhcos = self.rhcos.map(|source| match config.group.minor_version() {
      Some(version) => rhcos::detect_rhcos_status(source, version, &config.group.arches),
      None => {
        tracing::warn!(group = %config.group.name, "no minor version in group name: skipping RHCOS status");
        Vec::new()
      }
    });

    tracing::info!(changing = state.changing_count(), issues = state.issues().len(), "scan complete");
    Ok(Report::from_state(&state, catalog, rhcos))
  }

  /// Rebuild decision for every component, joined before returning
  fn evaluate_all(
    &self,
    pool: &rayon::ThreadPool,
    request: &ScanRequest,
  ) -> ScanResult<Vec<(&'a Component, RebuildHint)>> {
    let config = &self.ctx.config;
    let engine = RebuildDecisionEngine::new(self.store, self.resolver, &config.group, self.now);
    let components: Vec<&'a Component> = self.ctx.catalog.all_components().collect();
    let progress = ScanProgress::new(request.progress, components.len(), "Evaluating components");

    let results: Vec<ScanResult<(&'a Component, RebuildHint)>> = pool.install(|| {
      components
        .par_iter()
        .map(|component| {
          let hint = engine.evaluate_component(component);
          progress.inc();
          hint.map(|hint| (*component, hint))
        })
        .collect()
    });

    results.into_iter().collect()
  }

  /// Dependency-age and config-digest checks for images not already changing
  fn check_images(
    &self,
    pool: &rayon::ThreadPool,
    state: &ScanState,
  ) -> ScanResult<Vec<(&'a Component, RebuildHint)>> {
    let config = &self.ctx.config;
    let checks = ImageChecks::new(self.store, &self.ctx.catalog, &config.group);
    let candidates: Vec<&'a Component> = self
      .ctx
      .catalog
      .all_components()
      .filter(|c| c.kind == ComponentKind::Image && !state.is_changing(&c.qualified_key()))
      .collect();

    let results: Vec<ScanResult<Option<(&'a Component, RebuildHint)>>> = pool.install(|| {
      candidates
        .par_iter()
        .map(|component| {
          let Some(build) = checks.latest_build(&component.key)? else {
            return Ok(None);
          };
          if config.scan.check_dependents
            && let Some(hint) = checks.dependency_newer(component, &build)?
          {
            return Ok(Some((*component, hint)));
          }
          if config.scan.check_config_changes
            && let Some(hint) = checks.config_changed(component, &build)
          {
            return Ok(Some((*component, hint)));
          }
          Ok(None)
        })
        .collect()
    });

    let mut hints = Vec::new();
    for result in results {
      hints.extend(result?);
    }
    Ok(hints)
  }

  fn rebase_into_priv(&self, pool: &rayon::ThreadPool, request: &ScanRequest, state: &mut ScanState) {
    let config = &self.ctx.config;
    tracing::info!("rebasing public upstream contents into private mirrors");

    let jobs: Vec<ReconcileJob> = self
      .ctx
      .catalog
      .all_components()
      .filter_map(|c| ReconcileJob::plan(c, &config.group))
      .collect();

    let reconciler = Reconciler::new(
      &config.scan.workdir,
      request.dry_run,
      config.scan.retry.ls_remote(),
      config.scan.retry.push(),
    );

    for (key, outcome) in reconciler.reconcile_all(pool, &jobs) {
      match outcome {
        ReconcileOutcome::Failed(issue) => state.add_issue(issue),
        other => tracing::debug!(component = %key, outcome = ?other, "reconciliation finished"),
      }
    }
  }
}
