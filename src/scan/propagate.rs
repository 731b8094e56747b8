//! Change propagation through the component graph
//!
//! Two mechanisms:
//! - ancestor push: marking a component marks its precomputed descendants in the same step
//! - builder fixed point: components built with a changing builder image are marked, pass
//!   after pass, until a full pass adds nothing

use super::hint::{RebuildHint, RebuildHintCode};
use super::state::ScanState;
use crate::catalog::{Component, ComponentKind, MetadataCatalog};
use crate::core::error::{ScanError, ScanResult};

pub struct ChangePropagator<'a> {
  catalog: &'a MetadataCatalog,
  /// Upper bound on builder passes; each productive pass marks at least one component
  max_passes: usize,
}

impl<'a> ChangePropagator<'a> {
  pub fn new(catalog: &'a MetadataCatalog) -> Self {
    Self {
      catalog,
      max_passes: catalog.len() + 1,
    }
  }

  /// Mark every seed that needs a rebuild, then close over builder edges
  pub fn propagate<'c>(
    &self,
    state: &mut ScanState,
    seeds: impl IntoIterator<Item = (&'c Component, RebuildHint)>,
  ) -> ScanResult<()> {
    for (component, hint) in seeds {
      if hint.rebuild() {
        self.mark(state, component, &hint)?;
      }
    }
    self.propagate_builders(state)?;
    Ok(())
  }

  /// Mark a component as changing, along with all of its descendants
  pub fn mark(&self, state: &mut ScanState, component: &Component, hint: &RebuildHint) -> ScanResult<()> {
    ensure_known_kind(component)?;

    let key = component.qualified_key();
    if state.mark_changing(&key) {
      tracing::info!(component = %component.key, code = %hint.code, reason = %hint.reason, "marked changing");
    }
    state.add_reason(&key, hint);

    let ancestor_hint = RebuildHint::new(
      RebuildHintCode::AncestorChanging,
      format!("Ancestor {} is changing", component.key),
    );
    for descendant in self.catalog.descendants(&component.key) {
      ensure_known_kind(descendant)?;
      let descendant_key = descendant.qualified_key();
      state.mark_changing(&descendant_key);
      state.add_reason(&descendant_key, &ancestor_hint);
    }

    Ok(())
  }

  /// Mark components whose builder member is changing, until nothing new gets marked.
  ///
  /// Returns the number of passes made.
  pub fn propagate_builders(&self, state: &mut ScanState) -> ScanResult<usize> {
    let mut passes = 0;
    loop {
      passes += 1;
      let before = state.changing_count();

      for component in self.catalog.all_components() {
        if state.is_changing(&component.qualified_key()) {
          continue;
        }

        let changing_builder = component.builder_members.iter().find(|member| {
          self
            .catalog
            .get(member)
            .is_some_and(|builder| state.is_changing(&builder.qualified_key()))
        });

        if let Some(member) = changing_builder {
          tracing::info!(component = %component.key, builder = %member, "builder member is changing");
          let hint = RebuildHint::new(
            RebuildHintCode::BuilderChanging,
            format!("Builder group member has changed: {}", member),
          );
          self.mark(state, component, &hint)?;
        }
      }

      let after = state.changing_count();
      if after < before {
        return Err(ScanError::invariant("changing set shrank during builder propagation"));
      }
      if after == before {
        return Ok(passes);
      }
      if passes >= self.max_passes {
        return Err(ScanError::invariant(format!(
          "builder propagation did not converge after {} passes",
          passes
        )));
      }
    }
  }
}

fn ensure_known_kind(component: &Component) -> ScanResult<()> {
  match &component.kind {
    ComponentKind::Image | ComponentKind::Rpm => Ok(()),
    ComponentKind::Unknown(kind) => Err(ScanError::invariant(format!(
      "Unsupported component kind '{}' for {}",
      kind, component.key
    ))),
  }
}
