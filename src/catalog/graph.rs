//! Component dependency graph built on petgraph
//!
//! ## Graph Structure
//!
//! - **Directed Graph**: `A → B` means "A depends on B"
//! - **Nodes**: distgit keys of catalog components
//! - **Edges**: `Dependency` (declared), `Base` (runtime parent), `Builder` (build-time only)
//!
//! Descendants follow `Dependency` and `Base` edges only. Builder edges are resolved by
//! the builder fixed-point pass during propagation, after the changing set is known.

use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Why one component points at another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
  Dependency,
  Base,
  Builder,
}

impl EdgeKind {
  fn is_runtime(self) -> bool {
    matches!(self, EdgeKind::Dependency | EdgeKind::Base)
  }
}

/// Dependency graph over catalog components.
pub struct ComponentGraph {
  graph: DiGraph<String, EdgeKind>,
  index: HashMap<String, NodeIndex>,
}

impl ComponentGraph {
  /// Create a graph with one node per key
  pub fn new<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();
    for key in keys {
      let idx = graph.add_node(key.to_string());
      index.insert(key.to_string(), idx);
    }
    Self { graph, index }
  }

  /// Add `from → to`. Returns false when either end is not a known component.
  pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> bool {
    match (self.index.get(from), self.index.get(to)) {
      (Some(&a), Some(&b)) => {
        self.graph.update_edge(a, b, kind);
        true
      }
      _ => false,
    }
  }

  /// All components that transitively depend on `key` at runtime (excluding `key`).
  ///
  /// DFS over incoming runtime edges; the visited set makes cycles harmless.
  pub fn transitive_dependents(&self, key: &str) -> BTreeSet<String> {
    let Some(&start) = self.index.get(key) else {
      return BTreeSet::new();
    };

    let mut visited = HashSet::new();
    let mut stack = vec![start];
    let mut dependents = BTreeSet::new();

    while let Some(node_idx) = stack.pop() {
      if !visited.insert(node_idx) {
        continue;
      }

      for edge in self.graph.edges_directed(node_idx, Direction::Incoming) {
        if !edge.weight().is_runtime() {
          continue;
        }
        let neighbor = edge.source();
        if neighbor != start {
          dependents.insert(self.graph[neighbor].clone());
        }
        stack.push(neighbor);
      }
    }

    dependents
  }

  /// Direct dependents of `key` over edges of the given kind
  pub fn direct_dependents(&self, key: &str, kind: EdgeKind) -> BTreeSet<String> {
    let Some(&idx) = self.index.get(key) else {
      return BTreeSet::new();
    };
    self
      .graph
      .edges_directed(idx, Direction::Incoming)
      .filter(|edge| *edge.weight() == kind)
      .map(|edge| self.graph[edge.source()].clone())
      .collect()
  }

  /// Dependency cycles (strongly connected components with more than one node, or self-loops)
  pub fn find_cycles(&self) -> Vec<Vec<String>> {
    algo::tarjan_scc(&self.graph)
      .into_iter()
      .filter(|component| {
        component.len() > 1 || component.first().is_some_and(|&n| self.graph.contains_edge(n, n))
      })
      .map(|component| {
        let mut names: Vec<String> = component.into_iter().map(|idx| self.graph[idx].clone()).collect();
        names.sort();
        names
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn graph(edges: &[(&str, &str, EdgeKind)]) -> ComponentGraph {
    let mut keys: Vec<&str> = edges.iter().flat_map(|(a, b, _)| [*a, *b]).collect();
    keys.sort();
    keys.dedup();
    let mut g = ComponentGraph::new(keys);
    for (a, b, kind) in edges {
      assert!(g.add_edge(a, b, *kind));
    }
    g
  }

  #[test]
  fn test_transitive_dependents() {
    // installer -> cli -> base
    let g = graph(&[
      ("cli", "base", EdgeKind::Base),
      ("installer", "cli", EdgeKind::Dependency),
    ]);
    let deps = g.transitive_dependents("base");
    assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["cli", "installer"]);
    assert!(g.transitive_dependents("installer").is_empty());
  }

  #[test]
  fn test_builder_edges_are_not_descendants() {
    let g = graph(&[("cli", "golang-builder", EdgeKind::Builder)]);
    assert!(g.transitive_dependents("golang-builder").is_empty());
    assert_eq!(
      g.direct_dependents("golang-builder", EdgeKind::Builder).into_iter().collect::<Vec<_>>(),
      vec!["cli"]
    );
  }

  #[test]
  fn test_cycles_terminate_and_are_reported() {
    let g = graph(&[("a", "b", EdgeKind::Dependency), ("b", "a", EdgeKind::Dependency)]);
    assert_eq!(g.transitive_dependents("a").into_iter().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(g.find_cycles(), vec![vec!["a".to_string(), "b".to_string()]]);
  }

  #[test]
  fn test_unknown_edge_end_rejected() {
    let mut g = ComponentGraph::new(["a"]);
    assert!(!g.add_edge("a", "missing", EdgeKind::Dependency));
    assert!(g.transitive_dependents("missing").is_empty());
  }
}
