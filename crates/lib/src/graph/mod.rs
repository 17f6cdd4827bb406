//! The build graph and the packages and targets it holds.
//!
//! The graph is the only state shared between concurrently parsing packages,
//! so every method takes `&self` and does its own locking. Dependency edges
//! live in a `petgraph` DAG; an edge that would close a cycle is rejected when
//! it is added rather than discovered later.
//!
//! # Submodules
//!
//! - [`package`] - per-build-file target registry and output ownership
//! - [`target`] - declared targets and their lifecycle state

mod package;
mod target;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use thiserror::Error;
use tracing::trace;

use crate::error::EvalError;
use crate::label::BuildLabel;

pub use package::Package;
pub use target::{BuildTarget, Dependency, TargetData, TargetState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate build target {0}")]
  DuplicateTarget(BuildLabel),

  #[error("duplicate package {0}")]
  DuplicatePackage(String),

  #[error("dependency from {from} on {to} would create a cycle")]
  Cycle { from: BuildLabel, to: BuildLabel },
}

#[derive(Default)]
struct GraphInner {
  packages: HashMap<String, Arc<Package>>,
  targets: HashMap<BuildLabel, Arc<BuildTarget>>,
  /// Edges point from a dependency to its dependent.
  edges: DiGraph<BuildLabel, ()>,
  nodes: HashMap<BuildLabel, NodeIndex>,
}

impl GraphInner {
  fn node(&mut self, label: &BuildLabel) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(label) {
      return idx;
    }
    let idx = self.edges.add_node(label.clone());
    self.nodes.insert(label.clone(), idx);
    idx
  }

  /// Add the edge `from -> to`, returning it if it is new.
  fn link(&mut self, from: &BuildLabel, to: &BuildLabel) -> Result<Option<EdgeIndex>, GraphError> {
    let dependent = self.node(from);
    let dependency = self.node(to);
    if self.edges.find_edge(dependency, dependent).is_some() {
      return Ok(None);
    }
    if has_path_connecting(&self.edges, dependent, dependency, None) {
      return Err(GraphError::Cycle {
        from: from.clone(),
        to: to.clone(),
      });
    }
    trace!(%from, %to, "added dependency edge");
    Ok(Some(self.edges.add_edge(dependency, dependent, ())))
  }

  /// Insert `targets` and all their dependency edges, or nothing at all.
  fn insert_targets(&mut self, targets: &[Arc<BuildTarget>]) -> Result<(), GraphError> {
    for target in targets {
      if self.targets.contains_key(&target.label) {
        return Err(GraphError::DuplicateTarget(target.label.clone()));
      }
    }

    let mut added = Vec::new();
    for target in targets {
      for dep in target.dependency_labels() {
        match self.link(&target.label, &dep) {
          Ok(edge) => added.extend(edge),
          Err(err) => {
            // Newest first, so each removed edge is the last index and no other moves.
            for edge in added.into_iter().rev() {
              self.edges.remove_edge(edge);
            }
            return Err(err);
          }
        }
      }
    }

    for target in targets {
      self.node(&target.label);
      trace!(label = %target.label, "added target to graph");
      self.targets.insert(target.label.clone(), target.clone());
    }
    Ok(())
  }
}

/// All packages and targets known to this run.
#[derive(Default)]
pub struct Graph {
  inner: RwLock<GraphInner>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn package(&self, name: &str) -> Option<Arc<Package>> {
    self.inner.read().packages.get(name).cloned()
  }

  /// Register a parsed package together with its targets and their edges.
  ///
  /// Either everything is added or, on error, the graph is left as it was.
  pub fn add_package(&self, package: Arc<Package>) -> Result<(), GraphError> {
    let mut inner = self.inner.write();
    if inner.packages.contains_key(&package.name) {
      return Err(GraphError::DuplicatePackage(package.name.clone()));
    }
    inner.insert_targets(&package.all_targets())?;
    inner.packages.insert(package.name.clone(), package);
    Ok(())
  }

  /// The named package, created and registered by `create` if it does not exist yet.
  pub fn package_or_insert_with(&self, name: &str, create: impl FnOnce() -> Package) -> Arc<Package> {
    let mut inner = self.inner.write();
    inner
      .packages
      .entry(name.to_string())
      .or_insert_with(|| Arc::new(create()))
      .clone()
  }

  pub fn target(&self, label: &BuildLabel) -> Option<Arc<BuildTarget>> {
    self.inner.read().targets.get(label).cloned()
  }

  /// The target for `label`; its absence means the graph is inconsistent.
  pub fn target_or_die(&self, label: &BuildLabel) -> Result<Arc<BuildTarget>, EvalError> {
    self
      .target(label)
      .ok_or_else(|| EvalError::Fatal(format!("Target {} not found in build graph", label)))
  }

  /// Add a target and the edges to everything it depends on, or nothing on error.
  pub fn add_target(&self, target: Arc<BuildTarget>) -> Result<(), GraphError> {
    self.inner.write().insert_targets(&[target])
  }

  /// Record that `from` depends on `to`. Either side may not be declared yet.
  pub fn add_dependency(&self, from: &BuildLabel, to: &BuildLabel) -> Result<(), GraphError> {
    self.inner.write().link(from, to).map(|_| ())
  }

  /// Labels `label` depends on, as recorded by [`Graph::add_dependency`].
  pub fn dependencies_of(&self, label: &BuildLabel) -> Vec<BuildLabel> {
    let inner = self.inner.read();
    let Some(&idx) = inner.nodes.get(label) else {
      return Vec::new();
    };
    let mut labels: Vec<BuildLabel> = inner
      .edges
      .neighbors_directed(idx, Direction::Incoming)
      .map(|n| inner.edges[n].clone())
      .collect();
    labels.sort();
    labels
  }

  pub fn num_targets(&self) -> usize {
    self.inner.read().targets.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn label(name: &str) -> BuildLabel {
    BuildLabel::new("pkg", name)
  }

  fn target(name: &str) -> Arc<BuildTarget> {
    Arc::new(BuildTarget::new(label(name), "weft-out"))
  }

  mod targets {
    use super::*;

    #[test]
    fn added_targets_are_found() {
      let graph = Graph::new();
      graph.add_target(target("a")).unwrap();
      assert!(graph.target(&label("a")).is_some());
      assert!(graph.target(&label("b")).is_none());
      assert_eq!(graph.num_targets(), 1);
    }

    #[test]
    fn duplicate_target_is_rejected() {
      let graph = Graph::new();
      graph.add_target(target("a")).unwrap();
      assert_eq!(
        graph.add_target(target("a")),
        Err(GraphError::DuplicateTarget(label("a")))
      );
    }

    #[test]
    fn target_or_die_is_fatal() {
      let graph = Graph::new();
      let err = graph.target_or_die(&label("missing")).unwrap_err();
      assert!(err.is_fatal());
    }
  }

  mod dependencies {
    use super::*;

    #[test]
    fn dependencies_are_sorted() {
      let graph = Graph::new();
      graph.add_dependency(&label("bin"), &label("util")).unwrap();
      graph.add_dependency(&label("bin"), &label("lib")).unwrap();

      assert_eq!(graph.dependencies_of(&label("bin")), vec![label("lib"), label("util")]);
      assert!(graph.dependencies_of(&label("lib")).is_empty());
    }

    #[test]
    fn repeated_edge_is_idempotent() {
      let graph = Graph::new();
      graph.add_dependency(&label("a"), &label("b")).unwrap();
      graph.add_dependency(&label("a"), &label("b")).unwrap();
      assert_eq!(graph.dependencies_of(&label("a")), vec![label("b")]);
    }

    #[test]
    fn cycle_is_rejected() {
      let graph = Graph::new();
      graph.add_dependency(&label("a"), &label("b")).unwrap();
      graph.add_dependency(&label("b"), &label("c")).unwrap();
      assert_eq!(
        graph.add_dependency(&label("c"), &label("a")),
        Err(GraphError::Cycle {
          from: label("c"),
          to: label("a"),
        })
      );
    }

    #[test]
    fn self_dependency_is_rejected() {
      let graph = Graph::new();
      assert!(graph.add_dependency(&label("a"), &label("a")).is_err());
    }
  }

  mod packages {
    use super::*;

    fn with_deps(name: &str, deps: &[&str]) -> Arc<BuildTarget> {
      let target = target(name);
      for dep in deps {
        target.add_maybe_exported_dependency(label(dep), false);
      }
      target
    }

    #[test]
    fn package_is_added_with_its_edges() {
      let graph = Graph::new();
      let pkg = Arc::new(Package::new("pkg", "pkg/BUILD"));
      pkg.add_target(with_deps("bin", &["lib"]));
      pkg.add_target(with_deps("lib", &[]));

      graph.add_package(pkg).unwrap();
      assert!(graph.package("pkg").is_some());
      assert_eq!(graph.num_targets(), 2);
      assert_eq!(graph.dependencies_of(&label("bin")), vec![label("lib")]);
    }

    #[test]
    fn cycle_rolls_back_the_whole_package() {
      let graph = Graph::new();
      graph.add_dependency(&label("x"), &label("c")).unwrap();
      let pkg = Arc::new(Package::new("pkg", "pkg/BUILD"));
      pkg.add_target(with_deps("a", &["b", "z"]));
      pkg.add_target(with_deps("c", &["x"]));

      assert_eq!(
        graph.add_package(pkg),
        Err(GraphError::Cycle {
          from: label("c"),
          to: label("x"),
        })
      );
      assert!(graph.package("pkg").is_none());
      assert_eq!(graph.num_targets(), 0);
      assert!(graph.dependencies_of(&label("a")).is_empty());
      assert_eq!(graph.dependencies_of(&label("x")), vec![label("c")]);
    }

    #[test]
    fn duplicate_target_rejects_the_package() {
      let graph = Graph::new();
      graph.add_target(target("a")).unwrap();
      let pkg = Arc::new(Package::new("pkg", "pkg/BUILD"));
      pkg.add_target(with_deps("a", &[]));
      pkg.add_target(with_deps("b", &[]));

      assert_eq!(graph.add_package(pkg), Err(GraphError::DuplicateTarget(label("a"))));
      assert!(graph.package("pkg").is_none());
      assert!(graph.target(&label("b")).is_none());
    }
  }

  #[test]
  fn package_or_insert_reuses_existing() {
    let graph = Graph::new();
    let first = graph.package_or_insert_with("_remote", || Package::new("_remote", ""));
    let second = graph.package_or_insert_with("_remote", || Package::new("_remote", "other"));
    assert!(Arc::ptr_eq(&first, &second));
  }
}
