//! Builtins that inspect or change targets after they have been declared,
//! mostly from pre- and post-build callbacks.
//!
//! Targets may only be changed until they are built. Changes made from a
//! callback must reach the graph straight away: the package's end-of-parse
//! registration has already happened by then.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, error};

use super::Registry;
use crate::ensure;
use crate::error::{EvalError, Flow};
use crate::graph::{BuildTarget, Graph, TargetState};
use crate::interp::{Params, Scope};
use crate::label::{BuildLabel, looks_like_build_label};
use crate::value::Value;

pub(super) fn register(registry: &mut Registry) {
  registry.native(
    "add_dep",
    Params::builder()
      .required("target", &["str"])
      .required("dep", &["str"])
      .optional("exported", Value::Bool(false), &["bool"])
      .build(),
    add_dep,
  );
  registry.native(
    "add_out",
    Params::builder()
      .required("target", &["str"])
      .required("name", &["str"])
      .optional("out", Value::from(""), &["str"])
      .build(),
    add_out,
  );
  registry.native(
    "add_licence",
    Params::builder()
      .required("target", &["str"])
      .required("licence", &["str"])
      .build(),
    add_licence,
  );
  registry.native(
    "get_command",
    Params::builder()
      .required("target", &["str"])
      .optional("config", Value::from(""), &["str"])
      .build(),
    get_command,
  );
  registry.native(
    "set_command",
    Params::builder()
      .required("target", &["str"])
      .required("config", &["str"])
      .optional("command", Value::from(""), &["str"])
      .build(),
    set_command,
  );
  registry.native(
    "get_labels",
    Params::builder()
      .required("target", &["str"])
      .required("prefix", &["str"])
      .build(),
    get_labels,
  );
}

/// A target of the current package that can still be modified.
fn get_target_post(scope: &Scope<'_>, name: &str) -> Result<Arc<BuildTarget>, EvalError> {
  let pkg = scope.require_package()?;
  let target = pkg
    .target(name)
    .ok_or_else(|| EvalError::assertion(format!("Unknown build target {} in {}", name, pkg.name)))?;
  ensure!(
    target.state() < TargetState::Built,
    "Attempted to modify target {}, but it's already built",
    target.label
  );
  Ok(target)
}

fn add_dep(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  ensure!(
    scope.is_callback(),
    "add_dep can only be called from a pre- or post-build callback"
  );
  let target = get_target_post(scope, args[0].expect_str("target")?)?;
  let pkg = scope.require_package()?;
  let dep = BuildLabel::parse(args[1].expect_str("dep")?, &pkg.name)?;
  let exported = args[2].is_truthy();

  // The graph rejects cycles, so it goes first and the target only changes once the edge exists.
  scope.interp().graph().add_dependency(&target.label, &dep)?;
  target.add_maybe_exported_dependency(dep.clone(), exported);
  pkg.mark_target_modified(&target);
  debug!(label = %target.label, %dep, exported, "added dependency from callback");
  Ok(Value::None)
}

fn add_out(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let target = get_target_post(scope, args[0].expect_str("target")?)?;
  let name = args[1].expect_str("name")?;
  let out = args[2].str_or_empty("out")?;
  let pkg = scope.require_package()?;
  if out.is_empty() {
    target.add_output(name);
    pkg.must_register_output(name, &target)?;
  } else {
    target.add_named_output(name, out);
    pkg.must_register_output(out, &target)?;
  }
  Ok(Value::None)
}

fn add_licence(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let target = get_target_post(scope, args[0].expect_str("target")?)?;
  target.add_licence(args[1].expect_str("licence")?);
  Ok(Value::None)
}

fn get_command(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let target = get_target_post(scope, args[0].expect_str("target")?)?;
  Ok(Value::Str(target.command_for_config(args[1].str_or_empty("config")?)))
}

/// `set_command(name, cmd)` sets the default command;
/// `set_command(name, config, cmd)` sets the command for one configuration.
fn set_command(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let target = get_target_post(scope, args[0].expect_str("target")?)?;
  let config = args[1].expect_str("config")?;
  let command = args[2].str_or_empty("command")?;
  if command.is_empty() {
    target.set_command(config);
  } else {
    target.add_command(config, command);
  }
  Ok(Value::None)
}

fn get_labels(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let name = args[0].expect_str("target")?;
  let prefix = args[1].expect_str("prefix")?;
  let graph = scope.interp().graph().clone();
  let (target, min_state) = if looks_like_build_label(name) {
    let pkg_name = scope.package().map(|pkg| pkg.name.as_str()).unwrap_or_default();
    let label = BuildLabel::parse(name, pkg_name)?;
    (graph.target_or_die(&label)?, TargetState::Built)
  } else {
    (get_target_post(scope, name)?, TargetState::Building)
  };

  if target.state() < min_state {
    error!(label = %target.label, state = ?target.state(), "get_labels called on an unbuilt target");
    let msg = format!("get_labels called on a target that is not yet built: {}", target.label);
    return Err(EvalError::Fatal(msg).into());
  }
  Ok(Value::str_list(transitive_labels(&graph, &target, prefix)))
}

/// Labels starting with `prefix` on `root` and its dependencies, prefix removed.
///
/// Dependencies of a target with complete output are not visited, except for
/// the root's own.
fn transitive_labels(graph: &Graph, root: &Arc<BuildTarget>, prefix: &str) -> BTreeSet<String> {
  let mut labels = BTreeSet::new();
  let mut visited = HashSet::new();
  let mut stack = vec![root.clone()];

  while let Some(target) = stack.pop() {
    if !visited.insert(target.label.clone()) {
      continue;
    }
    for label in target.labels() {
      if let Some(stripped) = label.strip_prefix(prefix) {
        labels.insert(stripped.trim().to_string());
      }
    }
    if target.label == root.label || !target.output_is_complete() {
      stack.extend(
        target
          .dependency_labels()
          .iter()
          .rev()
          .filter(|dep| !visited.contains(*dep))
          .filter_map(|dep| graph.target(dep)),
      );
    }
  }
  labels
}
