use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::interp::Function;
use crate::label::BuildLabel;

/// Lifecycle of a target, in order. Anything at or past `Built` is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TargetState {
  #[default]
  Inactive,
  Active,
  Pending,
  Ready,
  Building,
  Built,
  Cached,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
  pub label: BuildLabel,
  pub exported: bool,
}

/// Everything a build file can declare about a target.
#[derive(Debug, Default)]
pub struct TargetData {
  pub state: TargetState,
  pub command: String,
  pub commands: BTreeMap<String, String>,
  pub test_command: String,
  pub test_commands: BTreeMap<String, String>,
  pub sources: Vec<String>,
  pub data: Vec<String>,
  pub tools: Vec<String>,
  pub outputs: Vec<String>,
  pub named_outputs: BTreeMap<String, Vec<String>>,
  pub optional_outputs: Vec<String>,
  pub test_outputs: Vec<String>,
  pub dependencies: Vec<Dependency>,
  pub labels: Vec<String>,
  pub licences: Vec<String>,
  pub visibility: Vec<String>,
  pub hashes: Vec<String>,
  pub secrets: Vec<String>,
  pub requires: Vec<String>,
  pub provides: BTreeMap<String, BuildLabel>,
  pub building_description: String,
  pub is_binary: bool,
  pub is_test: bool,
  pub test_only: bool,
  pub needs_transitive_deps: bool,
  pub output_is_complete: bool,
  pub container: bool,
  pub sandbox: bool,
  pub test_sandbox: bool,
  pub no_test_output: bool,
  pub stamp: bool,
  pub show_progress: bool,
  pub flakiness: i64,
  pub build_timeout: i64,
  pub test_timeout: i64,
  pub pre_build: Option<Arc<Function>>,
  pub post_build: Option<Arc<Function>>,
  pub added_post_build: bool,
}

/// A declared build target.
///
/// Targets are shared between the package that declared them and the graph,
/// so all mutable state sits behind a lock.
#[derive(Debug)]
pub struct BuildTarget {
  pub label: BuildLabel,
  out_root: PathBuf,
  data: Mutex<TargetData>,
}

impl BuildTarget {
  pub fn new(label: BuildLabel, out_root: impl Into<PathBuf>) -> Self {
    Self {
      label,
      out_root: out_root.into(),
      data: Mutex::new(TargetData::default()),
    }
  }

  /// Lock the target's data for reading or writing.
  pub fn data(&self) -> MutexGuard<'_, TargetData> {
    self.data.lock()
  }

  pub fn state(&self) -> TargetState {
    self.data.lock().state
  }

  pub fn set_state(&self, state: TargetState) {
    self.data.lock().state = state;
  }

  pub fn is_built(&self) -> bool {
    self.state() >= TargetState::Built
  }

  /// Directory the target's outputs are written to.
  pub fn out_dir(&self) -> PathBuf {
    self.out_root.join("gen").join(&self.label.package_name)
  }

  /// All outputs, plain ones first and then named ones in name order.
  pub fn outputs(&self) -> Vec<String> {
    let data = self.data.lock();
    let mut outs = data.outputs.clone();
    for named in data.named_outputs.values() {
      outs.extend(named.iter().cloned());
    }
    outs
  }

  pub fn add_output(&self, output: &str) {
    let mut data = self.data.lock();
    if !data.outputs.iter().any(|o| o == output) {
      data.outputs.push(output.to_string());
    }
  }

  pub fn add_named_output(&self, name: &str, output: &str) {
    let mut data = self.data.lock();
    let outs = data.named_outputs.entry(name.to_string()).or_default();
    if !outs.iter().any(|o| o == output) {
      outs.push(output.to_string());
    }
  }

  pub fn dependency_labels(&self) -> Vec<BuildLabel> {
    self.data.lock().dependencies.iter().map(|d| d.label.clone()).collect()
  }

  /// Add a dependency; a repeated dependency only upgrades its exported flag.
  pub fn add_maybe_exported_dependency(&self, label: BuildLabel, exported: bool) {
    let mut data = self.data.lock();
    match data.dependencies.iter_mut().find(|d| d.label == label) {
      Some(dep) => dep.exported |= exported,
      None => data.dependencies.push(Dependency { label, exported }),
    }
  }

  pub fn labels(&self) -> Vec<String> {
    self.data.lock().labels.clone()
  }

  pub fn add_licence(&self, licence: &str) {
    let mut data = self.data.lock();
    if !data.licences.iter().any(|l| l == licence) {
      data.licences.push(licence.to_string());
    }
  }

  pub fn output_is_complete(&self) -> bool {
    self.data.lock().output_is_complete
  }

  /// The command for a build configuration, falling back to the default command.
  pub fn command_for_config(&self, config: &str) -> String {
    let data = self.data.lock();
    if config.is_empty() {
      return data.command.clone();
    }
    data
      .commands
      .get(config)
      .cloned()
      .unwrap_or_else(|| data.command.clone())
  }

  pub fn set_command(&self, command: &str) {
    self.data.lock().command = command.to_string();
  }

  pub fn add_command(&self, config: &str, command: &str) {
    self
      .data
      .lock()
      .commands
      .insert(config.to_string(), command.to_string());
  }

  pub fn post_build_function(&self) -> Option<Arc<Function>> {
    self.data.lock().post_build.clone()
  }

  pub fn pre_build_function(&self) -> Option<Arc<Function>> {
    self.data.lock().pre_build.clone()
  }
}
