use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::BuildTarget;
use crate::ensure;
use crate::error::EvalError;
use crate::label::BuildLabel;

#[derive(Debug, Default)]
struct PackageInner {
  targets: BTreeMap<String, Arc<BuildTarget>>,
  outputs: HashMap<String, BuildLabel>,
  subincludes: Vec<BuildLabel>,
  modified: BTreeSet<BuildLabel>,
}

/// One build file's worth of targets.
#[derive(Debug)]
pub struct Package {
  pub name: String,
  /// Path of the build file, relative to the repository root.
  pub filename: String,
  inner: Mutex<PackageInner>,
}

impl Package {
  pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      filename: filename.into(),
      inner: Mutex::new(PackageInner::default()),
    }
  }

  pub fn target(&self, name: &str) -> Option<Arc<BuildTarget>> {
    self.inner.lock().targets.get(name).cloned()
  }

  pub fn add_target(&self, target: Arc<BuildTarget>) {
    self.inner.lock().targets.insert(target.label.name.clone(), target);
  }

  pub fn num_targets(&self) -> usize {
    self.inner.lock().targets.len()
  }

  pub fn all_targets(&self) -> Vec<Arc<BuildTarget>> {
    self.inner.lock().targets.values().cloned().collect()
  }

  /// Record that a target changed after the package finished parsing.
  pub fn mark_target_modified(&self, target: &BuildTarget) {
    self.inner.lock().modified.insert(target.label.clone());
  }

  pub fn modified_targets(&self) -> Vec<BuildLabel> {
    self.inner.lock().modified.iter().cloned().collect()
  }

  /// Claim `output` for `target`; two different targets may not produce the same file.
  pub fn must_register_output(&self, output: &str, target: &BuildTarget) -> Result<(), EvalError> {
    let mut inner = self.inner.lock();
    if let Some(owner) = inner.outputs.get(output) {
      ensure!(
        *owner == target.label,
        "Duplicate output file {}; generated by both {} and {}",
        output,
        owner,
        target.label
      );
      return Ok(());
    }
    inner.outputs.insert(output.to_string(), target.label.clone());
    Ok(())
  }

  /// Drop every output claim held by `label`.
  pub fn release_outputs(&self, label: &BuildLabel) {
    self.inner.lock().outputs.retain(|_, owner| owner != label);
  }

  pub fn register_subinclude(&self, label: BuildLabel) {
    let mut inner = self.inner.lock();
    if !inner.subincludes.contains(&label) {
      inner.subincludes.push(label);
    }
  }

  pub fn subincludes(&self) -> Vec<BuildLabel> {
    self.inner.lock().subincludes.clone()
  }
}
