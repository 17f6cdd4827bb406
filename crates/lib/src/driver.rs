//! Reference package driver.
//!
//! The driver owns the parts of package evaluation that happen around the
//! builtins:
//!
//! - running a build file in a fresh package scope
//! - parking packages whose evaluation was deferred on an unbuilt subinclude,
//!   and re-running them from the start once that target is built
//! - registering a parsed package, its targets and their dependency edges with
//!   the graph in one batch
//! - running pre- and post-build callbacks in callback mode
//!
//! Fatal errors end the process once logged, unless the driver was built with
//! [`Driver::returning_fatal`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{EvalError, Signal};
use crate::graph::{BuildTarget, Package};
use crate::interp::{Function, Interpreter, Scope};
use crate::label::BuildLabel;
use crate::value::Value;

/// A parsed build file, ready to be evaluated statement by statement.
pub trait BuildFile: Send + Sync {
  /// Evaluate every statement of the file in `scope`.
  fn evaluate(&self, scope: &mut Scope<'_>) -> crate::error::Flow<()>;
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
  Parsed(Arc<Package>),
  /// Parked until the label is built.
  Deferred(BuildLabel),
}

impl ParseOutcome {
  pub fn package(&self) -> Option<&Arc<Package>> {
    match self {
      ParseOutcome::Parsed(pkg) => Some(pkg),
      ParseOutcome::Deferred(_) => None,
    }
  }
}

struct PendingParse {
  name: String,
  filename: String,
  file: Arc<dyn BuildFile>,
}

pub struct Driver {
  interp: Arc<Interpreter>,
  pending: Mutex<BTreeMap<BuildLabel, Vec<PendingParse>>>,
  exit_on_fatal: bool,
}

impl Driver {
  pub fn new(interp: Arc<Interpreter>) -> Self {
    Self {
      interp,
      pending: Mutex::new(BTreeMap::new()),
      exit_on_fatal: true,
    }
  }

  /// Return fatal errors to the caller instead of exiting.
  pub fn returning_fatal(mut self) -> Self {
    self.exit_on_fatal = false;
    self
  }

  pub fn interpreter(&self) -> &Arc<Interpreter> {
    &self.interp
  }

  /// Labels some package is currently waiting on.
  pub fn pending(&self) -> Vec<BuildLabel> {
    self.pending.lock().keys().cloned().collect()
  }

  /// Evaluate package `name` from `file`.
  ///
  /// Every attempt starts from an empty package, so nothing from a deferred
  /// attempt survives into the next one.
  pub fn parse_package(
    &self,
    name: &str,
    filename: &str,
    file: Arc<dyn BuildFile>,
  ) -> Result<ParseOutcome, EvalError> {
    loop {
      let pkg = Arc::new(Package::new(name, filename));
      let mut scope = Scope::for_package(&self.interp, pkg.clone());
      match file.evaluate(&mut scope) {
        Ok(()) => {
          self.register(&pkg).map_err(|err| self.fail(err, filename))?;
          return Ok(ParseOutcome::Parsed(pkg));
        }
        Err(Signal::Error(err)) => return Err(self.fail(err, filename)),
        Err(Signal::Defer(label)) => {
          let mut pending = self.pending.lock();
          // The label may have been built since the attempt looked at it.
          if self.interp.graph().target(&label).is_some_and(|t| t.is_built()) {
            debug!(package = name, %label, "subinclude became available, re-parsing");
            continue;
          }
          debug!(package = name, %label, "deferring package until subinclude is built");
          pending.entry(label.clone()).or_default().push(PendingParse {
            name: name.to_string(),
            filename: filename.to_string(),
            file,
          });
          return Ok(ParseOutcome::Deferred(label));
        }
      }
    }
  }

  /// Re-run every package waiting on `label`.
  ///
  /// Call once the target's state has reached built.
  pub fn target_built(&self, label: &BuildLabel) -> Vec<Result<ParseOutcome, EvalError>> {
    let waiting = self.pending.lock().remove(label).unwrap_or_default();
    if !waiting.is_empty() {
      info!(%label, packages = waiting.len(), "re-parsing deferred packages");
    }
    waiting
      .into_iter()
      .map(|parse| self.parse_package(&parse.name, &parse.filename, parse.file))
      .collect()
  }

  /// Run the target's pre-build callback, if it has one, as `pre_build(name)`.
  pub fn run_pre_build(&self, target: &BuildTarget) -> Result<(), EvalError> {
    let Some(func) = target.pre_build_function() else {
      return Ok(());
    };
    self.run_callback(target, &func, vec![Value::from(target.label.name.as_str())])
  }

  /// Run the target's post-build callback, if it has one, as
  /// `post_build(name, output_lines)`.
  pub fn run_post_build(&self, target: &BuildTarget, output: &str) -> Result<(), EvalError> {
    let Some(func) = target.post_build_function() else {
      return Ok(());
    };
    let lines = Value::str_list(output.trim().split('\n'));
    self.run_callback(target, &func, vec![Value::from(target.label.name.as_str()), lines])
  }

  fn run_callback(&self, target: &BuildTarget, func: &Function, args: Vec<Value>) -> Result<(), EvalError> {
    let pkg = self
      .interp
      .graph()
      .package(&target.label.package_name)
      .ok_or_else(|| EvalError::assertion(format!("Package {} is not in the build graph", target.label.package_name)))?;
    debug!(label = %target.label, callback = func.name(), "running build callback");

    let mut scope = Scope::for_callback(&self.interp, pkg.clone());
    match func.invoke(&mut scope, args, Vec::new()) {
      Ok(_) => Ok(()),
      Err(Signal::Error(err)) => Err(self.fail(err, &pkg.filename)),
      Err(Signal::Defer(label)) => Err(self.fail(
        EvalError::assertion(format!(
          "{} cannot subinclude {} from a build callback",
          target.label, label
        )),
        &pkg.filename,
      )),
    }
  }

  /// Add a freshly parsed package to the graph along with everything it declared.
  fn register(&self, pkg: &Arc<Package>) -> Result<(), EvalError> {
    self.interp.graph().add_package(pkg.clone())?;
    info!(package = %pkg.name, targets = pkg.num_targets(), "parsed package");
    Ok(())
  }

  fn fail(&self, err: EvalError, filename: &str) -> EvalError {
    let err = err.in_file(filename);
    if err.is_fatal() {
      error!(error = %err, "fatal error evaluating build file");
      if self.exit_on_fatal {
        std::process::exit(1);
      }
    }
    err
  }
}
