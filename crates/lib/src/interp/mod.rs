//! Evaluation environment for build files.
//!
//! The [`Interpreter`] holds the state shared by every package evaluation in a
//! run: the build graph, the global `CONFIG` object, the builtin registry and
//! the [`Host`] that provides filesystem-facing services. Each package (or
//! callback) evaluation gets its own [`Scope`] chained onto it.
//!
//! # Submodules
//!
//! - [`call`] - call expressions the core evaluates itself
//! - [`function`] - callable values and their parameter declarations
//! - [`scope`] - name lookup contexts

mod call;
mod function;
mod scope;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::builtins::{self, Registry};
use crate::config::Configuration;
use crate::error::EvalError;
use crate::graph::{Graph, Package};
use crate::label::BuildLabel;
use crate::value::{ConfigObject, Value};

pub use call::{Call, CallArg, Evaluate, Expr};
pub use function::{Body, Function, InterpretedBody, NativeFn, Params, ParamsBuilder, Resolved};
pub use scope::Scope;

/// Services the interpreter delegates to its embedder.
pub trait Host: Send + Sync {
  /// Match `includes` under `package`, skipping `excludes`.
  fn glob(&self, package: &str, includes: &[String], excludes: &[String], hidden: bool)
  -> Result<Vec<String>, EvalError>;

  /// Evaluate the file at `path` and return the symbols it defines.
  fn subinclude(&self, interp: &Arc<Interpreter>, path: &Path) -> Result<BTreeMap<String, Value>, EvalError>;
}

/// Session-wide evaluation state.
pub struct Interpreter {
  configuration: Configuration,
  config: Arc<ConfigObject>,
  graph: Arc<Graph>,
  host: Arc<dyn Host>,
  builtins: Registry,
  subinclude_package: OnceLock<Arc<Package>>,
  remote_claims: Mutex<HashSet<BuildLabel>>,
}

impl Interpreter {
  pub fn new(configuration: Configuration, graph: Arc<Graph>, host: Arc<dyn Host>) -> Arc<Self> {
    Self::with_prelude(configuration, graph, host, Vec::new())
  }

  /// Create an interpreter whose builtins include functions defined by a prelude.
  ///
  /// Native builtins are registered after the prelude and replace any prelude
  /// function of the same name.
  pub fn with_prelude(
    configuration: Configuration,
    graph: Arc<Graph>,
    host: Arc<dyn Host>,
    prelude: Vec<Function>,
  ) -> Arc<Self> {
    let mut registry = Registry::new();
    for func in prelude {
      registry.define(func);
    }
    builtins::register_builtins(&mut registry);
    debug!(count = registry.len(), "registered builtins");

    let config = Arc::new(configuration.config_object());
    Arc::new(Self {
      configuration,
      config,
      graph,
      host,
      builtins: registry,
      subinclude_package: OnceLock::new(),
      remote_claims: Mutex::new(HashSet::new()),
    })
  }

  pub fn configuration(&self) -> &Configuration {
    &self.configuration
  }

  /// The global `CONFIG` object.
  pub fn config(&self) -> &Arc<ConfigObject> {
    &self.config
  }

  pub fn graph(&self) -> &Arc<Graph> {
    &self.graph
  }

  pub fn host(&self) -> &Arc<dyn Host> {
    &self.host
  }

  pub fn builtin(&self, name: &str) -> Option<Arc<Function>> {
    self.builtins.get(name)
  }

  /// The reserved package holding targets synthesized for remote subincludes.
  pub fn subinclude_package(&self) -> &Arc<Package> {
    self
      .subinclude_package
      .get_or_init(|| builtins::subinclude::register_subinclude_package(&self.graph))
  }

  /// Claim the right to declare the remote subinclude target `label`.
  ///
  /// Returns `None` when the target already exists or another evaluation holds
  /// the claim. The claim is released when dropped.
  pub(crate) fn claim_remote_target(&self, label: &BuildLabel) -> Option<RemoteClaim<'_>> {
    let mut claims = self.remote_claims.lock();
    if self.graph.target(label).is_some() || !claims.insert(label.clone()) {
      return None;
    }
    Some(RemoteClaim {
      interp: self,
      label: label.clone(),
    })
  }
}

/// Exclusive right to declare one remote subinclude target.
pub(crate) struct RemoteClaim<'a> {
  interp: &'a Interpreter,
  label: BuildLabel,
}

impl Drop for RemoteClaim<'_> {
  fn drop(&mut self) {
    self.interp.remote_claims.lock().remove(&self.label);
  }
}
