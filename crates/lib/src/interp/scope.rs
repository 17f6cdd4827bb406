use std::collections::BTreeMap;
use std::sync::Arc;

use super::Interpreter;
use crate::error::EvalError;
use crate::graph::Package;
use crate::value::{ConfigObject, Value};

/// A name lookup context.
///
/// Lookups go through this scope's locals, then each enclosing scope, then the
/// interpreter's builtins. A scope also records which package is being
/// evaluated and whether evaluation is happening inside a pre- or post-build
/// callback, where graph changes must be applied immediately.
pub struct Scope<'a> {
  interp: Arc<Interpreter>,
  pkg: Option<Arc<Package>>,
  parent: Option<&'a Scope<'a>>,
  locals: BTreeMap<String, Value>,
  callback: bool,
}

impl Scope<'static> {
  /// Top-level scope for parsing a package's build file.
  pub fn for_package(interp: &Arc<Interpreter>, pkg: Arc<Package>) -> Self {
    Self::root(interp, Some(pkg), false)
  }

  /// Top-level scope for running a callback against an already-parsed package.
  pub fn for_callback(interp: &Arc<Interpreter>, pkg: Arc<Package>) -> Self {
    Self::root(interp, Some(pkg), true)
  }

  /// A scope that belongs to no package.
  pub fn detached(interp: &Arc<Interpreter>) -> Self {
    Self::root(interp, None, false)
  }

  fn root(interp: &Arc<Interpreter>, pkg: Option<Arc<Package>>, callback: bool) -> Self {
    let mut locals = BTreeMap::new();
    locals.insert("CONFIG".to_string(), Value::Config(Arc::new(interp.config().overlay())));
    Self {
      interp: interp.clone(),
      pkg,
      parent: None,
      locals,
      callback,
    }
  }
}

impl<'a> Scope<'a> {
  /// A nested scope for a function call.
  pub fn child(&self) -> Scope<'_> {
    Scope {
      interp: self.interp.clone(),
      pkg: self.pkg.clone(),
      parent: Some(self),
      locals: BTreeMap::new(),
      callback: self.callback,
    }
  }

  pub fn interp(&self) -> &Arc<Interpreter> {
    &self.interp
  }

  pub fn package(&self) -> Option<&Arc<Package>> {
    self.pkg.as_ref()
  }

  /// The owning package; builtins that declare or modify targets need one.
  pub fn require_package(&self) -> Result<&Arc<Package>, EvalError> {
    self
      .pkg
      .as_ref()
      .ok_or_else(|| EvalError::assertion("this function can only be called while parsing a package"))
  }

  /// Build file name used to prefix log lines and errors.
  pub fn filename(&self) -> &str {
    self.pkg.as_ref().map(|p| p.filename.as_str()).unwrap_or_default()
  }

  pub fn is_callback(&self) -> bool {
    self.callback
  }

  pub fn parent(&self) -> Option<&Scope<'a>> {
    self.parent
  }

  pub fn locals(&self) -> &BTreeMap<String, Value> {
    &self.locals
  }

  pub fn lookup(&self, name: &str) -> Option<Value> {
    if let Some(value) = self.locals.get(name) {
      return Some(value.clone());
    }
    match self.parent {
      Some(parent) => parent.lookup(name),
      None => self.interp.builtin(name).map(Value::Function),
    }
  }

  pub fn set(&mut self, name: &str, value: Value) {
    self.locals.insert(name.to_string(), value);
  }

  /// Bind every value; existing names are kept unless `overwrite` is set.
  pub fn set_all(&mut self, values: BTreeMap<String, Value>, overwrite: bool) {
    for (name, value) in values {
      if overwrite || !self.locals.contains_key(&name) {
        self.locals.insert(name, value);
      }
    }
  }

  /// The `CONFIG` object visible from here.
  pub fn config(&self) -> Result<Arc<ConfigObject>, EvalError> {
    match self.lookup("CONFIG") {
      Some(Value::Config(config)) => Ok(config),
      _ => Err(EvalError::assertion("CONFIG object has been altered")),
    }
  }
}
