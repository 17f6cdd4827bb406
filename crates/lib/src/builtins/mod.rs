//! Native builtins.
//!
//! [`register_builtins`] fills the root registry that every scope falls back
//! to. String, dict and config methods live in separate read-only method
//! tables, built once on first use and looked up by receiver type through
//! [`method`].
//!
//! # Submodules
//!
//! - [`dicts`] - dict and config methods
//! - [`log`] - `debug()` through `fatal()`
//! - [`misc`] - language-level utilities (`len`, `sorted`, `zip`, `glob`, ...)
//! - [`mutate`] - post-build target introspection and mutation
//! - [`rules`] - `build_rule`, `filegroup`, `hash_filegroup`, `package`
//! - [`strings`] - string methods
//! - [`subinclude`] - deferred cross-package inclusion

pub mod dicts;
pub mod log;
pub mod misc;
pub mod mutate;
pub mod rules;
pub mod strings;
pub mod subinclude;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use crate::error::{EvalError, Flow};
use crate::interp::{Call, Function, NativeFn, Params, Scope};
use crate::value::Value;

/// Name to function bindings for the root scope.
#[derive(Debug, Default)]
pub struct Registry {
  functions: BTreeMap<String, Arc<Function>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bind a function under its own name, replacing any previous binding.
  pub fn define(&mut self, func: Function) -> Arc<Function> {
    let func = Arc::new(func);
    self.functions.insert(func.name().to_string(), func.clone());
    func
  }

  /// Bind a native function.
  pub fn native(&mut self, name: &str, params: Arc<Params>, code: NativeFn) -> Arc<Function> {
    self.define(Function::native(name, params, code))
  }

  pub fn get(&self, name: &str) -> Option<Arc<Function>> {
    self.functions.get(name).cloned()
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }
}

/// Install every native builtin into `registry`.
pub fn register_builtins(registry: &mut Registry) {
  rules::register(registry);
  subinclude::register(registry);
  misc::register(registry);
  mutate::register(registry);
  log::register(registry);
}

/// Methods available on one receiver type.
pub type MethodTable = BTreeMap<&'static str, Arc<Function>>;

static STRING_METHODS: LazyLock<MethodTable> = LazyLock::new(strings::methods);
static DICT_METHODS: LazyLock<MethodTable> = LazyLock::new(dicts::dict_methods);
static CONFIG_METHODS: LazyLock<MethodTable> = LazyLock::new(dicts::config_methods);

/// Look up `receiver.name`.
pub fn method(receiver: &Value, name: &str) -> Result<Arc<Function>, EvalError> {
  let table: &MethodTable = match receiver {
    Value::Str(_) => &STRING_METHODS,
    Value::Dict(_) => &DICT_METHODS,
    Value::Config(_) => &CONFIG_METHODS,
    other => {
      return Err(EvalError::assertion(format!(
        "object of type {} has no attribute {}",
        other.type_name(),
        name
      )));
    }
  };
  table.get(name).cloned().ok_or_else(|| {
    EvalError::assertion(format!(
      "object of type {} has no attribute {}",
      receiver.type_name(),
      name
    ))
  })
}

/// Evaluate `receiver.name(args...)`.
pub fn call_method(scope: &mut Scope<'_>, receiver: Value, name: &str, call: &Call) -> Flow<Value> {
  let func = method(&receiver, name)?;
  func.call_method(scope, receiver, call)
}

/// One method table entry.
fn entry(name: &'static str, params: Arc<Params>, code: NativeFn) -> (&'static str, Arc<Function>) {
  (name, Arc::new(Function::native(name, params, code)))
}

/// Read string argument `i`; `None` reads as the empty string.
fn str_arg<'v>(args: &'v [Value], i: usize, what: &str) -> Result<&'v str, EvalError> {
  match args.get(i) {
    Some(value) => value.str_or_empty(what),
    None => Ok(""),
  }
}
