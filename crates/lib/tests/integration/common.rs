//! Shared helpers for driver integration tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use weft_lib::interp::{Call, Expr, Function, InterpretedBody, Params};
use weft_lib::{BuildFile, Configuration, Driver, EvalError, Flow, Graph, Host, Interpreter, Scope, Value};

/// Host serving canned symbol tables for subincluded files. Globs match nothing.
#[derive(Default)]
pub struct SymbolHost {
  symbols: BTreeMap<PathBuf, BTreeMap<String, Value>>,
}

impl SymbolHost {
  pub fn with(mut self, path: &str, symbols: &[(&str, Value)]) -> Self {
    let table = symbols.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    self.symbols.insert(PathBuf::from(path), table);
    self
  }
}

impl Host for SymbolHost {
  fn glob(&self, _: &str, _: &[String], _: &[String], _: bool) -> Result<Vec<String>, EvalError> {
    Ok(Vec::new())
  }

  fn subinclude(&self, _: &Arc<Interpreter>, path: &Path) -> Result<BTreeMap<String, Value>, EvalError> {
    self
      .symbols
      .get(path)
      .cloned()
      .ok_or_else(|| EvalError::assertion(format!("no such file: {}", path.display())))
  }
}

pub fn driver() -> Driver {
  driver_with_host(SymbolHost::default())
}

pub fn driver_with_host(host: SymbolHost) -> Driver {
  let interp = Interpreter::new(Configuration::default(), Arc::new(Graph::new()), Arc::new(host));
  Driver::new(interp).returning_fatal()
}

type ScriptFn = dyn Fn(&mut Scope<'_>) -> Flow<()> + Send + Sync;

/// A build file whose statements are a Rust closure.
pub struct Script(Box<ScriptFn>);

impl BuildFile for Script {
  fn evaluate(&self, scope: &mut Scope<'_>) -> Flow<()> {
    (self.0)(scope)
  }
}

pub fn script(f: impl Fn(&mut Scope<'_>) -> Flow<()> + Send + Sync + 'static) -> Arc<dyn BuildFile> {
  Arc::new(Script(Box::new(f)))
}

type BodyFn = dyn Fn(&mut Scope<'_>) -> Flow<Value> + Send + Sync;

struct Body(Box<BodyFn>);

impl fmt::Debug for Body {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Body")
  }
}

impl InterpretedBody for Body {
  fn execute(&self, frame: &mut Scope<'_>) -> Flow<Value> {
    (self.0)(frame)
  }
}

/// A build-file function value taking the named string parameters.
pub fn function(
  name: &str,
  params: &[&str],
  body: impl Fn(&mut Scope<'_>) -> Flow<Value> + Send + Sync + 'static,
) -> Value {
  let params = params
    .iter()
    .fold(Params::builder(), |builder, param| builder.required(param, &[]))
    .build();
  Value::Function(Arc::new(Function::interpreted(name, params, Arc::new(Body(Box::new(body))))))
}

/// Call builtin `name` with keyword arguments.
pub fn call(scope: &mut Scope<'_>, name: &str, kwargs: &[(&str, Value)]) -> Flow<Value> {
  let Some(func) = scope.interp().builtin(name) else {
    return Err(EvalError::assertion(format!("no builtin {}", name)).into());
  };
  let call = kwargs
    .iter()
    .fold(Call::new(), |call, (k, v)| call.named(k, Expr::Literal(v.clone())));
  func.call(scope, &call)
}

/// Call builtin `name` with positional string arguments.
pub fn call_positional(scope: &mut Scope<'_>, name: &str, args: &[&str]) -> Flow<Value> {
  let Some(func) = scope.interp().builtin(name) else {
    return Err(EvalError::assertion(format!("no builtin {}", name)).into());
  };
  let call = args
    .iter()
    .fold(Call::new(), |call, arg| call.positional(Expr::string(*arg)));
  func.call(scope, &call)
}

/// Declare a target through `build_rule`.
pub fn declare(scope: &mut Scope<'_>, name: &str, extra: &[(&str, Value)]) -> Flow<Value> {
  let mut kwargs = vec![("name", Value::from(name))];
  kwargs.extend(extra.iter().cloned());
  call(scope, "build_rule", &kwargs)
}
