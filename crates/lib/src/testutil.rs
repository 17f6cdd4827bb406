//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Configuration;
use crate::error::{EvalError, Flow};
use crate::graph::{Graph, Package};
use crate::interp::{Call, Expr, Function, Host, InterpretedBody, Interpreter, Params, Scope};
use crate::value::Value;

/// Arguments of one [`Host::glob`] call, as seen by [`FakeHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobCall {
  pub package: String,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub hidden: bool,
}

/// In-memory [`Host`] with a fixed file listing per package and canned
/// subinclude symbol tables. Clones share their call log.
#[derive(Clone, Default)]
pub struct FakeHost {
  files: BTreeMap<String, Vec<String>>,
  symbols: BTreeMap<PathBuf, BTreeMap<String, Value>>,
  calls: Arc<Mutex<Vec<GlobCall>>>,
}

impl FakeHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_files(mut self, package: &str, files: &[&str]) -> Self {
    self
      .files
      .insert(package.to_string(), files.iter().map(|f| f.to_string()).collect());
    self
  }

  pub fn with_symbols(mut self, path: impl Into<PathBuf>, symbols: BTreeMap<String, Value>) -> Self {
    self.symbols.insert(path.into(), symbols);
    self
  }

  pub fn glob_calls(&self) -> Vec<GlobCall> {
    self.calls.lock().clone()
  }
}

impl Host for FakeHost {
  fn glob(
    &self,
    package: &str,
    includes: &[String],
    excludes: &[String],
    hidden: bool,
  ) -> Result<Vec<String>, EvalError> {
    self.calls.lock().push(GlobCall {
      package: package.to_string(),
      includes: includes.to_vec(),
      excludes: excludes.to_vec(),
      hidden,
    });
    let files = self.files.get(package).map(Vec::as_slice).unwrap_or_default();
    Ok(
      files
        .iter()
        .filter(|f| hidden || !f.starts_with('.'))
        .filter(|f| includes.iter().any(|p| wildcard_match(p, f)))
        .filter(|f| !excludes.iter().any(|p| wildcard_match(p, f)))
        .cloned()
        .collect(),
    )
  }

  fn subinclude(&self, _interp: &Arc<Interpreter>, path: &Path) -> Result<BTreeMap<String, Value>, EvalError> {
    self
      .symbols
      .get(path)
      .cloned()
      .ok_or_else(|| EvalError::assertion(format!("no such file: {}", path.display())))
  }
}

/// `*` matches any run of characters; everything else is literal.
fn wildcard_match(pattern: &str, name: &str) -> bool {
  match pattern.split_once('*') {
    None => pattern == name,
    Some((prefix, rest)) => {
      let Some(tail) = name.strip_prefix(prefix) else {
        return false;
      };
      (0..=tail.len()).any(|i| tail.is_char_boundary(i) && wildcard_match(rest, &tail[i..]))
    }
  }
}

pub fn interpreter() -> Arc<Interpreter> {
  interpreter_with_host(FakeHost::new())
}

pub fn interpreter_with_config(configuration: Configuration) -> Arc<Interpreter> {
  Interpreter::new(configuration, Arc::new(Graph::new()), Arc::new(FakeHost::new()))
}

pub fn interpreter_with_host(host: FakeHost) -> Arc<Interpreter> {
  interpreter_with_prelude(host, Vec::new())
}

pub fn interpreter_with_prelude(host: FakeHost, prelude: Vec<Function>) -> Arc<Interpreter> {
  Interpreter::with_prelude(Configuration::default(), Arc::new(Graph::new()), Arc::new(host), prelude)
}

/// Scope for parsing a fresh package `name` from `name/BUILD`.
pub fn package_scope(interp: &Arc<Interpreter>, name: &str) -> Scope<'static> {
  Scope::for_package(interp, Arc::new(Package::new(name, format!("{name}/BUILD"))))
}

/// Callback scope for package `name`, registering the package with the graph if needed.
pub fn callback_scope(interp: &Arc<Interpreter>, name: &str) -> Scope<'static> {
  let pkg = interp
    .graph()
    .package_or_insert_with(name, || Package::new(name, format!("{name}/BUILD")));
  Scope::for_callback(interp, pkg)
}

type BodyFn = dyn Fn(&mut Scope<'_>) -> Flow<Value> + Send + Sync;

/// An interpreted function body backed by a Rust closure.
pub struct ClosureBody(Box<BodyFn>);

impl fmt::Debug for ClosureBody {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("ClosureBody")
  }
}

impl InterpretedBody for ClosureBody {
  fn execute(&self, frame: &mut Scope<'_>) -> Flow<Value> {
    (self.0)(frame)
  }
}

/// An interpreted function named `name` whose body runs `body` in the call frame.
pub fn closure(
  name: &str,
  params: Arc<Params>,
  body: impl Fn(&mut Scope<'_>) -> Flow<Value> + Send + Sync + 'static,
) -> Function {
  Function::interpreted(name, params, Arc::new(ClosureBody(Box::new(body))))
}

/// A `remote_file` rule declaring one output named after the target.
pub fn remote_file() -> Function {
  let params = Params::builder()
    .required("name", &["str"])
    .required("url", &["str"])
    .optional("hashes", Value::None, &["list"])
    .build();
  closure("remote_file", params, |frame| {
    let Some(Value::Function(build_rule)) = frame.lookup("build_rule") else {
      return Err(EvalError::assertion("build_rule is not defined").into());
    };
    let call = Call::new()
      .named("name", Expr::Ident("name".to_string()))
      .named("outs", Expr::List(vec![Expr::Ident("name".to_string())]))
      .named("hashes", Expr::Ident("hashes".to_string()))
      .named("building_description", Expr::string("Fetching..."));
    build_rule.call(frame, &call)
  })
}
