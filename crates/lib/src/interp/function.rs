//! Callable values and their parameter declarations.
//!
//! A [`Function`] pairs a shared [`Params`] declaration with either native code
//! or an interpreted body supplied by the parser. Native code reads its
//! arguments by position, so the declaration and the native implementation are
//! two halves of one contract: `args[i]` is always the value for `params.names()[i]`.
//! Variants of one function (`filegroup` and `build_rule`) share the same
//! `Arc<Params>` instead of copying it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::{Call, Scope};
use crate::ensure;
use crate::error::{EvalError, Flow};
use crate::value::{self, Value};

/// Native implementation of a builtin. Receives the calling scope and the
/// positionally resolved arguments.
pub type NativeFn = fn(&mut Scope<'_>, Vec<Value>) -> Flow<Value>;

/// Body of a function defined in build-file source.
pub trait InterpretedBody: Send + Sync + fmt::Debug {
  /// Run the body in `frame`, which already binds every parameter by name.
  fn execute(&self, frame: &mut Scope<'_>) -> Flow<Value>;
}

#[derive(Clone)]
pub enum Body {
  Native(NativeFn),
  Interpreted(Arc<dyn InterpretedBody>),
}

impl fmt::Debug for Body {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Body::Native(_) => write!(f, "Native"),
      Body::Interpreted(body) => f.debug_tuple("Interpreted").field(body).finish(),
    }
  }
}

/// Immutable parameter declaration, shared between function variants.
#[derive(Debug, Default)]
pub struct Params {
  names: Vec<String>,
  indices: HashMap<String, usize>,
  defaults: Vec<Option<Value>>,
  types: Vec<Vec<String>>,
  varargs: bool,
  kwargs: bool,
}

/// Arguments after resolution against a [`Params`] declaration.
#[derive(Debug)]
pub struct Resolved {
  /// One slot per declared parameter, followed by any extra positional values.
  pub args: Vec<Value>,
  /// Keyword arguments with no declared parameter (only when `kwargs` is set).
  pub kwargs: BTreeMap<String, Value>,
}

impl Params {
  pub fn builder() -> ParamsBuilder {
    ParamsBuilder::default()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn index_of(&self, name: &str) -> Option<usize> {
    self.indices.get(name).copied()
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// Place the call's arguments into declaration order, filling in defaults.
  pub fn resolve(
    &self,
    func: &str,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
  ) -> Result<Resolved, EvalError> {
    let mut slots: Vec<Option<Value>> = vec![None; self.names.len()];
    let mut extra = Vec::new();

    for (i, value) in positional.into_iter().enumerate() {
      if i < slots.len() {
        slots[i] = Some(value);
      } else {
        ensure!(self.varargs, "too many arguments to {}()", func);
        extra.push(value);
      }
    }

    let mut kwargs = BTreeMap::new();
    for (name, value) in named {
      match self.indices.get(&name) {
        Some(&i) => {
          ensure!(
            slots[i].is_none(),
            "{}() got multiple values for argument {}",
            func,
            name
          );
          slots[i] = Some(value);
        }
        None => {
          ensure!(
            self.kwargs,
            "{}() got an unexpected keyword argument '{}'",
            func,
            name
          );
          kwargs.insert(name, value);
        }
      }
    }

    let mut args = Vec::with_capacity(slots.len() + extra.len());
    for (i, slot) in slots.into_iter().enumerate() {
      let value = match slot {
        Some(value) => value,
        None => match &self.defaults[i] {
          Some(default) => default.clone(),
          None => {
            return Err(EvalError::assertion(format!(
              "Missing required argument {} to {}()",
              self.names[i], func
            )));
          }
        },
      };
      self.check_type(func, i, &value)?;
      args.push(value);
    }
    args.extend(extra);

    Ok(Resolved { args, kwargs })
  }

  fn check_type(&self, func: &str, i: usize, value: &Value) -> Result<(), EvalError> {
    let types = &self.types[i];
    if types.is_empty() || value.is_none() || types.iter().any(|t| value::is_type(value, t)) {
      return Ok(());
    }
    Err(EvalError::assertion(format!(
      "Invalid type for argument {} to {}(); expected {}, was {}",
      self.names[i],
      func,
      types.join(" or "),
      value.type_name()
    )))
  }
}

#[derive(Debug, Default)]
pub struct ParamsBuilder {
  params: Params,
}

impl ParamsBuilder {
  fn push(mut self, name: &str, default: Option<Value>, types: &[&str]) -> Self {
    self.params.indices.insert(name.to_string(), self.params.names.len());
    self.params.names.push(name.to_string());
    self.params.defaults.push(default);
    self.params.types.push(types.iter().map(|t| t.to_string()).collect());
    self
  }

  /// A parameter that must be supplied.
  pub fn required(self, name: &str, types: &[&str]) -> Self {
    self.push(name, None, types)
  }

  /// A parameter with a default value.
  pub fn optional(self, name: &str, default: Value, types: &[&str]) -> Self {
    self.push(name, Some(default), types)
  }

  /// Accept extra positional arguments after the declared ones.
  pub fn varargs(mut self) -> Self {
    self.params.varargs = true;
    self
  }

  /// Accept keyword arguments that match no declared parameter.
  pub fn kwargs(mut self) -> Self {
    self.params.kwargs = true;
    self
  }

  pub fn build(self) -> Arc<Params> {
    Arc::new(self.params)
  }
}

/// A named callable.
#[derive(Debug)]
pub struct Function {
  name: String,
  params: Arc<Params>,
  body: Body,
}

impl Function {
  pub fn native(name: impl Into<String>, params: Arc<Params>, code: NativeFn) -> Self {
    Self {
      name: name.into(),
      params,
      body: Body::Native(code),
    }
  }

  pub fn interpreted(name: impl Into<String>, params: Arc<Params>, body: Arc<dyn InterpretedBody>) -> Self {
    Self {
      name: name.into(),
      params,
      body: Body::Interpreted(body),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn params(&self) -> &Arc<Params> {
    &self.params
  }

  /// Evaluate a call expression's arguments in `scope` and invoke this function.
  pub fn call(&self, scope: &mut Scope<'_>, call: &Call) -> Flow<Value> {
    let (positional, named) = call.evaluate_args(scope)?;
    self.invoke(scope, positional, named)
  }

  /// Call as a method: `receiver` becomes the first positional argument.
  pub fn call_method(&self, scope: &mut Scope<'_>, receiver: Value, call: &Call) -> Flow<Value> {
    let (mut positional, named) = call.evaluate_args(scope)?;
    positional.insert(0, receiver);
    self.invoke(scope, positional, named)
  }

  /// Invoke with already-evaluated arguments.
  pub fn invoke(&self, scope: &mut Scope<'_>, positional: Vec<Value>, named: Vec<(String, Value)>) -> Flow<Value> {
    let Resolved { args, kwargs } = self.params.resolve(&self.name, positional, named)?;
    match &self.body {
      Body::Native(code) if self.params.kwargs => {
        let mut frame = scope.child();
        frame.set_all(kwargs, true);
        code(&mut frame, args)
      }
      Body::Native(code) => code(scope, args),
      Body::Interpreted(body) => {
        let mut frame = scope.child();
        let declared = self.params.names.len();
        for (name, value) in self.params.names.iter().zip(args.iter()) {
          frame.set(name, value.clone());
        }
        if self.params.varargs {
          frame.set("args", Value::list(args[declared..].to_vec()));
        }
        frame.set_all(kwargs, true);
        body.execute(&mut frame)
      }
    }
  }
}
