use std::fmt;
use std::sync::Arc;

use super::Scope;
use crate::error::{EvalError, Flow};
use crate::value::Value;

/// An expression produced by the parser that the core can evaluate.
pub trait Evaluate: Send + Sync + fmt::Debug {
  fn evaluate(&self, scope: &mut Scope<'_>) -> Flow<Value>;
}

/// The argument expressions of a call.
///
/// The core builds these itself when it needs to invoke build-file functions
/// through the same path as source-level calls; anything richer comes from the
/// parser as [`Expr::Dynamic`].
#[derive(Debug, Clone)]
pub enum Expr {
  Literal(Value),
  Ident(String),
  /// A list display; evaluates to a fresh list each time.
  List(Vec<Expr>),
  Dynamic(Arc<dyn Evaluate>),
}

impl Expr {
  pub fn string(s: impl Into<String>) -> Self {
    Expr::Literal(Value::Str(s.into()))
  }

  pub fn evaluate(&self, scope: &mut Scope<'_>) -> Flow<Value> {
    match self {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::Ident(name) => scope
        .lookup(name)
        .ok_or_else(|| EvalError::assertion(format!("name '{}' is not defined", name)).into()),
      Expr::List(items) => {
        let values = items.iter().map(|item| item.evaluate(scope)).collect::<Flow<Vec<_>>>()?;
        Ok(Value::list(values))
      }
      Expr::Dynamic(expr) => expr.evaluate(scope),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CallArg {
  /// Set for keyword arguments.
  pub name: Option<String>,
  pub value: Expr,
}

/// A call expression's argument list.
#[derive(Debug, Clone, Default)]
pub struct Call {
  pub args: Vec<CallArg>,
}

impl Call {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn positional(mut self, value: Expr) -> Self {
    self.args.push(CallArg { name: None, value });
    self
  }

  pub fn named(mut self, name: &str, value: Expr) -> Self {
    self.args.push(CallArg {
      name: Some(name.to_string()),
      value,
    });
    self
  }

  /// Evaluate every argument, left to right.
  pub fn evaluate_args(&self, scope: &mut Scope<'_>) -> Flow<(Vec<Value>, Vec<(String, Value)>)> {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in &self.args {
      let value = arg.value.evaluate(scope)?;
      match &arg.name {
        Some(name) => named.push((name.clone(), value)),
        None => positional.push(value),
      }
    }
    Ok((positional, named))
  }
}
