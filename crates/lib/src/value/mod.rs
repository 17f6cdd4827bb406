//! The closed set of runtime values.
//!
//! Every builtin pattern-matches on [`Value`]; adding a variant is an
//! exhaustiveness update across the crate rather than a runtime extension.
//!
//! Lists and dicts are shared and mutable: cloning a `Value::List` aliases the
//! same underlying storage, the way assignment does in the build language.
//!
//! # Ordering
//!
//! Dicts iterate in sorted key order. `keys()`, `values()`, `items()` and the
//! substitution order of `format()` are therefore deterministic.

mod config;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::EvalError;
use crate::interp::Function;

pub use config::ConfigObject;

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
  #[default]
  None,
  Bool(bool),
  Int(i64),
  Str(String),
  List(List),
  Dict(Dict),
  Function(Arc<Function>),
  Config(Arc<ConfigObject>),
}

/// A shared, mutable, ordered list of values.
#[derive(Debug, Clone, Default)]
pub struct List(Arc<RwLock<Vec<Value>>>);

/// A shared, mutable, string-keyed mapping.
#[derive(Debug, Clone, Default)]
pub struct Dict(Arc<RwLock<BTreeMap<String, Value>>>);

impl List {
  pub fn new(items: Vec<Value>) -> Self {
    Self(Arc::new(RwLock::new(items)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
    self.0.write()
  }

  /// A copy of the current items.
  pub fn items(&self) -> Vec<Value> {
    self.0.read().clone()
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  fn same(&self, other: &List) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl Dict {
  pub fn new(entries: BTreeMap<String, Value>) -> Self {
    Self(Arc::new(RwLock::new(entries)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
    self.0.write()
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    self.0.read().get(key).cloned()
  }

  /// A copy of the current entries.
  pub fn entries(&self) -> BTreeMap<String, Value> {
    self.0.read().clone()
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  fn same(&self, other: &Dict) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl Value {
  pub fn list(items: Vec<Value>) -> Self {
    Value::List(List::new(items))
  }

  pub fn dict(entries: BTreeMap<String, Value>) -> Self {
    Value::Dict(Dict::new(entries))
  }

  pub fn str_list<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> Self {
    Value::list(items.into_iter().map(|s| Value::Str(s.as_ref().to_string())).collect())
  }

  pub fn is_none(&self) -> bool {
    matches!(self, Value::None)
  }

  /// Name of this value's type, as shown in error messages.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::None => "none",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Str(_) => "str",
      Value::List(_) => "list",
      Value::Dict(_) => "dict",
      Value::Function(_) => "function",
      Value::Config(_) => "config",
    }
  }

  pub fn is_truthy(&self) -> bool {
    match self {
      Value::None => false,
      Value::Bool(b) => *b,
      Value::Int(i) => *i != 0,
      Value::Str(s) => !s.is_empty(),
      Value::List(l) => !l.is_empty(),
      Value::Dict(d) => !d.is_empty(),
      Value::Function(_) | Value::Config(_) => true,
    }
  }

  pub fn len(&self) -> Result<usize, EvalError> {
    match self {
      Value::Str(s) => Ok(s.len()),
      Value::List(l) => Ok(l.len()),
      Value::Dict(d) => Ok(d.len()),
      Value::Config(c) => Ok(c.len()),
      other => Err(EvalError::assertion(format!(
        "object of type {} has no len()",
        other.type_name()
      ))),
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  /// The string inside this value, or an assertion error naming `what`.
  pub fn expect_str(&self, what: &str) -> Result<&str, EvalError> {
    self.as_str().ok_or_else(|| {
      EvalError::assertion(format!("argument {} must be a str, not {}", what, self.type_name()))
    })
  }

  /// The string inside this value; `None` reads as the empty string.
  pub fn str_or_empty(&self, what: &str) -> Result<&str, EvalError> {
    match self {
      Value::None => Ok(""),
      other => other.expect_str(what),
    }
  }

  pub fn expect_int(&self, what: &str) -> Result<i64, EvalError> {
    match self {
      Value::Int(i) => Ok(*i),
      Value::Bool(b) => Ok(i64::from(*b)),
      other => Err(EvalError::assertion(format!(
        "argument {} must be an int, not {}",
        what,
        other.type_name()
      ))),
    }
  }

  pub fn expect_list(&self, what: &str) -> Result<&List, EvalError> {
    match self {
      Value::List(l) => Ok(l),
      other => Err(EvalError::assertion(format!(
        "argument {} must be a list, not {}",
        what,
        other.type_name()
      ))),
    }
  }

  pub fn expect_dict(&self, what: &str) -> Result<&Dict, EvalError> {
    match self {
      Value::Dict(d) => Ok(d),
      other => Err(EvalError::assertion(format!(
        "argument {} must be a dict, not {}",
        what,
        other.type_name()
      ))),
    }
  }

  /// Read a list of strings.
  pub fn string_list(&self, what: &str) -> Result<Vec<String>, EvalError> {
    let list = self.expect_list(what)?;
    list
      .read()
      .iter()
      .map(|item| match item {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(EvalError::assertion(format!("{} must be a list of strings", what))),
      })
      .collect()
  }

  /// Read an optional list of strings; `None` reads as empty.
  pub fn optional_string_list(&self, what: &str) -> Result<Vec<String>, EvalError> {
    match self {
      Value::None => Ok(Vec::new()),
      other => other.string_list(what),
    }
  }

  /// Ordering used by `sorted()` and the comparison operators.
  pub fn compare(&self, other: &Value) -> Result<Ordering, EvalError> {
    match (self, other) {
      (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
      (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
      (Value::Int(a), Value::Bool(b)) => Ok(a.cmp(&i64::from(*b))),
      (Value::Bool(a), Value::Int(b)) => Ok(i64::from(*a).cmp(b)),
      (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
      (Value::List(a), Value::List(b)) => {
        let (a, b) = (a.items(), b.items());
        for (x, y) in a.iter().zip(b.iter()) {
          match x.compare(y)? {
            Ordering::Equal => continue,
            unequal => return Ok(unequal),
          }
        }
        Ok(a.len().cmp(&b.len()))
      }
      (a, b) => Err(EvalError::assertion(format!(
        "unorderable types: {} < {}",
        a.type_name(),
        b.type_name()
      ))),
    }
  }

  /// Quoted rendering, used for the elements of containers.
  pub fn repr(&self) -> String {
    match self {
      Value::Str(s) => format!("{:?}", s),
      other => other.to_string(),
    }
  }
}

/// Whether `value` satisfies the builtin type designator `name`.
///
/// `bool` values also count as `int`, for compatibility with older build files
/// that assert integer types on flags.
pub fn is_type(value: &Value, name: &str) -> bool {
  match value {
    Value::Bool(_) => name == "bool" || name == "int",
    Value::Int(_) => name == "int",
    Value::Str(_) => name == "str",
    Value::List(_) => name == "list",
    Value::Dict(_) => name == "dict",
    Value::None => name == "none",
    Value::Function(_) => name == "function",
    Value::Config(_) => name == "config",
  }
}

/// Whether two values are of the same variant.
pub fn same_variant(a: &Value, b: &Value) -> bool {
  std::mem::discriminant(a) == std::mem::discriminant(b)
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::None, Value::None) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::List(a), Value::List(b)) => a.same(b) || *a.read() == *b.read(),
      (Value::Dict(a), Value::Dict(b)) => a.same(b) || *a.read() == *b.read(),
      (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
      (Value::Config(a), Value::Config(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::None => write!(f, "None"),
      Value::Bool(true) => write!(f, "True"),
      Value::Bool(false) => write!(f, "False"),
      Value::Int(i) => write!(f, "{}", i),
      Value::Str(s) => write!(f, "{}", s),
      Value::List(l) => {
        let items: Vec<String> = l.read().iter().map(Value::repr).collect();
        write!(f, "[{}]", items.join(", "))
      }
      Value::Dict(d) => {
        let entries: Vec<String> = d
          .read()
          .iter()
          .map(|(k, v)| format!("{:?}: {}", k, v.repr()))
          .collect();
        write!(f, "{{{}}}", entries.join(", "))
      }
      Value::Function(func) => write!(f, "<function {}>", func.name()),
      Value::Config(_) => write!(f, "<config object>"),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Str(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Str(s)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::list(items)
  }
}
