//! Dict and config object methods.

use std::sync::Arc;

use super::{MethodTable, entry};
use crate::error::{EvalError, Flow};
use crate::interp::{Params, Scope};
use crate::value::{ConfigObject, Dict, Value};

pub(super) fn dict_methods() -> MethodTable {
  let receiver_only = Params::builder().required("self", &["dict"]).build();
  let lookup = Params::builder()
    .required("self", &["dict"])
    .required("key", &[])
    .optional("default", Value::None, &[])
    .build();

  [
    entry("get", lookup.clone(), dict_get),
    entry("setdefault", lookup, dict_setdefault),
    entry("keys", receiver_only.clone(), keys),
    entry("values", receiver_only.clone(), values),
    entry("items", receiver_only.clone(), items),
    entry("copy", receiver_only, copy),
  ]
  .into_iter()
  .collect()
}

pub(super) fn config_methods() -> MethodTable {
  let lookup = Params::builder()
    .required("self", &["config"])
    .required("key", &["str"])
    .optional("default", Value::None, &[])
    .build();

  [
    entry("get", lookup.clone(), config_get),
    entry("setdefault", lookup, config_setdefault),
  ]
  .into_iter()
  .collect()
}

fn dict(args: &[Value]) -> Result<&Dict, EvalError> {
  args[0].expect_dict("self")
}

fn config(args: &[Value]) -> Result<&Arc<ConfigObject>, EvalError> {
  match &args[0] {
    Value::Config(config) => Ok(config),
    other => Err(EvalError::assertion(format!(
      "argument self must be a config, not {}",
      other.type_name()
    ))),
  }
}

fn key(value: &Value) -> Result<&str, EvalError> {
  value
    .as_str()
    .ok_or_else(|| EvalError::assertion(format!("dict keys must be strings, not {}", value.type_name())))
}

fn dict_get(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let key = key(&args[1])?;
  Ok(dict(&args)?.get(key).unwrap_or_else(|| args[2].clone()))
}

fn dict_setdefault(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let key = key(&args[1])?;
  let mut entries = dict(&args)?.write();
  Ok(entries.entry(key.to_string()).or_insert_with(|| args[2].clone()).clone())
}

fn keys(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::str_list(dict(&args)?.read().keys()))
}

fn values(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::list(dict(&args)?.read().values().cloned().collect()))
}

fn items(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let items = dict(&args)?
    .read()
    .iter()
    .map(|(k, v)| Value::list(vec![Value::from(k.as_str()), v.clone()]))
    .collect();
  Ok(Value::list(items))
}

fn copy(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::dict(dict(&args)?.entries()))
}

fn config_get(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let key = args[1].expect_str("key")?;
  Ok(config(&args)?.get(key, args[2].clone()))
}

fn config_setdefault(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let config = config(&args)?;
  let key = args[1].expect_str("key")?;
  if !config.contains(key) {
    config.set(key, args[2].clone());
  }
  Ok(config.get(key, Value::None))
}
