//! String methods.
//!
//! Positions and lengths are in bytes.

use std::collections::BTreeMap;

use super::{MethodTable, entry, str_arg};
use crate::ensure;
use crate::error::{EvalError, Flow};
use crate::interp::{Params, Scope};
use crate::value::Value;

const WHITESPACE: &str = " \t\n";

pub(super) fn methods() -> MethodTable {
  let unary = |arg: &str| Params::builder().required("self", &["str"]).required(arg, &["str"]).build();
  let strip = Params::builder()
    .required("self", &["str"])
    .optional("cutset", Value::from(WHITESPACE), &["str"])
    .build();
  let needle = unary("needle");

  [
    entry(
      "join",
      Params::builder().required("self", &["str"]).required("seq", &["list"]).build(),
      join,
    ),
    entry("split", unary("on"), split),
    entry(
      "replace",
      Params::builder()
        .required("self", &["str"])
        .required("old", &["str"])
        .required("new", &["str"])
        .build(),
      replace,
    ),
    entry("partition", unary("sep"), partition),
    entry("rpartition", unary("sep"), rpartition),
    entry("startswith", unary("s"), startswith),
    entry("endswith", unary("s"), endswith),
    entry("lstrip", strip.clone(), lstrip),
    entry("rstrip", strip.clone(), rstrip),
    entry("strip", strip, strip_both),
    entry("find", needle.clone(), find),
    entry("rfind", needle.clone(), rfind),
    entry("count", needle, count),
    entry("format", Params::builder().required("self", &["str"]).kwargs().build(), format),
  ]
  .into_iter()
  .collect()
}

fn receiver(args: &[Value]) -> Result<&str, EvalError> {
  str_arg(args, 0, "self")
}

fn join(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let sep = receiver(&args)?;
  let seq = args[1].string_list("seq")?;
  Ok(Value::Str(seq.join(sep)))
}

fn split(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let on = str_arg(&args, 1, "on")?;
  ensure!(!on.is_empty(), "empty separator");
  Ok(Value::str_list(text.split(on)))
}

fn replace(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let old = str_arg(&args, 1, "old")?;
  let new = str_arg(&args, 2, "new")?;
  Ok(Value::Str(text.replace(old, new)))
}

fn partition(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let sep = str_arg(&args, 1, "sep")?;
  Ok(match text.find(sep) {
    Some(idx) => Value::str_list([&text[..idx], sep, &text[idx + sep.len()..]]),
    None => Value::str_list([text, "", ""]),
  })
}

fn rpartition(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let sep = str_arg(&args, 1, "sep")?;
  Ok(match text.rfind(sep) {
    Some(idx) => Value::str_list([&text[..idx], sep, &text[idx + sep.len()..]]),
    None => Value::str_list(["", "", text]),
  })
}

fn startswith(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Bool(receiver(&args)?.starts_with(str_arg(&args, 1, "s")?)))
}

fn endswith(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Bool(receiver(&args)?.ends_with(str_arg(&args, 1, "s")?)))
}

fn lstrip(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let cutset = str_arg(&args, 1, "cutset")?;
  Ok(Value::from(receiver(&args)?.trim_start_matches(|c: char| cutset.contains(c))))
}

fn rstrip(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let cutset = str_arg(&args, 1, "cutset")?;
  Ok(Value::from(receiver(&args)?.trim_end_matches(|c: char| cutset.contains(c))))
}

fn strip_both(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let cutset = str_arg(&args, 1, "cutset")?;
  Ok(Value::from(receiver(&args)?.trim_matches(|c: char| cutset.contains(c))))
}

fn find(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let needle = str_arg(&args, 1, "needle")?;
  Ok(Value::Int(text.find(needle).map_or(-1, |i| i as i64)))
}

fn rfind(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let needle = str_arg(&args, 1, "needle")?;
  Ok(Value::Int(text.rfind(needle).map_or(-1, |i| i as i64)))
}

fn count(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let text = receiver(&args)?;
  let needle = str_arg(&args, 1, "needle")?;
  Ok(Value::Int(text.matches(needle).count() as i64))
}

/// Replace `{name}` with the keyword arguments, then with the caller's locals.
///
/// Runs in the frame created for the call: its locals are the keyword
/// arguments and its parent is the calling scope.
fn format(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let mut text = receiver(&args)?.to_string();
  let mut substitute = |vars: &BTreeMap<String, Value>| {
    for (name, value) in vars {
      let pattern = format!("{{{}}}", name);
      if text.contains(&pattern) {
        text = text.replace(&pattern, &value.to_string());
      }
    }
  };
  substitute(scope.locals());
  if let Some(caller) = scope.parent() {
    substitute(caller.locals());
  }
  Ok(Value::Str(text.replace("{{", "{").replace("}}", "}")))
}
