//! Language-level utilities: `len`, `sorted`, `range`, `zip`, type checks and
//! conversions, path joining and `glob`.

use std::cmp::Ordering;

use tracing::trace;

use super::Registry;
use crate::ensure;
use crate::error::{EvalError, Flow};
use crate::interp::{Params, Scope};
use crate::value::{self, Value};

pub(super) fn register(registry: &mut Registry) {
  let single = |name: &str| Params::builder().required(name, &[]).build();
  let varargs = Params::builder().varargs().build();
  let no_args = Params::builder().build();

  registry.native("len", single("obj"), len);
  registry.native("sorted", single("seq"), sorted);
  registry.native(
    "isinstance",
    Params::builder().required("obj", &[]).required("types", &[]).build(),
    isinstance,
  );
  registry.native("callable", single("obj"), callable);
  registry.native(
    "range",
    Params::builder()
      .required("start", &[])
      .optional("stop", Value::None, &[])
      .build(),
    range,
  );
  registry.native("enumerate", single("seq"), enumerate);
  registry.native("zip", varargs.clone(), zip);
  registry.native(
    "bool",
    Params::builder().optional("b", Value::Bool(false), &[]).build(),
    to_bool,
  );
  registry.native("str", single("s"), to_str);
  registry.native("int", single("x"), to_int);
  registry.native(
    "list",
    Params::builder().optional("seq", Value::None, &[]).build(),
    to_list,
  );
  registry.native("dict", Params::builder().kwargs().build(), to_dict);
  registry.native("join_path", varargs, join_path);
  registry.native("get_base_path", no_args.clone(), package_name);
  registry.native("package_name", no_args, package_name);
  registry.native(
    "glob",
    Params::builder()
      .required("includes", &["list"])
      .optional("excludes", Value::None, &["list"])
      .optional("exclude", Value::None, &["list"])
      .optional("hidden", Value::Bool(false), &["bool"])
      .build(),
    glob,
  );
}

fn len(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Int(args[0].len()? as i64))
}

/// Stable sort of a copy of the list.
fn sorted(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let Value::List(list) = &args[0] else {
    return Err(EvalError::assertion(format!("unsortable type {}", args[0].type_name())).into());
  };
  let mut items = list.items();
  let mut failure = None;
  items.sort_by(|a, b| {
    a.compare(b).unwrap_or_else(|err| {
      failure.get_or_insert(err);
      Ordering::Equal
    })
  });
  match failure {
    Some(err) => Err(err.into()),
    None => Ok(Value::list(items)),
  }
}

/// `types` is a type function (`str`, `int`, ...), a list of them, or a value
/// whose variant is compared against `obj`'s.
fn isinstance(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let (obj, types) = (&args[0], &args[1]);
  let matches = |t: &Value| match t {
    Value::Function(func) if value::is_type(obj, func.name()) => true,
    other => value::same_variant(obj, other),
  };
  let result = match types {
    Value::List(list) => list.read().iter().any(matches) || matches(types),
    single => matches(single),
  };
  Ok(Value::Bool(result))
}

fn callable(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Bool(matches!(args[0], Value::Function(_))))
}

fn range(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let (start, stop) = match (&args[0], &args[1]) {
    (Value::Int(stop), Value::None) => (0, *stop),
    (Value::Int(start), Value::Int(stop)) => (*start, *stop),
    _ => return Err(EvalError::assertion("Arguments to range() must be integers").into()),
  };
  Ok(Value::list((start..stop).map(Value::Int).collect()))
}

fn enumerate(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let Value::List(list) = &args[0] else {
    return Err(
      EvalError::assertion(format!(
        "Argument to enumerate must be a list, not {}",
        args[0].type_name()
      ))
      .into(),
    );
  };
  let pairs = list
    .read()
    .iter()
    .enumerate()
    .map(|(i, item)| Value::list(vec![Value::Int(i as i64), item.clone()]))
    .collect();
  Ok(Value::list(pairs))
}

fn zip(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let mut lists: Vec<Vec<Value>> = Vec::with_capacity(args.len());
  for seq in &args {
    let Value::List(list) = seq else {
      return Err(EvalError::assertion(format!("Arguments to zip must be lists, not {}", seq.type_name())).into());
    };
    let items = list.items();
    if let Some(first) = lists.first() {
      ensure!(
        first.len() == items.len(),
        "All arguments to zip must have the same length"
      );
    }
    lists.push(items);
  }

  let len = lists.first().map_or(0, Vec::len);
  let rows = (0..len)
    .map(|i| Value::list(lists.iter().map(|l| l[i].clone()).collect()))
    .collect();
  Ok(Value::list(rows))
}

fn to_bool(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Bool(args[0].is_truthy()))
}

fn to_str(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  Ok(Value::Str(args[0].to_string()))
}

fn to_int(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  match &args[0] {
    Value::Int(i) => Ok(Value::Int(*i)),
    Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
    Value::Str(s) => s
      .trim()
      .parse()
      .map(Value::Int)
      .map_err(|_| EvalError::assertion(format!("invalid literal for int(): {:?}", s)).into()),
    other => Err(
      EvalError::assertion(format!(
        "int() argument must be a str or int, not {}",
        other.type_name()
      ))
      .into(),
    ),
  }
}

fn to_list(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  match &args[0] {
    Value::None => Ok(Value::list(Vec::new())),
    Value::List(list) => Ok(Value::list(list.items())),
    Value::Dict(dict) => Ok(Value::str_list(dict.read().keys())),
    other => Err(EvalError::assertion(format!("'{}' object is not iterable", other.type_name())).into()),
  }
}

/// Runs in the call frame, whose locals are exactly the keyword arguments.
fn to_dict(scope: &mut Scope<'_>, _: Vec<Value>) -> Flow<Value> {
  Ok(Value::dict(scope.locals().clone()))
}

fn join_path(_: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let segments = args
    .iter()
    .map(|arg| arg.expect_str("join_path").map(str::to_string))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Value::Str(join_segments(&segments)))
}

/// Join `/`-separated path segments and normalize `.` and `..` lexically.
pub fn join_segments(segments: &[String]) -> String {
  let joined: Vec<&str> = segments.iter().map(String::as_str).filter(|s| !s.is_empty()).collect();
  if joined.is_empty() {
    return String::new();
  }
  let joined = joined.join("/");
  let absolute = joined.starts_with('/');

  let mut parts: Vec<&str> = Vec::new();
  for component in joined.split('/') {
    match component {
      "" | "." => {}
      ".." => match parts.last() {
        Some(&last) if last != ".." => {
          parts.pop();
        }
        _ if absolute => {}
        _ => parts.push(".."),
      },
      other => parts.push(other),
    }
  }

  let body = parts.join("/");
  match (absolute, body.is_empty()) {
    (true, _) => format!("/{}", body),
    (false, true) => ".".to_string(),
    (false, false) => body,
  }
}

fn package_name(scope: &mut Scope<'_>, _: Vec<Value>) -> Flow<Value> {
  Ok(Value::Str(scope.require_package()?.name.clone()))
}

/// Build files are never matched: their names are always excluded.
fn glob(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let package = scope.require_package()?.name.clone();
  let includes = args[0].string_list("includes")?;
  let mut excludes = if args[1].is_none() {
    args[2].optional_string_list("exclude")?
  } else {
    args[1].string_list("excludes")?
  };
  let hidden = args[3].is_truthy();

  let interp = scope.interp();
  excludes.extend(interp.configuration().parse.build_file_names.iter().cloned());
  let matches = interp.host().glob(&package, &includes, &excludes, hidden)?;
  trace!(%package, count = matches.len(), "glob");
  Ok(Value::str_list(matches))
}
