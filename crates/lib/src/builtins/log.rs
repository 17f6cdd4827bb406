//! Log functions callable from build files.
//!
//! `debug("built %s in %d steps", name, n)` interpolates its remaining
//! arguments into a leading format string; called with anything else first,
//! the whole argument list is logged as-is. Every line is prefixed with the
//! calling package's build file, `//<file>: `.

use tracing::{debug, error, info, warn};

use super::Registry;
use crate::error::{EvalError, Flow};
use crate::interp::{Params, Scope};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
  Debug,
  Info,
  Notice,
  Warning,
  Error,
  Fatal,
}

pub(super) fn register(registry: &mut Registry) {
  let params = Params::builder().varargs().build();
  registry.native("debug", params.clone(), log_debug);
  registry.native("info", params.clone(), log_info);
  registry.native("notice", params.clone(), log_notice);
  registry.native("warning", params.clone(), log_warning);
  registry.native("error", params.clone(), log_error);
  registry.native("fatal", params, log_fatal);
}

fn log_debug(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Debug, &args)
}

fn log_info(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Info, &args)
}

fn log_notice(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Notice, &args)
}

fn log_warning(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Warning, &args)
}

fn log_error(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Error, &args)
}

fn log_fatal(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  emit(scope, Level::Fatal, &args)
}

fn emit(scope: &Scope<'_>, level: Level, args: &[Value]) -> Flow<Value> {
  let message = match args.split_first() {
    Some((Value::Str(format), rest)) => sprintf(format, rest),
    _ => Value::list(args.to_vec()).to_string(),
  };
  let file = scope.filename();
  match level {
    Level::Debug => debug!("//{}: {}", file, message),
    Level::Info | Level::Notice => info!("//{}: {}", file, message),
    Level::Warning => warn!("//{}: {}", file, message),
    Level::Error => error!("//{}: {}", file, message),
    Level::Fatal => {
      error!("//{}: {}", file, message);
      return Err(EvalError::Fatal(message).into());
    }
  }
  Ok(Value::None)
}

/// printf-style interpolation.
///
/// `%s` and `%v` render a value as `str()` would, `%d` takes an int, `%q` and `%r`
/// render it quoted, `%%` is a literal percent sign. Missing operands render
/// as `%!s(MISSING)`; surplus ones are appended as `%!(EXTRA ...)`.
pub fn sprintf(format: &str, args: &[Value]) -> String {
  let mut out = String::with_capacity(format.len());
  let mut operands = args.iter();
  let mut chars = format.chars();

  while let Some(c) = chars.next() {
    if c != '%' {
      out.push(c);
      continue;
    }
    let Some(verb) = chars.next() else {
      out.push_str("%!(NOVERB)");
      break;
    };
    if verb == '%' {
      out.push('%');
      continue;
    }
    let Some(operand) = operands.next() else {
      out.push_str(&format!("%!{}(MISSING)", verb));
      continue;
    };
    match verb {
      's' | 'v' => out.push_str(&operand.to_string()),
      'd' => match operand {
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Bool(b) => out.push_str(&i64::from(*b).to_string()),
        other => out.push_str(&format!("%!d({}={})", other.type_name(), other)),
      },
      'q' | 'r' => out.push_str(&operand.repr()),
      other => out.push_str(&format!("%!{}({}={})", other, operand.type_name(), operand)),
    }
  }

  let extra: Vec<String> = operands.map(|v| format!("{}={}", v.type_name(), v)).collect();
  if !extra.is_empty() {
    out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
  }
  out
}
