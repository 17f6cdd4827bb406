//! `subinclude()`: import the symbols another target's outputs define.
//!
//! A subinclude can only be satisfied once its target is built. Until then the
//! call returns [`Signal::Defer`], which unwinds the whole package evaluation;
//! the driver re-runs the package from the start once the label is built, and
//! the second run finds the target ready.
//!
//! Subincluding a URL instead of a label materializes a target in the reserved
//! [`SUBINCLUDE_PACKAGE`] by calling the prelude's `remote_file` rule, so
//! remote targets get the same validation and defaults as any declared one.

use std::sync::Arc;

use tracing::debug;

use super::Registry;
use crate::ensure;
use crate::error::{EvalError, Flow, Signal};
use crate::graph::{Graph, Package};
use crate::interp::{Call, Expr, Params, Scope};
use crate::label::BuildLabel;
use crate::value::Value;

/// Package holding targets synthesized for remote subincludes.
pub const SUBINCLUDE_PACKAGE: &str = "_remote";

pub(super) fn register(registry: &mut Registry) {
  registry.native(
    "subinclude",
    Params::builder()
      .required("target", &["str"])
      .optional("hashes", Value::None, &["str", "list"])
      .build(),
    subinclude,
  );
}

/// The reserved remote package, created and added to the graph on first use.
pub fn register_subinclude_package(graph: &Graph) -> Arc<Package> {
  graph.package_or_insert_with(SUBINCLUDE_PACKAGE, || {
    debug!(package = SUBINCLUDE_PACKAGE, "registering subinclude package");
    Package::new(SUBINCLUDE_PACKAGE, SUBINCLUDE_PACKAGE)
  })
}

fn subinclude(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let label = subinclude_label(scope, &args)?;
  let interp = scope.interp().clone();

  let target = match interp.graph().target(&label) {
    Some(target) if target.is_built() => target,
    _ => {
      debug!(%label, file = scope.filename(), "deferring parse until subinclude is built");
      return Err(Signal::Defer(label));
    }
  };

  if label.package_name != SUBINCLUDE_PACKAGE
    && let Some(pkg) = scope.package()
  {
    pkg.register_subinclude(label.clone());
  }

  let out_dir = target.out_dir();
  for out in target.outputs() {
    let symbols = interp.host().subinclude(&interp, &out_dir.join(&out))?;
    scope.set_all(symbols, false);
  }
  Ok(Value::None)
}

/// The label a `subinclude()` argument refers to.
///
/// A URL maps to a target in the remote package, declared on first sight.
pub fn subinclude_label(scope: &Scope<'_>, args: &[Value]) -> Flow<BuildLabel> {
  let target = args[0].expect_str("target")?;
  ensure!(!target.starts_with(':'), "Subincludes cannot be from the local package");
  if !target.starts_with("http") {
    return Ok(BuildLabel::parse(target, "")?);
  }

  let name = remote_target_name(target);
  let label = BuildLabel::new(SUBINCLUDE_PACKAGE, name.as_str());
  let interp = scope.interp().clone();
  // Whoever loses the claim waits on the target like any other unbuilt subinclude.
  let Some(_claim) = interp.claim_remote_target(&label) else {
    return Ok(label);
  };

  let mut remote = Scope::for_callback(&interp, interp.subinclude_package().clone());
  let Some(Value::Function(remote_file)) = remote.lookup("remote_file") else {
    return Err(EvalError::assertion("remote_file is not callable").into());
  };

  let mut call = Call::new()
    .named("name", Expr::string(name.as_str()))
    .named("url", Expr::string(target));
  match &args[1] {
    Value::None => {}
    Value::Str(hash) => call = call.named("hashes", Expr::List(vec![Expr::string(hash.as_str())])),
    hashes => call = call.named("hashes", Expr::Literal(Value::str_list(hashes.string_list("hashes")?))),
  }
  debug!(%label, url = target, "declaring remote subinclude target");
  remote_file.call(&mut remote, &call)?;
  Ok(label)
}

/// Target name for a remote file: its base name with separators replaced.
fn remote_target_name(url: &str) -> String {
  let base = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
  base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
    .collect()
}
