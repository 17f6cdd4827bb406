//! Packages that subinclude unbuilt targets are parked and re-run from scratch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use weft_lib::{BuildLabel, ParseOutcome, TargetState, Value};

use super::common::{SymbolHost, call_positional, declare, driver, driver_with_host, script};

fn defs_label() -> BuildLabel {
  BuildLabel::new("defs", "defs")
}

fn parse_defs(driver: &weft_lib::Driver) {
  let defs = script(|scope| {
    declare(scope, "defs", &[("outs", Value::str_list(["rules.build_defs"]))])?;
    Ok(())
  });
  let outcome = driver.parse_package("defs", "defs/BUILD", defs).unwrap();
  assert!(matches!(outcome, ParseOutcome::Parsed(_)));
}

fn mark_built(driver: &weft_lib::Driver, label: &BuildLabel) {
  driver.interpreter().graph().target(label).unwrap().set_state(TargetState::Built);
}

#[test]
fn package_restarts_from_scratch_once_subinclude_is_built() {
  let host = SymbolHost::default().with(
    "weft-out/gen/defs/rules.build_defs",
    &[("GENERATED_NAME", Value::from("from_defs"))],
  );
  let driver = driver_with_host(host);
  parse_defs(&driver);

  let attempts = Arc::new(AtomicUsize::new(0));
  let counter = attempts.clone();
  let app = script(move |scope| {
    counter.fetch_add(1, Ordering::SeqCst);
    declare(scope, "early", &[])?;
    call_positional(scope, "subinclude", &["//defs:defs"])?;
    let name = scope.lookup("GENERATED_NAME").unwrap_or(Value::None);
    declare(scope, name.as_str().unwrap_or("missing"), &[("deps", Value::str_list([":early"]))])?;
    Ok(())
  });

  let outcome = driver.parse_package("app", "app/BUILD", app).unwrap();
  assert!(matches!(outcome, ParseOutcome::Deferred(ref label) if *label == defs_label()));
  assert_eq!(driver.pending(), vec![defs_label()]);
  assert!(driver.interpreter().graph().package("app").is_none());

  mark_built(&driver, &defs_label());
  let restarted = driver.target_built(&defs_label());
  assert_eq!(restarted.len(), 1);
  let pkg = restarted[0].as_ref().unwrap().package().unwrap().clone();

  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert!(driver.pending().is_empty());
  assert_eq!(pkg.num_targets(), 2);
  assert_eq!(pkg.subincludes(), vec![defs_label()]);

  let graph = driver.interpreter().graph();
  let generated = BuildLabel::new("app", "from_defs");
  assert!(graph.target(&generated).is_some());
  assert_eq!(graph.dependencies_of(&generated), vec![BuildLabel::new("app", "early")]);
}

#[test]
fn unrelated_waiters_stay_parked() {
  let driver = driver();
  let waits_on = |label: &'static str| {
    script(move |scope| {
      call_positional(scope, "subinclude", &[label])?;
      Ok(())
    })
  };
  driver.parse_package("a", "a/BUILD", waits_on("//defs:defs")).unwrap();
  driver.parse_package("b", "b/BUILD", waits_on("//other:other")).unwrap();
  assert_eq!(driver.pending().len(), 2);

  assert!(driver.target_built(&BuildLabel::new("nobody", "waits")).is_empty());
  assert_eq!(driver.pending().len(), 2);
}

#[test]
fn subinclude_of_declared_but_unbuilt_target_defers() {
  let driver = driver();
  parse_defs(&driver);
  driver
    .interpreter()
    .graph()
    .target(&defs_label())
    .unwrap()
    .set_state(TargetState::Building);

  let app = script(|scope| {
    call_positional(scope, "subinclude", &["//defs:defs"])?;
    Ok(())
  });
  let outcome = driver.parse_package("app", "app/BUILD", app).unwrap();
  assert!(matches!(outcome, ParseOutcome::Deferred(_)));
}

#[test]
fn fatal_errors_are_reported_with_the_build_file() {
  let driver = driver();
  let app = script(|scope| {
    call_positional(scope, "fatal", &["cannot continue"])?;
    Ok(())
  });
  let err = driver.parse_package("app", "app/BUILD", app).unwrap_err();
  assert!(err.is_fatal());
  assert_eq!(err.to_string(), "//app/BUILD: fatal: cannot continue");
}
