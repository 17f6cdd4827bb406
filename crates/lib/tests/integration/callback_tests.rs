//! Pre- and post-build callbacks change the graph immediately.

use weft_lib::interp::{Call, Expr};
use weft_lib::{BuildLabel, Driver, TargetState, Value};

use super::common::{call_positional, declare, driver, function, script};

/// Parse package `gen` holding one target `lister` with the given callbacks.
fn parse_lister(driver: &Driver, callbacks: Vec<(&'static str, Value)>) -> BuildLabel {
  let file = script(move |scope| {
    declare(scope, "lister", &callbacks)?;
    Ok(())
  });
  driver.parse_package("gen", "gen/BUILD", file).unwrap();
  let label = BuildLabel::new("gen", "lister");
  driver.interpreter().graph().target(&label).unwrap().set_state(TargetState::Building);
  label
}

/// Post-build callback declaring one target per output line and depending on each.
fn declare_per_line() -> Value {
  function("declare_per_line", &["name", "output"], |frame| {
    let name = frame.lookup("name").unwrap_or(Value::None);
    let name = name.as_str().unwrap_or_default().to_string();
    let lines = frame.lookup("output").map(|o| o.string_list("output")).transpose()?;
    for line in lines.unwrap_or_default() {
      declare(frame, &line, &[])?;
      let dep = format!(":{}", line);
      call_positional(frame, "add_dep", &[name.as_str(), dep.as_str()])?;
    }
    Ok(Value::None)
  })
}

#[test]
fn post_build_targets_and_edges_are_visible_at_once() {
  let driver = driver();
  let label = parse_lister(&driver, vec![("post_build", declare_per_line())]);
  let graph = driver.interpreter().graph().clone();
  let target = graph.target(&label).unwrap();

  driver.run_post_build(&target, "alpha\nbeta\n").unwrap();

  let alpha = BuildLabel::new("gen", "alpha");
  let beta = BuildLabel::new("gen", "beta");
  assert_eq!(graph.dependencies_of(&label), vec![alpha.clone(), beta.clone()]);
  assert!(graph.target(&alpha).unwrap().data().added_post_build);
  assert_eq!(target.dependency_labels(), vec![alpha.clone(), beta.clone()]);

  let pkg = graph.package("gen").unwrap();
  assert_eq!(pkg.modified_targets(), vec![alpha, beta, label]);
}

#[test]
fn pre_build_receives_the_target_name() {
  let driver = driver();
  let set_command = function("set_cmd", &["name"], |frame| {
    let Some(func) = frame.interp().builtin("set_command") else {
      return Ok(Value::None);
    };
    let call = Call::new()
      .positional(Expr::Ident("name".to_string()))
      .positional(Expr::string("echo pre"));
    func.call(frame, &call)
  });
  let label = parse_lister(&driver, vec![("pre_build", set_command)]);
  let target = driver.interpreter().graph().target(&label).unwrap();

  driver.run_pre_build(&target).unwrap();
  assert_eq!(target.command_for_config(""), "echo pre");
}

#[test]
fn callback_failures_name_the_build_file() {
  let driver = driver();
  let broken = function("broken", &["name", "output"], |frame| {
    call_positional(frame, "add_dep", &["nope", ":x"])
  });
  let label = parse_lister(&driver, vec![("post_build", broken)]);
  let target = driver.interpreter().graph().target(&label).unwrap();

  let err = driver.run_post_build(&target, "").unwrap_err();
  assert_eq!(err.to_string(), "//gen/BUILD: Unknown build target nope in gen");
}

#[test]
fn add_dep_during_parse_is_rejected() {
  let driver = driver();
  let file = script(|scope| {
    declare(scope, "lib", &[])?;
    call_positional(scope, "add_dep", &["lib", ":other"])?;
    Ok(())
  });
  let err = driver.parse_package("pkg", "pkg/BUILD", file).unwrap_err();
  assert_eq!(
    err.to_string(),
    "//pkg/BUILD: add_dep can only be called from a pre- or post-build callback"
  );
}

#[test]
fn labels_are_collected_from_a_building_target() {
  let driver = driver();
  let file = script(|scope| {
    declare(scope, "base", &[("labels", Value::str_list(["link:-lbase"]))])?;
    declare(
      scope,
      "top",
      &[
        ("deps", Value::str_list([":base"])),
        ("labels", Value::str_list(["link:-ltop", "unrelated"])),
      ],
    )?;
    Ok(())
  });
  driver.parse_package("pkg", "pkg/BUILD", file).unwrap();
  let graph = driver.interpreter().graph();
  graph.target(&BuildLabel::new("pkg", "top")).unwrap().set_state(TargetState::Building);

  let collect = function("collect", &["name", "output"], |frame| {
    let labels = call_positional(frame, "get_labels", &["top", "link:"])?;
    assert_eq!(labels, Value::str_list(["-lbase", "-ltop"]));
    Ok(Value::None)
  });
  let top = graph.target(&BuildLabel::new("pkg", "top")).unwrap();
  top.data().post_build = match collect {
    Value::Function(func) => Some(func),
    _ => None,
  };
  driver.run_post_build(&top, "").unwrap();
}
