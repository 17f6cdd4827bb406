//! A package that fails to register leaves no trace in the graph.

use weft_lib::{BuildLabel, ParseOutcome, Value};

use super::common::{declare, driver, script};

#[test]
fn cyclic_package_is_not_registered() {
  let driver = driver();
  let a = script(|scope| {
    declare(scope, "x", &[("deps", Value::str_list(["//b:y"]))])?;
    Ok(())
  });
  driver.parse_package("a", "a/BUILD", a).unwrap();

  let b = script(|scope| {
    declare(scope, "w", &[("deps", Value::str_list([":y"]))])?;
    declare(scope, "y", &[("deps", Value::str_list(["//a:x"]))])?;
    Ok(())
  });
  let err = driver.parse_package("b", "b/BUILD", b).unwrap_err();
  assert_eq!(
    err.to_string(),
    "//b/BUILD: dependency from //b:y on //a:x would create a cycle"
  );

  let graph = driver.interpreter().graph();
  let w = BuildLabel::new("b", "w");
  assert!(graph.package("b").is_none());
  assert!(graph.target(&w).is_none());
  assert!(graph.target(&BuildLabel::new("b", "y")).is_none());
  assert!(graph.dependencies_of(&w).is_empty());
  assert_eq!(graph.num_targets(), 1);

  let fixed = script(|scope| {
    declare(scope, "w", &[("deps", Value::str_list([":y"]))])?;
    declare(scope, "y", &[])?;
    Ok(())
  });
  let outcome = driver.parse_package("b", "b/BUILD", fixed).unwrap();
  assert!(matches!(outcome, ParseOutcome::Parsed(_)));
  assert_eq!(graph.dependencies_of(&w), vec![BuildLabel::new("b", "y")]);
}
