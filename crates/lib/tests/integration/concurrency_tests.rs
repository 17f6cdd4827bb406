//! Many packages parsing at once share one graph.

use std::sync::Arc;
use std::thread;

use weft_lib::{BuildLabel, ParseOutcome, TargetState, Value};

use super::common::{call_positional, declare, driver, script};

#[test]
fn packages_parse_concurrently_into_one_graph() {
  let driver = Arc::new(driver());

  thread::scope(|s| {
    for i in 0..8 {
      let driver = driver.clone();
      s.spawn(move || {
        let name = format!("pkg{i}");
        let file = script(move |scope| {
          declare(scope, "lib", &[])?;
          let dep = if i > 0 { format!("//pkg{}:lib", i - 1) } else { ":lib".to_string() };
          if i > 0 {
            declare(scope, "bin", &[("deps", Value::str_list([dep.as_str()]))])?;
          }
          Ok(())
        });
        let outcome = driver.parse_package(&name, &format!("{name}/BUILD"), file).unwrap();
        assert!(matches!(outcome, ParseOutcome::Parsed(_)));
      });
    }
  });

  let graph = driver.interpreter().graph();
  assert_eq!(graph.num_targets(), 15);
  assert_eq!(
    graph.dependencies_of(&BuildLabel::new("pkg3", "bin")),
    vec![BuildLabel::new("pkg2", "lib")]
  );
}

#[test]
fn concurrent_waiters_on_one_label_all_restart() {
  let driver = Arc::new(driver());
  let defs = script(|scope| {
    declare(scope, "defs", &[])?;
    Ok(())
  });
  driver.parse_package("defs", "defs/BUILD", defs).unwrap();

  thread::scope(|s| {
    for i in 0..4 {
      let driver = driver.clone();
      s.spawn(move || {
        let file = script(|scope| {
          call_positional(scope, "subinclude", &["//defs:defs"])?;
          declare(scope, "user", &[])?;
          Ok(())
        });
        let name = format!("user{i}");
        driver.parse_package(&name, &format!("{name}/BUILD"), file).unwrap();
      });
    }
  });
  let label = BuildLabel::new("defs", "defs");
  assert_eq!(driver.pending(), vec![label.clone()]);

  driver.interpreter().graph().target(&label).unwrap().set_state(TargetState::Built);
  let restarted = driver.target_built(&label);
  assert_eq!(restarted.len(), 4);
  assert!(restarted.iter().all(|r| matches!(r, Ok(ParseOutcome::Parsed(_)))));
  assert_eq!(driver.interpreter().graph().num_targets(), 5);
}
