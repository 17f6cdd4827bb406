//! Target declaration: `build_rule` and its fixed-command variants, plus
//! `package()`.
//!
//! `build_rule` reads its arguments by slot. The slots are the variants of
//! [`RuleArg`], in declaration order, and [`build_rule_params`] is generated
//! from the same enum, so the declaration and the code that reads it cannot
//! disagree about where an argument lives. `filegroup` and `hash_filegroup`
//! share the one declaration object.

use std::sync::{Arc, LazyLock};

use tracing::debug;

use super::Registry;
use crate::ensure;
use crate::error::{EvalError, Flow};
use crate::graph::{BuildTarget, Package};
use crate::interp::{Function, Params, Scope};
use crate::label::{BuildLabel, looks_like_build_label};
use crate::value::Value;

/// Command given to every `filegroup` target.
pub const FILEGROUP_COMMAND: &str = "filegroup";
/// Command given to every `hash_filegroup` target.
pub const HASH_FILEGROUP_COMMAND: &str = "hash_filegroup";

const DEFAULT_BUILDING_DESCRIPTION: &str = "Building...";

/// Tests marked `flaky = True` are retried this many times.
const DEFAULT_FLAKINESS: i64 = 3;

/// Argument slots of `build_rule`, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleArg {
  Name,
  Cmd,
  TestCmd,
  Srcs,
  Data,
  Outs,
  Deps,
  ExportedDeps,
  Secrets,
  Tools,
  Labels,
  Visibility,
  Hashes,
  Binary,
  Test,
  TestOnly,
  BuildingDescription,
  NeedsTransitiveDeps,
  OutputIsComplete,
  Container,
  Sandbox,
  TestSandbox,
  NoTestOutput,
  Flaky,
  BuildTimeout,
  TestTimeout,
  PreBuild,
  PostBuild,
  Requires,
  Provides,
  Licences,
  TestOutputs,
  SystemSrcs,
  Stamp,
  Tag,
  OptionalOuts,
  Progress,
}

impl RuleArg {
  pub const ALL: [RuleArg; 37] = [
    RuleArg::Name,
    RuleArg::Cmd,
    RuleArg::TestCmd,
    RuleArg::Srcs,
    RuleArg::Data,
    RuleArg::Outs,
    RuleArg::Deps,
    RuleArg::ExportedDeps,
    RuleArg::Secrets,
    RuleArg::Tools,
    RuleArg::Labels,
    RuleArg::Visibility,
    RuleArg::Hashes,
    RuleArg::Binary,
    RuleArg::Test,
    RuleArg::TestOnly,
    RuleArg::BuildingDescription,
    RuleArg::NeedsTransitiveDeps,
    RuleArg::OutputIsComplete,
    RuleArg::Container,
    RuleArg::Sandbox,
    RuleArg::TestSandbox,
    RuleArg::NoTestOutput,
    RuleArg::Flaky,
    RuleArg::BuildTimeout,
    RuleArg::TestTimeout,
    RuleArg::PreBuild,
    RuleArg::PostBuild,
    RuleArg::Requires,
    RuleArg::Provides,
    RuleArg::Licences,
    RuleArg::TestOutputs,
    RuleArg::SystemSrcs,
    RuleArg::Stamp,
    RuleArg::Tag,
    RuleArg::OptionalOuts,
    RuleArg::Progress,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  /// Keyword name in build files.
  pub fn name(self) -> &'static str {
    match self {
      RuleArg::Name => "name",
      RuleArg::Cmd => "cmd",
      RuleArg::TestCmd => "test_cmd",
      RuleArg::Srcs => "srcs",
      RuleArg::Data => "data",
      RuleArg::Outs => "outs",
      RuleArg::Deps => "deps",
      RuleArg::ExportedDeps => "exported_deps",
      RuleArg::Secrets => "secrets",
      RuleArg::Tools => "tools",
      RuleArg::Labels => "labels",
      RuleArg::Visibility => "visibility",
      RuleArg::Hashes => "hashes",
      RuleArg::Binary => "binary",
      RuleArg::Test => "test",
      RuleArg::TestOnly => "test_only",
      RuleArg::BuildingDescription => "building_description",
      RuleArg::NeedsTransitiveDeps => "needs_transitive_deps",
      RuleArg::OutputIsComplete => "output_is_complete",
      RuleArg::Container => "container",
      RuleArg::Sandbox => "sandbox",
      RuleArg::TestSandbox => "test_sandbox",
      RuleArg::NoTestOutput => "no_test_output",
      RuleArg::Flaky => "flaky",
      RuleArg::BuildTimeout => "build_timeout",
      RuleArg::TestTimeout => "test_timeout",
      RuleArg::PreBuild => "pre_build",
      RuleArg::PostBuild => "post_build",
      RuleArg::Requires => "requires",
      RuleArg::Provides => "provides",
      RuleArg::Licences => "licences",
      RuleArg::TestOutputs => "test_outputs",
      RuleArg::SystemSrcs => "system_srcs",
      RuleArg::Stamp => "stamp",
      RuleArg::Tag => "tag",
      RuleArg::OptionalOuts => "optional_outs",
      RuleArg::Progress => "progress",
    }
  }

  /// Default value (`None` for the required `name`) and accepted types.
  fn declaration(self) -> (Option<Value>, &'static [&'static str]) {
    match self {
      RuleArg::Name => (None, &["str"]),
      RuleArg::Cmd | RuleArg::TestCmd => (Some(Value::None), &["str", "dict"]),
      RuleArg::Srcs | RuleArg::Outs => (Some(Value::None), &["list", "dict"]),
      RuleArg::Data
      | RuleArg::Deps
      | RuleArg::ExportedDeps
      | RuleArg::Secrets
      | RuleArg::Tools
      | RuleArg::Labels
      | RuleArg::Visibility
      | RuleArg::Hashes
      | RuleArg::Requires
      | RuleArg::Licences
      | RuleArg::TestOutputs
      | RuleArg::SystemSrcs
      | RuleArg::OptionalOuts => (Some(Value::None), &["list"]),
      RuleArg::Provides => (Some(Value::None), &["dict"]),
      RuleArg::BuildingDescription => (Some(Value::None), &["str"]),
      RuleArg::Tag => (Some(Value::from("")), &["str"]),
      RuleArg::PreBuild | RuleArg::PostBuild => (Some(Value::None), &["function"]),
      RuleArg::TestOnly | RuleArg::Sandbox | RuleArg::TestSandbox => (Some(Value::None), &["bool"]),
      RuleArg::Flaky | RuleArg::BuildTimeout | RuleArg::TestTimeout => (Some(Value::Int(0)), &["int"]),
      RuleArg::Binary
      | RuleArg::Test
      | RuleArg::NeedsTransitiveDeps
      | RuleArg::OutputIsComplete
      | RuleArg::Container
      | RuleArg::NoTestOutput
      | RuleArg::Stamp
      | RuleArg::Progress => (Some(Value::Bool(false)), &["bool"]),
    }
  }
}

/// Slots filled from `CONFIG` when the caller leaves them unset.
const CONFIG_DEFAULTS: [(RuleArg, &str); 5] = [
  (RuleArg::Visibility, "DEFAULT_VISIBILITY"),
  (RuleArg::TestOnly, "DEFAULT_TESTONLY"),
  (RuleArg::Licences, "DEFAULT_LICENCES"),
  (RuleArg::Sandbox, "BUILD_SANDBOX"),
  (RuleArg::TestSandbox, "TEST_SANDBOX"),
];

static BUILD_RULE_PARAMS: LazyLock<Arc<Params>> = LazyLock::new(|| {
  let mut builder = Params::builder();
  for arg in RuleArg::ALL {
    builder = match arg.declaration() {
      (Some(default), types) => builder.optional(arg.name(), default, types),
      (None, types) => builder.required(arg.name(), types),
    };
  }
  builder.build()
});

/// The parameter declaration shared by `build_rule`, `filegroup` and `hash_filegroup`.
pub fn build_rule_params() -> Arc<Params> {
  BUILD_RULE_PARAMS.clone()
}

pub(super) fn register(registry: &mut Registry) {
  registry.native("build_rule", build_rule_params(), build_rule);
  registry.native("filegroup", build_rule_params(), filegroup);
  registry.native("hash_filegroup", build_rule_params(), hash_filegroup);
  registry.native("package", Params::builder().kwargs().build(), package);
}

/// Resolved `build_rule` arguments, addressed by slot.
struct RuleArgs(Vec<Value>);

impl RuleArgs {
  fn new(args: Vec<Value>) -> Result<Self, EvalError> {
    ensure!(
      args.len() == RuleArg::ALL.len(),
      "build_rule() expects {} arguments, got {}",
      RuleArg::ALL.len(),
      args.len()
    );
    Ok(Self(args))
  }

  fn get(&self, arg: RuleArg) -> &Value {
    &self.0[arg.index()]
  }

  fn set(&mut self, arg: RuleArg, value: Value) {
    self.0[arg.index()] = value;
  }

  fn flag(&self, arg: RuleArg) -> bool {
    self.get(arg).is_truthy()
  }

  fn strings(&self, arg: RuleArg) -> Result<Vec<String>, EvalError> {
    self.get(arg).optional_string_list(arg.name())
  }
}

/// Declare a target in the current package and return its relative label.
pub fn build_rule(scope: &mut Scope<'_>, args: Vec<Value>) -> Flow<Value> {
  let mut args = RuleArgs::new(args)?;
  let config = scope.config()?;
  for (arg, key) in CONFIG_DEFAULTS {
    if args.get(arg).is_none() {
      args.set(arg, config.get(key, Value::None));
    }
  }

  let pkg = scope.require_package()?.clone();
  let target = create_target(scope, &pkg, &args)?;
  ensure!(
    pkg.target(&target.label.name).is_none(),
    "Duplicate build target in {}: {}",
    pkg.name,
    target.label.name
  );
  if let Err(err) = declare_target(scope, &pkg, &target, &args) {
    pkg.release_outputs(&target.label);
    return Err(err.into());
  }

  Ok(Value::Str(format!(":{}", target.label.name)))
}

/// Populate `target` and add it to the package, and to the graph when called from a callback.
///
/// On error the target is in neither.
fn declare_target(
  scope: &Scope<'_>,
  pkg: &Package,
  target: &Arc<BuildTarget>,
  args: &RuleArgs,
) -> Result<(), EvalError> {
  populate_target(pkg, target, args)?;
  if scope.is_callback() {
    // Declared from a callback: no end-of-parse registration will pick this up.
    debug!(label = %target.label, "adding new target directly to graph");
    target.data().added_post_build = true;
    scope.interp().graph().add_target(target.clone())?;
    pkg.add_target(target.clone());
    pkg.mark_target_modified(target);
  } else {
    pkg.add_target(target.clone());
  }
  Ok(())
}

fn filegroup(scope: &mut Scope<'_>, mut args: Vec<Value>) -> Flow<Value> {
  args[RuleArg::Cmd.index()] = Value::from(FILEGROUP_COMMAND);
  build_rule(scope, args)
}

fn hash_filegroup(scope: &mut Scope<'_>, mut args: Vec<Value>) -> Flow<Value> {
  args[RuleArg::Cmd.index()] = Value::from(HASH_FILEGROUP_COMMAND);
  build_rule(scope, args)
}

/// Apply a tag to a target name: `lib` tagged `srcs` is `_lib#srcs`, and
/// `_lib#srcs` tagged `zip` is `_lib#srcs_zip`.
pub fn tag_name(name: &str, tag: &str) -> String {
  let mut tagged = String::with_capacity(name.len() + tag.len() + 2);
  if !name.starts_with('_') {
    tagged.push('_');
  }
  tagged.push_str(name);
  tagged.push(if name.contains('#') { '_' } else { '#' });
  tagged.push_str(tag);
  tagged
}

fn create_target(scope: &Scope<'_>, pkg: &Package, args: &RuleArgs) -> Result<Arc<BuildTarget>, EvalError> {
  let mut name = args.get(RuleArg::Name).expect_str("name")?.to_string();
  let tag = args.get(RuleArg::Tag).str_or_empty("tag")?;
  if !tag.is_empty() {
    name = tag_name(&name, tag);
  }
  let label = BuildLabel::parse(&format!(":{}", name), &pkg.name)?;
  let target = BuildTarget::new(label, &scope.interp().configuration().build.out_dir);

  {
    let mut data = target.data();
    data.is_binary = args.flag(RuleArg::Binary);
    data.is_test = args.flag(RuleArg::Test);
    data.test_only = args.flag(RuleArg::TestOnly);
    data.needs_transitive_deps = args.flag(RuleArg::NeedsTransitiveDeps);
    data.output_is_complete = args.flag(RuleArg::OutputIsComplete);
    data.container = args.flag(RuleArg::Container);
    data.sandbox = args.flag(RuleArg::Sandbox);
    data.test_sandbox = args.flag(RuleArg::TestSandbox);
    data.no_test_output = args.flag(RuleArg::NoTestOutput);
    data.stamp = args.flag(RuleArg::Stamp);
    data.show_progress = args.flag(RuleArg::Progress);
    data.building_description = match args.get(RuleArg::BuildingDescription) {
      Value::None => DEFAULT_BUILDING_DESCRIPTION.to_string(),
      other => other.expect_str("building_description")?.to_string(),
    };
    data.flakiness = match args.get(RuleArg::Flaky) {
      Value::Bool(true) => DEFAULT_FLAKINESS,
      other => other.expect_int("flaky")?,
    };
    data.build_timeout = args.get(RuleArg::BuildTimeout).expect_int("build_timeout")?;
    data.test_timeout = args.get(RuleArg::TestTimeout).expect_int("test_timeout")?;
    data.labels = args.strings(RuleArg::Labels)?;
    data.licences = args.strings(RuleArg::Licences)?;
    data.visibility = args.strings(RuleArg::Visibility)?;
    data.hashes = args.strings(RuleArg::Hashes)?;
    data.secrets = args.strings(RuleArg::Secrets)?;
    data.requires = args.strings(RuleArg::Requires)?;
    data.test_outputs = args.strings(RuleArg::TestOutputs)?;
    data.optional_outputs = args.strings(RuleArg::OptionalOuts)?;
    data.pre_build = function(args.get(RuleArg::PreBuild));
    data.post_build = function(args.get(RuleArg::PostBuild));
  }
  Ok(Arc::new(target))
}

fn function(value: &Value) -> Option<Arc<Function>> {
  match value {
    Value::Function(func) => Some(func.clone()),
    _ => None,
  }
}

/// Fill in everything that refers to other targets or files.
fn populate_target(pkg: &Package, target: &BuildTarget, args: &RuleArgs) -> Result<(), EvalError> {
  match args.get(RuleArg::Cmd) {
    Value::None => {}
    Value::Dict(commands) => {
      for (config, command) in commands.entries() {
        target.add_command(&config, command.expect_str("cmd")?);
      }
    }
    command => target.set_command(command.expect_str("cmd")?),
  }
  match args.get(RuleArg::TestCmd) {
    Value::None => {}
    Value::Dict(commands) => {
      let mut data = target.data();
      for (config, command) in commands.entries() {
        let command = command.expect_str("test_cmd")?.to_string();
        data.test_commands.insert(config, command);
      }
    }
    command => target.data().test_command = command.expect_str("test_cmd")?.to_string(),
  }

  let sources = match args.get(RuleArg::Srcs) {
    Value::Dict(named) => {
      let mut sources = Vec::new();
      for (name, srcs) in named.entries() {
        sources.extend(srcs.string_list(&format!("srcs[{:?}]", name))?);
      }
      sources
    }
    other => other.optional_string_list("srcs")?,
  };
  let sources = inputs(pkg, target, sources)?;
  let data = inputs(pkg, target, args.strings(RuleArg::Data)?)?;
  let tools = inputs(pkg, target, args.strings(RuleArg::Tools)?)?;
  {
    let mut target_data = target.data();
    target_data.sources = sources;
    target_data.sources.extend(args.strings(RuleArg::SystemSrcs)?);
    target_data.data = data;
    target_data.tools = tools;
  }

  match args.get(RuleArg::Outs) {
    Value::Dict(named) => {
      for (name, outs) in named.entries() {
        for out in outs.string_list(&format!("outs[{:?}]", name))? {
          target.add_named_output(&name, &out);
          pkg.must_register_output(&out, target)?;
        }
      }
    }
    other => {
      for out in other.optional_string_list("outs")? {
        target.add_output(&out);
        pkg.must_register_output(&out, target)?;
      }
    }
  }

  for dep in args.strings(RuleArg::Deps)? {
    target.add_maybe_exported_dependency(BuildLabel::parse(&dep, &pkg.name)?, false);
  }
  for dep in args.strings(RuleArg::ExportedDeps)? {
    target.add_maybe_exported_dependency(BuildLabel::parse(&dep, &pkg.name)?, true);
  }

  if let Value::Dict(provides) = args.get(RuleArg::Provides) {
    let mut resolved = Vec::new();
    for (lang, label) in provides.entries() {
      resolved.push((lang, BuildLabel::parse(label.expect_str("provides")?, &pkg.name)?));
    }
    target.data().provides.extend(resolved);
  }
  Ok(())
}

/// Inputs written as build labels are also dependencies of the target.
fn inputs(pkg: &Package, target: &BuildTarget, inputs: Vec<String>) -> Result<Vec<String>, EvalError> {
  for input in &inputs {
    if looks_like_build_label(input) {
      target.add_maybe_exported_dependency(BuildLabel::parse(input, &pkg.name)?, false);
    }
  }
  Ok(inputs)
}

/// Override configuration values for the rest of this package.
///
/// Runs in the call frame, whose locals are exactly the keyword arguments.
fn package(scope: &mut Scope<'_>, _: Vec<Value>) -> Flow<Value> {
  let pkg = scope.require_package()?;
  ensure!(
    pkg.num_targets() == 0,
    "package() must be called before any build targets are defined"
  );
  let config = scope.config()?;
  for (key, value) in scope.locals() {
    let key = key.to_uppercase();
    ensure!(
      config.contains(&key),
      "error calling package(): {} is not a known config value",
      key
    );
    config.set(&key, value.clone());
  }
  Ok(Value::None)
}
