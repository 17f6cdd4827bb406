//! weft-lib: evaluation core for weft build files
//!
//! This crate provides the pieces a build-file interpreter needs beneath its
//! parser:
//! - `Value`: the dynamic values build files compute with
//! - `Interpreter` and `Scope`: session state and name lookup
//! - `builtins`: the native functions and methods build files call
//! - `Graph`: the packages and targets build files declare
//! - `Driver`: deferred parsing, batch registration and build callbacks

pub mod builtins;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod interp;
pub mod label;
pub mod value;

#[cfg(test)]
mod testutil;

pub use config::Configuration;
pub use driver::{BuildFile, Driver, ParseOutcome};
pub use error::{EvalError, Flow, Signal};
pub use graph::{BuildTarget, Graph, Package, TargetState};
pub use interp::{Host, Interpreter, Scope};
pub use label::BuildLabel;
pub use value::Value;
