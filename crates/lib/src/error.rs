//! Error and control-flow types shared by every evaluation frame.
//!
//! Evaluation has three outcomes besides success:
//!
//! - an [`EvalError`], which aborts the current package (or callback) evaluation
//! - an [`EvalError::Fatal`], which the driver turns into process termination
//! - a [`Signal::Defer`], which is not an error at all: it asks the driver to
//!   re-run the whole package once the carried label has been built
//!
//! All three travel up the call stack through [`Flow`] with plain `?`.

use thiserror::Error;

use crate::graph::GraphError;
use crate::label::{BuildLabel, LabelError};

/// Errors raised while evaluating a build file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
  /// A precondition check failed (duplicate target, bad argument type, ...).
  #[error("{0}")]
  Assertion(String),

  /// The run cannot continue correctly.
  #[error("fatal: {0}")]
  Fatal(String),

  #[error(transparent)]
  Label(#[from] LabelError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  /// An error annotated with the build file it came from.
  #[error("//{filename}: {source}")]
  Package {
    filename: String,
    #[source]
    source: Box<EvalError>,
  },
}

impl EvalError {
  pub fn assertion(message: impl Into<String>) -> Self {
    EvalError::Assertion(message.into())
  }

  /// Whether this error (or the error it wraps) must end the process.
  pub fn is_fatal(&self) -> bool {
    match self {
      EvalError::Fatal(_) => true,
      EvalError::Package { source, .. } => source.is_fatal(),
      _ => false,
    }
  }

  /// Attach the build file name, unless the error already carries one.
  pub fn in_file(self, filename: &str) -> Self {
    match self {
      EvalError::Package { .. } => self,
      other => EvalError::Package {
        filename: filename.to_string(),
        source: Box::new(other),
      },
    }
  }
}

/// Non-local outcome of an evaluation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
  /// Evaluation of the current package must be retried once this label is built.
  Defer(BuildLabel),
  Error(EvalError),
}

impl Signal {
  /// The deferred label, if this is a defer signal.
  pub fn deferred(&self) -> Option<&BuildLabel> {
    match self {
      Signal::Defer(label) => Some(label),
      Signal::Error(_) => None,
    }
  }
}

impl std::fmt::Display for Signal {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Signal::Defer(label) => write!(f, "deferred until {} is built", label),
      Signal::Error(err) => write!(f, "{}", err),
    }
  }
}

impl From<EvalError> for Signal {
  fn from(err: EvalError) -> Self {
    Signal::Error(err)
  }
}

impl From<LabelError> for Signal {
  fn from(err: LabelError) -> Self {
    Signal::Error(err.into())
  }
}

impl From<GraphError> for Signal {
  fn from(err: GraphError) -> Self {
    Signal::Error(err.into())
  }
}

/// Result of any evaluation step that may defer.
pub type Flow<T> = Result<T, Signal>;

/// Return an [`EvalError::Assertion`] unless `cond` holds.
///
/// Works in functions returning either `Result<_, EvalError>` or [`Flow`].
#[macro_export]
macro_rules! ensure {
  ($cond:expr, $($arg:tt)+) => {
    if !$cond {
      return Err($crate::error::EvalError::Assertion(format!($($arg)+)).into());
    }
  };
}
