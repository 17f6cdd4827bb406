//! Repository configuration.
//!
//! The configuration file is TOML. It seeds the `CONFIG` object build files
//! read from, which in turn supplies the defaults `build_rule` applies to
//! unset arguments.
//!
//! ```toml
//! [parse]
//! build_file_names = ["BUILD", "BUILD.weft"]
//!
//! [build]
//! default_visibility = ["PUBLIC"]
//! sandbox = true
//!
//! [extra]
//! GO_VERSION = "1.22"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::value::{ConfigObject, Value};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
  /// File names treated as build files; always excluded from `glob()`.
  pub build_file_names: Vec<String>,
}

impl Default for ParseConfig {
  fn default() -> Self {
    Self {
      build_file_names: vec!["BUILD".to_string()],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
  pub default_visibility: Vec<String>,
  pub default_testonly: bool,
  pub default_licences: Vec<String>,
  pub sandbox: bool,
  pub test_sandbox: bool,
  /// Root of the output tree.
  pub out_dir: String,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      default_visibility: Vec::new(),
      default_testonly: false,
      default_licences: Vec::new(),
      sandbox: false,
      test_sandbox: false,
      out_dir: "weft-out".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Configuration {
  pub parse: ParseConfig,
  pub build: BuildConfig,
  /// Additional keys exposed verbatim on `CONFIG`.
  pub extra: BTreeMap<String, String>,
}

impl Configuration {
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(s)?)
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_toml_str(&content)
  }

  /// The global `CONFIG` object. Its key set is closed from here on.
  pub fn config_object(&self) -> ConfigObject {
    let mut values = BTreeMap::new();
    values.insert(
      "DEFAULT_VISIBILITY".to_string(),
      list_or_none(&self.build.default_visibility),
    );
    values.insert(
      "DEFAULT_TESTONLY".to_string(),
      Value::Bool(self.build.default_testonly),
    );
    values.insert(
      "DEFAULT_LICENCES".to_string(),
      list_or_none(&self.build.default_licences),
    );
    values.insert("BUILD_SANDBOX".to_string(), Value::Bool(self.build.sandbox));
    values.insert("TEST_SANDBOX".to_string(), Value::Bool(self.build.test_sandbox));
    values.insert(
      "BUILD_FILE_NAMES".to_string(),
      Value::str_list(&self.parse.build_file_names),
    );
    values.insert("OS".to_string(), Value::from(std::env::consts::OS));
    values.insert("ARCH".to_string(), Value::from(std::env::consts::ARCH));
    for (key, value) in &self.extra {
      values.insert(key.to_uppercase(), Value::from(value.as_str()));
    }
    ConfigObject::new(values)
  }
}

fn list_or_none(items: &[String]) -> Value {
  if items.is_empty() {
    Value::None
  } else {
    Value::str_list(items)
  }
}
