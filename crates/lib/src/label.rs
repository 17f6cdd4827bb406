//! Build labels.
//!
//! A build label fully identifies a target: `//package/path:name`. Inside a
//! build file a label may also be written relative to the current package
//! (`:name`), or as a bare package (`//package/path`), in which case the name
//! defaults to the last path component.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
  #[error("empty build label")]
  Empty,

  #[error("invalid build label '{label}': {reason}")]
  Malformed { label: String, reason: &'static str },
}

/// A fully-qualified reference to a build target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildLabel {
  pub package_name: String,
  pub name: String,
}

/// Whether a string is written in build label syntax rather than as a plain name.
pub fn looks_like_build_label(s: &str) -> bool {
  s.starts_with("//") || s.starts_with(':') || s.starts_with('@')
}

impl BuildLabel {
  pub fn new(package_name: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      package_name: package_name.into(),
      name: name.into(),
    }
  }

  /// Parse a label, resolving `:name` against `current_package`.
  pub fn parse(label: &str, current_package: &str) -> Result<Self, LabelError> {
    let malformed = |reason| LabelError::Malformed {
      label: label.to_string(),
      reason,
    };

    if label.is_empty() {
      return Err(LabelError::Empty);
    }
    if label.starts_with('@') {
      return Err(malformed("subrepository labels are not supported"));
    }

    if let Some(name) = label.strip_prefix(':') {
      validate_name(name).map_err(malformed)?;
      return Ok(Self::new(current_package, name));
    }

    let Some(rest) = label.strip_prefix("//") else {
      return Err(malformed("labels must start with // or :"));
    };

    let (package, name) = match rest.split_once(':') {
      Some((package, name)) => (package, name.to_string()),
      None => {
        let last = rest.rsplit('/').next().unwrap_or_default();
        if last.is_empty() {
          return Err(malformed("cannot infer a target name from an empty package"));
        }
        (rest, last.to_string())
      }
    };

    if package.starts_with('/') || package.ends_with('/') {
      return Err(malformed("package path has a leading or trailing slash"));
    }
    validate_name(&name).map_err(malformed)?;

    Ok(Self::new(package, name))
  }
}

fn validate_name(name: &str) -> Result<(), &'static str> {
  if name.is_empty() {
    return Err("target name is empty");
  }
  if name.contains(':') {
    return Err("target name contains ':'");
  }
  if name.contains('/') {
    return Err("target name contains '/'");
  }
  Ok(())
}

impl fmt::Display for BuildLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "//{}:{}", self.package_name, self.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod parse {
    use super::*;

    #[test]
    fn full_label() {
      let label = BuildLabel::parse("//src/core:lib", "").unwrap();
      assert_eq!(label, BuildLabel::new("src/core", "lib"));
    }

    #[test]
    fn bare_package_uses_last_component() {
      let label = BuildLabel::parse("//src/core", "").unwrap();
      assert_eq!(label, BuildLabel::new("src/core", "core"));
    }

    #[test]
    fn relative_label_uses_current_package() {
      let label = BuildLabel::parse(":gen", "tools").unwrap();
      assert_eq!(label, BuildLabel::new("tools", "gen"));
    }

    #[test]
    fn root_package_label() {
      let label = BuildLabel::parse("//:all", "").unwrap();
      assert_eq!(label, BuildLabel::new("", "all"));
    }

    #[test]
    fn rejects_plain_names() {
      assert!(matches!(
        BuildLabel::parse("lib", ""),
        Err(LabelError::Malformed { .. })
      ));
    }

    #[test]
    fn rejects_empty() {
      assert_eq!(BuildLabel::parse("", "pkg"), Err(LabelError::Empty));
      assert!(BuildLabel::parse(":", "pkg").is_err());
      assert!(BuildLabel::parse("//", "pkg").is_err());
    }

    #[test]
    fn rejects_trailing_slash() {
      assert!(BuildLabel::parse("//src/:x", "").is_err());
    }
  }

  #[test]
  fn display_is_fully_qualified() {
    assert_eq!(BuildLabel::new("a/b", "c").to_string(), "//a/b:c");
  }

  #[test]
  fn label_syntax_detection() {
    assert!(looks_like_build_label("//a:b"));
    assert!(looks_like_build_label(":b"));
    assert!(looks_like_build_label("@repo//a:b"));
    assert!(!looks_like_build_label("b"));
    assert!(!looks_like_build_label("https://example.com/x.build_defs"));
  }
}
