use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Value;

/// The `CONFIG` object visible to build files.
///
/// The seeded values are shared and never change. Writes land in the object's
/// own overrides, which may also add keys the seed lacks. A package gets its
/// own view through [`ConfigObject::overlay`], so `package()` overrides and
/// `setdefault` additions stay local to the package that made them.
#[derive(Debug, Default)]
pub struct ConfigObject {
  base: Arc<BTreeMap<String, Value>>,
  overrides: RwLock<BTreeMap<String, Value>>,
}

impl ConfigObject {
  pub fn new(values: BTreeMap<String, Value>) -> Self {
    Self {
      base: Arc::new(values),
      overrides: RwLock::new(BTreeMap::new()),
    }
  }

  /// A fresh view over this object's current values with no overrides of its own.
  pub fn overlay(&self) -> Self {
    let mut values = (*self.base).clone();
    values.extend(self.overrides.read().iter().map(|(k, v)| (k.clone(), v.clone())));
    Self::new(values)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.base.contains_key(key) || self.overrides.read().contains_key(key)
  }

  /// The value stored under `key`, or `default` when the key is unknown.
  pub fn get(&self, key: &str, default: Value) -> Value {
    if let Some(value) = self.overrides.read().get(key) {
      return value.clone();
    }
    self.base.get(key).cloned().unwrap_or(default)
  }

  pub fn set(&self, key: &str, value: Value) {
    self.overrides.write().insert(key.to_string(), value);
  }

  pub fn len(&self) -> usize {
    let overrides = self.overrides.read();
    self.base.len() + overrides.keys().filter(|k| !self.base.contains_key(*k)).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
