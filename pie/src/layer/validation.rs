use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::dependency::TaskData;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::store::StoreReadTxn;
use crate::task::{TaskDefs, TaskKey};
use crate::value::Value;

/// Which checks a [`ValidationLayer`] performs, and whether failing checks abort the build.
///
/// Requiring a task whose definition is not registered always fails with [`Error::MissingTaskDef`]: without its
/// definition the task cannot be executed, so there is no option to turn that check off.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ValidationOptions {
  /// Detect cyclic requires. Cycles always abort the build, regardless of `throw_errors`.
  pub cycle: bool,
  /// Detect two tasks providing the same resource.
  pub overlapping_resource_provide: bool,
  /// Detect a resource being provided after it was required by a task without a dependency to the provider.
  pub provide_after_require: bool,
  /// Detect a resource being required without a dependency to its provider.
  pub require_without_dep_to_provider: bool,

  /// Check that values are equal to themselves.
  pub check_self_equals: bool,
  /// Check that hashing a value twice produces the same hash.
  pub check_self_hash: bool,
  /// Check that values survive serialization round-trips. Requires the `serde` feature.
  pub check_serialization: bool,

  /// Apply value checks to task keys.
  pub check_keys: bool,
  /// Apply value checks to task inputs.
  pub check_inputs: bool,
  /// Apply value checks to task outputs.
  pub check_outputs: bool,

  /// Abort the build on dependency graph errors, instead of logging them.
  pub throw_errors: bool,
  /// Abort the build on value check failures, instead of logging them.
  pub throw_warnings: bool,

  /// Maximum length of task descriptions in messages.
  pub short_string_length: usize,
}

impl ValidationOptions {
  /// Dependency graph checks that abort the build; no value checks.
  pub fn normal() -> Self {
    Self {
      cycle: true,
      overlapping_resource_provide: true,
      provide_after_require: true,
      require_without_dep_to_provider: true,
      check_self_equals: false,
      check_self_hash: false,
      check_serialization: false,
      check_keys: false,
      check_inputs: false,
      check_outputs: false,
      throw_errors: true,
      throw_warnings: false,
      short_string_length: 1024,
    }
  }

  /// All checks, all of which abort the build.
  pub fn all() -> Self {
    Self {
      check_self_equals: true,
      check_self_hash: true,
      check_serialization: true,
      check_keys: true,
      check_inputs: true,
      check_outputs: true,
      throw_warnings: true,
      short_string_length: 4096,
      ..Self::normal()
    }
  }

  /// All checks except serialization round-trips, all of which abort the build.
  pub fn all_except_serialization() -> Self {
    Self { check_serialization: false, ..Self::all() }
  }
}

impl Default for ValidationOptions {
  #[inline]
  fn default() -> Self { Self::normal() }
}

/// A [`Layer`] that validates the dependency graph and, optionally, the contracts of task keys, inputs, and outputs.
#[derive(Clone, Debug)]
pub struct ValidationLayer {
  options: ValidationOptions,
  requiring: Vec<TaskKey>,
}

impl Default for ValidationLayer {
  #[inline]
  fn default() -> Self { Self::new(ValidationOptions::normal()) }
}

impl ValidationLayer {
  #[inline]
  pub fn new(options: ValidationOptions) -> Self { Self { options, requiring: Vec::new() } }

  #[inline]
  pub fn options(&self) -> &ValidationOptions { &self.options }
}

impl Layer for ValidationLayer {
  fn require_top_down_start(&mut self, key: &TaskKey, input: &Value, defs: &TaskDefs) -> Result<()> {
    if !defs.exists(&key.id) {
      return Err(Error::MissingTaskDef { id: key.id.clone() });
    }
    if self.options.cycle && self.requiring.contains(key) {
      return Err(Error::CyclicDependency { key: key.clone(), stack: self.requiring.clone() });
    }
    if self.options.check_keys {
      self.check_value("task key", key, &key.key, true)?;
    }
    if self.options.check_inputs {
      self.check_value("input", key, input, false)?;
    }
    self.requiring.push(key.clone());
    Ok(())
  }

  fn require_top_down_end(&mut self, key: &TaskKey) {
    if let Some(index) = self.requiring.iter().rposition(|k| k == key) {
      self.requiring.remove(index);
    }
  }

  fn validate_visited(&mut self, key: &TaskKey, input: &Value, visited: &TaskData) -> Result<()> {
    if &visited.input != input {
      self.error(Error::VisitedInputMismatch { key: key.clone(), visited: visited.input.clone(), required: input.clone() })?;
    }
    Ok(())
  }

  fn validate_pre_write(&mut self, key: &TaskKey, data: &TaskData, txn: &dyn StoreReadTxn) -> Result<()> {
    if self.options.overlapping_resource_provide {
      for dep in &data.resource_provides {
        if let Some(provider) = txn.provider_of(&dep.key) {
          if &provider != key {
            self.error(Error::OverlappingProvide { resource: dep.key.clone(), provider, overlapping: key.clone() })?;
          }
        }
      }
    }
    Ok(())
  }

  fn validate_post_write(&mut self, key: &TaskKey, data: &TaskData, txn: &dyn StoreReadTxn) -> Result<()> {
    if self.options.require_without_dep_to_provider {
      for dep in &data.resource_requires {
        if let Some(provider) = txn.provider_of(&dep.key) {
          if &provider != key && !txn.requires_transitively(key, &provider) {
            self.error(Error::HiddenRequire { requirer: key.clone(), resource: dep.key.clone(), provider })?;
          }
        }
      }
    }
    if self.options.provide_after_require {
      for dep in &data.resource_provides {
        let mut requirers: Vec<_> = txn.requirers_of(&dep.key).into_iter().collect();
        requirers.sort_unstable_by(|a, b| txn.dependency_order_cmp(a, b));
        for requirer in requirers {
          if &requirer != key && !txn.requires_transitively(&requirer, key) {
            self.error(Error::HiddenProvide { provider: key.clone(), resource: dep.key.clone(), requirer })?;
          }
        }
      }
    }
    if self.options.check_outputs {
      self.check_value("output", key, &data.output, false)?;
    }
    Ok(())
  }

  #[inline]
  fn session_start(&mut self) {
    self.requiring.clear();
  }
}

impl ValidationLayer {
  fn error(&self, error: Error) -> Result<()> {
    if self.options.throw_errors {
      Err(error)
    } else {
      log::error!("{}", error);
      Ok(())
    }
  }

  fn check_value(&self, what: &str, key: &TaskKey, value: &Value, is_key: bool) -> Result<()> {
    let violations = self.value_violations(value, is_key);
    if violations.is_empty() { return Ok(()); }
    let error = Error::ContractViolation {
      subject: format!("{} {} of task {}", what, value, key.to_short_string(self.options.short_string_length)),
      violations,
    };
    if self.options.throw_warnings {
      Err(error)
    } else {
      log::warn!("{}", error);
      Ok(())
    }
  }

  #[allow(clippy::eq_op)]
  fn value_violations(&self, value: &Value, is_key: bool) -> Vec<String> {
    let mut violations = Vec::new();
    if self.options.check_self_equals && value != value {
      violations.push("not equal to itself".to_string());
    }
    if self.options.check_self_hash {
      let (hash_1, hash_2) = (hash(value), hash(value));
      if hash_1 != hash_2 {
        violations.push(format!("hash not equal to hash of itself: {} vs {}", hash_1, hash_2));
      }
    }
    if self.options.check_serialization {
      self.serialization_violations(value, is_key, &mut violations);
    }
    violations
  }

  #[cfg(feature = "serde")]
  fn serialization_violations(&self, value: &Value, is_key: bool, violations: &mut Vec<String>) {
    // Transient values are not persisted verbatim.
    if value.contains_transient() { return; }
    let serialized = match (ron::to_string(value), ron::to_string(value)) {
      (Ok(first), Ok(second)) => {
        if first != second {
          violations.push(format!("serialized differently when serialized twice: {} vs {}", first, second));
        }
        first
      }
      (Err(e), _) | (_, Err(e)) => {
        violations.push(format!("serialization failed: {}", e));
        return;
      }
    };
    let deserialized: Value = match ron::from_str(&serialized) {
      Ok(deserialized) => deserialized,
      Err(e) => {
        violations.push(format!("deserialization failed: {}", e));
        return;
      }
    };
    if &deserialized != value {
      violations.push(format!("not equal to itself after deserialization: {}", deserialized));
    }
    if is_key {
      if hash(&deserialized) != hash(value) {
        violations.push("produced a different hash after deserialization".to_string());
      }
      match ron::to_string(&deserialized) {
        Ok(again) if again != serialized =>
          violations.push(format!("serialized differently after a round-trip: {} vs {}", serialized, again)),
        Err(e) => violations.push(format!("serialization after a round-trip failed: {}", e)),
        _ => {}
      }
    }
  }

  #[cfg(not(feature = "serde"))]
  fn serialization_violations(&self, _value: &Value, _is_key: bool, _violations: &mut Vec<String>) {}
}

fn hash(value: &Value) -> u64 {
  let mut hasher = DefaultHasher::new();
  value.hash(&mut hasher);
  hasher.finish()
}


#[cfg(test)]
mod test {
  use assert_matches::assert_matches;

  use crate::dependency::{Observability, ResourceProvideDep, ResourceRequireDep, TaskRequireDep};
  use crate::resource::ResourceKey;
  use crate::stamp::{OutputStamper, ResourceStamp, ResourceStamper};
  use crate::store::in_memory::InMemoryStore;
  use crate::store::Store;

  use super::*;

  fn data(requires: &[&TaskKey], resource_requires: &[&str], resource_provides: &[&str]) -> TaskData {
    TaskData {
      input: Value::Unit,
      output: Value::Unit,
      observability: Observability::ImplicitObserved,
      task_requires: requires.iter()
        .map(|callee| TaskRequireDep::new((*callee).clone(), OutputStamper::Equals, &Value::Unit))
        .collect(),
      resource_requires: resource_requires.iter()
        .map(|r| ResourceRequireDep::new(ResourceKey::from(*r), ResourceStamper::Exists, ResourceStamp::Exists(true)))
        .collect(),
      resource_provides: resource_provides.iter()
        .map(|r| ResourceProvideDep::new(ResourceKey::from(*r), ResourceStamper::Exists, ResourceStamp::Exists(true)))
        .collect(),
    }
  }

  struct Named;
  impl crate::task::TaskDef for Named {
    fn id(&self) -> &str { "a" }
    fn execute(&self, _context: &mut dyn crate::context::ExecContext, input: &Value) -> Result<Value> {
      Ok(input.clone())
    }
  }

  #[test]
  fn test_cycle_detected() {
    let mut defs = TaskDefs::new();
    defs.add(Named);
    let key = TaskKey::new("a", 1);
    let mut layer = ValidationLayer::default();
    assert_matches!(layer.require_top_down_start(&key, &Value::from(1), &defs), Ok(()));
    let result = layer.require_top_down_start(&key, &Value::from(1), &defs);
    assert_matches!(result, Err(Error::CyclicDependency { key: k, stack }) if k == key && stack == vec![key.clone()]);
    layer.require_top_down_end(&key);
    assert_matches!(layer.require_top_down_start(&key, &Value::from(1), &defs), Ok(()));
  }

  #[test]
  fn test_missing_task_def() {
    let mut layer = ValidationLayer::default();
    let result = layer.require_top_down_start(&TaskKey::new("missing", 1), &Value::from(1), &TaskDefs::new());
    assert_matches!(result, Err(Error::MissingTaskDef { id }) if id == "missing");
  }

  #[test]
  fn test_visited_input_mismatch() {
    let mut layer = ValidationLayer::default();
    let key = TaskKey::new("a", 1);
    let visited = TaskData { input: Value::from(1), ..data(&[], &[], &[]) };
    assert_matches!(layer.validate_visited(&key, &Value::from(1), &visited), Ok(()));
    assert_matches!(layer.validate_visited(&key, &Value::from(2), &visited), Err(Error::VisitedInputMismatch { .. }));
  }

  #[test]
  fn test_overlapping_provide() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut store = InMemoryStore::default();
    let (provider, overlapping) = (TaskKey::new("p", 1), TaskKey::new("p", 2));
    store.write_txn().set_data(&provider, data(&[], &[], &["out.txt"]))?;

    let mut layer = ValidationLayer::default();
    assert_matches!(layer.validate_pre_write(&provider, &data(&[], &[], &["out.txt"]), store.read_txn()), Ok(()));
    let result = layer.validate_pre_write(&overlapping, &data(&[], &[], &["out.txt"]), store.read_txn());
    assert_matches!(result, Err(Error::OverlappingProvide { provider: p, overlapping: o, .. }) if p == provider && o == overlapping);
    Ok(())
  }

  #[test]
  fn test_hidden_require() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut store = InMemoryStore::default();
    let (provider, requirer) = (TaskKey::new("p", 1), TaskKey::new("q", 1));
    store.write_txn().set_data(&provider, data(&[], &[], &["out.txt"]))?;

    let hidden = data(&[], &["out.txt"], &[]);
    store.write_txn().set_data(&requirer, hidden.clone())?;
    let mut layer = ValidationLayer::default();
    let result = layer.validate_post_write(&requirer, &hidden, store.read_txn());
    assert_matches!(result, Err(Error::HiddenRequire { .. }));

    let visible = data(&[&provider], &["out.txt"], &[]);
    store.write_txn().set_data(&requirer, visible.clone())?;
    assert_matches!(layer.validate_post_write(&requirer, &visible, store.read_txn()), Ok(()));
    Ok(())
  }

  #[test]
  fn test_hidden_provide() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut store = InMemoryStore::default();
    let (provider, requirer) = (TaskKey::new("p", 1), TaskKey::new("q", 1));
    store.write_txn().set_data(&requirer, data(&[], &["out.txt"], &[]))?;
    let provides = data(&[], &[], &["out.txt"]);
    store.write_txn().set_data(&provider, provides.clone())?;

    let mut layer = ValidationLayer::default();
    let result = layer.validate_post_write(&provider, &provides, store.read_txn());
    assert_matches!(result, Err(Error::HiddenProvide { requirer: r, .. }) if r == requirer);
    Ok(())
  }

  #[test]
  fn test_errors_can_be_logged_instead() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut store = InMemoryStore::default();
    let (provider, requirer) = (TaskKey::new("p", 1), TaskKey::new("q", 1));
    store.write_txn().set_data(&provider, data(&[], &[], &["out.txt"]))?;
    let hidden = data(&[], &["out.txt"], &[]);
    store.write_txn().set_data(&requirer, hidden.clone())?;

    let mut layer = ValidationLayer::new(ValidationOptions { throw_errors: false, ..ValidationOptions::normal() });
    assert_matches!(layer.validate_post_write(&requirer, &hidden, store.read_txn()), Ok(()));
    Ok(())
  }

  #[test]
  fn test_value_checks_pass_for_plain_values() {
    let layer = ValidationLayer::new(ValidationOptions::all());
    let value = Value::List(vec![Value::from("a"), Value::from(1), Value::from(vec![1u8, 2])]);
    assert!(layer.value_violations(&value, true).is_empty());
  }
}
