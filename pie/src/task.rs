use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::context::ExecContext;
use crate::error::{Error, Result};
use crate::value::Value;

/// Set of tags passed to bottom-up builds, used by task definitions to decide whether they should be executed when
/// affected.
pub type Tags = HashSet<String>;

/// Identity of a task instance: the identifier of its definition plus the key derived from its input.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskKey {
  pub id: String,
  pub key: Value,
}

impl TaskKey {
  #[inline]
  pub fn new(id: impl Into<String>, key: impl Into<Value>) -> Self {
    Self { id: id.into(), key: key.into() }
  }

  /// Formats this key, truncated to at most `max_len` characters.
  pub fn to_short_string(&self, max_len: usize) -> String {
    truncate(self.to_string(), max_len)
  }
}

impl Display for TaskKey {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.id, self.key)
  }
}


/// Executable definition of a task, registered in [`TaskDefs`] under its [identifier](Self::id).
///
/// Object-safe trait.
#[allow(unused_variables)]
pub trait TaskDef: Send + Sync {
  /// Identifier of this definition, unique within one [`TaskDefs`] registry.
  fn id(&self) -> &str;

  /// Executes the task for `input`, with `context` providing a means to require other tasks and to require or provide
  /// resources. Every dependency must be created through `context`.
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value>;

  /// Derives the key of the task for `input`. Defaults to the input itself.
  #[inline]
  fn key(&self, input: &Value) -> Value { input.clone() }

  /// Returns whether the task for `input` should be executed when it is affected by a bottom-up build with `tags`. When
  /// this returns `false`, the task is deferred instead. Defaults to `true`.
  #[inline]
  fn should_exec_when_affected(&self, input: &Value, tags: &Tags) -> bool { true }

  /// Describes the task for `input`, truncated to at most `max_len` characters.
  fn desc(&self, input: &Value, max_len: usize) -> String {
    truncate(format!("{}({})", self.id(), input), max_len)
  }
}


/// A task definition paired with an input.
#[derive(Clone)]
pub struct Task {
  def: Arc<dyn TaskDef>,
  input: Value,
}

impl Task {
  #[inline]
  pub fn new(def: Arc<dyn TaskDef>, input: impl Into<Value>) -> Self {
    Self { def, input: input.into() }
  }

  #[inline]
  pub fn id(&self) -> &str { self.def.id() }
  #[inline]
  pub fn def(&self) -> &Arc<dyn TaskDef> { &self.def }
  #[inline]
  pub fn input(&self) -> &Value { &self.input }

  /// Creates the key of this task.
  #[inline]
  pub fn key(&self) -> TaskKey {
    TaskKey { id: self.def.id().to_string(), key: self.def.key(&self.input) }
  }

  #[inline]
  pub fn desc(&self, max_len: usize) -> String { self.def.desc(&self.input, max_len) }
}

impl PartialEq for Task {
  fn eq(&self, other: &Self) -> bool {
    self.def.id() == other.def.id() && self.input == other.input
  }
}
impl Eq for Task {}
impl Hash for Task {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.def.id().hash(state);
    self.input.hash(state);
  }
}
impl Debug for Task {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}({:?})", self.def.id(), self.input)
  }
}


/// Registry of [task definitions](TaskDef), keyed by identifier.
#[derive(Default, Clone)]
pub struct TaskDefs {
  defs: HashMap<String, Arc<dyn TaskDef>>,
}

impl TaskDefs {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Registers `def`, replacing any definition with the same identifier, and returns it as a shared definition.
  pub fn add(&mut self, def: impl TaskDef + 'static) -> Arc<dyn TaskDef> {
    let def: Arc<dyn TaskDef> = Arc::new(def);
    self.add_shared(def.clone());
    def
  }
  /// Registers shared `def`, replacing any definition with the same identifier.
  #[inline]
  pub fn add_shared(&mut self, def: Arc<dyn TaskDef>) {
    self.defs.insert(def.id().to_string(), def);
  }

  #[inline]
  pub fn get(&self, id: &str) -> Option<&Arc<dyn TaskDef>> { self.defs.get(id) }
  #[inline]
  pub fn exists(&self, id: &str) -> bool { self.defs.contains_key(id) }
  #[inline]
  pub fn len(&self) -> usize { self.defs.len() }
  #[inline]
  pub fn is_empty(&self) -> bool { self.defs.is_empty() }

  /// Creates a task for the definition with `id` and `input`. Fails when no such definition is registered.
  pub fn task(&self, id: &str, input: impl Into<Value>) -> Result<Task> {
    let def = self.get(id).ok_or_else(|| Error::MissingTaskDef { id: id.to_string() })?;
    Ok(Task::new(def.clone(), input))
  }
}

impl Debug for TaskDefs {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.defs.keys()).finish()
  }
}


fn truncate(mut string: String, max_len: usize) -> String {
  if string.chars().count() > max_len {
    let cut = string.char_indices().nth(max_len.saturating_sub(1)).map_or(string.len(), |(i, _)| i);
    string.truncate(cut);
    string.push('…');
  }
  string
}


#[cfg(test)]
mod test {
  use assert_matches::assert_matches;

  use super::*;

  struct Keyed;
  impl TaskDef for Keyed {
    fn id(&self) -> &str { "keyed" }
    fn execute(&self, _context: &mut dyn ExecContext, input: &Value) -> Result<Value> { Ok(input.clone()) }
    fn key(&self, input: &Value) -> Value {
      input.as_list().and_then(|l| l.first().cloned()).unwrap_or_default()
    }
  }

  #[test]
  fn test_key_derivation() -> Result<()> {
    let mut defs = TaskDefs::new();
    defs.add(Keyed);
    let task = defs.task("keyed", vec![Value::from("out.txt"), Value::from(3)])?;
    assert_eq!(task.key(), TaskKey::new("keyed", "out.txt"));
    assert_eq!(task.key().to_string(), "keyed(\"out.txt\")");
    Ok(())
  }

  #[test]
  fn test_missing_def() {
    let defs = TaskDefs::new();
    assert!(!defs.exists("keyed"));
    assert_matches!(defs.task("keyed", ()), Err(Error::MissingTaskDef { id }) if id == "keyed");
  }

  #[test]
  fn test_desc_truncates() {
    let key = TaskKey::new("a_long_identifier", "with a long input");
    assert_eq!(key.to_short_string(5), "a_lo…");
    assert_eq!(key.to_short_string(100), key.to_string());
  }
}
