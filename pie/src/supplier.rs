use std::fmt::{self, Display, Formatter};

use crate::context::ExecContext;
use crate::error::Result;
use crate::resource::ResourceKey;
use crate::task::Task;
use crate::value::Value;

/// Incremental supplier of a [`Value`], resolved through an [`ExecContext`] so that getting the value creates the
/// dependencies needed to get it again.
///
/// Suppliers are values themselves (see [`Value::Supplier`]), so a task can take the output of another task or the
/// contents of a resource as input without requiring it up front.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Supplier {
  /// Supplies a constant value, without creating a dependency.
  Value(Value),
  /// Supplies the output of the task created from definition `id` and `input`, by requiring it.
  Task { id: String, input: Value },
  /// Supplies the contents of a file as [`Value::Bytes`], or [`Value::Unit`] when it does not exist, by requiring it.
  Resource(ResourceKey),
}

impl Supplier {
  #[inline]
  pub fn value(value: impl Into<Value>) -> Self { Self::Value(value.into()) }
  #[inline]
  pub fn task(task: &Task) -> Self { Self::Task { id: task.id().to_string(), input: task.input().clone() } }
  #[inline]
  pub fn resource(key: impl Into<ResourceKey>) -> Self { Self::Resource(key.into()) }

  /// Gets the supplied value, creating a dependency to the task or resource it comes from.
  pub fn get(&self, context: &mut dyn ExecContext) -> Result<Value> {
    match self {
      Supplier::Value(value) => Ok(value.clone()),
      Supplier::Task { id, input } => context.require(id, input.clone()),
      Supplier::Resource(key) => Ok(context.read(key)?.map_or(Value::Unit, Value::Bytes)),
    }
  }
}

impl Display for Supplier {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Supplier::Value(value) => write!(f, "{}", value),
      Supplier::Task { id, input } => write!(f, "{}({})", id, input),
      Supplier::Resource(key) => write!(f, "{}", key),
    }
  }
}

impl From<Supplier> for Value {
  #[inline]
  fn from(supplier: Supplier) -> Self { Self::Supplier(Box::new(supplier)) }
}


#[cfg(test)]
mod test {
  use std::sync::Arc;

  use assert_matches::assert_matches;

  use crate::{PieBuilder, TaskDef};
  use crate::resource::memory::MemoryResourceService;
  use crate::tracker::event::EventTracker;

  use super::*;

  /// Gets the supplier in its input.
  struct Get;

  impl TaskDef for Get {
    fn id(&self) -> &str { "get" }
    fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
      let supplier = input.as_supplier().ok_or_else(|| crate::Error::failed("expected a supplier"))?;
      supplier.get(context)
    }
  }

  /// Returns the input.
  struct Identity;

  impl TaskDef for Identity {
    fn id(&self) -> &str { "identity" }
    fn execute(&self, _context: &mut dyn ExecContext, input: &Value) -> Result<Value> { Ok(input.clone()) }
  }

  fn get(supplier: Supplier) -> Task { Task::new(Arc::new(Get), supplier) }

  #[test]
  fn test_suppliers() -> Result<(), Box<dyn std::error::Error>> {
    let resources = MemoryResourceService::new();
    resources.write_file("in.txt", "Hello")?;
    let mut pie = PieBuilder::new()
      .with_task_def(Get)
      .with_task_def(Identity)
      .with_resources(resources.clone())
      .with_tracker(EventTracker::default())
      .build();

    let identity = Task::new(Arc::new(Identity), "World");
    assert_eq!(pie.new_session().require(&get(Supplier::value(1)))?, Value::Int(1));
    assert_eq!(pie.new_session().require(&get(Supplier::task(&identity)))?, Value::from("World"));
    assert_eq!(pie.new_session().require(&get(Supplier::resource("in.txt")))?, Value::Bytes(b"Hello".to_vec()));
    assert_eq!(pie.new_session().require(&get(Supplier::resource("missing.txt")))?, Value::Unit);

    // Getting a supplier creates a dependency to where its value comes from.
    let task = get(Supplier::resource("in.txt"));
    resources.write_file("in.txt", "Bye")?;
    assert_eq!(pie.new_session().require(&task)?, Value::Bytes(b"Bye".to_vec()));
    assert!(pie.tracker().one_execute_of(&task.key()));

    let session = pie.new_session();
    let callees: Vec<_> = session.store().task_requires(&get(Supplier::task(&identity)).key()).into_iter().map(|dep| dep.callee).collect();
    assert_eq!(callees, vec![identity.key()]);
    Ok(())
  }

  #[test]
  fn test_supplier_value() {
    let supplier = Supplier::task(&Task::new(Arc::new(Identity), 1));
    let value = Value::from(supplier.clone());
    assert_matches!(value.as_supplier(), Some(s) if s == &supplier);
    assert_eq!(value.to_string(), "identity(1)");
  }
}
