use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

use crate::dependency::{Observability, ResourceProvideDep, ResourceRequireDep, TaskData, TaskRequireDep};
use crate::error::Result;
use crate::resource::ResourceKey;
use crate::task::TaskKey;
use crate::tracker::Tracker;
use crate::value::Value;

pub mod in_memory;
#[cfg(feature = "serde")]
pub mod serializing;

/// Transactional storage of task data and of the dependency graph between tasks and resources.
///
/// A build session holds exactly one write transaction for its duration.
pub trait Store {
  /// Gets a read transaction.
  fn read_txn(&self) -> &dyn StoreReadTxn;
  /// Gets the write transaction.
  fn write_txn(&mut self) -> &mut dyn StoreWriteTxn;
  /// Flushes the store to durable media without closing it.
  #[inline]
  fn sync(&mut self) -> Result<()> { Ok(()) }
  /// Flushes the store and releases its resources.
  #[inline]
  fn close(&mut self) -> Result<()> { self.sync() }
}

/// Read operations on a store.
///
/// Object-safe trait.
pub trait StoreReadTxn {
  /// Gets the stored input of task `key`, or `None` if it has no record.
  fn input(&self, key: &TaskKey) -> Option<Value>;
  /// Gets the stored output of task `key`, or `None` if it has no record. A task that returned nothing has output
  /// [`Value::Unit`].
  fn output(&self, key: &TaskKey) -> Option<Value>;
  /// Gets the observability of task `key`, which is [`Observability::Unobserved`] if it has no record.
  fn observability(&self, key: &TaskKey) -> Observability;

  fn task_requires(&self, key: &TaskKey) -> Vec<TaskRequireDep>;
  fn resource_requires(&self, key: &TaskKey) -> Vec<ResourceRequireDep>;
  fn resource_provides(&self, key: &TaskKey) -> Vec<ResourceProvideDep>;

  /// Gets the tasks that require task `key`.
  fn callers_of(&self, key: &TaskKey) -> HashSet<TaskKey>;
  /// Gets the tasks that require `resource`.
  fn requirers_of(&self, resource: &ResourceKey) -> HashSet<TaskKey>;
  /// Gets the task that provides `resource`, if any.
  fn provider_of(&self, resource: &ResourceKey) -> Option<TaskKey>;

  /// Gets all data of task `key`, or `None` if its input or output is missing.
  fn data(&self, key: &TaskKey) -> Option<TaskData> {
    let input = self.input(key)?;
    let output = self.output(key)?;
    Some(TaskData {
      input,
      output,
      observability: self.observability(key),
      task_requires: self.task_requires(key),
      resource_requires: self.resource_requires(key),
      resource_provides: self.resource_provides(key),
    })
  }

  /// Returns whether `caller` requires `callee`, directly or transitively.
  fn requires_transitively(&self, caller: &TaskKey, callee: &TaskKey) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([caller.clone()]);
    while let Some(key) = queue.pop_front() {
      for dep in self.task_requires(&key) {
        if &dep.callee == callee { return true; }
        if visited.insert(dep.callee.clone()) {
          queue.push_back(dep.callee);
        }
      }
    }
    false
  }

  /// Compares `a` and `b` in dependency order: a total order in which every task is ordered before the tasks it
  /// (transitively) requires.
  fn dependency_order_cmp(&self, a: &TaskKey, b: &TaskKey) -> Ordering;
  /// Returns whether `caller` is ordered before `callee` in dependency order.
  #[inline]
  fn has_dependency_order_before(&self, caller: &TaskKey, callee: &TaskKey) -> bool {
    self.dependency_order_cmp(caller, callee) == Ordering::Less
  }

  /// Gets the tasks that are known to be inconsistent, but were not executed because they are unobserved or were
  /// excluded by tags.
  fn deferred_tasks(&self) -> Vec<TaskKey>;
  /// Gets all tasks without callers.
  fn tasks_without_callers(&self) -> Vec<TaskKey>;
  /// Gets the number of resources that are required but not provided by any task.
  fn num_source_files(&self) -> usize;
}

/// Write operations on a store.
///
/// Object-safe trait.
pub trait StoreWriteTxn: StoreReadTxn {
  fn as_read(&self) -> &dyn StoreReadTxn;

  fn set_input(&mut self, key: &TaskKey, input: Value);
  fn set_output(&mut self, key: &TaskKey, output: Value);
  fn set_observability(&mut self, key: &TaskKey, observability: Observability);

  /// Replaces the task dependencies of task `key`, updating reverse indexes. Fails with
  /// [`Error::CyclicDependency`](crate::Error::CyclicDependency), leaving the store unchanged, when the new dependencies
  /// would create a cycle.
  fn set_task_requires(&mut self, key: &TaskKey, deps: Vec<TaskRequireDep>) -> Result<()>;
  /// Replaces the resource require dependencies of task `key`, updating reverse indexes.
  fn set_resource_requires(&mut self, key: &TaskKey, deps: Vec<ResourceRequireDep>);
  /// Replaces the resource provide dependencies of task `key`, updating reverse indexes.
  fn set_resource_provides(&mut self, key: &TaskKey, deps: Vec<ResourceProvideDep>);

  /// Sets all `data` of task `key`. Task dependencies are set first, so nothing is written when they are rejected.
  fn set_data(&mut self, key: &TaskKey, data: TaskData) -> Result<()> {
    self.set_task_requires(key, data.task_requires)?;
    self.set_input(key, data.input);
    self.set_output(key, data.output);
    self.set_observability(key, data.observability);
    self.set_resource_requires(key, data.resource_requires);
    self.set_resource_provides(key, data.resource_provides);
    Ok(())
  }
  /// Deletes all data of task `key`, pruning reverse indexes, and returns the deleted data.
  fn delete_data(&mut self, key: &TaskKey) -> Option<TaskData>;

  fn add_deferred(&mut self, key: &TaskKey);
  /// Removes `key` from the deferred tasks, returning whether it was deferred.
  fn remove_deferred(&mut self, key: &TaskKey) -> bool;

  /// Removes everything from the store.
  fn clear(&mut self);
}


/// Explicitly unobserves task `key`: it becomes [`Observability::ImplicitObserved`] if an observed caller still
/// requires it, otherwise [`Observability::Unobserved`], which propagates to its callees.
pub fn explicit_unobserve(txn: &mut dyn StoreWriteTxn, key: &TaskKey, tracker: &mut dyn Tracker) {
  let observability = txn.observability(key);
  if observability.is_unobserved() { return; }
  if is_observed_by_caller(txn.as_read(), key) {
    set_observability(txn, key, Observability::ImplicitObserved, tracker);
  } else {
    set_observability(txn, key, Observability::Unobserved, tracker);
    for dep in txn.task_requires(key) {
      implicit_unobserve(txn, &dep.callee, tracker);
    }
  }
}

/// Implicitly unobserves task `key` when it is implicitly observed and no observed caller requires it anymore,
/// propagating to its callees. Explicitly observed tasks are left alone.
pub fn implicit_unobserve(txn: &mut dyn StoreWriteTxn, key: &TaskKey, tracker: &mut dyn Tracker) {
  if txn.observability(key) != Observability::ImplicitObserved { return; }
  if is_observed_by_caller(txn.as_read(), key) { return; }
  set_observability(txn, key, Observability::Unobserved, tracker);
  for dep in txn.task_requires(key) {
    implicit_unobserve(txn, &dep.callee, tracker);
  }
}

/// Sets the observability of task `key`, notifying `tracker` when it changes.
pub(crate) fn set_observability(
  txn: &mut dyn StoreWriteTxn,
  key: &TaskKey,
  observability: Observability,
  tracker: &mut dyn Tracker,
) {
  let previous = txn.observability(key);
  if previous != observability {
    txn.set_observability(key, observability);
    tracker.set_task_observability(key, previous, observability);
  }
}

fn is_observed_by_caller(txn: &dyn StoreReadTxn, key: &TaskKey) -> bool {
  txn.callers_of(key).iter().any(|caller| txn.observability(caller).is_observed())
}
