use std::collections::HashSet;

use crate::dependency::TaskData;
use crate::error::Result;
use crate::pie::SessionData;
use crate::reason::ExecReason;
use crate::resource::ResourceKey;
use crate::store::StoreReadTxn;
use crate::task::{Task, TaskKey};
use crate::value::Value;

impl SessionData<'_> {
  /// Executes all observed tasks affected by `changed` resources, in dependency order. Tasks whose definition opts out
  /// of executing under the session's tags are deferred instead.
  ///
  /// When this fails, the failed task and tasks that were scheduled but not yet executed are deferred, so that the next bottom-up build
  /// checks them again.
  pub(crate) fn update_affected_by(&mut self, changed: &[ResourceKey]) -> Result<()> {
    let result = self.update_affected_by_inner(changed);
    if result.is_err() {
      let keys: Vec<TaskKey> = self.scheduled.drain().collect();
      for key in keys {
        self.defer(&key);
      }
    }
    result
  }

  fn update_affected_by_inner(&mut self, changed: &[ResourceKey]) -> Result<()> {
    self.reschedule_deferred()?;
    for resource in changed {
      self.schedule_affected_by_resource(resource, true)?;
    }
    self.exec_scheduled()
  }

  /// Schedules deferred tasks that are inconsistent according to their stored data, and undefers the ones that are
  /// consistent. Unobserved tasks and tasks still excluded by tags stay deferred.
  fn reschedule_deferred(&mut self) -> Result<()> {
    for key in self.txn.deferred_tasks() {
      let Some(data) = self.txn.data(&key) else {
        self.txn.remove_deferred(&key);
        continue;
      };
      if data.observability.is_unobserved() { continue; }
      let task = self.defs.task(&key.id, data.input.clone())?;
      if !task.def().should_exec_when_affected(task.input(), &self.tags) { continue; }
      if self.is_inconsistent_shallow(&data)? {
        self.schedule(key);
      } else {
        self.txn.remove_deferred(&key);
        self.tracker.undefer_task(&key);
      }
    }
    Ok(())
  }

  /// Checks `data` against the current state of resources and the stored outputs of required tasks, without requiring
  /// anything.
  fn is_inconsistent_shallow(&self, data: &TaskData) -> Result<bool> {
    if data.output.contains_inconsistent_transient() { return Ok(true); }
    for dep in &data.resource_requires {
      if dep.check(self.resources)?.is_some() { return Ok(true); }
    }
    for dep in &data.resource_provides {
      if dep.check(self.resources)?.is_some() { return Ok(true); }
    }
    for dep in &data.task_requires {
      match self.txn.output(&dep.callee) {
        Some(output) if dep.check(&output).is_none() => {}
        _ => return Ok(true),
      }
    }
    Ok(false)
  }

  /// Schedules the observed tasks affected by a change to `resource`: the provider of `resource` when its provide
  /// dependency is inconsistent (if `check_provider` is set), and every requirer whose require dependency is
  /// inconsistent.
  fn schedule_affected_by_resource(&mut self, resource: &ResourceKey, check_provider: bool) -> Result<()> {
    self.tracker.schedule_affected_by_resource_start(resource);
    let result = self.schedule_affected_by_resource_inner(resource, check_provider);
    self.tracker.schedule_affected_by_resource_end(resource);
    result
  }

  fn schedule_affected_by_resource_inner(&mut self, resource: &ResourceKey, check_provider: bool) -> Result<()> {
    if check_provider {
      if let Some(provider) = self.txn.provider_of(resource) {
        if self.txn.observability(&provider).is_observed() {
          for dep in self.txn.resource_provides(&provider).iter().filter(|dep| &dep.key == resource) {
            let inconsistency = dep.check(self.resources);
            self.tracker.check_affected_by_provided_resource(&provider, dep, inconsistency.as_ref().map(Option::as_ref));
            if inconsistency?.is_some() {
              self.schedule(provider.clone());
              break;
            }
          }
        }
      }
    }
    for requirer in self.txn.requirers_of(resource) {
      if self.txn.observability(&requirer).is_unobserved() { continue; }
      for dep in self.txn.resource_requires(&requirer).iter().filter(|dep| &dep.key == resource) {
        let inconsistency = dep.check(self.resources);
        self.tracker.check_affected_by_required_resource(&requirer, dep, inconsistency.as_ref().map(Option::as_ref));
        if inconsistency?.is_some() {
          self.schedule(requirer.clone());
          break;
        }
      }
    }
    Ok(())
  }

  /// Schedules the observed callers of task `key` whose dependency to it is inconsistent with its new `output`.
  fn schedule_affected_by_task_output(&mut self, key: &TaskKey, output: &Value) {
    self.tracker.schedule_affected_by_task_output_start(key, output);
    for caller in self.txn.callers_of(key) {
      if self.txn.observability(&caller).is_unobserved() { continue; }
      for dep in self.txn.task_requires(&caller).iter().filter(|dep| &dep.callee == key) {
        let inconsistency = dep.check(output);
        self.tracker.check_affected_by_required_task(&caller, dep, inconsistency.as_ref());
        if inconsistency.is_some() {
          self.schedule(caller.clone());
          break;
        }
      }
    }
    self.tracker.schedule_affected_by_task_output_end(key);
  }

  #[inline]
  fn schedule(&mut self, key: TaskKey) {
    self.tracker.schedule_task(&key);
    self.scheduled.add(key);
  }

  /// Executes scheduled tasks, and the tasks affected by them, until the queue is empty.
  fn exec_scheduled(&mut self) -> Result<()> {
    loop {
      self.cancel.check()?;
      let Some(key) = self.scheduled.pop(self.txn.as_read()) else { break };
      let Some(task) = self.task_of(&key)? else { continue };
      if task.def().should_exec_when_affected(task.input(), &self.tags) {
        self.exec_affected(&key, &task)?;
      } else {
        self.defer(&key);
      }
    }
    Ok(())
  }

  /// Executes affected `task` with [`Self::exec_and_schedule`], deferring it when that fails.
  fn exec_affected(&mut self, key: &TaskKey, task: &Task) -> Result<Value> {
    let result = self.exec_and_schedule(key, task, ExecReason::Affected);
    if result.is_err() {
      self.defer(key);
    }
    result
  }

  #[inline]
  fn defer(&mut self, key: &TaskKey) {
    self.tracker.defer_task(key);
    self.txn.add_deferred(key);
  }

  /// Executes `task` and schedules the tasks affected by its new output and by the resources it provides.
  fn exec_and_schedule(&mut self, key: &TaskKey, task: &Task, reason: ExecReason) -> Result<Value> {
    let output = self.exec(key, task, reason, true)?;
    self.schedule_affected_by_task_output(key, &output);
    for dep in self.txn.resource_provides(key) {
      self.schedule_affected_by_resource(&dep.key, false)?;
    }
    Ok(output)
  }

  /// Executes scheduled tasks that task `key` (transitively) requires, and `key` itself if it is scheduled, in
  /// dependency order. Returns the output of `key` when it was scheduled and has been executed, or `None` when it was
  /// not scheduled.
  pub(crate) fn require_scheduled_now(&mut self, key: &TaskKey) -> Result<Option<Value>> {
    self.tracker.require_scheduled_now_start(key);
    let result = self.require_scheduled_now_inner(key);
    self.tracker.require_scheduled_now_end(key, result.as_ref().ok().and_then(Option::as_ref));
    result
  }

  fn require_scheduled_now_inner(&mut self, key: &TaskKey) -> Result<Option<Value>> {
    loop {
      self.cancel.check()?;
      let Some(least) = self.scheduled.pop_least_with_dependency_to(key, self.txn.as_read()) else { break };
      let Some(task) = self.task_of(&least)? else { continue };
      let output = self.exec_affected(&least, &task)?;
      if &least == key {
        return Ok(Some(output));
      }
    }
    Ok(None)
  }
}


/// Priority queue of distinct task keys, ordered by the dependency order of a store: popping yields a task that does
/// not (transitively) require any other task in the queue.
///
/// The order is queried when popping, as executing a task may change the dependency order.
#[derive(Default, Clone, Debug)]
pub(crate) struct Queue {
  set: HashSet<TaskKey>,
}

impl Queue {
  /// Adds `key` to the queue, returning `false` if it was already queued.
  #[inline]
  pub fn add(&mut self, key: TaskKey) -> bool { self.set.insert(key) }
  #[inline]
  pub fn is_empty(&self) -> bool { self.set.is_empty() }

  /// Removes and returns the last task in dependency order.
  pub fn pop(&mut self, txn: &dyn StoreReadTxn) -> Option<TaskKey> {
    let last = self.set.iter().max_by(|a, b| txn.dependency_order_cmp(a, b))?.clone();
    self.set.remove(&last);
    Some(last)
  }

  /// Removes and returns the last task in dependency order out of `key` and the tasks `key` (transitively) requires.
  pub fn pop_least_with_dependency_to(&mut self, key: &TaskKey, txn: &dyn StoreReadTxn) -> Option<TaskKey> {
    let last = self.set.iter()
      .filter(|queued| *queued == key || txn.requires_transitively(key, queued))
      .max_by(|a, b| txn.dependency_order_cmp(a, b))?
      .clone();
    self.set.remove(&last);
    Some(last)
  }

  /// Removes all tasks from the queue, returning them in no particular order.
  #[inline]
  pub fn drain(&mut self) -> impl Iterator<Item=TaskKey> + '_ { self.set.drain() }
}


#[cfg(test)]
mod test {
  use crate::dependency::TaskRequireDep;
  use crate::stamp::OutputStamper;
  use crate::store::in_memory::InMemoryStore;
  use crate::store::StoreWriteTxn;

  use super::*;

  fn key(name: &str) -> TaskKey { TaskKey::new(name, ()) }

  fn require(store: &mut InMemoryStore, caller: &str, callees: &[&str]) {
    let deps = callees.iter().map(|c| TaskRequireDep::new(key(c), OutputStamper::Equals, &Value::Unit)).collect();
    store.set_task_requires(&key(caller), deps).expect("no cycle");
  }

  #[test]
  fn test_distinct() {
    let mut queue = Queue::default();
    assert!(queue.add(key("a")));
    assert!(!queue.add(key("a")));
    assert_eq!(queue.drain().collect::<Vec<_>>(), vec![key("a")]);
    assert!(queue.is_empty());
  }

  #[test]
  fn test_pops_callees_before_callers() {
    let mut store = InMemoryStore::new();
    require(&mut store, "a", &["b"]);
    require(&mut store, "b", &["c"]);
    let mut queue = Queue::default();
    queue.add(key("a"));
    queue.add(key("c"));
    queue.add(key("b"));
    assert_eq!(queue.pop(&store), Some(key("c")));
    assert_eq!(queue.pop(&store), Some(key("b")));
    assert_eq!(queue.pop(&store), Some(key("a")));
    assert_eq!(queue.pop(&store), None);
  }

  #[test]
  fn test_pop_least_with_dependency_to() {
    let mut store = InMemoryStore::new();
    require(&mut store, "a", &["b"]);
    require(&mut store, "x", &["y"]);
    let mut queue = Queue::default();
    queue.add(key("a"));
    queue.add(key("b"));
    queue.add(key("y"));
    assert_eq!(queue.pop_least_with_dependency_to(&key("a"), &store), Some(key("b")));
    assert_eq!(queue.pop_least_with_dependency_to(&key("a"), &store), Some(key("a")));
    assert_eq!(queue.pop_least_with_dependency_to(&key("a"), &store), None);
    assert_eq!(queue.pop(&store), Some(key("y")));
  }
}
