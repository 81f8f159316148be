use crate::dependency::{Observability, TaskData};
use crate::error::{Error, Result};
use crate::pie::SessionData;
use crate::reason::ExecReason;
use crate::store;
use crate::task::{Task, TaskKey};
use crate::value::Value;

impl SessionData<'_> {
  /// Requires `task` as the root of a top-down build. When `modify_observability` is set, the task becomes explicitly
  /// observed afterwards.
  pub(crate) fn require_initial(&mut self, key: &TaskKey, task: &Task, modify_observability: bool) -> Result<Value> {
    let output = self.require(key, task, modify_observability)?;
    if modify_observability {
      store::set_observability(self.txn, key, Observability::ExplicitObserved, self.tracker);
    }
    Ok(output)
  }

  /// Requires `task`, returning its up-to-date output. Executes the task when it has no stored data or when one of its
  /// dependencies is inconsistent, checking task dependencies by requiring them recursively.
  pub(crate) fn require(&mut self, key: &TaskKey, task: &Task, modify_observability: bool) -> Result<Value> {
    self.cancel.check()?;
    self.layer.require_top_down_start(key, task.input(), self.defs)?;
    if self.requiring.contains(key) {
      self.layer.require_top_down_end(key);
      return Err(Error::CyclicDependency { key: key.clone(), stack: self.requiring.clone() });
    }
    self.requiring.push(key.clone());
    self.tracker.require_start(key, task);
    let result = self.get_output(key, task, modify_observability);
    self.tracker.require_end(key, task, result.as_ref().ok());
    self.requiring.pop();
    self.layer.require_top_down_end(key);
    result
  }

  fn get_output(&mut self, key: &TaskKey, task: &Task, modify_observability: bool) -> Result<Value> {
    // Visited in this session: return its output.
    self.tracker.check_visited_start(key);
    if let Some(visited) = self.visited.get(key) {
      self.layer.validate_visited(key, task.input(), visited)?;
      let output = visited.output.clone();
      self.tracker.check_visited_end(key, Some(&output));
      return Ok(output);
    }
    self.tracker.check_visited_end(key, None);

    // No stored data: execute.
    self.tracker.check_stored_start(key);
    let Some(stored) = self.txn.data(key) else {
      self.tracker.check_stored_end(key, None);
      return self.exec(key, task, ExecReason::NoData, modify_observability);
    };
    self.tracker.check_stored_end(key, Some(&stored.output));

    // Observed and scheduled by an ongoing bottom-up build: execute it and its scheduled dependencies now.
    if stored.observability.is_observed() && !self.scheduled.is_empty() {
      if let Some(output) = self.require_scheduled_now(key)? {
        return Ok(output);
      }
    }

    self.tracker.check_top_down_start(key, task);
    let reason = self.check_consistency(key, task, &stored, modify_observability);
    self.tracker.check_top_down_end(key, task);
    if let Some(reason) = reason? {
      return self.exec(key, task, reason, modify_observability);
    }

    self.up_to_date(key, task, stored, modify_observability)
  }

  /// Checks the stored data of task `key` in order: input, transient output, resource requires, resource provides, and
  /// finally task requires, which are required recursively. Returns the first inconsistency found.
  fn check_consistency(
    &mut self,
    key: &TaskKey,
    task: &Task,
    stored: &TaskData,
    modify_observability: bool,
  ) -> Result<Option<ExecReason>> {
    if task.input() != &stored.input {
      return Ok(Some(ExecReason::InconsistentInput { stored: stored.input.clone(), new: task.input().clone() }));
    }
    if stored.output.contains_inconsistent_transient() {
      return Ok(Some(ExecReason::InconsistentTransientOutput));
    }

    for dep in &stored.resource_requires {
      self.tracker.check_resource_require_start(key, dep);
      let inconsistency = dep.check(self.resources);
      self.tracker.check_resource_require_end(key, dep, inconsistency.as_ref().map(Option::as_ref));
      if let Some(new_stamp) = inconsistency? {
        return Ok(Some(ExecReason::InconsistentResourceRequire { dep: dep.clone(), new_stamp }));
      }
    }
    for dep in &stored.resource_provides {
      self.tracker.check_resource_provide_start(key, dep);
      let inconsistency = dep.check(self.resources);
      self.tracker.check_resource_provide_end(key, dep, inconsistency.as_ref().map(Option::as_ref));
      if let Some(new_stamp) = inconsistency? {
        return Ok(Some(ExecReason::InconsistentResourceProvide { dep: dep.clone(), new_stamp }));
      }
    }

    for dep in &stored.task_requires {
      self.tracker.check_task_require_start(key, dep);
      let Some(callee) = self.task_of(&dep.callee)? else {
        self.tracker.check_task_require_end(key, dep, None);
        return Ok(Some(ExecReason::InconsistentTaskRequire { dep: dep.clone(), new_stamp: None }));
      };
      let output = self.require(&dep.callee, &callee, modify_observability)?;
      let inconsistency = dep.check(&output);
      self.tracker.check_task_require_end(key, dep, inconsistency.as_ref());
      if let Some(new_stamp) = inconsistency {
        return Ok(Some(ExecReason::InconsistentTaskRequire { dep: dep.clone(), new_stamp: Some(new_stamp) }));
      }
    }

    Ok(None)
  }

  /// Marks task `key` with `stored` data as up-to-date, observing it when `modify_observability` is set.
  fn up_to_date(&mut self, key: &TaskKey, task: &Task, mut stored: TaskData, modify_observability: bool) -> Result<Value> {
    if modify_observability && stored.observability.is_unobserved() {
      stored.observability = Observability::ImplicitObserved;
      self.layer.validate_post_write(key, &stored, self.txn.as_read())?;
      store::set_observability(self.txn, key, Observability::ImplicitObserved, self.tracker);
    } else {
      self.layer.validate_post_write(key, &stored, self.txn.as_read())?;
    }
    let output = stored.output.clone();
    self.visited.insert(key.clone(), stored);
    self.callbacks.invoke(key, &output, self.tracker);
    self.tracker.up_to_date(key, task);
    Ok(output)
  }

  /// Creates the task of `key` from its stored input, or returns `None` if it has no stored input.
  pub(crate) fn task_of(&self, key: &TaskKey) -> Result<Option<Task>> {
    let Some(input) = self.txn.input(key) else { return Ok(None) };
    Ok(Some(self.defs.task(&key.id, input)?))
  }
}

