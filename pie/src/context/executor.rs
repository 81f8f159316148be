use crate::context::TaskContext;
use crate::dependency::{Observability, TaskData};
use crate::error::{Error, Result};
use crate::pie::SessionData;
use crate::reason::ExecReason;
use crate::store;
use crate::task::{Task, TaskKey};
use crate::value::Value;

impl SessionData<'_> {
  /// Executes `task`, stores its data, and returns its output.
  ///
  /// The task is observed while executing when `modify_observability` is set or when it already was observed, so
  /// that the tasks it requires become observed as well. When the task is observed after executing, tasks it no longer
  /// requires are implicitly unobserved.
  pub(crate) fn exec(
    &mut self,
    key: &TaskKey,
    task: &Task,
    reason: ExecReason,
    modify_observability: bool,
  ) -> Result<Value> {
    self.cancel.check()?;

    let previous_observability = self.txn.observability(key);
    let previous_callees: Vec<_> = self.txn.task_requires(key).into_iter().map(|dep| dep.callee).collect();

    self.tracker.execute_start(key, task, &reason);
    let mut context = TaskContext::new(self, key.clone(), modify_observability || previous_observability.is_observed());
    let result = task.def().execute(&mut context, task.input());
    let deps = context.into_deps();
    let output = match result {
      Ok(output) => output,
      Err(Error::Cancelled) => {
        self.tracker.execute_end_interrupted(key, task);
        return Err(Error::Cancelled);
      }
      Err(Error::Failed(source)) => {
        let error = Error::Execution { key: key.clone(), source };
        self.tracker.execute_end_failed(key, task, &error);
        return Err(error);
      }
      Err(error) => {
        self.tracker.execute_end_failed(key, task, &error);
        return Err(error);
      }
    };

    let observability = if modify_observability && previous_observability.is_unobserved() {
      Observability::ImplicitObserved
    } else {
      previous_observability
    };
    let data = TaskData {
      input: task.input().clone(),
      output,
      observability,
      task_requires: deps.task_requires,
      resource_requires: deps.resource_requires,
      resource_provides: deps.resource_provides,
    };
    self.tracker.execute_end_success(key, task, &data);

    self.layer.validate_pre_write(key, &data, self.txn.as_read())?;
    self.txn.set_data(key, data.clone())?;
    self.txn.remove_deferred(key);
    if previous_observability != observability {
      self.tracker.set_task_observability(key, previous_observability, observability);
    }
    self.layer.validate_post_write(key, &data, self.txn.as_read())?;

    if observability.is_observed() {
      for callee in previous_callees {
        if !data.requires_task(&callee) {
          store::implicit_unobserve(self.txn, &callee, self.tracker);
        }
      }
    }

    let output = data.output.clone();
    self.visited.insert(key.clone(), data);
    self.callbacks.invoke(key, &output, self.tracker);
    Ok(output)
  }
}
