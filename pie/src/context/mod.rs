use crate::dependency::{ResourceProvideDep, ResourceRequireDep, TaskRequireDep};
use crate::error::{Error, Result};
use crate::pie::SessionData;
use crate::resource::{ResourceKey, ResourceService};
use crate::stamp::{OutputStamper, ResourceStamper};
use crate::task::{Task, TaskDefs, TaskKey};
use crate::value::Value;

pub(crate) mod bottom_up;
pub(crate) mod executor;
pub(crate) mod top_down;

/// Context passed into a running task body, through which the task requires other tasks and resources, and provides
/// resources. Every dependency created through the context is recorded for the executing task.
///
/// Object-safe trait.
pub trait ExecContext {
  /// Requires `task`, creating a dependency to its output that is checked with `stamper`, and returns its up-to-date
  /// output.
  fn require_task_with_stamper(&mut self, task: &Task, stamper: OutputStamper) -> Result<Value>;
  /// Requires `task` with the [default output stamper](Self::default_output_stamper).
  #[inline]
  fn require_task(&mut self, task: &Task) -> Result<Value> {
    let stamper = self.default_output_stamper();
    self.require_task_with_stamper(task, stamper)
  }
  /// Requires the task created from definition `id` and `input`.
  #[inline]
  fn require(&mut self, id: &str, input: Value) -> Result<Value> {
    let task = self.task_defs().task(id, input)?;
    self.require_task(&task)
  }

  /// Creates a require dependency to the resource at `key`, stamped with `stamper`.
  fn require_resource_with_stamper(&mut self, key: &ResourceKey, stamper: ResourceStamper) -> Result<()>;
  /// Creates a require dependency to the resource at `key` with the default require stamper for that resource.
  #[inline]
  fn require_resource(&mut self, key: &ResourceKey) -> Result<()> {
    let stamper = self.default_require_stamper(key)?;
    self.require_resource_with_stamper(key, stamper)
  }
  /// Creates a provide dependency to the resource at `key`, stamped with `stamper`.
  fn provide_resource_with_stamper(&mut self, key: &ResourceKey, stamper: ResourceStamper) -> Result<()>;
  /// Creates a provide dependency to the resource at `key` with the default provide stamper for that resource.
  #[inline]
  fn provide_resource(&mut self, key: &ResourceKey) -> Result<()> {
    let stamper = self.default_provide_stamper(key)?;
    self.provide_resource_with_stamper(key, stamper)
  }

  /// Requires the file at `key` and reads it, returning `None` if it does not exist.
  fn read(&mut self, key: &ResourceKey) -> Result<Option<Vec<u8>>> {
    self.require_resource(key)?;
    self.resources().read(key).map_err(|e| Error::resource(key, e))
  }
  /// Writes `contents` to the file at `key` and provides it.
  fn write(&mut self, key: &ResourceKey, contents: &[u8]) -> Result<()> {
    self.resources().write(key, contents).map_err(|e| Error::resource(key, e))?;
    self.provide_resource(key)
  }

  /// Gets the resource service that stamps resources.
  fn resources(&self) -> &dyn ResourceService;
  /// Gets the registered task definitions.
  fn task_defs(&self) -> &TaskDefs;

  fn default_output_stamper(&self) -> OutputStamper;
  fn default_require_stamper(&self, key: &ResourceKey) -> Result<ResourceStamper>;
  fn default_provide_stamper(&self, key: &ResourceKey) -> Result<ResourceStamper>;

  /// Returns whether the build was cancelled. Long-running tasks may poll this and return [`Error::Cancelled`].
  fn is_cancelled(&self) -> bool;
}


/// [`ExecContext`] of one task execution. Starts with empty dependency buffers, which become the complete set of
/// dependencies of the task when its execution succeeds.
pub(crate) struct TaskContext<'s, 'p> {
  session: &'s mut SessionData<'p>,
  key: TaskKey,
  modify_observability: bool,
  task_requires: Vec<TaskRequireDep>,
  resource_requires: Vec<ResourceRequireDep>,
  resource_provides: Vec<ResourceProvideDep>,
}

/// Dependencies recorded by a [`TaskContext`].
pub(crate) struct RecordedDeps {
  pub task_requires: Vec<TaskRequireDep>,
  pub resource_requires: Vec<ResourceRequireDep>,
  pub resource_provides: Vec<ResourceProvideDep>,
}

impl<'s, 'p> TaskContext<'s, 'p> {
  #[inline]
  pub(crate) fn new(session: &'s mut SessionData<'p>, key: TaskKey, modify_observability: bool) -> Self {
    Self {
      session,
      key,
      modify_observability,
      task_requires: Vec::new(),
      resource_requires: Vec::new(),
      resource_provides: Vec::new(),
    }
  }

  #[inline]
  pub(crate) fn into_deps(self) -> RecordedDeps {
    RecordedDeps {
      task_requires: self.task_requires,
      resource_requires: self.resource_requires,
      resource_provides: self.resource_provides,
    }
  }
}

impl ExecContext for TaskContext<'_, '_> {
  fn require_task_with_stamper(&mut self, task: &Task, stamper: OutputStamper) -> Result<Value> {
    let key = task.key();
    if key == self.key {
      return Err(Error::CyclicDependency { key: key.clone(), stack: vec![key] });
    }
    let output = self.session.require(&key, task, self.modify_observability)?;
    let dep = TaskRequireDep::new(key, stamper, &output);
    self.session.tracker.required_task(&self.key, &dep);
    if !self.task_requires.contains(&dep) {
      self.task_requires.push(dep);
    }
    Ok(output)
  }

  fn require_resource_with_stamper(&mut self, key: &ResourceKey, stamper: ResourceStamper) -> Result<()> {
    let stamp = stamper.stamp(self.session.resources, key)?;
    let dep = ResourceRequireDep::new(key.clone(), stamper, stamp);
    self.session.tracker.required_resource(&self.key, &dep);
    if !self.resource_requires.contains(&dep) {
      self.resource_requires.push(dep);
    }
    Ok(())
  }

  fn provide_resource_with_stamper(&mut self, key: &ResourceKey, stamper: ResourceStamper) -> Result<()> {
    let stamp = stamper.stamp(self.session.resources, key)?;
    let dep = ResourceProvideDep::new(key.clone(), stamper, stamp);
    self.session.tracker.provided_resource(&self.key, &dep);
    if !self.resource_provides.contains(&dep) {
      self.resource_provides.push(dep);
    }
    Ok(())
  }

  #[inline]
  fn resources(&self) -> &dyn ResourceService { self.session.resources }
  #[inline]
  fn task_defs(&self) -> &TaskDefs { self.session.defs }

  #[inline]
  fn default_output_stamper(&self) -> OutputStamper { self.session.stampers.output }
  #[inline]
  fn default_require_stamper(&self, key: &ResourceKey) -> Result<ResourceStamper> {
    self.session.stampers.require_stamper(self.session.resources, key)
  }
  #[inline]
  fn default_provide_stamper(&self, key: &ResourceKey) -> Result<ResourceStamper> {
    self.session.stampers.provide_stamper(self.session.resources, key)
  }

  #[inline]
  fn is_cancelled(&self) -> bool { self.session.cancel.is_cancelled() }
}
