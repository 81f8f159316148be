use crate::error::Result;
use crate::resource::{ResourceKey, ResourceService};
use crate::stamp::{OutputStamp, OutputStamper, ResourceStamp, ResourceStamper};
use crate::task::TaskKey;
use crate::value::Value;

/// Dependency from a task to the output of another task, its `callee`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TaskRequireDep {
  pub callee: TaskKey,
  pub stamper: OutputStamper,
  pub stamp: OutputStamp,
}

impl TaskRequireDep {
  #[inline]
  pub fn new(callee: TaskKey, stamper: OutputStamper, output: &Value) -> Self {
    let stamp = stamper.stamp(output);
    Self { callee, stamper, stamp }
  }

  /// Checks whether this dependency is inconsistent with the callee's current `output`, returning the new stamp when it
  /// is, `None` otherwise.
  #[inline]
  pub fn check(&self, output: &Value) -> Option<OutputStamp> {
    let new_stamp = self.stamper.stamp(output);
    if new_stamp != self.stamp { Some(new_stamp) } else { None }
  }
}

/// Dependency from a task to a resource it reads.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceRequireDep {
  pub key: ResourceKey,
  pub stamper: ResourceStamper,
  pub stamp: ResourceStamp,
}

/// Dependency from a task to a resource it writes.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceProvideDep {
  pub key: ResourceKey,
  pub stamper: ResourceStamper,
  pub stamp: ResourceStamp,
}

macro_rules! resource_dep_impl {
  ($dep:ty) => {
    impl $dep {
      #[inline]
      pub fn new(key: ResourceKey, stamper: ResourceStamper, stamp: ResourceStamp) -> Self {
        Self { key, stamper, stamp }
      }

      /// Checks whether this dependency is inconsistent with the current state of the resource, returning the new stamp
      /// when it is, `None` otherwise.
      #[inline]
      pub fn check(&self, resources: &dyn ResourceService) -> Result<Option<ResourceStamp>> {
        let new_stamp = self.stamper.stamp(resources, &self.key)?;
        Ok(if new_stamp != self.stamp { Some(new_stamp) } else { None })
      }
    }
  };
}
resource_dep_impl!(ResourceRequireDep);
resource_dep_impl!(ResourceProvideDep);


/// Whether a task is (transitively) demanded by an explicit top-level require.
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Observability {
  /// No observed task depends on the task. Skipped by bottom-up builds.
  #[default]
  Unobserved,
  /// Required by an observed task.
  ImplicitObserved,
  /// Required directly by a top-level require.
  ExplicitObserved,
}

impl Observability {
  #[inline]
  pub fn is_observed(&self) -> bool { !self.is_unobserved() }
  #[inline]
  pub fn is_unobserved(&self) -> bool { *self == Self::Unobserved }
}


/// Stored record of one executed task.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TaskData {
  pub input: Value,
  pub output: Value,
  pub observability: Observability,
  pub task_requires: Vec<TaskRequireDep>,
  pub resource_requires: Vec<ResourceRequireDep>,
  pub resource_provides: Vec<ResourceProvideDep>,
}

impl TaskData {
  /// Returns whether this task requires `callee` directly.
  #[inline]
  pub fn requires_task(&self, callee: &TaskKey) -> bool {
    self.task_requires.iter().any(|d| &d.callee == callee)
  }
}
