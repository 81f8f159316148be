use std::fmt::{self, Display, Formatter};

use crate::dependency::{ResourceProvideDep, ResourceRequireDep, TaskRequireDep};
use crate::stamp::{OutputStamp, ResourceStamp};
use crate::value::Value;

/// Reason why a task is executed. Only used for diagnostics, never for control flow.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ExecReason {
  /// The task has never been executed.
  NoData,
  /// The task was scheduled by a bottom-up build.
  Affected,
  InconsistentInput { stored: Value, new: Value },
  InconsistentTransientOutput,
  InconsistentResourceRequire { dep: ResourceRequireDep, new_stamp: ResourceStamp },
  InconsistentResourceProvide { dep: ResourceProvideDep, new_stamp: ResourceStamp },
  /// `new_stamp` is `None` when the callee has no stored data anymore.
  InconsistentTaskRequire { dep: TaskRequireDep, new_stamp: Option<OutputStamp> },
}

impl Display for ExecReason {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      ExecReason::NoData => f.write_str("no stored data"),
      ExecReason::Affected => f.write_str("affected by a change"),
      ExecReason::InconsistentInput { stored, new } => write!(f, "input changed from {} to {}", stored, new),
      ExecReason::InconsistentTransientOutput => f.write_str("transient output is stale"),
      ExecReason::InconsistentResourceRequire { dep, new_stamp } =>
        write!(f, "required resource {} changed: {:?} ≠ {:?}", dep.key, dep.stamp, new_stamp),
      ExecReason::InconsistentResourceProvide { dep, new_stamp } =>
        write!(f, "provided resource {} changed: {:?} ≠ {:?}", dep.key, dep.stamp, new_stamp),
      ExecReason::InconsistentTaskRequire { dep, new_stamp: Some(new_stamp) } =>
        write!(f, "output of required task {} changed: {:?} ≠ {:?}", dep.callee, dep.stamp, new_stamp),
      ExecReason::InconsistentTaskRequire { dep, new_stamp: None } =>
        write!(f, "required task {} has no stored data", dep.callee),
    }
  }
}
