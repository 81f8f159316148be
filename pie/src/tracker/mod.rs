use crate::dependency::{Observability, ResourceProvideDep, ResourceRequireDep, TaskData, TaskRequireDep};
use crate::error::Error;
use crate::reason::ExecReason;
use crate::resource::ResourceKey;
use crate::stamp::{OutputStamp, ResourceStamp};
use crate::task::{Tags, Task, TaskKey};
use crate::value::Value;

pub mod writing;
pub mod event;
pub mod metrics;
pub mod logging;

/// Build event tracker. Can be used to implement logging, event tracing, progress tracking, metrics, etc.
///
/// Trackers only observe builds, they never influence them. Every method has a default implementation that does
/// nothing, and `()` implements this trait by doing nothing at all.
///
/// Object-safe trait.
#[allow(unused_variables)]
pub trait Tracker {
  /// Start: a new build.
  #[inline]
  fn build_start(&mut self) {}
  /// End: completed build.
  #[inline]
  fn build_end(&mut self) {}

  /// Start: top-down build requiring `task`.
  #[inline]
  fn require_top_down_initial_start(&mut self, key: &TaskKey, task: &Task) {}
  /// End: top-down build requiring `task`, producing `output`, or `None` if the build failed.
  #[inline]
  fn require_top_down_initial_end(&mut self, key: &TaskKey, task: &Task, output: Option<&Value>) {}
  /// Start: bottom-up build for `changed` resources, with `tags`.
  #[inline]
  fn require_bottom_up_initial_start(&mut self, changed: &[ResourceKey], tags: &Tags) {}
  /// End: bottom-up build.
  #[inline]
  fn require_bottom_up_initial_end(&mut self) {}

  /// Start: require `task`.
  #[inline]
  fn require_start(&mut self, key: &TaskKey, task: &Task) {}
  /// End: required `task`, producing `output`, or `None` if requiring failed.
  #[inline]
  fn require_end(&mut self, key: &TaskKey, task: &Task, output: Option<&Value>) {}

  /// Start: check whether `key` was already visited in this session.
  #[inline]
  fn check_visited_start(&mut self, key: &TaskKey) {}
  /// End: checked whether `key` was visited, finding its `output` if it was.
  #[inline]
  fn check_visited_end(&mut self, key: &TaskKey, output: Option<&Value>) {}
  /// Start: check whether `key` has stored data.
  #[inline]
  fn check_stored_start(&mut self, key: &TaskKey) {}
  /// End: checked whether `key` has stored data, finding its `output` if it has.
  #[inline]
  fn check_stored_end(&mut self, key: &TaskKey, output: Option<&Value>) {}

  /// Start: check consistency of the stored data of `task`.
  #[inline]
  fn check_top_down_start(&mut self, key: &TaskKey, task: &Task) {}
  /// End: checked consistency of the stored data of `task`.
  #[inline]
  fn check_top_down_end(&mut self, key: &TaskKey, task: &Task) {}
  /// Start: check resource require `dep` of `key`.
  #[inline]
  fn check_resource_require_start(&mut self, key: &TaskKey, dep: &ResourceRequireDep) {}
  /// End: checked resource require `dep` of `key`, possibly finding an `inconsistency`.
  #[inline]
  fn check_resource_require_end(
    &mut self,
    key: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {}
  /// Start: check resource provide `dep` of `key`.
  #[inline]
  fn check_resource_provide_start(&mut self, key: &TaskKey, dep: &ResourceProvideDep) {}
  /// End: checked resource provide `dep` of `key`, possibly finding an `inconsistency`.
  #[inline]
  fn check_resource_provide_end(
    &mut self,
    key: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {}
  /// Start: check task require `dep` of `key`.
  #[inline]
  fn check_task_require_start(&mut self, key: &TaskKey, dep: &TaskRequireDep) {}
  /// End: checked task require `dep` of `key`, possibly finding an `inconsistency`.
  #[inline]
  fn check_task_require_end(&mut self, key: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {}

  /// Start: execute `task` because of `reason`.
  #[inline]
  fn execute_start(&mut self, key: &TaskKey, task: &Task, reason: &ExecReason) {}
  /// End: executed `task` successfully, producing `data`.
  #[inline]
  fn execute_end_success(&mut self, key: &TaskKey, task: &Task, data: &TaskData) {}
  /// End: executing `task` failed with `error`.
  #[inline]
  fn execute_end_failed(&mut self, key: &TaskKey, task: &Task, error: &Error) {}
  /// End: executing `task` was cancelled.
  #[inline]
  fn execute_end_interrupted(&mut self, key: &TaskKey, task: &Task) {}
  /// `task` is up to date and was not executed.
  #[inline]
  fn up_to_date(&mut self, key: &TaskKey, task: &Task) {}

  /// Task `caller` created task require `dep`.
  #[inline]
  fn required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep) {}
  /// Task `requirer` created resource require `dep`.
  #[inline]
  fn required_resource(&mut self, requirer: &TaskKey, dep: &ResourceRequireDep) {}
  /// Task `provider` created resource provide `dep`.
  #[inline]
  fn provided_resource(&mut self, provider: &TaskKey, dep: &ResourceProvideDep) {}

  /// Start: schedule tasks affected by changed `resource`.
  #[inline]
  fn schedule_affected_by_resource_start(&mut self, resource: &ResourceKey) {}
  /// End: scheduled tasks affected by changed `resource`.
  #[inline]
  fn schedule_affected_by_resource_end(&mut self, resource: &ResourceKey) {}
  /// Checked whether `provider` is affected through its provide `dep`, possibly finding an `inconsistency`.
  #[inline]
  fn check_affected_by_provided_resource(
    &mut self,
    provider: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {}
  /// Checked whether `requirer` is affected through its require `dep`, possibly finding an `inconsistency`.
  #[inline]
  fn check_affected_by_required_resource(
    &mut self,
    requirer: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {}
  /// Start: schedule tasks affected by new `output` of `key`.
  #[inline]
  fn schedule_affected_by_task_output_start(&mut self, key: &TaskKey, output: &Value) {}
  /// End: scheduled tasks affected by the new output of `key`.
  #[inline]
  fn schedule_affected_by_task_output_end(&mut self, key: &TaskKey) {}
  /// Checked whether `caller` is affected through its task require `dep`, possibly finding an `inconsistency`.
  #[inline]
  fn check_affected_by_required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {}
  /// Scheduled `key` for execution.
  #[inline]
  fn schedule_task(&mut self, key: &TaskKey) {}
  /// Deferred `key`: it is affected but will not be executed in this build.
  #[inline]
  fn defer_task(&mut self, key: &TaskKey) {}
  /// Removed `key` from the deferred tasks.
  #[inline]
  fn undefer_task(&mut self, key: &TaskKey) {}
  /// Start: execute scheduled tasks until `key` is executed or no scheduled task is required by `key`.
  #[inline]
  fn require_scheduled_now_start(&mut self, key: &TaskKey) {}
  /// End: executed scheduled tasks for `key`, producing `output` if `key` itself was executed.
  #[inline]
  fn require_scheduled_now_end(&mut self, key: &TaskKey, output: Option<&Value>) {}

  /// Start: invoke the callback of `key` with `output`.
  #[inline]
  fn invoke_callback_start(&mut self, key: &TaskKey, output: &Value) {}
  /// End: invoked the callback of `key`.
  #[inline]
  fn invoke_callback_end(&mut self, key: &TaskKey) {}

  /// Changed the observability of `key` from `previous` to `observability`.
  #[inline]
  fn set_task_observability(&mut self, key: &TaskKey, previous: Observability, observability: Observability) {}
}

/// Implement [`Tracker`] for `()` that does nothing.
impl Tracker for () {}

/// A [`Tracker`] that forwards events to two [`Tracker`]s.
#[derive(Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub struct CompositeTracker<A1, A2>(pub A1, pub A2);
impl<A1, A2> CompositeTracker<A1, A2> {
  #[inline]
  pub fn new(tracker_1: A1, tracker_2: A2) -> Self { Self(tracker_1, tracker_2) }
}
impl<A1: Tracker, A2: Tracker> Tracker for CompositeTracker<A1, A2> {
  #[inline]
  fn build_start(&mut self) {
    self.0.build_start();
    self.1.build_start();
  }
  #[inline]
  fn build_end(&mut self) {
    self.0.build_end();
    self.1.build_end();
  }

  #[inline]
  fn require_top_down_initial_start(&mut self, key: &TaskKey, task: &Task) {
    self.0.require_top_down_initial_start(key, task);
    self.1.require_top_down_initial_start(key, task);
  }
  #[inline]
  fn require_top_down_initial_end(&mut self, key: &TaskKey, task: &Task, output: Option<&Value>) {
    self.0.require_top_down_initial_end(key, task, output);
    self.1.require_top_down_initial_end(key, task, output);
  }
  #[inline]
  fn require_bottom_up_initial_start(&mut self, changed: &[ResourceKey], tags: &Tags) {
    self.0.require_bottom_up_initial_start(changed, tags);
    self.1.require_bottom_up_initial_start(changed, tags);
  }
  #[inline]
  fn require_bottom_up_initial_end(&mut self) {
    self.0.require_bottom_up_initial_end();
    self.1.require_bottom_up_initial_end();
  }

  #[inline]
  fn require_start(&mut self, key: &TaskKey, task: &Task) {
    self.0.require_start(key, task);
    self.1.require_start(key, task);
  }
  #[inline]
  fn require_end(&mut self, key: &TaskKey, task: &Task, output: Option<&Value>) {
    self.0.require_end(key, task, output);
    self.1.require_end(key, task, output);
  }

  #[inline]
  fn check_visited_start(&mut self, key: &TaskKey) {
    self.0.check_visited_start(key);
    self.1.check_visited_start(key);
  }
  #[inline]
  fn check_visited_end(&mut self, key: &TaskKey, output: Option<&Value>) {
    self.0.check_visited_end(key, output);
    self.1.check_visited_end(key, output);
  }
  #[inline]
  fn check_stored_start(&mut self, key: &TaskKey) {
    self.0.check_stored_start(key);
    self.1.check_stored_start(key);
  }
  #[inline]
  fn check_stored_end(&mut self, key: &TaskKey, output: Option<&Value>) {
    self.0.check_stored_end(key, output);
    self.1.check_stored_end(key, output);
  }

  #[inline]
  fn check_top_down_start(&mut self, key: &TaskKey, task: &Task) {
    self.0.check_top_down_start(key, task);
    self.1.check_top_down_start(key, task);
  }
  #[inline]
  fn check_top_down_end(&mut self, key: &TaskKey, task: &Task) {
    self.0.check_top_down_end(key, task);
    self.1.check_top_down_end(key, task);
  }
  #[inline]
  fn check_resource_require_start(&mut self, key: &TaskKey, dep: &ResourceRequireDep) {
    self.0.check_resource_require_start(key, dep);
    self.1.check_resource_require_start(key, dep);
  }
  #[inline]
  fn check_resource_require_end(
    &mut self,
    key: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.0.check_resource_require_end(key, dep, inconsistency);
    self.1.check_resource_require_end(key, dep, inconsistency);
  }
  #[inline]
  fn check_resource_provide_start(&mut self, key: &TaskKey, dep: &ResourceProvideDep) {
    self.0.check_resource_provide_start(key, dep);
    self.1.check_resource_provide_start(key, dep);
  }
  #[inline]
  fn check_resource_provide_end(
    &mut self,
    key: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.0.check_resource_provide_end(key, dep, inconsistency);
    self.1.check_resource_provide_end(key, dep, inconsistency);
  }
  #[inline]
  fn check_task_require_start(&mut self, key: &TaskKey, dep: &TaskRequireDep) {
    self.0.check_task_require_start(key, dep);
    self.1.check_task_require_start(key, dep);
  }
  #[inline]
  fn check_task_require_end(&mut self, key: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {
    self.0.check_task_require_end(key, dep, inconsistency);
    self.1.check_task_require_end(key, dep, inconsistency);
  }

  #[inline]
  fn execute_start(&mut self, key: &TaskKey, task: &Task, reason: &ExecReason) {
    self.0.execute_start(key, task, reason);
    self.1.execute_start(key, task, reason);
  }
  #[inline]
  fn execute_end_success(&mut self, key: &TaskKey, task: &Task, data: &TaskData) {
    self.0.execute_end_success(key, task, data);
    self.1.execute_end_success(key, task, data);
  }
  #[inline]
  fn execute_end_failed(&mut self, key: &TaskKey, task: &Task, error: &Error) {
    self.0.execute_end_failed(key, task, error);
    self.1.execute_end_failed(key, task, error);
  }
  #[inline]
  fn execute_end_interrupted(&mut self, key: &TaskKey, task: &Task) {
    self.0.execute_end_interrupted(key, task);
    self.1.execute_end_interrupted(key, task);
  }
  #[inline]
  fn up_to_date(&mut self, key: &TaskKey, task: &Task) {
    self.0.up_to_date(key, task);
    self.1.up_to_date(key, task);
  }

  #[inline]
  fn required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep) {
    self.0.required_task(caller, dep);
    self.1.required_task(caller, dep);
  }
  #[inline]
  fn required_resource(&mut self, requirer: &TaskKey, dep: &ResourceRequireDep) {
    self.0.required_resource(requirer, dep);
    self.1.required_resource(requirer, dep);
  }
  #[inline]
  fn provided_resource(&mut self, provider: &TaskKey, dep: &ResourceProvideDep) {
    self.0.provided_resource(provider, dep);
    self.1.provided_resource(provider, dep);
  }

  #[inline]
  fn schedule_affected_by_resource_start(&mut self, resource: &ResourceKey) {
    self.0.schedule_affected_by_resource_start(resource);
    self.1.schedule_affected_by_resource_start(resource);
  }
  #[inline]
  fn schedule_affected_by_resource_end(&mut self, resource: &ResourceKey) {
    self.0.schedule_affected_by_resource_end(resource);
    self.1.schedule_affected_by_resource_end(resource);
  }
  #[inline]
  fn check_affected_by_provided_resource(
    &mut self,
    provider: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.0.check_affected_by_provided_resource(provider, dep, inconsistency);
    self.1.check_affected_by_provided_resource(provider, dep, inconsistency);
  }
  #[inline]
  fn check_affected_by_required_resource(
    &mut self,
    requirer: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.0.check_affected_by_required_resource(requirer, dep, inconsistency);
    self.1.check_affected_by_required_resource(requirer, dep, inconsistency);
  }
  #[inline]
  fn schedule_affected_by_task_output_start(&mut self, key: &TaskKey, output: &Value) {
    self.0.schedule_affected_by_task_output_start(key, output);
    self.1.schedule_affected_by_task_output_start(key, output);
  }
  #[inline]
  fn schedule_affected_by_task_output_end(&mut self, key: &TaskKey) {
    self.0.schedule_affected_by_task_output_end(key);
    self.1.schedule_affected_by_task_output_end(key);
  }
  #[inline]
  fn check_affected_by_required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {
    self.0.check_affected_by_required_task(caller, dep, inconsistency);
    self.1.check_affected_by_required_task(caller, dep, inconsistency);
  }
  #[inline]
  fn schedule_task(&mut self, key: &TaskKey) {
    self.0.schedule_task(key);
    self.1.schedule_task(key);
  }
  #[inline]
  fn defer_task(&mut self, key: &TaskKey) {
    self.0.defer_task(key);
    self.1.defer_task(key);
  }
  #[inline]
  fn undefer_task(&mut self, key: &TaskKey) {
    self.0.undefer_task(key);
    self.1.undefer_task(key);
  }
  #[inline]
  fn require_scheduled_now_start(&mut self, key: &TaskKey) {
    self.0.require_scheduled_now_start(key);
    self.1.require_scheduled_now_start(key);
  }
  #[inline]
  fn require_scheduled_now_end(&mut self, key: &TaskKey, output: Option<&Value>) {
    self.0.require_scheduled_now_end(key, output);
    self.1.require_scheduled_now_end(key, output);
  }

  #[inline]
  fn invoke_callback_start(&mut self, key: &TaskKey, output: &Value) {
    self.0.invoke_callback_start(key, output);
    self.1.invoke_callback_start(key, output);
  }
  #[inline]
  fn invoke_callback_end(&mut self, key: &TaskKey) {
    self.0.invoke_callback_end(key);
    self.1.invoke_callback_end(key);
  }

  #[inline]
  fn set_task_observability(&mut self, key: &TaskKey, previous: Observability, observability: Observability) {
    self.0.set_task_observability(key, previous, observability);
    self.1.set_task_observability(key, previous, observability);
  }
}
