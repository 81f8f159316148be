use std::ops::RangeInclusive;

use crate::dependency::{Observability, ResourceProvideDep, ResourceRequireDep, TaskData, TaskRequireDep};
use crate::error::Error;
use crate::reason::ExecReason;
use crate::resource::ResourceKey;
use crate::task::{Tags, Task, TaskKey};
use crate::tracker::Tracker;
use crate::value::Value;

/// A [`Tracker`] that stores [`Event`]s in a [`Vec`], useful in testing to assert that builds are incremental and
/// correct.
#[derive(Clone, Debug)]
pub struct EventTracker {
  events: Vec<Event>,
  clear_on_build_start: bool,
}

impl Default for EventTracker {
  fn default() -> Self {
    Self { events: Vec::new(), clear_on_build_start: true }
  }
}

impl EventTracker {
  /// Creates a tracker that clears its events at the start of every build if `clear_on_build_start` is `true`.
  #[inline]
  pub fn new(clear_on_build_start: bool) -> Self { Self { events: Vec::new(), clear_on_build_start } }
}

/// Enumeration of important build events.
#[derive(Clone, Debug)]
pub enum Event {
  BuildStart,
  BuildEnd,

  RequireTopDownStart(TaskKey),
  RequireTopDownEnd(TaskKey, Option<Value>),
  RequireBottomUpStart(Vec<ResourceKey>, Tags),
  RequireBottomUpEnd,

  RequireStart(TaskKey),
  RequireEnd(TaskKey, Option<Value>),

  ExecuteStart(ExecuteStart),
  ExecuteEnd(ExecuteEnd),
  UpToDate(TaskKey),

  RequiredTask(TaskKey, TaskRequireDep),
  RequiredResource(TaskKey, ResourceRequireDep),
  ProvidedResource(TaskKey, ResourceProvideDep),

  ScheduleTask(TaskKey),
  DeferTask(TaskKey),
  UndeferTask(TaskKey),

  InvokeCallback(TaskKey, Value),
  SetObservability(TaskKey, SetObservability),
}

/// Start: execute `key` because of `reason`.
#[derive(Clone, Debug)]
pub struct ExecuteStart {
  pub key: TaskKey,
  pub reason: ExecReason,
  pub index: usize,
}
/// End: executed `key`, with `outcome`.
#[derive(Clone, Debug)]
pub struct ExecuteEnd {
  pub key: TaskKey,
  pub outcome: ExecuteOutcome,
  pub index: usize,
}
/// How an execution ended.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ExecuteOutcome {
  Success(Value),
  /// Failed with the displayed error.
  Failed(String),
  Interrupted,
}
/// Changed observability from `previous` to `observability`.
#[derive(Copy, Clone, Debug)]
pub struct SetObservability {
  pub index: usize,
  pub previous: Observability,
  pub observability: Observability,
}

impl Tracker for EventTracker {
  #[inline]
  fn build_start(&mut self) {
    if self.clear_on_build_start {
      self.events.clear();
    }
    self.events.push(Event::BuildStart);
  }
  #[inline]
  fn build_end(&mut self) {
    self.events.push(Event::BuildEnd);
  }

  #[inline]
  fn require_top_down_initial_start(&mut self, key: &TaskKey, _task: &Task) {
    self.events.push(Event::RequireTopDownStart(key.clone()));
  }
  #[inline]
  fn require_top_down_initial_end(&mut self, key: &TaskKey, _task: &Task, output: Option<&Value>) {
    self.events.push(Event::RequireTopDownEnd(key.clone(), output.cloned()));
  }
  #[inline]
  fn require_bottom_up_initial_start(&mut self, changed: &[ResourceKey], tags: &Tags) {
    self.events.push(Event::RequireBottomUpStart(changed.to_vec(), tags.clone()));
  }
  #[inline]
  fn require_bottom_up_initial_end(&mut self) {
    self.events.push(Event::RequireBottomUpEnd);
  }

  #[inline]
  fn require_start(&mut self, key: &TaskKey, _task: &Task) {
    self.events.push(Event::RequireStart(key.clone()));
  }
  #[inline]
  fn require_end(&mut self, key: &TaskKey, _task: &Task, output: Option<&Value>) {
    self.events.push(Event::RequireEnd(key.clone(), output.cloned()));
  }

  #[inline]
  fn execute_start(&mut self, key: &TaskKey, _task: &Task, reason: &ExecReason) {
    let data = ExecuteStart { key: key.clone(), reason: reason.clone(), index: self.events.len() };
    self.events.push(Event::ExecuteStart(data));
  }
  #[inline]
  fn execute_end_success(&mut self, key: &TaskKey, _task: &Task, data: &TaskData) {
    self.push_execute_end(key, ExecuteOutcome::Success(data.output.clone()));
  }
  #[inline]
  fn execute_end_failed(&mut self, key: &TaskKey, _task: &Task, error: &Error) {
    self.push_execute_end(key, ExecuteOutcome::Failed(error.to_string()));
  }
  #[inline]
  fn execute_end_interrupted(&mut self, key: &TaskKey, _task: &Task) {
    self.push_execute_end(key, ExecuteOutcome::Interrupted);
  }
  #[inline]
  fn up_to_date(&mut self, key: &TaskKey, _task: &Task) {
    self.events.push(Event::UpToDate(key.clone()));
  }

  #[inline]
  fn required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep) {
    self.events.push(Event::RequiredTask(caller.clone(), dep.clone()));
  }
  #[inline]
  fn required_resource(&mut self, requirer: &TaskKey, dep: &ResourceRequireDep) {
    self.events.push(Event::RequiredResource(requirer.clone(), dep.clone()));
  }
  #[inline]
  fn provided_resource(&mut self, provider: &TaskKey, dep: &ResourceProvideDep) {
    self.events.push(Event::ProvidedResource(provider.clone(), dep.clone()));
  }

  #[inline]
  fn schedule_task(&mut self, key: &TaskKey) {
    self.events.push(Event::ScheduleTask(key.clone()));
  }
  #[inline]
  fn defer_task(&mut self, key: &TaskKey) {
    self.events.push(Event::DeferTask(key.clone()));
  }
  #[inline]
  fn undefer_task(&mut self, key: &TaskKey) {
    self.events.push(Event::UndeferTask(key.clone()));
  }

  #[inline]
  fn invoke_callback_start(&mut self, key: &TaskKey, output: &Value) {
    self.events.push(Event::InvokeCallback(key.clone(), output.clone()));
  }

  #[inline]
  fn set_task_observability(&mut self, key: &TaskKey, previous: Observability, observability: Observability) {
    let data = SetObservability { index: self.events.len(), previous, observability };
    self.events.push(Event::SetObservability(key.clone(), data));
  }
}

impl EventTracker {
  #[inline]
  fn push_execute_end(&mut self, key: &TaskKey, outcome: ExecuteOutcome) {
    let data = ExecuteEnd { key: key.clone(), outcome, index: self.events.len() };
    self.events.push(Event::ExecuteEnd(data));
  }
}

impl Event {
  /// Returns `true` if this is a [build start event](Event::BuildStart).
  pub fn is_build_start(&self) -> bool {
    matches!(self, Event::BuildStart)
  }
  /// Returns `true` if this is a [build end event](Event::BuildEnd).
  pub fn is_build_end(&self) -> bool {
    matches!(self, Event::BuildEnd)
  }

  /// Returns `true` if this is an execute [start](Event::ExecuteStart) or [end](Event::ExecuteEnd) event.
  pub fn is_execute(&self) -> bool {
    matches!(self, Event::ExecuteStart(_) | Event::ExecuteEnd(_))
  }
  /// Returns `true` if this is an execute [start](Event::ExecuteStart) or [end](Event::ExecuteEnd) event for `key`.
  pub fn is_execute_of(&self, key: &TaskKey) -> bool {
    match self {
      Event::ExecuteStart(ExecuteStart { key: k, .. }) |
      Event::ExecuteEnd(ExecuteEnd { key: k, .. }) => k == key,
      _ => false,
    }
  }
  /// Returns `Some(&data)` if this is an [execute start event](Event::ExecuteStart) for `key`, or `None` otherwise.
  pub fn match_execute_start(&self, key: &TaskKey) -> Option<&ExecuteStart> {
    match self {
      Event::ExecuteStart(data) if &data.key == key => Some(data),
      _ => None,
    }
  }
  /// Returns `Some(&data)` if this is an [execute end event](Event::ExecuteEnd) for `key`, or `None` otherwise.
  pub fn match_execute_end(&self, key: &TaskKey) -> Option<&ExecuteEnd> {
    match self {
      Event::ExecuteEnd(data) if &data.key == key => Some(data),
      _ => None,
    }
  }

  /// Returns `true` if this is an [up-to-date event](Event::UpToDate) for `key`.
  pub fn is_up_to_date_of(&self, key: &TaskKey) -> bool {
    matches!(self, Event::UpToDate(k) if k == key)
  }
  /// Returns `true` if this is a [schedule event](Event::ScheduleTask) for `key`.
  pub fn is_schedule_of(&self, key: &TaskKey) -> bool {
    matches!(self, Event::ScheduleTask(k) if k == key)
  }
  /// Returns `true` if this is a [defer event](Event::DeferTask) for `key`.
  pub fn is_defer_of(&self, key: &TaskKey) -> bool {
    matches!(self, Event::DeferTask(k) if k == key)
  }
  /// Returns `true` if this is a [callback event](Event::InvokeCallback) for `key`.
  pub fn is_callback_of(&self, key: &TaskKey) -> bool {
    matches!(self, Event::InvokeCallback(k, _) if k == key)
  }
  /// Returns `Some(&data)` if this is an [observability change event](Event::SetObservability) for `key`, or `None`
  /// otherwise.
  pub fn match_set_observability(&self, key: &TaskKey) -> Option<&SetObservability> {
    match self {
      Event::SetObservability(k, data) if k == key => Some(data),
      _ => None,
    }
  }
}

impl EventTracker {
  /// Returns a slice over all events.
  pub fn slice(&self) -> &[Event] {
    &self.events
  }
  /// Returns an iterator over all events.
  pub fn iter(&self) -> impl Iterator<Item=&Event> {
    self.events.iter()
  }
  /// Removes all events.
  pub fn clear(&mut self) {
    self.events.clear();
  }

  /// Returns `true` if `predicate` returns `true` for any event.
  pub fn any(&self, predicate: impl FnMut(&Event) -> bool) -> bool {
    self.iter().any(predicate)
  }
  /// Returns `true` if `predicate` returns `true` for exactly one event.
  pub fn one(&self, predicate: impl FnMut(&&Event) -> bool) -> bool {
    self.iter().filter(predicate).count() == 1
  }
  /// Returns the number of events for which `predicate` returns `true`.
  pub fn count(&self, predicate: impl FnMut(&&Event) -> bool) -> usize {
    self.iter().filter(predicate).count()
  }

  /// Returns `Some(v)` for the first event `e` where `f(e)` returns `Some(v)`, or `None` otherwise.
  pub fn find_map<R>(&self, f: impl FnMut(&Event) -> Option<&R>) -> Option<&R> {
    self.iter().find_map(f)
  }

  /// Returns `true` if any task was executed.
  pub fn any_execute(&self) -> bool {
    self.any(|e| e.is_execute())
  }
  /// Returns `true` if `key` was executed.
  pub fn any_execute_of(&self, key: &TaskKey) -> bool {
    self.any(|e| e.is_execute_of(key))
  }
  /// Returns `true` if `key` was executed exactly once.
  pub fn one_execute_of(&self, key: &TaskKey) -> bool {
    self.one(|e| e.match_execute_start(key).is_some())
  }
  /// Returns the keys of executed tasks, in execution start order.
  pub fn executed(&self) -> Vec<&TaskKey> {
    self.iter().filter_map(|e| match e {
      Event::ExecuteStart(data) => Some(&data.key),
      _ => None,
    }).collect()
  }
  /// Finds the first execute [start](Event::ExecuteStart) and [end](Event::ExecuteEnd) event for `key` and returns
  /// `Some((&start_data, &end_data))`, or `None` otherwise.
  pub fn first_execute(&self, key: &TaskKey) -> Option<(&ExecuteStart, &ExecuteEnd)> {
    let start_data = self.find_map(|e| e.match_execute_start(key));
    let end_data = self.find_map(|e| e.match_execute_end(key));
    start_data.zip(end_data)
  }
  /// Finds the first execute [start](Event::ExecuteStart) and [end](Event::ExecuteEnd) event for `key` and returns
  /// `Some(start_data.index..=end_data.index)`, or `None` otherwise.
  pub fn first_execute_range(&self, key: &TaskKey) -> Option<RangeInclusive<usize>> {
    self.first_execute(key).map(|(s, e)| s.index..=e.index)
  }
  /// Finds the first [execute start event](Event::ExecuteStart) for `key` and returns `Some(&data.reason)`, or `None`
  /// otherwise.
  pub fn first_execute_reason(&self, key: &TaskKey) -> Option<&ExecReason> {
    self.find_map(|e| e.match_execute_start(key)).map(|d| &d.reason)
  }
  /// Finds the first [execute end event](Event::ExecuteEnd) for `key` and returns `Some(&data)`, or `None` otherwise.
  pub fn first_execute_end(&self, key: &TaskKey) -> Option<&ExecuteEnd> {
    self.find_map(|e| e.match_execute_end(key))
  }
  /// Finds the first [execute end event](Event::ExecuteEnd) for `key` and returns `Some(&data.index)`, or `None`
  /// otherwise.
  pub fn first_execute_end_index(&self, key: &TaskKey) -> Option<&usize> {
    self.first_execute_end(key).map(|d| &d.index)
  }

  /// Returns `true` if `key` was found to be up-to-date.
  pub fn any_up_to_date_of(&self, key: &TaskKey) -> bool {
    self.any(|e| e.is_up_to_date_of(key))
  }
  /// Returns `true` if `key` was scheduled.
  pub fn any_schedule_of(&self, key: &TaskKey) -> bool {
    self.any(|e| e.is_schedule_of(key))
  }
  /// Returns `true` if `key` was deferred.
  pub fn any_defer_of(&self, key: &TaskKey) -> bool {
    self.any(|e| e.is_defer_of(key))
  }
  /// Returns the number of callback invocations for `key`.
  pub fn count_callbacks_of(&self, key: &TaskKey) -> usize {
    self.count(|e| e.is_callback_of(key))
  }
  /// Returns the observability changes of `key`, in order.
  pub fn observability_changes_of(&self, key: &TaskKey) -> Vec<&SetObservability> {
    self.iter().filter_map(|e| e.match_set_observability(key)).collect()
  }
}
