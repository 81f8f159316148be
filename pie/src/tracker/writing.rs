use std::io;
use std::io::{Stderr, Stdout};

use crate::dependency::{ResourceProvideDep, ResourceRequireDep, TaskData, TaskRequireDep};
use crate::error::Error;
use crate::reason::ExecReason;
use crate::resource::ResourceKey;
use crate::stamp::{OutputStamp, ResourceStamp};
use crate::task::{Tags, Task, TaskKey};
use crate::tracker::Tracker;
use crate::value::Value;

/// A [`Tracker`] that writes events to a [`std::io::Write`] instance, for example [`std::io::Stdout`].
///
/// Nested requires are indented. Write errors are ignored.
#[derive(Debug, Clone)]
pub struct WritingTracker<W> {
  writer: W,
  indentation: u32,
}

impl Default for WritingTracker<Stdout> {
  #[inline]
  fn default() -> Self { Self::new_stdout_writer() }
}

impl Default for WritingTracker<Stderr> {
  #[inline]
  fn default() -> Self { Self::new_stderr_writer() }
}

impl<W: io::Write> WritingTracker<W> {
  #[inline]
  pub fn new(writer: W) -> Self { Self { writer, indentation: 0 } }

  #[inline]
  pub fn writer(&self) -> &W { &self.writer }
  #[inline]
  pub fn into_writer(self) -> W { self.writer }
}

impl WritingTracker<Stdout> {
  #[inline]
  pub fn new_stdout_writer() -> Self { Self::new(io::stdout()) }
}

impl WritingTracker<Stderr> {
  #[inline]
  pub fn new_stderr_writer() -> Self { Self::new(io::stderr()) }
}

impl<W: io::Write> Tracker for WritingTracker<W> {
  #[inline]
  fn require_top_down_initial_start(&mut self, key: &TaskKey, _task: &Task) {
    self.writeln(format_args!("Top-down build start: {}", key));
    self.indent();
  }
  #[inline]
  fn require_top_down_initial_end(&mut self, _key: &TaskKey, _task: &Task, output: Option<&Value>) {
    self.unindent();
    match output {
      Some(output) => self.writeln(format_args!("Top-down build end: {}", output)),
      None => self.writeln(format_args!("Top-down build end: failed")),
    }
  }
  #[inline]
  fn require_bottom_up_initial_start(&mut self, changed: &[ResourceKey], tags: &Tags) {
    self.write_indentation();
    self.write(format_args!("Bottom-up build start: "));
    let mut iter = changed.iter();
    if let Some(resource) = iter.next() {
      self.write(format_args!("{}", resource));
      for resource in iter {
        self.write(format_args!(", {}", resource));
      }
    }
    if !tags.is_empty() {
      let mut tags: Vec<_> = tags.iter().map(String::as_str).collect();
      tags.sort_unstable();
      self.write(format_args!(" (tags: {})", tags.join(", ")));
    }
    self.write_nl();
    self.indent();
  }
  #[inline]
  fn require_bottom_up_initial_end(&mut self) {
    self.unindent();
    self.writeln(format_args!("Bottom-up build end"));
  }

  #[inline]
  fn check_top_down_start(&mut self, key: &TaskKey, _task: &Task) {
    self.writeln(format_args!("? {}", key));
    self.indent();
  }
  #[inline]
  fn check_resource_require_end(
    &mut self,
    _key: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.write_resource_dependency(&dep.key, &dep.stamp, inconsistency);
  }
  #[inline]
  fn check_resource_provide_end(
    &mut self,
    _key: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.write_resource_dependency(&dep.key, &dep.stamp, inconsistency);
  }
  #[inline]
  fn check_task_require_end(&mut self, _key: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {
    self.write_task_dependency(&dep.callee, dep, inconsistency);
  }
  #[inline]
  fn check_top_down_end(&mut self, _key: &TaskKey, _task: &Task) {
    self.unindent();
  }

  #[inline]
  fn execute_start(&mut self, key: &TaskKey, _task: &Task, reason: &ExecReason) {
    self.writeln(format_args!("→ {} ({})", key, reason));
    self.indent();
  }
  #[inline]
  fn execute_end_success(&mut self, _key: &TaskKey, _task: &Task, data: &TaskData) {
    self.unindent();
    self.writeln(format_args!("← {}", data.output));
  }
  #[inline]
  fn execute_end_failed(&mut self, _key: &TaskKey, _task: &Task, error: &Error) {
    self.unindent();
    self.writeln(format_args!("← failed: {}", error));
  }
  #[inline]
  fn execute_end_interrupted(&mut self, _key: &TaskKey, _task: &Task) {
    self.unindent();
    self.writeln(format_args!("← cancelled"));
  }
  #[inline]
  fn up_to_date(&mut self, key: &TaskKey, _task: &Task) {
    self.writeln(format_args!("✓ {}", key))
  }

  #[inline]
  fn schedule_affected_by_resource_start(&mut self, resource: &ResourceKey) {
    self.writeln(format_args!("¿ {}", resource));
    self.indent();
  }
  #[inline]
  fn schedule_affected_by_resource_end(&mut self, _resource: &ResourceKey) {
    self.unindent();
  }
  #[inline]
  fn check_affected_by_provided_resource(
    &mut self,
    provider: &TaskKey,
    dep: &ResourceProvideDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.write_resource_dependency_in_task_context(provider, &dep.stamp, inconsistency);
  }
  #[inline]
  fn check_affected_by_required_resource(
    &mut self,
    requirer: &TaskKey,
    dep: &ResourceRequireDep,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    self.write_resource_dependency_in_task_context(requirer, &dep.stamp, inconsistency);
  }
  #[inline]
  fn schedule_affected_by_task_output_start(&mut self, key: &TaskKey, _output: &Value) {
    self.writeln(format_args!("¿ {}", key));
    self.indent();
  }
  #[inline]
  fn schedule_affected_by_task_output_end(&mut self, _key: &TaskKey) {
    self.unindent();
  }
  #[inline]
  fn check_affected_by_required_task(&mut self, caller: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {
    self.write_task_dependency(caller, dep, inconsistency);
  }
  #[inline]
  fn schedule_task(&mut self, key: &TaskKey) {
    self.writeln(format_args!("↑ {}", key));
  }
  #[inline]
  fn defer_task(&mut self, key: &TaskKey) {
    self.writeln(format_args!("⏸ {}", key));
  }
}

impl<W: io::Write> WritingTracker<W> {
  #[inline]
  fn write(&mut self, args: std::fmt::Arguments) {
    write!(&mut self.writer, "{}", args).ok();
  }
  #[inline]
  fn writeln(&mut self, args: std::fmt::Arguments) {
    self.write_indentation();
    writeln!(&mut self.writer, "{}", args).ok();
  }
  #[inline]
  fn write_indentation(&mut self) {
    for _ in 0..self.indentation {
      write!(&mut self.writer, " ").ok();
    }
  }
  #[inline]
  fn write_nl(&mut self) {
    writeln!(&mut self.writer).ok();
  }

  #[inline]
  fn indent(&mut self) {
    self.indentation = self.indentation.saturating_add(1);
  }
  #[inline]
  fn unindent(&mut self) {
    self.indentation = self.indentation.saturating_sub(1);
  }

  #[inline]
  fn write_resource_dependency(
    &mut self,
    resource: &ResourceKey,
    stamp: &ResourceStamp,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    match inconsistency {
      Ok(Some(new_stamp)) => self.writeln(format_args!("☒ {} [{:?} ≠ {:?}]", resource, stamp, new_stamp)),
      Ok(None) => self.writeln(format_args!("☑ {} [{:?}]", resource, stamp)),
      Err(e) => self.writeln(format_args!("☒ {} [error: {}]", resource, e))
    }
  }
  #[inline]
  fn write_resource_dependency_in_task_context(
    &mut self,
    task: &TaskKey,
    stamp: &ResourceStamp,
    inconsistency: Result<Option<&ResourceStamp>, &Error>,
  ) {
    match inconsistency {
      Ok(Some(new_stamp)) => self.writeln(format_args!("☒ {} [{:?} ≠ {:?}]", task, stamp, new_stamp)),
      Ok(None) => self.writeln(format_args!("☑ {} [{:?}]", task, stamp)),
      Err(e) => self.writeln(format_args!("☒ {} [error: {}]", task, e))
    }
  }
  #[inline]
  fn write_task_dependency(&mut self, subject: &TaskKey, dep: &TaskRequireDep, inconsistency: Option<&OutputStamp>) {
    if let Some(new_stamp) = inconsistency {
      self.writeln(format_args!("☒ {} [{:?} ≠ {:?}]", subject, dep.stamp, new_stamp));
    } else {
      self.writeln(format_args!("☑ {} [{:?}]", subject, dep.stamp));
    }
  }
}


#[cfg(test)]
mod test {
  use crate::dependency::Observability;
  use crate::task::TaskDefs;

  use super::*;

  struct Noop;
  impl crate::task::TaskDef for Noop {
    fn id(&self) -> &str { "noop" }
    fn execute(&self, _context: &mut dyn crate::context::ExecContext, _input: &Value) -> crate::error::Result<Value> {
      Ok(Value::Unit)
    }
  }

  #[test]
  fn test_indentation() {
    let mut defs = TaskDefs::new();
    let def = defs.add(Noop);
    let task = Task::new(def, 1);
    let key = task.key();
    let data = TaskData {
      input: Value::from(1),
      output: Value::from("done"),
      observability: Observability::ExplicitObserved,
      task_requires: Vec::new(),
      resource_requires: Vec::new(),
      resource_provides: Vec::new(),
    };

    let mut tracker = WritingTracker::new(Vec::new());
    tracker.require_top_down_initial_start(&key, &task);
    tracker.execute_start(&key, &task, &ExecReason::NoData);
    tracker.execute_end_success(&key, &task, &data);
    tracker.require_top_down_initial_end(&key, &task, Some(&data.output));

    let written = String::from_utf8(tracker.into_writer()).unwrap();
    assert_eq!(written, "Top-down build start: noop(1)\n → noop(1) (no stored data)\n ← \"done\"\nTop-down build end: \"done\"\n");
  }
}
