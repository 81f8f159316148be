use std::time::{Duration, Instant};

use crate::dependency::{ResourceProvideDep, ResourceRequireDep, TaskRequireDep};
use crate::error::Error;
use crate::reason::ExecReason;
use crate::task::{Task, TaskKey};
use crate::tracker::Tracker;

/// A [`Tracker`] that counts build events into a [`Report`].
#[derive(Clone, Debug)]
pub struct MetricsTracker {
  report: Report,
  clear_on_build_start: bool,
  last_build_start: Option<Instant>,
}

impl Default for MetricsTracker {
  fn default() -> Self {
    Self {
      report: Report::default(),
      clear_on_build_start: true,
      last_build_start: None,
    }
  }
}

impl MetricsTracker {
  #[inline]
  pub fn report(&self) -> &Report { &self.report }
}

#[derive(Default, Clone, Debug)]
pub struct Report {
  pub total_required_resources: u32,
  pub total_provided_resources: u32,
  pub total_required_tasks: u32,

  pub total_executed_tasks: u32,
  pub total_failed_tasks: u32,
  pub total_up_to_date_tasks: u32,
  pub total_scheduled_tasks: u32,
  pub total_deferred_tasks: u32,

  pub build_duration: Duration,
}

impl Report {
  fn clear(&mut self) {
    *self = Self::default();
  }
}

impl Tracker for MetricsTracker {
  #[inline]
  fn build_start(&mut self) {
    if self.clear_on_build_start {
      self.report.clear();
    }
    self.last_build_start = Some(Instant::now());
  }
  #[inline]
  fn build_end(&mut self) {
    if let Some(start) = &self.last_build_start {
      self.report.build_duration = start.elapsed();
    }
  }

  #[inline]
  fn execute_start(&mut self, _key: &TaskKey, _task: &Task, _reason: &ExecReason) {
    self.report.total_executed_tasks += 1;
  }
  #[inline]
  fn execute_end_failed(&mut self, _key: &TaskKey, _task: &Task, _error: &Error) {
    self.report.total_failed_tasks += 1;
  }
  #[inline]
  fn up_to_date(&mut self, _key: &TaskKey, _task: &Task) {
    self.report.total_up_to_date_tasks += 1;
  }

  #[inline]
  fn required_task(&mut self, _caller: &TaskKey, _dep: &TaskRequireDep) {
    self.report.total_required_tasks += 1;
  }
  #[inline]
  fn required_resource(&mut self, _requirer: &TaskKey, _dep: &ResourceRequireDep) {
    self.report.total_required_resources += 1;
  }
  #[inline]
  fn provided_resource(&mut self, _provider: &TaskKey, _dep: &ResourceProvideDep) {
    self.report.total_provided_resources += 1;
  }

  #[inline]
  fn schedule_task(&mut self, _key: &TaskKey) {
    self.report.total_scheduled_tasks += 1;
  }
  #[inline]
  fn defer_task(&mut self, _key: &TaskKey) {
    self.report.total_deferred_tasks += 1;
  }
}
