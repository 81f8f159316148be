use log::Level;

use crate::dependency::{Observability, TaskData};
use crate::error::Error;
use crate::reason::ExecReason;
use crate::resource::ResourceKey;
use crate::task::{Tags, Task, TaskKey};
use crate::tracker::Tracker;
use crate::value::Value;

/// A [`Tracker`] that forwards the coarse build events to the [`log`] facade: builds and executions at
/// [`Level::Debug`], failures at [`Level::Warn`], and scheduling at [`Level::Trace`].
#[derive(Default, Copy, Clone, Debug)]
pub struct LoggingTracker {
  max_desc_len: Option<usize>,
}

impl LoggingTracker {
  /// Creates a tracker that truncates task descriptions to `max_desc_len` characters.
  #[inline]
  pub fn with_max_desc_len(max_desc_len: usize) -> Self { Self { max_desc_len: Some(max_desc_len) } }

  #[inline]
  fn desc(&self, key: &TaskKey, task: &Task) -> String {
    match self.max_desc_len {
      Some(max_len) => task.desc(max_len),
      None => key.to_string(),
    }
  }
}

impl Tracker for LoggingTracker {
  #[inline]
  fn require_top_down_initial_start(&mut self, key: &TaskKey, task: &Task) {
    log::debug!("top-down build of {} started", self.desc(key, task));
  }
  #[inline]
  fn require_top_down_initial_end(&mut self, key: &TaskKey, task: &Task, output: Option<&Value>) {
    match output {
      Some(_) => log::debug!("top-down build of {} completed", self.desc(key, task)),
      None => log::debug!("top-down build of {} failed", self.desc(key, task)),
    }
  }
  #[inline]
  fn require_bottom_up_initial_start(&mut self, changed: &[ResourceKey], tags: &Tags) {
    log::debug!("bottom-up build of {} changed resource(s) started, {} tag(s)", changed.len(), tags.len());
  }
  #[inline]
  fn require_bottom_up_initial_end(&mut self) {
    log::debug!("bottom-up build completed");
  }

  #[inline]
  fn execute_start(&mut self, key: &TaskKey, task: &Task, reason: &ExecReason) {
    log::debug!("executing {}: {}", self.desc(key, task), reason);
  }
  #[inline]
  fn execute_end_success(&mut self, key: &TaskKey, task: &Task, _data: &TaskData) {
    log::trace!("executed {}", self.desc(key, task));
  }
  #[inline]
  fn execute_end_failed(&mut self, key: &TaskKey, task: &Task, error: &Error) {
    log::warn!("executing {} failed: {}", self.desc(key, task), error);
  }
  #[inline]
  fn execute_end_interrupted(&mut self, key: &TaskKey, task: &Task) {
    log::info!("executing {} was cancelled", self.desc(key, task));
  }

  #[inline]
  fn schedule_task(&mut self, key: &TaskKey) {
    log::trace!("scheduled {}", key);
  }
  #[inline]
  fn defer_task(&mut self, key: &TaskKey) {
    log::trace!("deferred {}", key);
  }

  #[inline]
  fn set_task_observability(&mut self, key: &TaskKey, previous: Observability, observability: Observability) {
    if log::log_enabled!(Level::Trace) {
      log::trace!("observability of {} changed from {:?} to {:?}", key, previous, observability);
    }
  }
}
