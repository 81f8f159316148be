use std::io::Stdout;
use std::ops::{Deref, DerefMut};

use rstest::fixture;
use tempfile::TempDir;

use ::pie::{Pie, PieBuilder, ResourceKey, Result, Task, Value};
use ::pie::layer::validation::ValidationOptions;
use ::pie::resource::memory::MemoryResourceService;
use ::pie::tracker::CompositeTracker;
use ::pie::tracker::event::EventTracker;
use ::pie::tracker::writing::WritingTracker;

use crate::task::common_task_defs;

/// Tracker of test PIE instances: event tracking for assertions and stdout writing for debugging.
pub type TestTracker = CompositeTracker<EventTracker, WritingTracker<Stdout>>;

/// PIE with all common task definitions, in-memory resources, and all validation checks enabled.
pub struct TestPie {
  pie: Pie<TestTracker>,
  resources: MemoryResourceService,
}

impl TestPie {
  /// Gets a handle to the in-memory resources of this PIE instance.
  #[inline]
  pub fn resources(&self) -> &MemoryResourceService { &self.resources }
  /// Gets the events of the last build.
  #[inline]
  pub fn events(&self) -> &EventTracker { &self.pie.tracker().0 }

  /// Requires `task` in a new session.
  #[inline]
  pub fn require(&mut self, task: &Task) -> Result<Value> {
    self.pie.new_session().require(task)
  }
  /// Requires `task` in a new session, then calls `test_assert_func` with the events of that build.
  pub fn require_then_assert(&mut self, task: &Task, test_assert_func: impl FnOnce(&EventTracker)) -> Result<Value> {
    let output = self.require(task)?;
    test_assert_func(self.events());
    Ok(output)
  }
  /// Requires `task` in a new session, asserting that no task was executed.
  pub fn require_then_assert_no_execute(&mut self, task: &Task) -> Result<Value> {
    self.require_then_assert(task, |events| assert!(!events.any_execute(), "expected no executions: {:?}", events.executed()))
  }
  /// Requires `task` in a new session, asserting that only `task` was executed, once.
  pub fn require_then_assert_one_execute(&mut self, task: &Task) -> Result<Value> {
    let key = task.key();
    self.require_then_assert(task, |events| {
      assert_eq!(events.executed(), vec![&key], "expected one execution");
    })
  }

  /// Updates tasks affected by `changed` in a new session, then calls `test_assert_func` with the events of that build.
  pub fn update_affected_by_then_assert(
    &mut self,
    changed: &[ResourceKey],
    test_assert_func: impl FnOnce(&EventTracker),
  ) -> Result<()> {
    self.pie.new_session().update_affected_by(changed)?;
    test_assert_func(self.events());
    Ok(())
  }
}

impl Deref for TestPie {
  type Target = Pie<TestTracker>;
  #[inline]
  fn deref(&self) -> &Self::Target { &self.pie }
}
impl DerefMut for TestPie {
  #[inline]
  fn deref_mut(&mut self) -> &mut Self::Target { &mut self.pie }
}

pub fn create_test_pie() -> TestPie {
  init_logging();
  let resources = MemoryResourceService::new();
  let pie = test_pie_builder()
    .with_resources(resources.clone())
    .build();
  TestPie { pie, resources }
}

/// Creates a builder with all common task definitions, the file system as resource service, all validation checks,
/// and the test tracker.
pub fn test_pie_builder() -> PieBuilder<TestTracker> {
  let tracker = CompositeTracker(EventTracker::default(), WritingTracker::new_stdout_writer());
  PieBuilder::new()
    .with_task_defs(common_task_defs())
    .with_validation(ValidationOptions::all())
    .with_tracker(tracker)
}

/// Initializes logging for tests, configured through the `RUST_LOG` environment variable.
pub fn init_logging() {
  // Fails when logging was already initialized by another test.
  let _ = pretty_env_logger::try_init();
}

// Fixtures

#[fixture]
#[inline]
pub fn pie() -> TestPie {
  create_test_pie()
}

#[fixture]
#[inline]
pub fn temp_dir() -> TempDir {
  crate::fs::create_temp_dir().expect("failed to create temporary directory")
}
