use std::sync::Arc;

use rstest::rstest;
use testresult::TestResult;

use ::pie::{Error, ExecContext, Observability, ResourceKey, Result, Task, TaskDef, Value};
use dev_shared::task::*;
use dev_shared::test::{pie, TestPie};

fn observability_of(pie: &mut TestPie, task: &Task) -> Observability {
  pie.new_session().store().observability(&task.key())
}

#[rstest]
fn test_require_observes(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.require_then_assert(&lower, |events| {
    let changes = events.observability_changes_of(&lower.key());
    assert_eq!(changes.last().map(|c| c.observability), Some(Observability::ExplicitObserved));
  })?;
  assert_eq!(observability_of(&mut pie, &lower), Observability::ExplicitObserved);
  assert_eq!(observability_of(&mut pie, &constant), Observability::ImplicitObserved);
  Ok(())
}

#[rstest]
fn test_require_without_observing_then_require(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.new_session().require_without_observing(&lower)?;
  assert_eq!(observability_of(&mut pie, &lower), Observability::Unobserved);
  assert_eq!(observability_of(&mut pie, &constant), Observability::Unobserved);

  // Up-to-date tasks become observed as well.
  pie.require_then_assert_no_execute(&lower)?;
  assert_eq!(observability_of(&mut pie, &lower), Observability::ExplicitObserved);
  assert_eq!(observability_of(&mut pie, &constant), Observability::ImplicitObserved);
  Ok(())
}

#[rstest]
fn test_unobserve(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.require(&lower)?;

  let mut session = pie.new_session();
  session.unobserve(&lower.key());
  assert!(!session.is_observed(&lower.key()));
  assert!(!session.is_observed(&constant.key()));
  Ok(())
}

#[rstest]
fn test_unobserve_keeps_tasks_required_by_observed_tasks(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  let sequence = sequence(&[constant.clone()]);
  pie.require(&lower)?;
  pie.require(&sequence)?;

  pie.new_session().unobserve(&lower.key());
  assert_eq!(observability_of(&mut pie, &lower), Observability::Unobserved);
  assert_eq!(observability_of(&mut pie, &constant), Observability::ImplicitObserved);
  Ok(())
}

#[rstest]
fn test_unobserve_keeps_explicitly_observed_tasks(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.require(&constant)?;
  pie.require(&lower)?;
  assert_eq!(observability_of(&mut pie, &constant), Observability::ExplicitObserved);

  pie.new_session().unobserve(&lower.key());
  assert_eq!(observability_of(&mut pie, &constant), Observability::ExplicitObserved);

  // Explicitly unobserving a task that an observed task requires leaves it implicitly observed.
  pie.require(&lower)?;
  pie.new_session().unobserve(&constant.key());
  assert_eq!(observability_of(&mut pie, &constant), Observability::ImplicitObserved);
  Ok(())
}

#[rstest]
fn test_set_implicit_to_explicitly_observed(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.require(&lower)?;

  let mut session = pie.new_session();
  assert!(!session.is_explicitly_observed(&constant.key()));
  assert!(session.set_implicit_to_explicitly_observed(&constant.key()));
  assert!(session.is_explicitly_observed(&constant.key()));
  assert!(!session.set_implicit_to_explicitly_observed(&dev_shared::task::constant("Unknown").key()));
  Ok(())
}

/// Requires `constant(s)` where `s` is the contents of the file at the input path.
struct ConstantFromFile;

impl TaskDef for ConstantFromFile {
  fn id(&self) -> &str { "constant_from_file" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let path = input.as_path().ok_or_else(|| Error::failed("expected a path"))?;
    let contents = context.read(&ResourceKey::new(path))?.unwrap_or_default();
    context.require_task(&constant(String::from_utf8_lossy(&contents).into_owned()))
  }
}

fn constant_from_file(path: &str) -> Task { Task::new(Arc::new(ConstantFromFile), std::path::Path::new(path)) }

#[rstest]
fn test_no_longer_required_tasks_are_unobserved(mut pie: TestPie) -> TestResult {
  pie.add_task_def(ConstantFromFile);
  pie.resources().write_file("in.txt", "a")?;
  let task = constant_from_file("in.txt");
  pie.require(&task)?;
  assert_eq!(observability_of(&mut pie, &constant("a")), Observability::ImplicitObserved);

  pie.resources().write_file("in.txt", "b")?;
  pie.require(&task)?;
  assert_eq!(observability_of(&mut pie, &constant("a")), Observability::Unobserved);
  assert_eq!(observability_of(&mut pie, &constant("b")), Observability::ImplicitObserved);

  let deleted = pie.new_session().delete_unobserved_tasks(|_, _| true);
  assert_eq!(deleted, vec![constant("a").key()]);
  Ok(())
}

#[rstest]
fn test_delete_unobserved_tasks(mut pie: TestPie) -> TestResult {
  let constant = constant("Hello");
  let lower = lower(&constant);
  pie.require(&lower)?;

  let mut session = pie.new_session();
  assert!(session.delete_unobserved_tasks(|_, _| true).is_empty());
  session.unobserve(&lower.key());
  assert!(session.delete_unobserved_tasks(|key, _| key != &lower.key()).is_empty());
  assert_eq!(session.delete_unobserved_tasks(|_, _| true), vec![lower.key(), constant.key()]);
  assert!(!session.has_been_executed(&lower.key()));
  assert!(!session.has_been_executed(&constant.key()));
  drop(session);

  pie.require_then_assert(&lower, |events| assert_eq!(events.executed().len(), 2))?;
  Ok(())
}

#[rstest]
fn test_bottom_up_keeps_observability(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "1")?;
  let sum = sum("a.txt");
  let double = double("a.txt");
  pie.require(&double)?;

  pie.resources().write_file("a.txt", "2")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("a.txt")], |events| {
    assert!(events.observability_changes_of(&double.key()).is_empty());
    assert!(events.observability_changes_of(&sum.key()).is_empty());
  })?;
  assert_eq!(observability_of(&mut pie, &double), Observability::ExplicitObserved);
  assert_eq!(observability_of(&mut pie, &sum), Observability::ImplicitObserved);
  Ok(())
}
