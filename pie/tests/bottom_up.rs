use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_matches::assert_matches;
use rstest::rstest;
use testresult::TestResult;

use ::pie::{CancelToken, Error, ExecContext, ExecReason, ResourceKey, ResourceService, ResourceStamper, Result, Tags, Task, TaskDef, TaskKey, Value};
use ::pie::tracker::event::Event;
use dev_shared::task::*;
use dev_shared::test::{pie, test_pie_builder, TestPie};

fn output_of(pie: &mut TestPie, task: &Task) -> Option<Value> {
  pie.new_session().store().output(&task.key())
}

fn deferred(pie: &mut TestPie) -> Vec<TaskKey> {
  pie.new_session().store().deferred_tasks()
}

#[rstest]
fn test_update_affected_by(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "3")?;
  let sum = sum("a.txt");
  let double = double("a.txt");
  assert_eq!(pie.require(&double)?.as_int(), Some(6));

  pie.resources().write_file("a.txt", "5")?;
  let changed = [ResourceKey::new("a.txt")];
  pie.update_affected_by_then_assert(&changed, |events| {
    assert_eq!(events.executed(), vec![&sum.key(), &double.key()]);
    assert_matches!(events.first_execute_reason(&sum.key()), Some(ExecReason::Affected));
    assert!(events.any_schedule_of(&double.key()));
  })?;
  assert_eq!(output_of(&mut pie, &double), Some(Value::from(10)));

  // Nothing changed since the last build.
  pie.update_affected_by_then_assert(&changed, |events| assert!(!events.any_execute()))?;
  pie.require_then_assert_no_execute(&double)?;
  Ok(())
}

#[rstest]
fn test_unchanged_output_stops_propagation(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "5")?;
  let sum = sum("a.txt");
  let double = double("a.txt");
  pie.require(&double)?;

  pie.resources().write_file("a.txt", "2 3")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("a.txt")], |events| {
    assert_eq!(events.executed(), vec![&sum.key()]);
    assert!(!events.any_schedule_of(&double.key()));
  })?;
  Ok(())
}

#[rstest]
fn test_unrelated_change(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "1")?;
  pie.resources().write_file("b.txt", "2")?;
  pie.require(&double("a.txt"))?;
  pie.resources().write_file("b.txt", "3")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("b.txt")], |events| assert!(!events.any_execute()))?;
  Ok(())
}

#[rstest]
fn test_unobserved_tasks_are_not_updated(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "1")?;
  let double = double("a.txt");
  pie.new_session().require_without_observing(&double)?;

  pie.resources().write_file("a.txt", "2")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("a.txt")], |events| assert!(!events.any_execute()))?;
  assert_eq!(output_of(&mut pie, &double), Some(Value::from(2)));
  Ok(())
}

#[rstest]
fn test_task_affected_twice_executes_once(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "a")?;
  pie.resources().write_file("b.txt", "b")?;
  let sequence = sequence(&[read("a.txt"), read("b.txt")]);
  pie.require(&sequence)?;

  pie.resources().write_file("a.txt", "A")?;
  pie.resources().write_file("b.txt", "B")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("a.txt"), ResourceKey::new("b.txt")], |events| {
    assert!(events.one_execute_of(&sequence.key()));
    assert_eq!(events.executed().len(), 3);
    assert_eq!(events.executed().last(), Some(&&sequence.key()));
  })?;
  assert_eq!(output_of(&mut pie, &sequence), Some(Value::from(vec![Value::from("A"), Value::from("B")])));
  Ok(())
}

#[rstest]
fn test_overwritten_provided_file(mut pie: TestPie) -> TestResult {
  let key = ResourceKey::new("out.txt");
  let write = write("out.txt", "Hello");
  pie.require(&write)?;

  pie.resources().write_file("out.txt", "Overwritten")?;
  pie.update_affected_by_then_assert(&[key.clone()], |events| {
    assert_eq!(events.executed(), vec![&write.key()]);
  })?;
  assert_eq!(pie.resources().read(&key)?, Some(b"Hello".to_vec()));
  Ok(())
}

/// Gets the supplier in the first element of its `[supplier, path]` input, then reads the file at `path`
/// which the supplying task provides.
struct ReadProvided;

impl TaskDef for ReadProvided {
  fn id(&self) -> &str { "read_provided" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let list = input.as_list().ok_or_else(|| Error::failed("expected a list"))?;
    get_supplied(context, &list[0])?;
    let path = list[1].as_path().ok_or_else(|| Error::failed("expected a path"))?;
    let contents = context.read(&ResourceKey::new(path))?.unwrap_or_default();
    Ok(String::from_utf8_lossy(&contents).into_owned().into())
  }
}

fn read_provided(provider: &Task, path: impl AsRef<Path>) -> Task {
  Task::new(Arc::new(ReadProvided), vec![supply(provider), path.as_ref().into()])
}

#[rstest]
fn test_provided_file_affects_requirers(mut pie: TestPie) -> TestResult {
  pie.add_task_def(ReadProvided);
  pie.resources().write_file("in.txt", "Hello")?;
  let read = read("in.txt");
  let writer = write_output(&read, "out.txt");
  let reader = read_provided(&writer, "out.txt");
  assert_eq!(pie.require(&reader)?.as_str(), Some("Hello"));

  pie.resources().write_file("in.txt", "World")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("in.txt")], |events| {
    assert_eq!(events.executed(), vec![&read.key(), &writer.key(), &reader.key()]);
  })?;
  assert_eq!(output_of(&mut pie, &reader), Some(Value::from("World")));
  Ok(())
}

/// Returns the output of `read(b)` when the file at `switch` contains `b`, and of `read(a)` otherwise. Input:
/// `[switch, a, b]`.
struct Choose;

impl TaskDef for Choose {
  fn id(&self) -> &str { "choose" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let paths: Vec<PathBuf> = input.as_list()
      .map(|list| list.iter().filter_map(|v| v.as_path().map(Path::to_path_buf)).collect())
      .unwrap_or_default();
    let [switch, a, b] = paths.as_slice() else { return Err(Error::failed("expected three paths")) };
    let switch = context.read(&ResourceKey::new(switch))?.unwrap_or_default();
    let path = if switch == b"b" { b } else { a };
    context.require_task(&read(path))
  }
}

fn choose(switch: &str, a: &str, b: &str) -> Task {
  Task::new(Arc::new(Choose), vec![Value::from(Path::new(switch)), Value::from(Path::new(a)), Value::from(Path::new(b))])
}

#[rstest]
fn test_scheduled_task_required_during_build(mut pie: TestPie) -> TestResult {
  pie.add_task_def(Choose);
  pie.resources().write_file("switch.txt", "a")?;
  pie.resources().write_file("a.txt", "a")?;
  pie.resources().write_file("b.txt", "b")?;
  let choose = choose("switch.txt", "a.txt", "b.txt");
  let (read_a, read_b) = (read("a.txt"), read("b.txt"));
  assert_eq!(pie.require(&choose)?.as_str(), Some("a"));
  assert_eq!(pie.require(&read_b)?.as_str(), Some("b"));

  // Both are scheduled; whichever executes first, `read(b)` is executed once, before `choose` uses its output.
  pie.resources().write_file("switch.txt", "b")?;
  pie.resources().write_file("b.txt", "B")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("switch.txt"), ResourceKey::new("b.txt")], |events| {
    assert!(events.one_execute_of(&choose.key()));
    assert!(events.one_execute_of(&read_b.key()));
    assert!(!events.any_execute_of(&read_a.key()));
  })?;
  assert_eq!(output_of(&mut pie, &choose), Some(Value::from("B")));
  let session = pie.new_session();
  assert!(!session.is_observed(&read_a.key()));
  assert!(session.is_explicitly_observed(&read_b.key()));
  Ok(())
}

/// Reads the file at the input path, hashing its contents. Only executes in bottom-up builds tagged with `run`.
struct RunTagged;

impl TaskDef for RunTagged {
  fn id(&self) -> &str { "run_tagged" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let key = ResourceKey::new(input.as_path().ok_or_else(|| Error::failed("expected a path"))?);
    context.require_resource_with_stamper(&key, ResourceStamper::Hash)?;
    let contents = context.resources().read(&key)?.unwrap_or_default();
    Ok(String::from_utf8_lossy(&contents).into_owned().into())
  }
  fn should_exec_when_affected(&self, _input: &Value, tags: &Tags) -> bool { tags.contains("run") }
}

fn run_tagged(path: &str) -> Task { Task::new(Arc::new(RunTagged), Path::new(path)) }

fn run_tags() -> Tags { Tags::from(["run".to_string()]) }

#[rstest]
fn test_deferred_task_executes_with_tags(mut pie: TestPie) -> TestResult {
  pie.add_task_def(RunTagged);
  pie.resources().write_file("a.txt", "a")?;
  let task = run_tagged("a.txt");
  pie.require(&task)?;

  pie.resources().write_file("a.txt", "b")?;
  pie.update_affected_by_then_assert(&[ResourceKey::new("a.txt")], |events| {
    assert!(events.any_defer_of(&task.key()));
    assert!(!events.any_execute());
  })?;
  assert_eq!(deferred(&mut pie), vec![task.key()]);

  // Deferred tasks are checked again in every bottom-up build, even without changes.
  pie.new_session().update_affected_by(&[])?;
  assert!(!pie.events().any_execute());
  pie.new_session().update_affected_by_with_tags(&[], &run_tags())?;
  assert!(pie.events().one_execute_of(&task.key()));
  assert_eq!(output_of(&mut pie, &task), Some(Value::from("b")));
  assert!(deferred(&mut pie).is_empty());
  Ok(())
}

#[rstest]
fn test_deferred_task_consistent_again_is_undeferred(mut pie: TestPie) -> TestResult {
  pie.add_task_def(RunTagged);
  pie.resources().write_file("a.txt", "a")?;
  let task = run_tagged("a.txt");
  pie.require(&task)?;

  pie.resources().write_file("a.txt", "b")?;
  pie.new_session().update_affected_by(&[ResourceKey::new("a.txt")])?;
  assert_eq!(deferred(&mut pie), vec![task.key()]);

  pie.resources().write_file("a.txt", "a")?;
  pie.new_session().update_affected_by_with_tags(&[], &run_tags())?;
  let events = pie.events();
  assert!(!events.any_execute());
  assert!(events.any(|e| matches!(e, Event::UndeferTask(k) if k == &task.key())));
  assert!(deferred(&mut pie).is_empty());
  Ok(())
}

#[rstest]
fn test_top_down_require_undefers(mut pie: TestPie) -> TestResult {
  pie.add_task_def(RunTagged);
  pie.resources().write_file("a.txt", "a")?;
  let task = run_tagged("a.txt");
  pie.require(&task)?;

  pie.resources().write_file("a.txt", "b")?;
  pie.new_session().update_affected_by(&[ResourceKey::new("a.txt")])?;
  assert_eq!(pie.require_then_assert_one_execute(&task)?.as_str(), Some("b"));
  assert!(deferred(&mut pie).is_empty());
  Ok(())
}

#[rstest]
fn test_failed_task_is_deferred(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "1")?;
  let sum = sum("a.txt");
  pie.require(&sum)?;

  pie.resources().write_file("a.txt", "one")?;
  let result = pie.new_session().update_affected_by(&[ResourceKey::new("a.txt")]);
  assert_matches!(result, Err(Error::Execution { key, .. }) if key == sum.key());
  assert!(pie.events().any(|e| e.is_defer_of(&sum.key())));
  assert_eq!(deferred(&mut pie), vec![sum.key()]);

  pie.resources().write_file("a.txt", "4")?;
  pie.update_affected_by_then_assert(&[], |events| assert!(events.one_execute_of(&sum.key())))?;
  assert_eq!(output_of(&mut pie, &sum), Some(Value::from(4)));
  assert!(deferred(&mut pie).is_empty());
  Ok(())
}

#[rstest]
fn test_cancelled_build_defers_scheduled_tasks(mut pie: TestPie) -> TestResult {
  pie.resources().write_file("a.txt", "1")?;
  let sum = sum("a.txt");
  let double = double("a.txt");
  pie.require(&double)?;

  pie.resources().write_file("a.txt", "2")?;
  let cancel = CancelToken::new();
  cancel.cancel();
  let result = pie.new_session().update_affected_by_with_cancel(&[ResourceKey::new("a.txt")], &Tags::default(), &cancel);
  assert_matches!(result, Err(Error::Cancelled));
  assert!(!pie.events().any_execute());
  assert!(pie.events().any(|e| e.is_defer_of(&sum.key())));
  assert_eq!(deferred(&mut pie), vec![sum.key()]);

  pie.update_affected_by_then_assert(&[], |events| {
    assert_eq!(events.executed(), vec![&sum.key(), &double.key()]);
  })?;
  assert_eq!(output_of(&mut pie, &double), Some(Value::from(4)));
  Ok(())
}

#[rstest]
fn test_bottom_up_agrees_with_build_from_scratch(mut pie: TestPie) -> TestResult {
  pie.add_task_def(ReadProvided);
  pie.resources().write_file("a.txt", "1 2")?;
  pie.resources().write_file("in.txt", "Hello")?;
  let double = double("a.txt");
  let reader = read_provided(&write_output(&lower(&read("in.txt")), "out.txt"), "out.txt");
  pie.require(&double)?;
  pie.require(&reader)?;

  pie.resources().write_file("a.txt", "3 4")?;
  pie.resources().write_file("in.txt", "World")?;
  pie.new_session().update_affected_by(&[ResourceKey::new("a.txt"), ResourceKey::new("in.txt")])?;

  let mut from_scratch = test_pie_builder()
    .with_resources(pie.resources().clone())
    .with_task_def(ReadProvided)
    .build();
  let mut session = from_scratch.new_session();
  assert_eq!(output_of(&mut pie, &double), Some(session.require(&double)?));
  assert_eq!(output_of(&mut pie, &reader), Some(session.require(&reader)?));
  Ok(())
}
