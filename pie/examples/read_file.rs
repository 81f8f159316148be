use std::error::Error;
use std::fs::write;
use std::path::Path;
use std::sync::Arc;

use dev_shared::fs::{create_temp_dir, write_until_modified};
use pie::{ExecContext, PieBuilder, ResourceKey, Task, TaskDef, Value};
use pie::tracker::writing::WritingTracker;

/// Task that reads the file at its input path, returning its contents as a string.
struct ReadFile;

impl TaskDef for ReadFile {
  fn id(&self) -> &str { "read_file" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> pie::Result<Value> {
    let path = input.as_path().ok_or_else(|| pie::Error::failed("expected a path"))?;
    let contents = context.read(&ResourceKey::new(path))?.unwrap_or_default();
    Ok(String::from_utf8_lossy(&contents).into_owned().into())
  }
}

fn read_file(path: &Path) -> Task { Task::new(Arc::new(ReadFile), path) }

fn main() -> Result<(), Box<dyn Error>> {
  let temp_dir = create_temp_dir()?;
  let hello_file_path = temp_dir.path().join("hello.txt");
  write(&hello_file_path, "Hello, World!")?;

  let mut pie = PieBuilder::new()
    .with_task_def(ReadFile)
    .with_tracker(WritingTracker::new_stdout_writer())
    .build();

  let task = read_file(&hello_file_path);

  // Task is executed because it is new.
  let output = pie.new_session().require(&task)?;
  println!("A: {output}");

  // Task is not executed, because the file has not changed.
  let output = pie.new_session().require(&task)?;
  println!("B: {output}");

  // Task is executed because the modified time of the file has changed (even though the file contents have not).
  write_until_modified(&hello_file_path, "Hello, World!")?;
  let output = pie.new_session().require(&task)?;
  println!("C: {output}");

  Ok(())
}
