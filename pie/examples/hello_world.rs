use std::sync::Arc;

use pie::{ExecContext, Pie, PieBuilder, Result, Task, TaskDef, Value};

struct HelloWorld;

impl TaskDef for HelloWorld {
  fn id(&self) -> &str { "hello_world" }
  fn execute(&self, _context: &mut dyn ExecContext, _input: &Value) -> Result<Value> {
    Ok("Hello, World!".into())
  }
}

fn main() -> Result<()> {
  let mut pie: Pie = PieBuilder::new().with_task_def(HelloWorld).build();
  let output = pie.new_session().require(&Task::new(Arc::new(HelloWorld), ()))?;
  println!("{}", output);
  Ok(())
}
