use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::pie::{Error, ExecContext, ResourceKey, ResourceStamper, Result, Supplier, Task, TaskDef, TaskDefs, Value};

// Read string from file

/// Reads the file at the input path into a string, which is empty when the file does not exist.
pub struct ReadString;

impl TaskDef for ReadString {
  fn id(&self) -> &str { "read" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let key = ResourceKey::new(path_input(input)?);
    let contents = context.read(&key)?.unwrap_or_default();
    Ok(String::from_utf8_lossy(&contents).into_owned().into())
  }
}

/// [`ReadString`] that stamps the file by hashing its contents.
pub struct ReadStringHashed;

impl TaskDef for ReadStringHashed {
  fn id(&self) -> &str { "read_hashed" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let key = ResourceKey::new(path_input(input)?);
    context.require_resource_with_stamper(&key, ResourceStamper::Hash)?;
    let contents = context.resources().read(&key)?.unwrap_or_default();
    Ok(String::from_utf8_lossy(&contents).into_owned().into())
  }
}

// Sum and double of integers in a file

/// Sums the whitespace-separated integers in the file at the input path.
pub struct Sum;

impl TaskDef for Sum {
  fn id(&self) -> &str { "sum" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let key = ResourceKey::new(path_input(input)?);
    let contents = context.read(&key)?.unwrap_or_default();
    let mut sum = 0i64;
    for word in String::from_utf8_lossy(&contents).split_whitespace() {
      sum += word.parse::<i64>().map_err(Error::failed)?;
    }
    Ok(sum.into())
  }
}

/// Doubles the output of [`Sum`] for the input path.
pub struct Double;

impl TaskDef for Double {
  fn id(&self) -> &str { "double" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let sum = context.require_task(&sum(path_input(input)?))?;
    let sum = sum.as_int().ok_or_else(|| Error::failed("sum did not return an integer"))?;
    Ok((2 * sum).into())
  }
}

// Write string to file

/// Writes a constant string to a file and provides it. Input: `[path, string]`.
pub struct WriteString;

impl TaskDef for WriteString {
  fn id(&self) -> &str { "write" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let [path, string] = list_input(input)? else { return Err(malformed(input)) };
    let path = path.as_path().ok_or_else(|| malformed(input))?;
    let string = string.as_str().ok_or_else(|| malformed(input))?;
    context.write(&ResourceKey::new(path), string.as_bytes())?;
    Ok(Value::Unit)
  }
}

/// Gets a string from a supplier, writes it to a file, and provides that file. Input: `[supplier, path]`.
pub struct WriteTaskOutput;

impl TaskDef for WriteTaskOutput {
  fn id(&self) -> &str { "write_output" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let [supplier, path] = list_input(input)? else { return Err(malformed(input)) };
    let path = path.as_path().ok_or_else(|| malformed(input))?;
    let output = get_supplied(context, supplier)?;
    let string = output.as_str().ok_or_else(|| Error::failed("supplier did not return a string"))?;
    context.write(&ResourceKey::new(path), string.as_bytes())?;
    Ok(Value::Unit)
  }
}

// List directory

/// Lists the names of the children of the directory at the input path, one per line.
pub struct ListDirectory;

impl TaskDef for ListDirectory {
  fn id(&self) -> &str { "list" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let key = ResourceKey::new(path_input(input)?);
    context.require_resource(&key)?;
    let mut names: Vec<_> = context.resources().list(&key)?
      .iter()
      .filter_map(|child| child.name().map(str::to_string))
      .collect();
    names.sort();
    Ok(names.join("\n").into())
  }
}

// String transformations

/// Returns the input.
pub struct Constant;

impl TaskDef for Constant {
  fn id(&self) -> &str { "constant" }
  fn execute(&self, _context: &mut dyn ExecContext, input: &Value) -> Result<Value> { Ok(input.clone()) }
}

/// Lowercases the string supplied by the input.
pub struct ToLowerCase;

impl TaskDef for ToLowerCase {
  fn id(&self) -> &str { "lower" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let output = get_supplied(context, input)?;
    let string = output.as_str().ok_or_else(|| Error::failed("supplier did not return a string"))?;
    Ok(string.to_lowercase().into())
  }
}

/// Gets every supplier in the input list, returning their values.
pub struct Sequence;

impl TaskDef for Sequence {
  fn id(&self) -> &str { "sequence" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let mut outputs = Vec::new();
    for supplier in list_input(input)? {
      outputs.push(get_supplied(context, supplier)?);
    }
    Ok(outputs.into())
  }
}

// Misbehaving tasks

/// Requires `cyclic((n + 1) % len)` for input `[n, len]`, which creates a cycle of `len` tasks.
pub struct Cyclic;

impl TaskDef for Cyclic {
  fn id(&self) -> &str { "cyclic" }
  fn execute(&self, context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    let [n, len] = list_input(input)? else { return Err(malformed(input)) };
    let (Some(n), Some(len)) = (n.as_int(), len.as_int()) else { return Err(malformed(input)) };
    context.require_task(&cyclic((n + 1) % len, len))
  }
}

/// Fails with the input as message.
pub struct Fail;

impl TaskDef for Fail {
  fn id(&self) -> &str { "fail" }
  fn execute(&self, _context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
    Err(Error::failed(input.to_string()))
  }
}


/// Creates a registry with all common task definitions.
pub fn common_task_defs() -> TaskDefs {
  let mut defs = TaskDefs::new();
  defs.add(ReadString);
  defs.add(ReadStringHashed);
  defs.add(Sum);
  defs.add(Double);
  defs.add(WriteString);
  defs.add(WriteTaskOutput);
  defs.add(ListDirectory);
  defs.add(Constant);
  defs.add(ToLowerCase);
  defs.add(Sequence);
  defs.add(Cyclic);
  defs.add(Fail);
  defs
}

pub fn read(path: impl AsRef<Path>) -> Task { Task::new(Arc::new(ReadString), path.as_ref()) }
pub fn read_hashed(path: impl AsRef<Path>) -> Task { Task::new(Arc::new(ReadStringHashed), path.as_ref()) }
pub fn sum(path: impl AsRef<Path>) -> Task { Task::new(Arc::new(Sum), path.as_ref()) }
pub fn double(path: impl AsRef<Path>) -> Task { Task::new(Arc::new(Double), path.as_ref()) }
pub fn write(path: impl AsRef<Path>, string: impl Into<String>) -> Task {
  Task::new(Arc::new(WriteString), vec![path.as_ref().into(), Value::String(string.into())])
}
pub fn write_output(task: &Task, path: impl AsRef<Path>) -> Task {
  Task::new(Arc::new(WriteTaskOutput), vec![supply(task), path.as_ref().into()])
}
pub fn list(path: impl AsRef<Path>) -> Task { Task::new(Arc::new(ListDirectory), path.as_ref()) }
pub fn constant(value: impl Into<Value>) -> Task { Task::new(Arc::new(Constant), value) }
pub fn lower(task: &Task) -> Task { Task::new(Arc::new(ToLowerCase), supply(task)) }
pub fn sequence(tasks: &[Task]) -> Task {
  Task::new(Arc::new(Sequence), tasks.iter().map(supply).collect::<Vec<_>>())
}
pub fn cyclic(n: i64, len: i64) -> Task { Task::new(Arc::new(Cyclic), vec![Value::from(n), Value::from(len)]) }
pub fn fail(message: &str) -> Task { Task::new(Arc::new(Fail), message) }


/// Supplies the output of `task`.
pub fn supply(task: &Task) -> Value { Supplier::task(task).into() }

/// Gets the value of the supplier in `input`.
pub fn get_supplied(context: &mut dyn ExecContext, input: &Value) -> Result<Value> {
  input.as_supplier().ok_or_else(|| malformed(input))?.get(context)
}

fn path_input(input: &Value) -> Result<PathBuf> {
  input.as_path().map(Path::to_path_buf).ok_or_else(|| malformed(input))
}

fn list_input(input: &Value) -> Result<&[Value]> {
  input.as_list().ok_or_else(|| malformed(input))
}

fn malformed(input: &Value) -> Error {
  Error::failed(format!("malformed input {}", input))
}
