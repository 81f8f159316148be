use std::io;

use crate::resource::ResourceKey;
use crate::task::TaskKey;
use crate::value::Value;

/// Boxed error type produced by task bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a build.
///
/// Engine errors raised inside a nested require (cycles, hidden dependencies, ...) propagate unchanged through task
/// bodies when they are returned with `?`. Errors created by task bodies themselves should be [`Error::Failed`], which
/// the executor wraps into [`Error::Execution`] together with the key of the failing task.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
  #[error("cyclic dependency: task {key} is required while it is already being required by {}", display_stack(.stack))]
  CyclicDependency { key: TaskKey, stack: Vec<TaskKey> },
  #[error("task definition '{id}' is not registered")]
  MissingTaskDef { id: String },
  #[error("task {key} was visited with input {visited:?} but is now required with input {required:?}")]
  VisitedInputMismatch { key: TaskKey, visited: Value, required: Value },
  #[error("overlapping provided resource: resource {resource} is provided by task {provider}, but task {overlapping} \
  also provides it")]
  OverlappingProvide { resource: ResourceKey, provider: TaskKey, overlapping: TaskKey },
  #[error("hidden dependency: task {requirer} requires resource {resource} which is provided by task {provider}, \
  without a (transitive) task dependency from {requirer} to {provider}")]
  HiddenRequire { requirer: TaskKey, resource: ResourceKey, provider: TaskKey },
  #[error("hidden dependency: task {provider} provides resource {resource} which was required by task {requirer}, \
  without a (transitive) task dependency from {requirer} to {provider}")]
  HiddenProvide { provider: TaskKey, resource: ResourceKey, requirer: TaskKey },
  #[error("{subject} violates its equality, hashing, or serialization contract: {}", .violations.join("; "))]
  ContractViolation { subject: String, violations: Vec<String> },
  #[error("executing task {key} failed")]
  Execution { key: TaskKey, #[source] source: BoxError },
  #[error(transparent)]
  Failed(BoxError),
  #[error("accessing resource {key} failed")]
  Resource { key: ResourceKey, #[source] source: io::Error },
  #[error("store failure: {message}")]
  Store { message: String, #[source] source: Option<BoxError> },
  #[error("build was cancelled")]
  Cancelled,
}

impl Error {
  /// Creates a task failure from any error, to be returned from a task body.
  #[inline]
  pub fn failed(error: impl Into<BoxError>) -> Self { Self::Failed(error.into()) }

  #[inline]
  pub(crate) fn resource(key: &ResourceKey, source: io::Error) -> Self {
    Self::Resource { key: key.clone(), source }
  }

  #[inline]
  pub(crate) fn store(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self::Store { message: message.into(), source: Some(source.into()) }
  }

  /// Returns whether this error is a cancellation.
  #[inline]
  pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }
}

impl From<io::Error> for Error {
  #[inline]
  fn from(error: io::Error) -> Self { Self::Failed(Box::new(error)) }
}

impl From<String> for Error {
  #[inline]
  fn from(message: String) -> Self { Self::Failed(message.into()) }
}

impl From<&str> for Error {
  #[inline]
  fn from(message: &str) -> Self { Self::Failed(message.into()) }
}

fn display_stack(stack: &[TaskKey]) -> String {
  let keys: Vec<String> = stack.iter().map(|k| k.to_string()).collect();
  format!("[{}]", keys.join(" -> "))
}

/// Result type of the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;


#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_cyclic_dependency_message() {
    let key = TaskKey::new("a", 1);
    let error = Error::CyclicDependency { key: key.clone(), stack: vec![key.clone(), TaskKey::new("b", 2)] };
    assert_eq!(error.to_string(), "cyclic dependency: task a(1) is required while it is already being required by [a(1) -> b(2)]");
  }

  #[test]
  fn test_failed_is_transparent() {
    let error = Error::from("no such integer");
    assert_eq!(error.to_string(), "no such integer");
    assert!(!error.is_cancelled());
    assert!(Error::Cancelled.is_cancelled());
  }
}
