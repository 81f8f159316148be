use crate::dependency::TaskData;
use crate::error::Result;
use crate::store::StoreReadTxn;
use crate::task::{TaskDefs, TaskKey};
use crate::value::Value;

pub mod validation;

/// Cross-cutting checks invoked around requires and store writes.
///
/// Object-safe trait.
#[allow(unused_variables)]
pub trait Layer {
  /// Called when task `key` with `input` starts being required, before anything else happens. When this returns an
  /// error, [`require_top_down_end`](Self::require_top_down_end) is not called for `key`.
  #[inline]
  fn require_top_down_start(&mut self, key: &TaskKey, input: &Value, defs: &TaskDefs) -> Result<()> { Ok(()) }
  /// Called when task `key` is done being required, whether requiring it succeeded or not.
  #[inline]
  fn require_top_down_end(&mut self, key: &TaskKey) {}

  /// Validates that `input`, with which task `key` is required, matches the `visited` data of that task.
  #[inline]
  fn validate_visited(&mut self, key: &TaskKey, input: &Value, visited: &TaskData) -> Result<()> { Ok(()) }
  /// Validates `data` of task `key` against `txn` before `data` is written.
  #[inline]
  fn validate_pre_write(&mut self, key: &TaskKey, data: &TaskData, txn: &dyn StoreReadTxn) -> Result<()> { Ok(()) }
  /// Validates `data` of task `key` against `txn` after `data` has been written.
  #[inline]
  fn validate_post_write(&mut self, key: &TaskKey, data: &TaskData, txn: &dyn StoreReadTxn) -> Result<()> { Ok(()) }

  /// Called at the start of every session.
  #[inline]
  fn session_start(&mut self) {}
}

/// A [`Layer`] that does not validate anything. Cyclic requires are still rejected by the session itself, but without
/// validation of resource dependencies.
#[derive(Default, Copy, Clone, Debug)]
pub struct NoopLayer;

impl Layer for NoopLayer {}
