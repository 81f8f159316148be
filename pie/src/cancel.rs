use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Cooperative cancellation flag for builds. Clones share the same flag, so a token can be cancelled from another
/// thread while a build checks it.
#[derive(Default, Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Requests cancellation of builds checking this token.
  #[inline]
  pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed) }
  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }

  /// Returns [`Error::Cancelled`] if cancellation was requested.
  #[inline]
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
  }
}
