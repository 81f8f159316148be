use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::{Store, StoreReadTxn, StoreWriteTxn};

/// What to do when the stored snapshot cannot be deserialized.
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub enum DeserializeFailurePolicy {
  /// Fail with [`Error::Store`].
  #[default]
  Fail,
  /// Log an error and start from an empty store, which forces every task to be executed again.
  Discard,
}

/// [`Store`] wrapper that loads a snapshot of the wrapped store from a file on creation, and writes a snapshot to
/// that file on [close](Store::close), and on [sync](Store::sync) when enabled.
#[derive(Debug)]
pub struct SerializingStore<S> {
  store: S,
  path: PathBuf,
  write_on_sync: bool,
}

impl<S: Default + DeserializeOwned> SerializingStore<S> {
  /// Opens the store snapshot at `path`, starting from an empty store if no file exists at `path`. `policy` decides
  /// what happens when the file exists but cannot be deserialized.
  pub fn open(path: impl Into<PathBuf>, policy: DeserializeFailurePolicy) -> Result<Self> {
    let path = path.into();
    let store = match fs::read_to_string(&path) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => S::default(),
      Err(e) => return Err(Error::store(format!("reading store snapshot {} failed", path.display()), e)),
      Ok(text) => match ron::from_str(&text) {
        Ok(store) => store,
        Err(e) if policy == DeserializeFailurePolicy::Discard => {
          log::error!("deserializing store snapshot {} failed, discarding it and executing all tasks again: {}", path.display(), e);
          S::default()
        }
        Err(e) => return Err(Error::store(format!("deserializing store snapshot {} failed", path.display()), e)),
      }
    };
    Ok(Self { store, path, write_on_sync: false })
  }
}

impl<S> SerializingStore<S> {
  /// Also write the snapshot on every [sync](Store::sync).
  #[inline]
  pub fn with_write_on_sync(mut self, write_on_sync: bool) -> Self {
    self.write_on_sync = write_on_sync;
    self
  }

  #[inline]
  pub fn path(&self) -> &Path { &self.path }
  #[inline]
  pub fn inner(&self) -> &S { &self.store }
  #[inline]
  pub fn into_inner(self) -> S { self.store }
}

impl<S: Serialize> SerializingStore<S> {
  fn write_snapshot(&self) -> Result<()> {
    let text = ron::to_string(&self.store)
      .map_err(|e| Error::store(format!("serializing store snapshot {} failed", self.path.display()), e))?;
    // Write to a sibling file first, so that a crash while writing never leaves a truncated snapshot behind.
    let temporary = self.path.with_extension("tmp");
    fs::write(&temporary, text)
      .and_then(|_| fs::rename(&temporary, &self.path))
      .map_err(|e| Error::store(format!("writing store snapshot {} failed", self.path.display()), e))?;
    log::debug!("wrote store snapshot {}", self.path.display());
    Ok(())
  }
}

impl<S: Store + Serialize> Store for SerializingStore<S> {
  #[inline]
  fn read_txn(&self) -> &dyn StoreReadTxn { self.store.read_txn() }
  #[inline]
  fn write_txn(&mut self) -> &mut dyn StoreWriteTxn { self.store.write_txn() }

  fn sync(&mut self) -> Result<()> {
    self.store.sync()?;
    if self.write_on_sync {
      self.write_snapshot()?;
    }
    Ok(())
  }

  fn close(&mut self) -> Result<()> {
    self.store.close()?;
    self.write_snapshot()
  }
}
