use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::resource::{ResourceKey, ResourceKind, ResourceMetadata, ResourceService};

/// In-memory [`ResourceService`] with files and directories, and a logical clock for modification times.
///
/// Cloning creates another handle to the same resources, so a test can keep a handle to change resources that are
/// observed by a [`Pie`](crate::Pie) instance.
#[derive(Default, Clone, Debug)]
pub struct MemoryResourceService {
  state: Arc<RwLock<State>>,
}

#[derive(Default, Debug)]
struct State {
  entries: BTreeMap<PathBuf, Entry>,
  clock: i128,
}

#[derive(Debug)]
struct Entry {
  contents: Option<Vec<u8>>,
  modified: i128,
}

impl MemoryResourceService {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Writes `contents` to the file at `path`, creating parent directories as needed.
  pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
    self.write(&ResourceKey::new(path.as_ref()), contents.as_ref())
  }

  /// Creates a directory at `path`, creating parent directories as needed.
  pub fn create_dir(&self, path: impl AsRef<Path>) -> io::Result<()> {
    let mut state = self.state_mut()?;
    state.create_dirs(path.as_ref())
  }

  /// Removes the resource at `path` including all its descendants. Returns whether something was removed.
  pub fn remove(&self, path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut state = self.state_mut()?;
    let before = state.entries.len();
    state.entries.retain(|p, _| !p.starts_with(path));
    Ok(state.entries.len() != before)
  }

  fn state(&self) -> io::Result<RwLockReadGuard<'_, State>> {
    self.state.read().map_err(|_| io::Error::new(io::ErrorKind::Other, "in-memory resource state is poisoned"))
  }
  fn state_mut(&self) -> io::Result<RwLockWriteGuard<'_, State>> {
    self.state.write().map_err(|_| io::Error::new(io::ErrorKind::Other, "in-memory resource state is poisoned"))
  }
}

impl State {
  fn tick(&mut self) -> i128 {
    self.clock += 1;
    self.clock
  }

  fn create_dirs(&mut self, path: &Path) -> io::Result<()> {
    for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
      if ancestor.as_os_str().is_empty() { continue; }
      match self.entries.get(ancestor) {
        Some(Entry { contents: Some(_), .. }) => {
          return Err(io::Error::new(io::ErrorKind::Other, format!("{} is a file", ancestor.display())));
        }
        Some(_) => {}
        None => {
          let modified = self.tick();
          self.entries.insert(ancestor.to_path_buf(), Entry { contents: None, modified });
        }
      }
    }
    Ok(())
  }
}

impl ResourceService for MemoryResourceService {
  fn metadata(&self, key: &ResourceKey) -> io::Result<Option<ResourceMetadata>> {
    let state = self.state()?;
    Ok(state.entries.get(key.path()).map(|entry| {
      let kind = if entry.contents.is_some() { ResourceKind::File } else { ResourceKind::Directory };
      ResourceMetadata { kind, modified: entry.modified }
    }))
  }

  fn read(&self, key: &ResourceKey) -> io::Result<Option<Vec<u8>>> {
    let state = self.state()?;
    Ok(state.entries.get(key.path()).and_then(|entry| entry.contents.clone()))
  }

  fn list(&self, key: &ResourceKey) -> io::Result<Vec<ResourceKey>> {
    let state = self.state()?;
    let path = key.path();
    match state.entries.get(path) {
      Some(Entry { contents: None, .. }) => Ok(state.entries.keys()
        .filter(|p| p.parent() == Some(path))
        .map(|p| ResourceKey::new(p.clone()))
        .collect()),
      _ => Ok(Vec::new()),
    }
  }

  fn write(&self, key: &ResourceKey, contents: &[u8]) -> io::Result<()> {
    let mut state = self.state_mut()?;
    let path = key.path();
    if let Some(Entry { contents: None, .. }) = state.entries.get(path) {
      return Err(io::Error::new(io::ErrorKind::Other, format!("{} is a directory", path.display())));
    }
    if let Some(parent) = path.parent() {
      state.create_dirs(parent)?;
    }
    let modified = state.tick();
    state.entries.insert(path.to_path_buf(), Entry { contents: Some(contents.to_vec()), modified });
    Ok(())
  }
}


#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_write_read_list() -> io::Result<()> {
    let service = MemoryResourceService::new();
    service.write_file("dir/b.txt", "b")?;
    service.write_file("dir/a.txt", "a")?;
    let dir = ResourceKey::new("dir");
    assert_eq!(service.metadata(&dir)?.map(|m| m.kind), Some(ResourceKind::Directory));
    assert_eq!(service.read(&ResourceKey::new("dir/a.txt"))?, Some(b"a".to_vec()));
    let service_dyn: &dyn ResourceService = &service;
    let children = service_dyn.resolve(&dir).children()?;
    assert_eq!(children, vec![ResourceKey::new("dir/a.txt"), ResourceKey::new("dir/b.txt")]);
    Ok(())
  }

  #[test]
  fn test_modified_increases() -> io::Result<()> {
    let service = MemoryResourceService::new();
    let key = ResourceKey::new("a.txt");
    service.write_file("a.txt", "1")?;
    let first = service.metadata(&key)?.map(|m| m.modified);
    service.clone().write_file("a.txt", "1")?;
    let second = service.metadata(&key)?.map(|m| m.modified);
    assert!(second > first);
    Ok(())
  }

  #[test]
  fn test_remove() -> io::Result<()> {
    let service = MemoryResourceService::new();
    service.write_file("dir/a.txt", "a")?;
    assert!(service.remove("dir")?);
    assert!(service.metadata(&ResourceKey::new("dir/a.txt"))?.is_none());
    assert!(!service.remove("dir")?);
    Ok(())
  }

  #[test]
  fn test_write_to_directory_fails() -> io::Result<()> {
    let service = MemoryResourceService::new();
    service.create_dir("dir")?;
    assert!(service.write_file("dir", "a").is_err());
    Ok(())
  }
}
