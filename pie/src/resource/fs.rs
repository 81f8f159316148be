use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

use crate::resource::{ResourceKey, ResourceKind, ResourceMetadata, ResourceService};

/// [`ResourceService`] over the real file system.
#[derive(Default, Copy, Clone, Debug)]
pub struct FsResourceService;

impl ResourceService for FsResourceService {
  fn metadata(&self, key: &ResourceKey) -> io::Result<Option<ResourceMetadata>> {
    let Some(metadata) = metadata(key)? else { return Ok(None) };
    let kind = if metadata.is_dir() { ResourceKind::Directory } else { ResourceKind::File };
    let modified = nanos_since_epoch(metadata.modified()?);
    Ok(Some(ResourceMetadata { kind, modified }))
  }

  fn read(&self, key: &ResourceKey) -> io::Result<Option<Vec<u8>>> {
    let Some(mut file) = open_if_file(key)? else { return Ok(None) };
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(Some(buffer))
  }

  fn list(&self, key: &ResourceKey) -> io::Result<Vec<ResourceKey>> {
    match metadata(key)? {
      Some(metadata) if metadata.is_dir() => {
        let mut children = Vec::new();
        for entry in fs::read_dir(key)? {
          children.push(ResourceKey::new(entry?.path()));
        }
        Ok(children)
      }
      _ => Ok(Vec::new()),
    }
  }

  fn write(&self, key: &ResourceKey, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = key.path().parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(key, contents)
  }
}

/// Gets the metadata for given `path`, returning:
/// - `Ok(Some(metadata))` if a file or directory exists at given path,
/// - `Ok(None)` if no file or directory exists at given path,
/// - `Err(e)` if there was an error getting the metadata for given path.
pub fn metadata(path: impl AsRef<Path>) -> io::Result<Option<Metadata>> {
  match fs::metadata(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e),
    Ok(m) => Ok(Some(m))
  }
}

/// Attempt to open file at given `path`, returning:
/// - `Ok(Some(file))` if a file exists at given path,
/// - `Ok(None)` if no file exists at given path (but a directory could exist at given path),
/// - `Err(e)` if there was an error getting the metadata for given path, or if there was an error opening the file.
///
/// This function is necessary due to Windows returning an error when attempting to open a directory.
pub fn open_if_file(path: impl AsRef<Path>) -> io::Result<Option<File>> {
  let file = match metadata(&path)? {
    Some(metadata) if metadata.is_file() => Some(File::open(&path)?),
    _ => None,
  };
  Ok(file)
}

fn nanos_since_epoch(time: SystemTime) -> i128 {
  match time.duration_since(SystemTime::UNIX_EPOCH) {
    Ok(duration) => duration.as_nanos() as i128,
    Err(e) => -(e.duration().as_nanos() as i128),
  }
}


#[cfg(test)]
mod test {
  use std::fs::remove_file;

  use assert_matches::assert_matches;

  use dev_shared::fs::{create_temp_dir, create_temp_file};

  use super::*;

  #[test]
  fn test_metadata_of_file() -> io::Result<()> {
    let temp_file = create_temp_file()?;
    let metadata = FsResourceService.metadata(&ResourceKey::new(temp_file.path()))?;
    assert_matches!(metadata, Some(ResourceMetadata { kind: ResourceKind::File, .. }));
    Ok(())
  }

  #[test]
  fn test_metadata_none() -> io::Result<()> {
    let temp_file = create_temp_file()?;
    let key = ResourceKey::new(temp_file.path());
    remove_file(&key)?;
    assert!(FsResourceService.metadata(&key)?.is_none());
    assert!(FsResourceService.read(&key)?.is_none());
    Ok(())
  }

  #[test]
  fn test_read_and_write() -> io::Result<()> {
    let temp_dir = create_temp_dir()?;
    let key = ResourceKey::new(temp_dir.path().join("nested").join("out.txt"));
    FsResourceService.write(&key, b"hello")?;
    assert_eq!(FsResourceService.read(&key)?.as_deref(), Some(&b"hello"[..]));
    Ok(())
  }

  #[test]
  fn test_open_if_file_on_directory() -> io::Result<()> {
    let temp_dir = create_temp_dir()?;
    assert!(open_if_file(temp_dir.path())?.is_none());
    let key = ResourceKey::new(temp_dir.path());
    assert!(FsResourceService.read(&key)?.is_none());
    assert_matches!(FsResourceService.metadata(&key)?, Some(ResourceMetadata { kind: ResourceKind::Directory, .. }));
    Ok(())
  }

  #[test]
  fn test_list() -> io::Result<()> {
    let temp_dir = create_temp_dir()?;
    fs::write(temp_dir.path().join("a.txt"), "a")?;
    fs::write(temp_dir.path().join("b.txt"), "b")?;
    let service: &dyn ResourceService = &FsResourceService;
    let key = ResourceKey::new(temp_dir.path());
    let children = service.resolve(&key).children()?;
    let names: Vec<_> = children.iter().filter_map(|c| c.name()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    Ok(())
  }
}
