use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub mod fs;
pub mod memory;

/// Identifies a resource (a file or directory) by its path.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceKey(PathBuf);

impl ResourceKey {
  #[inline]
  pub fn new(path: impl Into<PathBuf>) -> Self { Self(path.into()) }
  #[inline]
  pub fn path(&self) -> &Path { &self.0 }
  /// Returns the last component of the path, used to order directory children.
  #[inline]
  pub fn name(&self) -> Option<&str> { self.0.file_name().and_then(|n| n.to_str()) }
}

impl Display for ResourceKey {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0.display()) }
}
impl From<PathBuf> for ResourceKey {
  #[inline]
  fn from(path: PathBuf) -> Self { Self(path) }
}
impl From<&Path> for ResourceKey {
  #[inline]
  fn from(path: &Path) -> Self { Self(path.to_path_buf()) }
}
impl From<&str> for ResourceKey {
  #[inline]
  fn from(path: &str) -> Self { Self(PathBuf::from(path)) }
}
impl AsRef<Path> for ResourceKey {
  #[inline]
  fn as_ref(&self) -> &Path { &self.0 }
}


#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ResourceKind {
  File,
  Directory,
}

/// Metadata of an existing resource. `modified` is in nanoseconds relative to the unix epoch, or a logical clock
/// value for services without real time.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ResourceMetadata {
  pub kind: ResourceKind,
  pub modified: i128,
}

/// Access to resources by [key](ResourceKey). Stampers only observe resources through this trait.
///
/// Object-safe trait.
pub trait ResourceService {
  /// Gets the metadata of the resource at `key`, or `None` if it does not exist.
  fn metadata(&self, key: &ResourceKey) -> io::Result<Option<ResourceMetadata>>;
  /// Reads the contents of the file at `key`, or `None` if no file exists there (a directory could).
  fn read(&self, key: &ResourceKey) -> io::Result<Option<Vec<u8>>>;
  /// Lists the direct children of the directory at `key`, or nothing if no directory exists there.
  fn list(&self, key: &ResourceKey) -> io::Result<Vec<ResourceKey>>;
  /// Writes `contents` to the file at `key`, creating it when it does not exist.
  fn write(&self, key: &ResourceKey, contents: &[u8]) -> io::Result<()>;
}

impl<'s> dyn ResourceService + 's {
  /// Resolves `key` into a [`Resource`] handle.
  #[inline]
  pub fn resolve<'a>(&'a self, key: &'a ResourceKey) -> Resource<'a> {
    Resource { service: self, key }
  }
}

/// Handle to a resource in a [`ResourceService`].
#[derive(Copy, Clone)]
pub struct Resource<'a> {
  service: &'a dyn ResourceService,
  key: &'a ResourceKey,
}

impl<'a> Resource<'a> {
  #[inline]
  pub fn key(&self) -> &'a ResourceKey { self.key }
  #[inline]
  pub fn metadata(&self) -> io::Result<Option<ResourceMetadata>> { self.service.metadata(self.key) }
  #[inline]
  pub fn exists(&self) -> io::Result<bool> { Ok(self.metadata()?.is_some()) }
  #[inline]
  pub fn is_directory(&self) -> io::Result<bool> {
    Ok(matches!(self.metadata()?, Some(ResourceMetadata { kind: ResourceKind::Directory, .. })))
  }
  #[inline]
  pub fn read(&self) -> io::Result<Option<Vec<u8>>> { self.service.read(self.key) }
  /// Lists the children of this directory, sorted by key.
  pub fn children(&self) -> io::Result<Vec<ResourceKey>> {
    let mut children = self.service.list(self.key)?;
    children.sort();
    Ok(children)
  }
  #[inline]
  pub fn service(&self) -> &'a dyn ResourceService { self.service }
}
