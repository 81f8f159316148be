use std::fmt::{self, Debug, Formatter};

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKey, ResourceKind, ResourceService};
use crate::value::Value;

// Resource stampers

/// Maps a resource to a [`ResourceStamp`]. Stamps are only comparable when created by the same stamper.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResourceStamper {
  /// Whether the resource exists.
  Exists,
  /// Modification time of a file, or the latest modification time of the direct children of a directory.
  Modified,
  /// Modification time of a file, or the latest modification time of all descendants of a directory.
  ModifiedRecursive,
  /// Digest of the contents of a file, or of the names and contents of the direct children of a directory.
  #[cfg(feature = "hash_stamper")]
  Hash,
  /// Digest of the contents of a file, or of the names and contents of all descendants of a directory.
  #[cfg(feature = "hash_stamper")]
  HashRecursive,
}

impl ResourceStamper {
  /// Stamps the resource at `key` in `resources`.
  pub fn stamp(&self, resources: &dyn ResourceService, key: &ResourceKey) -> Result<ResourceStamp> {
    self.stamp_resource(resources.resolve(key)).map_err(|e| Error::resource(key, e))
  }

  fn stamp_resource(&self, resource: Resource) -> std::io::Result<ResourceStamp> {
    match self {
      ResourceStamper::Exists => Ok(ResourceStamp::Exists(resource.exists()?)),
      ResourceStamper::Modified => Ok(ResourceStamp::Modified(modified(resource, false)?)),
      ResourceStamper::ModifiedRecursive => Ok(ResourceStamp::Modified(modified(resource, true)?)),
      #[cfg(feature = "hash_stamper")]
      ResourceStamper::Hash => Ok(ResourceStamp::Hash(hash::hash(resource, false)?)),
      #[cfg(feature = "hash_stamper")]
      ResourceStamper::HashRecursive => Ok(ResourceStamp::Hash(hash::hash(resource, true)?)),
    }
  }
}

/// Latest modification time, `None` when the resource does not exist, [`i128::MIN`] for an empty directory.
fn modified(resource: Resource, recursive: bool) -> std::io::Result<Option<i128>> {
  let Some(metadata) = resource.metadata()? else { return Ok(None) };
  if metadata.kind == ResourceKind::File {
    return Ok(Some(metadata.modified));
  }
  let service = resource.service();
  let mut latest = i128::MIN;
  for child in resource.children()? {
    let child = service.resolve(&child);
    let child_modified = match child.metadata()? {
      Some(m) if m.kind == ResourceKind::Directory && recursive => modified(child, true)?.unwrap_or(i128::MIN).max(m.modified),
      Some(m) => m.modified,
      None => continue,
    };
    latest = latest.max(child_modified);
  }
  Ok(Some(latest))
}

#[cfg(feature = "hash_stamper")]
mod hash {
  use sha2::{Digest, Sha256};

  use crate::resource::{Resource, ResourceKind};

  const MISSING: u8 = 0;
  const FILE: u8 = 1;
  const DIRECTORY: u8 = 2;

  /// Digest of `resource`, `None` when it does not exist. Every entry is prefixed with a marker byte, so that missing,
  /// empty, and directory resources never share a digest. Directory children are visited in name order.
  pub fn hash(resource: Resource, recursive: bool) -> std::io::Result<Option<[u8; 32]>> {
    let Some(metadata) = resource.metadata()? else { return Ok(None) };
    let digest = match metadata.kind {
      ResourceKind::File => hash_file(resource)?,
      ResourceKind::Directory => hash_directory(resource, recursive)?,
    };
    Ok(Some(digest))
  }

  fn hash_file(resource: Resource) -> std::io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    match resource.read()? {
      Some(contents) => {
        hasher.update([FILE]);
        hasher.update(contents);
      }
      None => hasher.update([MISSING]),
    }
    Ok(hasher.finalize().into())
  }

  fn hash_directory(resource: Resource, recursive: bool) -> std::io::Result<[u8; 32]> {
    let service = resource.service();
    let mut hasher = Sha256::new();
    hasher.update([DIRECTORY]);
    for child_key in resource.children()? {
      let child = service.resolve(&child_key);
      hasher.update(child_key.name().unwrap_or_default().as_bytes());
      match child.metadata()? {
        Some(m) if m.kind == ResourceKind::File => hasher.update(hash_file(child)?),
        Some(_) if recursive => hasher.update(hash_directory(child, true)?),
        Some(_) => hasher.update([DIRECTORY]),
        None => hasher.update([MISSING]),
      }
    }
    Ok(hasher.finalize().into())
  }
}

/// Stamp of a resource, created by a [`ResourceStamper`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResourceStamp {
  Exists(bool),
  Modified(Option<i128>),
  Hash(Option<[u8; 32]>),
}

impl Debug for ResourceStamp {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      ResourceStamp::Exists(b) => write!(f, "Exists({})", b),
      ResourceStamp::Modified(Some(m)) => write!(f, "Modified({})", m),
      ResourceStamp::Modified(None) => f.write_str("Modified(None)"),
      ResourceStamp::Hash(Some(h)) => {
        f.write_str("Hash(")?;
        for b in &h[..8] {
          write!(f, "{:02x}", b)?;
        }
        f.write_str(")")
      }
      ResourceStamp::Hash(None) => f.write_str("Hash(None)"),
    }
  }
}


// Output stampers

/// Maps a task output to an [`OutputStamp`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OutputStamper {
  /// Always consistent: the caller does not depend on the output.
  Inconsequential,
  /// Consistent when the output is equal.
  Equals,
}

impl OutputStamper {
  #[inline]
  pub fn stamp(&self, output: &Value) -> OutputStamp {
    match self {
      OutputStamper::Inconsequential => OutputStamp::Inconsequential,
      OutputStamper::Equals => OutputStamp::Equals(output.clone()),
    }
  }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OutputStamp {
  Inconsequential,
  Equals(Value),
}


/// Default stampers, used when a dependency is created without an explicit stamper.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DefaultStampers {
  pub output: OutputStamper,
  /// Require stamper for file resources.
  pub require_file: ResourceStamper,
  /// Provide stamper for file resources.
  pub provide_file: ResourceStamper,
  /// Require stamper for directory resources.
  pub require_directory: ResourceStamper,
  /// Provide stamper for directory resources.
  pub provide_directory: ResourceStamper,
}

impl Default for DefaultStampers {
  fn default() -> Self {
    Self {
      output: OutputStamper::Equals,
      require_file: ResourceStamper::Modified,
      provide_file: ResourceStamper::Modified,
      require_directory: ResourceStamper::ModifiedRecursive,
      provide_directory: ResourceStamper::ModifiedRecursive,
    }
  }
}

impl DefaultStampers {
  /// Selects the default require stamper for the resource at `key`.
  pub fn require_stamper(&self, resources: &dyn ResourceService, key: &ResourceKey) -> Result<ResourceStamper> {
    let is_directory = resources.resolve(key).is_directory().map_err(|e| Error::resource(key, e))?;
    Ok(if is_directory { self.require_directory } else { self.require_file })
  }
  /// Selects the default provide stamper for the resource at `key`.
  pub fn provide_stamper(&self, resources: &dyn ResourceService, key: &ResourceKey) -> Result<ResourceStamper> {
    let is_directory = resources.resolve(key).is_directory().map_err(|e| Error::resource(key, e))?;
    Ok(if is_directory { self.provide_directory } else { self.provide_file })
  }
}
