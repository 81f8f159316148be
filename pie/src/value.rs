use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use dyn_clone::DynClone;

use crate::supplier::Supplier;

/// Value used as task input, task key, and task output.
///
/// Values have stable equality and hashing, and are serializable when the `serde` feature is enabled, which is what
/// allows the engine to persist them and to compare them across process restarts. [`Value::Unit`] is the output of a
/// task that returns nothing.
#[derive(Default, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
  #[default]
  Unit,
  Bool(bool),
  Int(i64),
  String(String),
  Bytes(Vec<u8>),
  Path(PathBuf),
  List(Vec<Value>),
  Supplier(Box<Supplier>),
  Transient(Transient),
}

impl Value {
  #[inline]
  pub fn is_unit(&self) -> bool { matches!(self, Self::Unit) }
  #[inline]
  pub fn as_bool(&self) -> Option<bool> {
    if let Self::Bool(b) = self { Some(*b) } else { None }
  }
  #[inline]
  pub fn as_int(&self) -> Option<i64> {
    if let Self::Int(i) = self { Some(*i) } else { None }
  }
  #[inline]
  pub fn as_str(&self) -> Option<&str> {
    if let Self::String(s) = self { Some(s) } else { None }
  }
  #[inline]
  pub fn as_bytes(&self) -> Option<&[u8]> {
    if let Self::Bytes(b) = self { Some(b) } else { None }
  }
  #[inline]
  pub fn as_path(&self) -> Option<&Path> {
    if let Self::Path(p) = self { Some(p) } else { None }
  }
  #[inline]
  pub fn as_list(&self) -> Option<&[Value]> {
    if let Self::List(l) = self { Some(l) } else { None }
  }
  #[inline]
  pub fn as_supplier(&self) -> Option<&Supplier> {
    if let Self::Supplier(s) = self { Some(s) } else { None }
  }
  #[inline]
  pub fn as_transient(&self) -> Option<&Transient> {
    if let Self::Transient(t) = self { Some(t) } else { None }
  }

  /// Returns whether this value is, or contains, a [`Transient`] value.
  pub fn contains_transient(&self) -> bool {
    match self {
      Self::Transient(_) => true,
      Self::List(values) => values.iter().any(|v| v.contains_transient()),
      Self::Supplier(supplier) => matches!(supplier.as_ref(), Supplier::Value(v) if v.contains_transient()),
      _ => false,
    }
  }
  /// Returns whether this value is, or contains, a [`Transient`] value that is stale or no longer consistent.
  pub fn contains_inconsistent_transient(&self) -> bool {
    match self {
      Self::Transient(transient) => !transient.is_consistent(),
      Self::List(values) => values.iter().any(|v| v.contains_inconsistent_transient()),
      Self::Supplier(supplier) => matches!(supplier.as_ref(), Supplier::Value(v) if v.contains_inconsistent_transient()),
      _ => false,
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Value::Unit => f.write_str("()"),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Int(i) => write!(f, "{}", i),
      Value::String(s) => write!(f, "{:?}", s),
      Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
      Value::Path(p) => write!(f, "{}", p.display()),
      Value::List(values) => {
        f.write_str("[")?;
        for (i, value) in values.iter().enumerate() {
          if i > 0 { f.write_str(", ")?; }
          write!(f, "{}", value)?;
        }
        f.write_str("]")
      }
      Value::Supplier(s) => write!(f, "{}", s),
      Value::Transient(t) => write!(f, "{:?}", t),
    }
  }
}

impl From<()> for Value {
  #[inline]
  fn from(_: ()) -> Self { Self::Unit }
}
impl From<bool> for Value {
  #[inline]
  fn from(value: bool) -> Self { Self::Bool(value) }
}
impl From<i64> for Value {
  #[inline]
  fn from(value: i64) -> Self { Self::Int(value) }
}
impl From<i32> for Value {
  #[inline]
  fn from(value: i32) -> Self { Self::Int(value as i64) }
}
impl From<String> for Value {
  #[inline]
  fn from(value: String) -> Self { Self::String(value) }
}
impl From<&str> for Value {
  #[inline]
  fn from(value: &str) -> Self { Self::String(value.to_string()) }
}
impl From<Vec<u8>> for Value {
  #[inline]
  fn from(value: Vec<u8>) -> Self { Self::Bytes(value) }
}
impl From<PathBuf> for Value {
  #[inline]
  fn from(value: PathBuf) -> Self { Self::Path(value) }
}
impl From<&Path> for Value {
  #[inline]
  fn from(value: &Path) -> Self { Self::Path(value.to_path_buf()) }
}
impl From<Vec<Value>> for Value {
  #[inline]
  fn from(value: Vec<Value>) -> Self { Self::List(value) }
}
impl From<Transient> for Value {
  #[inline]
  fn from(value: Transient) -> Self { Self::Transient(value) }
}


/// In-memory value that is returned from a task but not persisted verbatim, such as a handle to a loaded object.
///
/// A transient value must decide for itself whether it is still valid. When it is not, the task that produced it is
/// re-executed even when all its dependencies are consistent.
pub trait TransientValue: TransientObj + DynClone + Debug + Send + Sync {
  /// Returns whether this value is still valid.
  fn is_consistent(&self) -> bool;
}
dyn_clone::clone_trait_object!(TransientValue);

/// Object-safe equality and hashing proxies, implemented for all `'static` types that implement [`Eq`] and [`Hash`].
pub trait TransientObj {
  fn as_any(&self) -> &dyn Any;
  fn dyn_eq(&self, other: &dyn Any) -> bool;
  fn dyn_hash(&self, state: &mut dyn Hasher);
}
impl<T: Eq + Hash + Any> TransientObj for T {
  #[inline]
  fn as_any(&self) -> &dyn Any { self }
  #[inline]
  fn dyn_eq(&self, other: &dyn Any) -> bool {
    other.downcast_ref::<Self>().map_or(false, |other| self == other)
  }
  #[inline]
  fn dyn_hash(&self, mut state: &mut dyn Hasher) {
    self.hash(&mut state);
  }
}

/// Wrapper around a [`TransientValue`]. Serializes to a marker and deserializes as a stale value, which is never
/// consistent.
#[derive(Clone)]
pub struct Transient(Option<Box<dyn TransientValue>>);

impl Transient {
  #[inline]
  pub fn new(value: impl TransientValue + 'static) -> Self { Self(Some(Box::new(value))) }
  /// Creates a stale transient value, as produced by deserialization.
  #[inline]
  pub fn stale() -> Self { Self(None) }

  #[inline]
  pub fn is_stale(&self) -> bool { self.0.is_none() }
  /// Returns whether the wrapped value is present and still considers itself valid.
  #[inline]
  pub fn is_consistent(&self) -> bool {
    self.0.as_ref().map_or(false, |v| v.is_consistent())
  }
  #[inline]
  pub fn get(&self) -> Option<&dyn TransientValue> { self.0.as_deref() }
  #[inline]
  pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
    self.0.as_deref().and_then(|v| v.as_any().downcast_ref())
  }
}

impl PartialEq for Transient {
  fn eq(&self, other: &Self) -> bool {
    match (self.0.as_deref(), other.0.as_deref()) {
      (Some(a), Some(b)) => a.dyn_eq(b.as_any()),
      (None, None) => true,
      _ => false,
    }
  }
}
impl Eq for Transient {}
impl Hash for Transient {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match self.0.as_deref() {
      Some(v) => {
        state.write_u8(1);
        v.dyn_hash(state);
      }
      None => state.write_u8(0),
    }
  }
}
impl Debug for Transient {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self.0.as_deref() {
      Some(v) => f.debug_tuple("Transient").field(v).finish(),
      None => f.write_str("Transient(<stale>)"),
    }
  }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Transient {
  #[inline]
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_unit()
  }
}
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Transient {
  #[inline]
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    <() as serde::Deserialize>::deserialize(deserializer)?;
    Ok(Self::stale())
  }
}
