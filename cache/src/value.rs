use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

/// A type-erased, cheaply cloneable cached value.
///
/// The map stores values of any `'static + Send + Sync` type side by side.
/// Reading one back as a concrete type is a checked downcast that fails
/// explicitly on mismatch instead of coercing.
#[derive(Clone)]
pub struct Value {
  inner: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl Value {
  /// Wraps `value`.
  ///
  /// Wrapping a `Value` returns it unchanged rather than nesting it.
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    let type_name = any::type_name::<T>();
    match (Box::new(value) as Box<dyn Any + Send + Sync>).downcast::<Value>() {
      Ok(value) => *value,
      Err(other) => Self {
        inner: Arc::from(other),
        type_name,
      },
    }
  }

  /// Wraps an existing `Arc` without copying the payload.
  pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      inner: value,
      type_name: any::type_name::<T>(),
    }
  }

  /// Returns `true` if the stored value is a `T`.
  #[inline]
  pub fn is<T: Any>(&self) -> bool {
    self.inner.is::<T>()
  }

  /// Returns a shared handle to the stored value if it is a `T`.
  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.inner.clone().downcast::<T>().ok()
  }

  /// Borrows the stored value if it is a `T`.
  #[inline]
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.inner.downcast_ref::<T>()
  }

  /// The name of the stored type, as reported by `std::any::type_name`.
  #[inline]
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// Returns `true` if both values point at the same allocation.
  pub fn ptr_eq(&self, other: &Value) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Value")
      .field("type", &self.type_name)
      .finish_non_exhaustive()
  }
}
