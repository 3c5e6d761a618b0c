//! Type representation for the supported C subset.
//!
//! The language only has `int` today, but symbol entries still carry a type
//! so storage sizing and name classification stay in one place.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
  Int,
  Function,
}

impl Type {
  pub fn is_integer(&self) -> bool {
    matches!(self, Type::Int)
  }

  pub fn is_function(&self) -> bool {
    matches!(self, Type::Function)
  }

  /// Storage size in bytes. Every data slot is a uniform 8 bytes; functions
  /// occupy no frame storage.
  pub fn size(&self) -> i64 {
    match self {
      Type::Int => 8,
      Type::Function => 0,
    }
  }
}
