use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors reported by the aligned allocator and by [`MemoryBlock`](crate::MemoryBlock).
///
/// Every check runs before any memory is touched, so a call that returns one
/// of these leaves the block exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("offset {offset} with length {length} is out of bounds for block with size {byte_size}")]
  OutOfBounds {
    offset: usize,
    length: usize,
    byte_size: usize,
  },

  #[error("block address is null")]
  NullBlock,

  #[error("double free: block address is already null")]
  DoubleFree,

  #[error("attempt to modify a frozen block")]
  Frozen,

  #[error("failed to allocate {padded} bytes (requested: {requested})")]
  OutOfMemory { requested: usize, padded: usize },

  #[error("{0}")]
  RuntimeFault(&'static str),

  #[error("attempt to release a null pointer")]
  InvalidFree,
}

/// Fieldless discriminant of [`MemoryError`], for callers that map errors to
/// their own error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  InvalidArgument,
  OutOfBounds,
  NullBlock,
  DoubleFree,
  Frozen,
  OutOfMemory,
  RuntimeFault,
  InvalidFree,
}

impl MemoryError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      MemoryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
      MemoryError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
      MemoryError::NullBlock => ErrorKind::NullBlock,
      MemoryError::DoubleFree => ErrorKind::DoubleFree,
      MemoryError::Frozen => ErrorKind::Frozen,
      MemoryError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
      MemoryError::RuntimeFault(_) => ErrorKind::RuntimeFault,
      MemoryError::InvalidFree => ErrorKind::InvalidFree,
    }
  }

  pub(crate) fn invalid_argument(message: impl Into<String>) -> MemoryError {
    MemoryError::InvalidArgument(message.into())
  }

  pub(crate) fn out_of_bounds(
    offset: usize,
    length: usize,
    byte_size: usize,
  ) -> MemoryError {
    MemoryError::OutOfBounds {
      offset,
      length,
      byte_size,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kind() {
    assert_eq!(MemoryError::DoubleFree.kind(), ErrorKind::DoubleFree);
    assert_eq!(
      MemoryError::out_of_bounds(4, 8, 10).kind(),
      ErrorKind::OutOfBounds
    );
    assert_eq!(
      MemoryError::invalid_argument("size").kind(),
      ErrorKind::InvalidArgument
    );
  }

  #[test]
  fn test_display() {
    let error = MemoryError::out_of_bounds(7, 4, 8);
    assert_eq!(
      error.to_string(),
      "offset 7 with length 4 is out of bounds for block with size 8"
    );
    assert_eq!(
      MemoryError::OutOfMemory {
        requested: 16,
        padded: 39
      }
      .to_string(),
      "failed to allocate 39 bytes (requested: 16)"
    );
  }
}
