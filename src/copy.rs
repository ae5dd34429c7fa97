use std::ptr;

use log::debug;

use crate::{
  block::MemoryBlock,
  error::{MemoryError, Result},
};

/// Where [`MemoryBlock::copy_from`] reads from.
///
/// Anything carrying a byte size gets its range bounds-checked. A bare
/// address cannot be checked and the caller bears that risk.
#[derive(Debug, Clone, Copy)]
pub enum CopySource<'a> {
  Block(&'a MemoryBlock),
  Bytes(&'a [u8]),
  Address {
    address: *const u8,
    byte_size: Option<usize>,
  },
}

impl<'a> CopySource<'a> {
  /// A raw address without size information.
  pub fn address(address: *const u8) -> Self {
    CopySource::Address {
      address,
      byte_size: None,
    }
  }

  /// A raw address of a region known to span `byte_size` bytes.
  pub fn sized_address(
    address: *const u8,
    byte_size: usize,
  ) -> Self {
    CopySource::Address {
      address,
      byte_size: Some(byte_size),
    }
  }

  fn resolve(&self) -> (*const u8, Option<usize>) {
    match *self {
      CopySource::Block(block) => (block.address(), Some(block.byte_size())),
      CopySource::Bytes(bytes) => (bytes.as_ptr(), Some(bytes.len())),
      CopySource::Address { address, byte_size } => (address, byte_size),
    }
  }
}

impl<'a> From<&'a MemoryBlock> for CopySource<'a> {
  fn from(block: &'a MemoryBlock) -> Self {
    CopySource::Block(block)
  }
}

impl<'a> From<&'a [u8]> for CopySource<'a> {
  fn from(bytes: &'a [u8]) -> Self {
    CopySource::Bytes(bytes)
  }
}

impl MemoryBlock {
  /// Moves `byte_count` bytes from `source + source_offset` into this block at
  /// `destination_offset`. Overlapping ranges are handled.
  ///
  /// Without a `byte_count`, copies as much as fits after
  /// `destination_offset`, further limited by what a sized source has left
  /// after `source_offset`. An explicit count that overruns either side is
  /// rejected with [`MemoryError::OutOfBounds`].
  pub fn copy_from(
    &mut self,
    source: CopySource<'_>,
    destination_offset: usize,
    source_offset: usize,
    byte_count: Option<usize>,
  ) -> Result<&mut Self> {
    self.check_not_null()?;
    self.check_mutable()?;

    let (source_address, source_size) = source.resolve();
    if source_address.is_null() {
      return Err(MemoryError::invalid_argument("source pointer is null"));
    }

    let byte_size = self.byte_size();
    if byte_size == 0 {
      return Err(MemoryError::RuntimeFault(
        "destination block has a size of zero -- cannot safely copy to this block",
      ));
    }

    let byte_count = match byte_count {
      Some(count) => count,
      None => {
        let available = byte_size.checked_sub(destination_offset).ok_or(
          MemoryError::out_of_bounds(destination_offset, 0, byte_size),
        )?;
        match source_size {
          Some(size) => size
            .checked_sub(source_offset)
            .ok_or(MemoryError::out_of_bounds(source_offset, 0, size))?
            .min(available),
          None => {
            unchecked_copy_notice(source_address, available);
            available
          }
        }
      }
    };

    if let Some(size) = source_size {
      check_range(source_offset, byte_count, size)?;
    }
    check_range(destination_offset, byte_count, byte_size)?;

    let source_pointer = source_address.wrapping_add(source_offset);
    let destination_pointer = self.address().wrapping_add(destination_offset);

    debug!(
      "copy: destination = {:?}, source = {:?}, destination_offset = {}, source_offset = {}, byte_count = {}, byte_size = {}",
      self.address(),
      source_address,
      destination_offset,
      source_offset,
      byte_count,
      byte_size
    );

    if byte_count == 0 || ptr::eq(source_pointer, destination_pointer) {
      return Ok(self);
    }

    unsafe { ptr::copy(source_pointer, destination_pointer, byte_count) };

    Ok(self)
  }

  /// Moves `byte_count` bytes inside this block. Overlapping ranges are
  /// handled.
  pub fn copy_within(
    &mut self,
    destination_offset: usize,
    source_offset: usize,
    byte_count: usize,
  ) -> Result<&mut Self> {
    let source = CopySource::sized_address(self.address(), self.byte_size());
    self.copy_from(
      source,
      destination_offset,
      source_offset,
      Some(byte_count),
    )
  }
}

/// Fails unless `[offset, offset + length)` fits in `size` bytes. An empty
/// range may sit exactly at the end.
fn check_range(
  offset: usize,
  length: usize,
  size: usize,
) -> Result<()> {
  match offset.checked_add(length) {
    Some(end) if offset <= size && end <= size => Ok(()),
    _ => Err(MemoryError::out_of_bounds(offset, length, size)),
  }
}

fn unchecked_copy_notice(
  source: *const u8,
  byte_count: usize,
) {
  #[cfg(feature = "copy-warnings")]
  log::warn!(
    "Copying {} bytes from memory address {:?} without explicit size -- this copy is not bounds-checked on the source",
    byte_count,
    source
  );
  #[cfg(not(feature = "copy-warnings"))]
  debug!(
    "Copying {} bytes from memory address {:?} without explicit size",
    byte_count, source
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn pattern_block(size: u8) -> MemoryBlock {
    let mut block = MemoryBlock::allocate(size as usize).unwrap();
    for value in 0..size {
      block.set_uint8(value as usize, value).unwrap();
    }
    block
  }

  #[test]
  fn test_overlapping_copy() {
    let mut block = pattern_block(10);

    block.copy_within(2, 0, 5).unwrap();

    assert_eq!(block.to_bytes(false).unwrap(), vec![0, 1, 0, 1, 2, 3, 4, 7, 8, 9]);
  }

  #[test]
  fn test_overlapping_copy_backwards() {
    let mut block = pattern_block(10);

    block.copy_within(0, 3, 5).unwrap();

    assert_eq!(block.to_bytes(false).unwrap(), vec![3, 4, 5, 6, 7, 5, 6, 7, 8, 9]);
  }

  #[test]
  fn test_copy_between_blocks() {
    let source = pattern_block(8);
    let mut destination = MemoryBlock::allocate(8).unwrap();

    destination.copy_from((&source).into(), 4, 2, Some(3)).unwrap();

    assert_eq!(destination.to_bytes(false).unwrap(), vec![0, 0, 0, 0, 2, 3, 4, 0]);
  }

  #[test]
  fn test_default_count_is_clamped_to_source() {
    let source = pattern_block(4);
    let mut destination = MemoryBlock::allocate(8).unwrap();

    destination.copy_from((&source).into(), 1, 1, None).unwrap();
    assert_eq!(destination.to_bytes(false).unwrap(), vec![0, 1, 2, 3, 0, 0, 0, 0]);

    let larger = pattern_block(16);
    let mut small = MemoryBlock::allocate(4).unwrap();
    small.copy_from((&larger).into(), 0, 10, None).unwrap();
    assert_eq!(small.to_bytes(false).unwrap(), vec![10, 11, 12, 13]);
  }

  #[test]
  fn test_copy_from_bytes() {
    let mut block = MemoryBlock::allocate(6).unwrap();
    let bytes: &[u8] = b"abcdef";

    block.copy_from(bytes.into(), 0, 2, None).unwrap();
    assert_eq!(block.to_bytes(false).unwrap(), b"cdef\0\0");
  }

  #[test]
  fn test_copy_from_raw_address() {
    let storage = [5u8, 6, 7, 8];
    let mut block = MemoryBlock::allocate(4).unwrap();

    block
      .copy_from(CopySource::address(storage.as_ptr()), 1, 0, Some(3))
      .unwrap();
    assert_eq!(block.to_bytes(false).unwrap(), vec![0, 5, 6, 7]);

    let error = block
      .copy_from(CopySource::address(ptr::null()), 0, 0, Some(1))
      .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
  }

  #[test]
  fn test_copy_out_of_bounds() {
    let source = pattern_block(4);
    let mut destination = pattern_block(8);

    let error = destination.copy_from((&source).into(), 6, 0, Some(3)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfBounds);

    let error = destination.copy_from((&source).into(), 0, 2, Some(3)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfBounds);

    let error = destination.copy_from((&source).into(), 0, 5, None).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfBounds);

    let error = destination.copy_from((&source).into(), 9, 0, None).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfBounds);

    let error = destination
      .copy_from((&source).into(), usize::MAX, 0, Some(2))
      .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OutOfBounds);

    // Nothing was written by the failed calls.
    assert_eq!(destination.to_bytes(false).unwrap(), (0..8).collect::<Vec<u8>>());
  }

  #[test]
  fn test_zero_count_and_same_pointer() {
    let source = pattern_block(4);
    let mut block = pattern_block(4);

    block.copy_from((&source).into(), 4, 0, Some(0)).unwrap();
    block.copy_within(1, 1, 3).unwrap();

    assert_eq!(block.to_bytes(false).unwrap(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn test_copy_into_null_or_frozen() {
    let source = pattern_block(4);

    let mut freed = MemoryBlock::allocate(4).unwrap();
    freed.free().unwrap();
    assert_eq!(
      freed.copy_from((&source).into(), 0, 0, None).unwrap_err(),
      MemoryError::NullBlock
    );

    let mut frozen = MemoryBlock::allocate(4).unwrap();
    frozen.freeze();
    assert_eq!(
      frozen.copy_from((&source).into(), 0, 0, None).unwrap_err(),
      MemoryError::Frozen
    );
  }
}
