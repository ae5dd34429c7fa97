use std::{fmt, ptr};

use log::{error, warn};

use crate::{
  align::{DEFAULT_ALIGNMENT, is_power_of_two},
  aligned,
  error::{MemoryError, Result},
};

/// A bounds-checked view over one aligned region of raw memory.
///
/// ```text
///   MemoryBlock
///   ┌─────────────────────┐
///   │ address ────────────┼──────►┌───────────────────────────────┐
///   │ byte_size: N        │       │        N usable bytes         │
///   │ alignment: A        │       └───────────────────────────────┘
///   │ owns_memory: bool   │        ▲
///   │ mutable: bool       │        └── address % A == 0 (when allocated)
///   └─────────────────────┘
/// ```
///
/// A block either owns its region (created by [`allocate`](Self::allocate) or
/// [`reallocate`](Self::reallocate)) and releases it exactly once, or borrows
/// a region supplied through [`wrap`](Self::wrap) and never releases it.
pub struct MemoryBlock {
  address: *mut u8,
  byte_size: usize,
  alignment: usize,
  owns_memory: bool,
  mutable: bool,
}

impl MemoryBlock {
  /// Allocates `size` zeroed bytes aligned to the width of a pointer.
  pub fn allocate(size: usize) -> Result<Self> {
    Self::allocate_aligned(size, DEFAULT_ALIGNMENT)
  }

  /// Allocates `size` zeroed bytes aligned to `alignment`.
  pub fn allocate_aligned(
    size: usize,
    alignment: usize,
  ) -> Result<Self> {
    check_size_and_alignment(size, alignment)?;

    let address = aligned::allocate(size, alignment)?;

    Ok(Self {
      address,
      byte_size: size,
      alignment,
      owns_memory: true,
      mutable: true,
    })
  }

  /// Wraps memory this block does not own, assuming pointer-width alignment.
  ///
  /// # Safety
  ///
  /// See [`wrap_aligned`](Self::wrap_aligned).
  pub unsafe fn wrap(
    address: *mut u8,
    size: usize,
  ) -> Result<Self> {
    unsafe { Self::wrap_aligned(address, size, DEFAULT_ALIGNMENT) }
  }

  /// Wraps `size` bytes at `address`. The block never releases them.
  ///
  /// # Safety
  ///
  /// `address` must be valid for reads and writes of `size` bytes for as long
  /// as the block refers to it, and the caller stays responsible for freeing
  /// it. Nothing here can check that.
  pub unsafe fn wrap_aligned(
    address: *mut u8,
    size: usize,
    alignment: usize,
  ) -> Result<Self> {
    if address.is_null() {
      return Err(MemoryError::invalid_argument("address is null"));
    }
    check_size_and_alignment(size, alignment)?;

    Ok(Self {
      address,
      byte_size: size,
      alignment,
      owns_memory: false,
      mutable: true,
    })
  }

  /// Resizes the block, keeping its alignment.
  pub fn reallocate(
    &mut self,
    new_size: usize,
  ) -> Result<&mut Self> {
    self.reallocate_aligned(new_size, self.alignment)
  }

  /// Moves the block's contents into a fresh allocation of `new_size` bytes
  /// aligned to `new_alignment`.
  ///
  /// The first `min(byte_size, new_size)` bytes are preserved and the rest of
  /// a grown block is zeroed. The block always owns its memory afterwards: a
  /// wrapped region is copied out and left untouched, and the block no longer
  /// aliases it.
  pub fn reallocate_aligned(
    &mut self,
    new_size: usize,
    new_alignment: usize,
  ) -> Result<&mut Self> {
    self.check_mutable()?;

    if new_size == self.byte_size && new_alignment == self.alignment {
      return Ok(self);
    }
    check_size_and_alignment(new_size, new_alignment)?;

    let new_address = aligned::allocate(new_size, new_alignment)?;

    if !self.address.is_null() && self.byte_size > 0 {
      unsafe {
        ptr::copy_nonoverlapping(
          self.address,
          new_address,
          self.byte_size.min(new_size),
        );
      }
    }

    if !self.address.is_null() {
      if self.owns_memory {
        unsafe { aligned::release(self.address)? };
      } else {
        warn!(
          "realloc called on unowned pointer {:?} -- allocating new block and copying contents ({} bytes), but original block will not be freed",
          self.address, self.byte_size
        );
      }
    }

    self.address = new_address;
    self.byte_size = new_size;
    self.alignment = new_alignment;
    self.owns_memory = true;

    Ok(self)
  }

  /// Releases owned memory and leaves the block null with a size of zero.
  ///
  /// A borrowed block is only detached from its region. Freeing a null block
  /// is reported as [`MemoryError::DoubleFree`].
  pub fn free(&mut self) -> Result<&mut Self> {
    self.check_mutable()?;

    if self.address.is_null() {
      return Err(MemoryError::DoubleFree);
    }

    if self.owns_memory {
      unsafe { aligned::release(self.address)? };
    }

    self.address = ptr::null_mut();
    self.byte_size = 0;
    self.owns_memory = false;

    Ok(self)
  }

  /// Allocates a new owned block with the same size and alignment and copies
  /// every byte into it.
  pub fn duplicate(&self) -> Result<Self> {
    self.check_not_null()?;

    let mut copy = Self::allocate_aligned(self.byte_size, self.alignment)?;
    copy.copy_from(self.into(), 0, 0, Some(self.byte_size))?;

    Ok(copy)
  }

  /// Clears the mutable flag. There is no way back.
  pub fn freeze(&mut self) -> &mut Self {
    self.mutable = false;
    self
  }

  pub fn is_frozen(&self) -> bool {
    !self.mutable
  }

  pub fn address(&self) -> *mut u8 {
    self.address
  }

  pub fn byte_size(&self) -> usize {
    self.byte_size
  }

  pub fn alignment(&self) -> usize {
    self.alignment
  }

  pub fn owns_memory(&self) -> bool {
    self.owns_memory
  }

  pub fn is_null(&self) -> bool {
    self.address.is_null()
  }

  pub(crate) fn check_not_null(&self) -> Result<()> {
    if self.address.is_null() {
      return Err(MemoryError::NullBlock);
    }
    Ok(())
  }

  pub(crate) fn check_mutable(&self) -> Result<()> {
    if !self.mutable {
      return Err(MemoryError::Frozen);
    }
    Ok(())
  }

  /// Fails unless `[offset, offset + length)` lies inside the block.
  pub(crate) fn check_bounds(
    &self,
    offset: usize,
    length: usize,
  ) -> Result<()> {
    let in_bounds = offset < self.byte_size
      && offset
        .checked_add(length)
        .is_some_and(|end| end <= self.byte_size);

    if !in_bounds {
      return Err(MemoryError::out_of_bounds(offset, length, self.byte_size));
    }
    Ok(())
  }
}

fn check_size_and_alignment(
  size: usize,
  alignment: usize,
) -> Result<()> {
  if !is_power_of_two(alignment) {
    return Err(MemoryError::invalid_argument(format!(
      "alignment must be a power of two -- {alignment} is not a power of two"
    )));
  }
  if size < 1 {
    return Err(MemoryError::invalid_argument(
      "size of block must be 1 or more -- zero-byte blocks are not permitted",
    ));
  }
  Ok(())
}

impl Drop for MemoryBlock {
  fn drop(&mut self) {
    if self.owns_memory && !self.address.is_null() {
      if let Err(err) = unsafe { aligned::release(self.address) } {
        error!("Failed to release block {:?}: {}", self.address, err);
      }
      self.address = ptr::null_mut();
    }
  }
}

/// Blocks are equal when they view the same region: same address, same size.
impl PartialEq for MemoryBlock {
  fn eq(
    &self,
    other: &Self,
  ) -> bool {
    self.address == other.address && self.byte_size == other.byte_size
  }
}

impl Eq for MemoryBlock {}

impl fmt::Debug for MemoryBlock {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("MemoryBlock")
      .field("address", &self.address)
      .field("byte_size", &self.byte_size)
      .field("alignment", &self.alignment)
      .field("owns_memory", &self.owns_memory)
      .field("mutable", &self.mutable)
      .finish()
  }
}

impl fmt::Display for MemoryBlock {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "<MemoryBlock *0x{:014x}:{}:{}>",
      self.address as usize, self.byte_size, self.alignment
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use proptest::prelude::*;

  fn bytes(block: &MemoryBlock) -> Vec<u8> {
    (0..block.byte_size())
      .map(|offset| block.get_uint8(offset).unwrap())
      .collect()
  }

  fn fill(
    block: &mut MemoryBlock,
    pattern: &[u8],
  ) {
    for (offset, byte) in pattern.iter().enumerate() {
      block.set_uint8(offset, *byte).unwrap();
    }
  }

  #[test]
  fn test_allocate() {
    let block = MemoryBlock::allocate(32).unwrap();

    assert!(!block.is_null());
    assert!(block.owns_memory());
    assert!(!block.is_frozen());
    assert_eq!(block.byte_size(), 32);
    assert_eq!(block.alignment(), DEFAULT_ALIGNMENT);
    assert!(bytes(&block).iter().all(|byte| *byte == 0));
  }

  #[test]
  fn test_allocate_alignment() {
    for alignment in [1, 2, 4, 8, 16, 4096] {
      let block = MemoryBlock::allocate_aligned(3, alignment).unwrap();
      assert_eq!(block.address() as usize % alignment, 0);
      assert_eq!(block.alignment(), alignment);
    }

    let error = MemoryBlock::allocate_aligned(16, 3).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
  }

  #[test]
  fn test_zero_size_rejected() {
    let error = MemoryBlock::allocate(0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);

    let mut storage = [0u8; 4];
    let error = unsafe { MemoryBlock::wrap(storage.as_mut_ptr(), 0) }.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
  }

  #[test]
  fn test_wrap() {
    let mut storage = [7u8; 8];
    let block = unsafe { MemoryBlock::wrap_aligned(storage.as_mut_ptr(), 8, 1) }.unwrap();

    assert!(!block.owns_memory());
    assert_eq!(block.address(), storage.as_mut_ptr());
    assert_eq!(bytes(&block), vec![7u8; 8]);

    let error = unsafe { MemoryBlock::wrap(ptr::null_mut(), 8) }.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
  }

  #[test]
  fn test_double_free() {
    let mut block = MemoryBlock::allocate(8).unwrap();

    block.free().unwrap();
    assert!(block.is_null());
    assert_eq!(block.byte_size(), 0);

    let error = block.free().unwrap_err();
    assert_eq!(error, MemoryError::DoubleFree);
  }

  #[test]
  fn test_free_borrowed_leaves_storage() {
    let mut storage = [1u8, 2, 3, 4];
    let mut block = unsafe { MemoryBlock::wrap(storage.as_mut_ptr(), 4) }.unwrap();

    block.free().unwrap();

    assert!(block.is_null());
    assert_eq!(block.get_uint8(0).unwrap_err(), MemoryError::NullBlock);
    assert_eq!(storage, [1, 2, 3, 4]);
  }

  #[test]
  fn test_realloc_preserves_prefix() {
    let mut block = MemoryBlock::allocate(8).unwrap();
    fill(&mut block, &[1, 2, 3, 4, 5, 6, 7, 8]);

    block.reallocate(16).unwrap();

    assert_eq!(block.byte_size(), 16);
    let contents = bytes(&block);
    assert_eq!(&contents[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&contents[8..], &[0u8; 8]);
  }

  #[test]
  fn test_realloc_owned_repeatedly() {
    let mut block = MemoryBlock::allocate_aligned(4, 8).unwrap();
    block.set_uint32(0, 0xC0FFEE).unwrap();

    for (size, alignment) in [(8, 8), (64, 64), (4, 4096), (32, 2), (4, 8)] {
      block.reallocate_aligned(size, alignment).unwrap();

      assert!(block.owns_memory());
      assert_eq!(block.alignment(), alignment);
      assert_eq!(block.address() as usize % alignment, 0);
      assert_eq!(block.get_uint32(0), Ok(0xC0FFEE));
    }
  }

  #[test]
  fn test_realloc_shrink_truncates() {
    let mut block = MemoryBlock::allocate(16).unwrap();
    fill(&mut block, &(0..16).collect::<Vec<u8>>());

    block.reallocate(4).unwrap();

    assert_eq!(bytes(&block), vec![0, 1, 2, 3]);
  }

  #[test]
  fn test_realloc_same_size_is_noop() {
    let mut block = MemoryBlock::allocate(8).unwrap();
    let address = block.address();

    block.reallocate(8).unwrap();
    assert_eq!(block.address(), address);

    block.reallocate_aligned(8, 64).unwrap();
    assert_eq!(block.alignment(), 64);
    assert_eq!(block.address() as usize % 64, 0);
  }

  #[test]
  fn test_realloc_rejects_invalid_arguments() {
    let mut block = MemoryBlock::allocate(8).unwrap();
    let address = block.address();

    assert_eq!(block.reallocate(0).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(
      block.reallocate_aligned(8, 12).unwrap_err().kind(),
      ErrorKind::InvalidArgument
    );
    assert_eq!(block.address(), address);
    assert_eq!(block.byte_size(), 8);
  }

  #[test]
  fn test_realloc_borrowed_becomes_owned() {
    let mut storage = [9u8, 8, 7, 6];
    let mut block = unsafe { MemoryBlock::wrap(storage.as_mut_ptr(), 4) }.unwrap();

    block.reallocate(6).unwrap();

    assert!(block.owns_memory());
    assert_ne!(block.address(), storage.as_mut_ptr());
    assert_eq!(bytes(&block), vec![9, 8, 7, 6, 0, 0]);

    // The block no longer aliases the wrapped storage.
    block.set_uint8(0, 1).unwrap();
    assert_eq!(storage[0], 9);
  }

  #[test]
  fn test_realloc_after_free() {
    let mut block = MemoryBlock::allocate(4).unwrap();
    block.free().unwrap();

    block.reallocate(8).unwrap();

    assert!(!block.is_null());
    assert!(block.owns_memory());
    assert_eq!(bytes(&block), vec![0u8; 8]);
  }

  #[test]
  fn test_frozen_rejects_mutation() {
    let mut block = MemoryBlock::allocate(8).unwrap();
    block.set_int32(0, 42).unwrap();
    block.freeze();

    assert!(block.is_frozen());
    assert_eq!(block.set_int32(0, 1).unwrap_err(), MemoryError::Frozen);
    assert_eq!(block.reallocate(16).unwrap_err(), MemoryError::Frozen);
    assert_eq!(block.free().unwrap_err(), MemoryError::Frozen);

    let source = MemoryBlock::allocate(8).unwrap();
    assert_eq!(
      block.copy_from((&source).into(), 0, 0, None).unwrap_err(),
      MemoryError::Frozen
    );

    assert_eq!(block.get_int32(0), Ok(42));
  }

  #[test]
  fn test_duplicate() {
    let mut block = MemoryBlock::allocate_aligned(6, 16).unwrap();
    fill(&mut block, b"snow\0!");
    block.freeze();

    let copy = block.duplicate().unwrap();

    assert_ne!(copy.address(), block.address());
    assert_ne!(copy, block);
    assert_eq!(copy.alignment(), 16);
    assert!(copy.owns_memory());
    assert!(!copy.is_frozen());
    assert_eq!(bytes(&copy), b"snow\0!".to_vec());
  }

  #[test]
  fn test_equality() {
    let mut storage = [0u8; 8];
    let first = unsafe { MemoryBlock::wrap(storage.as_mut_ptr(), 8) }.unwrap();
    let second = unsafe { MemoryBlock::wrap_aligned(storage.as_mut_ptr(), 8, 1) }.unwrap();
    let shorter = unsafe { MemoryBlock::wrap(storage.as_mut_ptr(), 4) }.unwrap();

    assert_eq!(first, second);
    assert_ne!(first, shorter);
  }

  #[test]
  fn test_display() {
    let mut block = MemoryBlock::allocate_aligned(4, 2).unwrap();
    let text = block.to_string();

    assert!(text.starts_with("<MemoryBlock *0x"));
    assert!(text.ends_with(":4:2>"));

    block.free().unwrap();
    assert_eq!(block.to_string(), "<MemoryBlock *0x00000000000000:0:2>");
  }

  proptest! {
    #[test]
    fn allocations_are_aligned(size in 1usize..512, shift in 0u32..13) {
      let alignment = 1usize << shift;
      let block = MemoryBlock::allocate_aligned(size, alignment).unwrap();
      prop_assert_eq!(block.address() as usize % alignment, 0);
      prop_assert_eq!(block.byte_size(), size);
    }
  }
}
