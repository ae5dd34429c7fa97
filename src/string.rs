use std::{ptr, slice};

use crate::{block::MemoryBlock, error::Result};

/// How many bytes [`MemoryBlock::get_string`] extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringLength {
  /// Up to the first zero byte or the end of the block.
  #[default]
  Auto,
  /// Everything from the offset to the end of the block.
  All,
  /// At most this many bytes, clamped to the end of the block.
  Exact(usize),
}

impl MemoryBlock {
  /// Copies bytes out of the block starting at `offset`.
  ///
  /// An offset at or past the end yields an empty vector. Explicit lengths
  /// that run past the end are clamped, never rejected.
  pub fn get_string(
    &self,
    offset: usize,
    length: StringLength,
  ) -> Result<Vec<u8>> {
    self.check_not_null()?;

    let byte_size = self.byte_size();
    if offset >= byte_size {
      return Ok(Vec::new());
    }

    let tail = unsafe { self.tail(offset) };
    let length = match length {
      StringLength::Auto => tail.iter().position(|byte| *byte == 0).unwrap_or(tail.len()),
      StringLength::All => tail.len(),
      StringLength::Exact(length) => length.min(tail.len()),
    };

    Ok(tail[..length].to_vec())
  }

  /// Copies `bytes` into the block at `offset`, truncating to fit.
  ///
  /// With `null_terminate`, one byte is reserved for a trailing zero which is
  /// always written when anything fits, so `bytes.len() + 1` bytes must be
  /// available to store the whole input. An offset with no room left is a
  /// no-op. Returns `bytes`.
  pub fn set_string<'a>(
    &mut self,
    offset: usize,
    bytes: &'a [u8],
    null_terminate: bool,
  ) -> Result<&'a [u8]> {
    self.check_not_null()?;
    self.check_mutable()?;

    let writable = self.byte_size() - usize::from(null_terminate);
    if offset >= writable {
      return Ok(bytes);
    }

    let count = bytes.len().min(writable - offset);

    unsafe {
      let destination = self.address().add(offset);
      ptr::copy(bytes.as_ptr(), destination, count);
      if null_terminate {
        destination.add(count).write(0);
      }
    }

    Ok(bytes)
  }

  /// Returns the block's contents, stopping before the first zero byte when
  /// `null_terminated` is set.
  pub fn to_bytes(
    &self,
    null_terminated: bool,
  ) -> Result<Vec<u8>> {
    let length = if null_terminated {
      StringLength::Auto
    } else {
      StringLength::All
    };
    self.get_string(0, length)
  }

  /// # Safety
  ///
  /// The block must be non-null and `offset < byte_size`.
  unsafe fn tail(
    &self,
    offset: usize,
  ) -> &[u8] {
    unsafe { slice::from_raw_parts(self.address().add(offset), self.byte_size() - offset) }
  }
}
