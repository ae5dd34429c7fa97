use std::mem;

use libc::{c_void, calloc, free};
use log::trace;

use crate::{
  align::{align_ptr, checked_align_up, is_power_of_two},
  error::{MemoryError, Result},
};

/// Width of the back-pointer slot stored in front of every aligned pointer.
const BACK_POINTER_SIZE: usize = mem::size_of::<*mut c_void>();

/// Computes how many bytes must be requested from the heap so that an
/// aligned region of `size` bytes, preceded by its back-pointer, always fits.
///
/// The region is `align_up(size + pointer_width, alignment)` plus the largest
/// shift `align_ptr` can apply to the base pointer.
pub fn padded_size(
  size: usize,
  alignment: usize,
) -> Option<usize> {
  let with_header = size.checked_add(BACK_POINTER_SIZE)?;
  checked_align_up(with_header, alignment)?.checked_add(alignment - 1)
}

/// Allocates `size` zeroed bytes aligned to `alignment`.
///
/// ```text
///   base (from calloc)          aligned (returned)
///   │                           │
///   ▼                           ▼
///   ┌──────────┬────────────────┬──────────────────────────┬───────┐
///   │ padding  │ back-pointer   │   size usable bytes      │ slack │
///   │          │ (= base)       │                          │       │
///   └──────────┴────────────────┴──────────────────────────┴───────┘
/// ```
///
/// The original base pointer is stored in the pointer-width slot right before
/// the returned pointer so that [`release`] can recover it.
pub fn allocate(
  size: usize,
  alignment: usize,
) -> Result<*mut u8> {
  if !is_power_of_two(alignment) {
    return Err(MemoryError::invalid_argument(format!(
      "alignment must be a power of two -- {alignment} is not a power of two"
    )));
  }

  let padded = padded_size(size, alignment).ok_or(MemoryError::OutOfMemory {
    requested: size,
    padded: usize::MAX,
  })?;

  let base = unsafe { calloc(padded, 1) } as *mut u8;

  if base.is_null() {
    return Err(MemoryError::OutOfMemory {
      requested: size,
      padded,
    });
  }

  let aligned = align_ptr(base.wrapping_add(BACK_POINTER_SIZE), alignment);

  unsafe {
    let slot = aligned.sub(BACK_POINTER_SIZE) as *mut *mut u8;
    slot.write_unaligned(base);
  }

  trace!(
    "Allocated block {:?} with padded size {} (requested: {} aligned to {} bytes), returning aligned pointer {:?}",
    base, padded, size, alignment, aligned
  );

  Ok(aligned)
}

/// Releases memory returned by [`allocate`].
///
/// # Safety
///
/// `aligned` must be null or a pointer previously returned by [`allocate`]
/// that has not been released yet. Any other pointer is undefined behavior.
pub unsafe fn release(aligned: *mut u8) -> Result<()> {
  if aligned.is_null() {
    return Err(MemoryError::InvalidFree);
  }

  unsafe {
    let base = read_back_pointer(aligned);

    trace!(
      "Deallocating aligned pointer {:?} with underlying pointer {:?}",
      aligned, base
    );

    free(base as *mut c_void);
  }

  Ok(())
}

unsafe fn read_back_pointer(aligned: *mut u8) -> *mut u8 {
  unsafe { (aligned.sub(BACK_POINTER_SIZE) as *const *mut u8).read_unaligned() }
}
