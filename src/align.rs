use crate::error::{MemoryError, Result};

/// Default alignment of a block: the width of a pointer.
pub const DEFAULT_ALIGNMENT: usize = core::mem::size_of::<usize>();

/// Rounds a size up to the machine word alignment.
///
/// # Examples
///
/// ```rust
/// use snowmem::align;
///
/// match core::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds a size up to the given power-of-two alignment.
///
/// ```rust
/// use snowmem::align_to;
///
/// assert_eq!(align_to!(17, 16), 32);
/// assert_eq!(align_to!(32, 16), 32);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// Returns true if `n` is a non-zero power of two. One counts.
#[inline]
pub const fn is_power_of_two(n: usize) -> bool {
  n != 0 && (n & (n - 1)) == 0
}

/// Rounds `size` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two; the result is meaningless otherwise.
/// Wraps on overflow like the underlying bit trick, use [`checked_align_up`]
/// when `size` comes from outside.
#[inline]
pub const fn align_up(
  size: usize,
  alignment: usize,
) -> usize {
  debug_assert!(is_power_of_two(alignment));
  size.wrapping_add(alignment - 1) & !(alignment - 1)
}

/// Like [`align_up`] but returns `None` instead of wrapping.
#[inline]
pub const fn checked_align_up(
  size: usize,
  alignment: usize,
) -> Option<usize> {
  match size.checked_add(alignment - 1) {
    Some(padded) => Some(padded & !(alignment - 1)),
    None => None,
  }
}

/// Rounds a pointer up to the next multiple of `alignment`. In most cases
/// this results in no change.
#[inline]
pub fn align_ptr(
  ptr: *mut u8,
  alignment: usize,
) -> *mut u8 {
  let address = ptr as usize;
  let padding = align_up(address, alignment).wrapping_sub(address);
  ptr.wrapping_add(padding)
}

/// Aligns a size or offset to `alignment`, the validated form of
/// [`align_up`]. Used to pre-compute padded struct sizes before allocating.
///
/// ```rust
/// use snowmem::{align_size, DEFAULT_ALIGNMENT};
///
/// assert_eq!(align_size(3, 4).unwrap(), 4);
/// assert_eq!(align_size(5, 1).unwrap(), 5);
/// assert!(align_size(5, 3).is_err());
/// assert_eq!(align_size(1, DEFAULT_ALIGNMENT).unwrap(), DEFAULT_ALIGNMENT);
/// ```
pub fn align_size(
  size: usize,
  alignment: usize,
) -> Result<usize> {
  if !is_power_of_two(alignment) {
    return Err(MemoryError::invalid_argument(format!(
      "alignment must be a power of two -- {alignment} is not a power of two"
    )));
  }

  checked_align_up(size, alignment).ok_or_else(|| {
    MemoryError::invalid_argument(format!(
      "size {size} overflows when aligned to {alignment}"
    ))
  })
}
