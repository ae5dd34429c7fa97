use std::{mem, slice};

use libc::{
  c_char, c_int, c_long, c_longlong, c_schar, c_short, c_uchar, c_uint, c_ulong, c_ulonglong,
  c_ushort, intptr_t, ptrdiff_t, size_t, uintptr_t,
};
use paste::paste;

use crate::{block::MemoryBlock, error::Result};

/// A fixed-width value that can be decoded from and encoded into raw bytes
/// in native byte order.
pub(crate) trait Scalar: Copy {
  const SIZE: usize = mem::size_of::<Self>();

  /// Decodes a value from the first `SIZE` bytes of `bytes`.
  fn decode(bytes: &[u8]) -> Self;

  /// Encodes the value into the first `SIZE` bytes of `bytes`.
  fn encode(
    self,
    bytes: &mut [u8],
  );
}

macro_rules! impl_scalar {
  ($($ty:ty),* $(,)?) => {
    $(
      impl Scalar for $ty {
        #[inline]
        fn decode(bytes: &[u8]) -> Self {
          let mut raw = [0u8; mem::size_of::<$ty>()];
          raw.copy_from_slice(&bytes[..Self::SIZE]);
          <$ty>::from_ne_bytes(raw)
        }

        #[inline]
        fn encode(
          self,
          bytes: &mut [u8],
        ) {
          bytes[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
        }
      }
    )*
  };
}

impl_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64);

impl MemoryBlock {
  /// Bounds-checked read of a `T` at `offset`. Unaligned offsets are allowed.
  pub(crate) fn read<T: Scalar>(
    &self,
    offset: usize,
  ) -> Result<T> {
    self.check_not_null()?;
    self.check_bounds(offset, T::SIZE)?;

    let bytes = unsafe { slice::from_raw_parts(self.address().add(offset), T::SIZE) };
    Ok(T::decode(bytes))
  }

  /// Bounds-checked write of a `T` at `offset`. Returns the stored value.
  pub(crate) fn write<T: Scalar>(
    &mut self,
    offset: usize,
    value: T,
  ) -> Result<T> {
    self.check_not_null()?;
    self.check_mutable()?;
    self.check_bounds(offset, T::SIZE)?;

    let bytes = unsafe { slice::from_raw_parts_mut(self.address().add(offset), T::SIZE) };
    value.encode(bytes);
    Ok(value)
  }
}

/// Size in bytes of a pointer, and the default block alignment.
pub const SIZEOF_VOID_POINTER: usize = mem::size_of::<*const u8>();

macro_rules! scalar_accessors {
  ($($name:ident: $ty:ty => $c_name:tt,)*) => {
    paste! {
      $(
        #[doc = "Size in bytes of a `" $c_name "`."]
        pub const [<SIZEOF_ $name:upper>]: usize = mem::size_of::<$ty>();
      )*

      impl MemoryBlock {
        $(
          #[doc = "Reads a `" $c_name "` at `offset` in native byte order."]
          pub fn [<get_ $name>](
            &self,
            offset: usize,
          ) -> Result<$ty> {
            self.read::<$ty>(offset)
          }

          #[doc = "Writes a `" $c_name "` at `offset` and returns the stored value."]
          pub fn [<set_ $name>](
            &mut self,
            offset: usize,
            value: $ty,
          ) -> Result<$ty> {
            self.write::<$ty>(offset, value)
          }
        )*
      }
    }
  };
}

scalar_accessors! {
  int8: i8 => "int8_t",
  uint8: u8 => "uint8_t",
  int16: i16 => "int16_t",
  uint16: u16 => "uint16_t",
  int32: i32 => "int32_t",
  uint32: u32 => "uint32_t",
  int64: i64 => "int64_t",
  uint64: u64 => "uint64_t",
  size: size_t => "size_t",
  ptrdiff: ptrdiff_t => "ptrdiff_t",
  intptr: intptr_t => "intptr_t",
  uintptr: uintptr_t => "uintptr_t",
  int: c_int => "int",
  unsigned_int: c_uint => "unsigned int",
  short: c_short => "short",
  unsigned_short: c_ushort => "unsigned short",
  long: c_long => "long",
  unsigned_long: c_ulong => "unsigned long",
  long_long: c_longlong => "long long",
  unsigned_long_long: c_ulonglong => "unsigned long long",
  float: f32 => "float",
  double: f64 => "double",
  char: c_char => "char",
  signed_char: c_schar => "signed char",
  unsigned_char: c_uchar => "unsigned char",
}
