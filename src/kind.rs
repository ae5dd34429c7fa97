use std::{fmt, str::FromStr};

use libc::{
  c_char, c_int, c_long, c_longlong, c_schar, c_short, c_uchar, c_uint, c_ulong, c_ulonglong,
  c_ushort, intptr_t, ptrdiff_t, size_t, uintptr_t,
};

use crate::{
  block::MemoryBlock,
  error::{MemoryError, Result},
  scalar::*,
};

/// A host-neutral number read from or written to a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
  Int(i64),
  UInt(u64),
  Float(f64),
}

impl From<i64> for ScalarValue {
  fn from(value: i64) -> Self {
    ScalarValue::Int(value)
  }
}

impl From<u64> for ScalarValue {
  fn from(value: u64) -> Self {
    ScalarValue::UInt(value)
  }
}

impl From<f64> for ScalarValue {
  fn from(value: f64) -> Self {
    ScalarValue::Float(value)
  }
}

impl ScalarValue {
  fn as_i64(self) -> i64 {
    match self {
      ScalarValue::Int(value) => value,
      ScalarValue::UInt(value) => value as i64,
      ScalarValue::Float(value) => value as i64,
    }
  }

  fn as_u64(self) -> u64 {
    match self {
      ScalarValue::Int(value) => value as u64,
      ScalarValue::UInt(value) => value,
      ScalarValue::Float(value) => value as u64,
    }
  }

  fn as_f64(self) -> f64 {
    match self {
      ScalarValue::Int(value) => value as f64,
      ScalarValue::UInt(value) => value as f64,
      ScalarValue::Float(value) => value,
    }
  }
}

macro_rules! scalar_kinds {
  ($(
    $variant:ident, $name:literal, [$($alias:literal),*], $size:expr, $class:ident,
    $get:ident, $set:ident, $ty:ty;
  )*) => {
    /// Every scalar kind a block can read and write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ScalarKind {
      $($variant,)*
    }

    impl ScalarKind {
      pub const ALL: &'static [ScalarKind] = &[$(ScalarKind::$variant,)*];

      /// Size in bytes.
      pub const fn size(self) -> usize {
        match self {
          $(ScalarKind::$variant => $size,)*
        }
      }

      /// Canonical C name, e.g. `uint32_t` or `unsigned_long`.
      pub const fn name(self) -> &'static str {
        match self {
          $(ScalarKind::$variant => $name,)*
        }
      }

      /// Looks a kind up by canonical name or short alias.
      pub fn from_name(name: &str) -> Option<ScalarKind> {
        match name {
          $($name $(| $alias)* => Some(ScalarKind::$variant),)*
          "*" => Some(ScalarKind::Intptr),
          _ => None,
        }
      }

      /// Narrows `value` to this kind the way a store would.
      pub fn narrow(
        self,
        value: ScalarValue,
      ) -> ScalarValue {
        match self {
          $(ScalarKind::$variant => scalar_kinds!(@narrow $class, $ty, value),)*
        }
      }
    }

    impl MemoryBlock {
      /// Reads a value of `kind` at `offset`.
      pub fn get_value(
        &self,
        kind: ScalarKind,
        offset: usize,
      ) -> Result<ScalarValue> {
        match kind {
          $(ScalarKind::$variant => {
            let value = self.$get(offset)?;
            Ok(scalar_kinds!(@wrap $class, value))
          })*
        }
      }

      /// Narrows `value` to `kind`, writes it at `offset` and returns what was
      /// stored.
      pub fn set_value(
        &mut self,
        kind: ScalarKind,
        offset: usize,
        value: ScalarValue,
      ) -> Result<ScalarValue> {
        match kind {
          $(ScalarKind::$variant => {
            let stored = self.$set(offset, scalar_kinds!(@unwrap $class, $ty, value))?;
            Ok(scalar_kinds!(@wrap $class, stored))
          })*
        }
      }
    }
  };

  (@unwrap signed, $ty:ty, $value:expr) => { $value.as_i64() as $ty };
  (@unwrap unsigned, $ty:ty, $value:expr) => { $value.as_u64() as $ty };
  (@unwrap float, $ty:ty, $value:expr) => { $value.as_f64() as $ty };

  (@wrap signed, $value:expr) => { ScalarValue::Int($value as i64) };
  (@wrap unsigned, $value:expr) => { ScalarValue::UInt($value as u64) };
  (@wrap float, $value:expr) => { ScalarValue::Float($value as f64) };

  (@narrow $class:ident, $ty:ty, $value:expr) => {{
    let narrowed: $ty = scalar_kinds!(@unwrap $class, $ty, $value);
    scalar_kinds!(@wrap $class, narrowed)
  }};
}

scalar_kinds! {
  Char, "char", ["c"], SIZEOF_CHAR, signed, get_char, set_char, c_char;
  SignedChar, "signed_char", ["sc"], SIZEOF_SIGNED_CHAR, signed, get_signed_char, set_signed_char, c_schar;
  UnsignedChar, "unsigned_char", ["uc"], SIZEOF_UNSIGNED_CHAR, unsigned, get_unsigned_char, set_unsigned_char, c_uchar;
  Int8, "int8_t", ["i8"], SIZEOF_INT8, signed, get_int8, set_int8, i8;
  Uint8, "uint8_t", ["ui8"], SIZEOF_UINT8, unsigned, get_uint8, set_uint8, u8;
  Short, "short", ["s"], SIZEOF_SHORT, signed, get_short, set_short, c_short;
  UnsignedShort, "unsigned_short", ["us"], SIZEOF_UNSIGNED_SHORT, unsigned, get_unsigned_short, set_unsigned_short, c_ushort;
  Int16, "int16_t", ["i16"], SIZEOF_INT16, signed, get_int16, set_int16, i16;
  Uint16, "uint16_t", ["ui16"], SIZEOF_UINT16, unsigned, get_uint16, set_uint16, u16;
  Int32, "int32_t", ["i32"], SIZEOF_INT32, signed, get_int32, set_int32, i32;
  Uint32, "uint32_t", ["ui32"], SIZEOF_UINT32, unsigned, get_uint32, set_uint32, u32;
  Int64, "int64_t", ["i64"], SIZEOF_INT64, signed, get_int64, set_int64, i64;
  Uint64, "uint64_t", ["ui64"], SIZEOF_UINT64, unsigned, get_uint64, set_uint64, u64;
  Int, "int", ["i"], SIZEOF_INT, signed, get_int, set_int, c_int;
  UnsignedInt, "unsigned_int", ["ui"], SIZEOF_UNSIGNED_INT, unsigned, get_unsigned_int, set_unsigned_int, c_uint;
  Long, "long", ["l"], SIZEOF_LONG, signed, get_long, set_long, c_long;
  UnsignedLong, "unsigned_long", ["ul"], SIZEOF_UNSIGNED_LONG, unsigned, get_unsigned_long, set_unsigned_long, c_ulong;
  LongLong, "long_long", ["ll"], SIZEOF_LONG_LONG, signed, get_long_long, set_long_long, c_longlong;
  UnsignedLongLong, "unsigned_long_long", ["ull"], SIZEOF_UNSIGNED_LONG_LONG, unsigned, get_unsigned_long_long, set_unsigned_long_long, c_ulonglong;
  Float, "float", ["f"], SIZEOF_FLOAT, float, get_float, set_float, f32;
  Double, "double", ["d"], SIZEOF_DOUBLE, float, get_double, set_double, f64;
  Size, "size_t", ["zu"], SIZEOF_SIZE, unsigned, get_size, set_size, size_t;
  Ptrdiff, "ptrdiff_t", ["td"], SIZEOF_PTRDIFF, signed, get_ptrdiff, set_ptrdiff, ptrdiff_t;
  Intptr, "intptr_t", ["ip"], SIZEOF_INTPTR, signed, get_intptr, set_intptr, intptr_t;
  Uintptr, "uintptr_t", ["uip"], SIZEOF_UINTPTR, unsigned, get_uintptr, set_uintptr, uintptr_t;
}

impl ScalarKind {
  /// Natural alignment, equal to the size for every scalar kind.
  pub const fn alignment(self) -> usize {
    self.size()
  }
}

impl fmt::Display for ScalarKind {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ScalarKind {
  type Err = MemoryError;

  fn from_str(name: &str) -> Result<Self> {
    ScalarKind::from_name(name)
      .ok_or_else(|| MemoryError::invalid_argument(format!("unknown scalar type '{name}'")))
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;
  use crate::error::ErrorKind;

  #[test]
  fn test_catalogue() {
    assert_eq!(ScalarKind::ALL.len(), 25);

    for kind in ScalarKind::ALL {
      assert_eq!(ScalarKind::from_name(kind.name()), Some(*kind));
      assert!(kind.size() >= 1);
      assert_eq!(kind.alignment(), kind.size());
    }

    assert_eq!(ScalarKind::from_name("ull"), Some(ScalarKind::UnsignedLongLong));
    assert_eq!(ScalarKind::from_name("*"), Some(ScalarKind::Intptr));
    assert_eq!(ScalarKind::from_name("zu").map(ScalarKind::size), Some(SIZEOF_VOID_POINTER));
    assert_eq!(ScalarKind::from_name("quad"), None);
    assert_eq!(
      "quad".parse::<ScalarKind>().unwrap_err().kind(),
      ErrorKind::InvalidArgument
    );
    assert_eq!(ScalarKind::Uint16.to_string(), "uint16_t");
  }

  #[test]
  fn test_narrow() {
    assert_eq!(ScalarKind::Int8.narrow(ScalarValue::Int(300)), ScalarValue::Int(44));
    assert_eq!(ScalarKind::Int8.narrow(ScalarValue::Int(-129)), ScalarValue::Int(127));
    assert_eq!(ScalarKind::Uint8.narrow(ScalarValue::Int(-1)), ScalarValue::UInt(255));
    assert_eq!(ScalarKind::Uint16.narrow(ScalarValue::UInt(0x1_0001)), ScalarValue::UInt(1));
    assert_eq!(ScalarKind::Int32.narrow(ScalarValue::Float(-7.9)), ScalarValue::Int(-7));
    assert_eq!(
      ScalarKind::Float.narrow(ScalarValue::Float(0.1)),
      ScalarValue::Float(0.1f32 as f64)
    );
    assert_eq!(ScalarKind::Double.narrow(ScalarValue::Int(3)), ScalarValue::Float(3.0));
  }

  #[test]
  fn test_set_value_returns_stored() {
    let mut block = MemoryBlock::allocate(16).unwrap();

    for kind in ScalarKind::ALL {
      let value = ScalarValue::Int(-2);
      let stored = block.set_value(*kind, 0, value).unwrap();
      assert_eq!(stored, kind.narrow(value));
      assert_eq!(block.get_value(*kind, 0).unwrap(), stored);
    }

    assert_eq!(
      block.set_value(ScalarKind::Int16, 3, 70000i64.into()),
      Ok(ScalarValue::Int(4464))
    );
    assert_eq!(block.get_int16(3), Ok(4464));
  }

  #[test]
  fn test_value_bounds() {
    let mut block = MemoryBlock::allocate(4).unwrap();

    assert_eq!(
      block.get_value(ScalarKind::Double, 0).unwrap_err().kind(),
      ErrorKind::OutOfBounds
    );
    assert_eq!(
      block
        .set_value(ScalarKind::Uint32, 1, 1u64.into())
        .unwrap_err()
        .kind(),
      ErrorKind::OutOfBounds
    );
  }

  proptest! {
    #[test]
    fn every_kind_round_trips_up_to_the_last_offset(
      size in 8usize..64,
      position in any::<prop::sample::Index>(),
      raw in any::<i64>()
    ) {
      let mut block = MemoryBlock::allocate(size).unwrap();
      let value = ScalarValue::Int(raw);

      for kind in ScalarKind::ALL {
        let last = size - kind.size();

        for offset in [position.index(last + 1), last] {
          let stored = block.set_value(*kind, offset, value).unwrap();
          prop_assert_eq!(stored, kind.narrow(value));
          prop_assert_eq!(block.get_value(*kind, offset), Ok(stored));
        }

        prop_assert_eq!(
          block.get_value(*kind, last + 1).unwrap_err().kind(),
          ErrorKind::OutOfBounds
        );
        prop_assert_eq!(
          block.set_value(*kind, last + 1, value).unwrap_err().kind(),
          ErrorKind::OutOfBounds
        );
      }
    }
  }
}
