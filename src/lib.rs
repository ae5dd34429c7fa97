//! # snowmem - Bounds-Checked Views Over Raw Memory
//!
//! This crate wraps raw, alignment-controlled memory in a [`MemoryBlock`]
//! that checks every access against its size and tracks whether it owns the
//! memory it points to. It is meant for code that has to alias foreign
//! memory (C structs, hardware buffers, interop regions) without writing
//! pointer arithmetic by hand.
//!
//! ## Overview
//!
//! Two layers, the second built only on the first:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │  MemoryBlock                                                         │
//!   │    get_* / set_*      bounds + null + frozen checks                  │
//!   │    get_string / set_string / copy_from / copy_within                 │
//!   │    allocate / wrap / reallocate / free                               │
//!   └───────────────┬──────────────────────────────────────────────────────┘
//!                   │ allocate, reallocate, free only
//!   ┌───────────────▼──────────────────────────────────────────────────────┐
//!   │  aligned      calloc + back-pointer, any power-of-two alignment      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   snowmem
//!   ├── align      - Alignment macros (align!, align_to!) and helpers
//!   ├── aligned    - Aligned allocator (back-pointer scheme)
//!   ├── block      - MemoryBlock state, lifecycle and bounds checks
//!   ├── scalar     - Typed get_*/set_* accessors and SIZEOF_* constants
//!   ├── string     - String extraction and insertion
//!   ├── copy       - Overlap-safe copies between blocks and addresses
//!   ├── kind       - Scalar kind catalogue and dynamic values
//!   ├── layout     - Runtime C struct layouts
//!   └── error      - MemoryError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use snowmem::{MemoryBlock, StringLength};
//!
//! let mut block = MemoryBlock::allocate_aligned(16, 16).unwrap();
//! assert_eq!(block.address() as usize % 16, 0);
//!
//! block.set_uint32(0, 0xDEADBEEF).unwrap();
//! assert_eq!(block.get_uint32(0).unwrap(), 0xDEADBEEF);
//!
//! // Reads past the end are reported, not performed.
//! assert!(block.get_uint64(12).is_err());
//!
//! block.set_string(4, b"hello", true).unwrap();
//! assert_eq!(block.get_string(4, StringLength::Auto).unwrap(), b"hello");
//!
//! block.free().unwrap();
//! assert!(block.free().is_err()); // double free
//! ```
//!
//! Typed access goes through the named `get_*`/`set_*` pairs or
//! [`MemoryBlock::get_value`]; the byte codec behind them is internal:
//!
//! ```compile_fail
//! use snowmem::Scalar;
//! ```
//!
//! ## Ownership
//!
//! ```text
//!   allocate ──► owns_memory = true  ──► free / drop releases the region
//!   wrap     ──► owns_memory = false ──► free / drop only forget the address
//!   reallocate (either) ──► owns_memory = true (contents copied out)
//! ```
//!
//! A wrapped block that is reallocated copies its contents into a new owned
//! region. The wrapped memory is left alone and the block stops aliasing it.
//!
//! ## Safety
//!
//! Allocation, access and copies between blocks are safe. Wrapping an
//! address is `unsafe`: the block trusts the caller's size. Blocks perform no
//! synchronization and are neither `Send` nor `Sync`.

pub mod align;
pub mod aligned;
mod block;
mod copy;
mod error;
mod kind;
mod layout;
mod scalar;
mod string;

pub use align::{DEFAULT_ALIGNMENT, align_size, is_power_of_two};
pub use block::MemoryBlock;
pub use copy::CopySource;
pub use error::{ErrorKind, MemoryError, Result};
pub use kind::{ScalarKind, ScalarValue};
pub use layout::{LayoutBuilder, LayoutRegistry, MemberInfo, MemberType, StructLayout};
pub use scalar::*;
pub use string::StringLength;
