use log::info;
use snowmem::{CopySource, MemoryBlock, ScalarValue, StringLength, StructLayout};

/// Walks through the life of a few blocks. Run with `RUST_LOG=trace` to see
/// every aligned allocation and release.
fn main() -> snowmem::Result<()> {
  pretty_env_logger::init();

  // --------------------------------------------------------------------
  // 1) Allocate 32 bytes aligned to a cache line.
  // --------------------------------------------------------------------
  let mut block = MemoryBlock::allocate_aligned(32, 64)?;
  info!("[1] Allocated {}", block);

  block.set_uint32(0, 0xDEADBEEF)?;
  block.set_double(8, 3.25)?;
  info!(
    "[1] uint32 @0 = 0x{:X}, double @8 = {}",
    block.get_uint32(0)?,
    block.get_double(8)?
  );

  // --------------------------------------------------------------------
  // 2) Out of bounds accesses are reported instead of performed.
  // --------------------------------------------------------------------
  match block.get_uint64(28) {
    Ok(value) => info!("[2] unexpected read: {}", value),
    Err(error) => info!("[2] {}", error),
  }

  // --------------------------------------------------------------------
  // 3) Strings: null-terminated writes truncate to leave room for the zero.
  // --------------------------------------------------------------------
  block.set_string(16, b"snow-data, but in a block", true)?;
  let text = block.get_string(16, StringLength::Auto)?;
  info!("[3] string @16 = {:?}", String::from_utf8_lossy(&text));

  // --------------------------------------------------------------------
  // 4) Grow the block; the old contents come along.
  // --------------------------------------------------------------------
  block.reallocate(128)?;
  info!("[4] Reallocated {}, uint32 @0 = 0x{:X}", block, block.get_uint32(0)?);

  // --------------------------------------------------------------------
  // 5) Wrap memory owned by someone else and copy it in.
  // --------------------------------------------------------------------
  let mut storage = *b"borrowed bytes\0";
  let borrowed = unsafe { MemoryBlock::wrap_aligned(storage.as_mut_ptr(), storage.len(), 1)? };
  block.copy_from(CopySource::Block(&borrowed), 64, 0, None)?;
  info!(
    "[5] copied from {}: {:?}",
    borrowed,
    String::from_utf8_lossy(&block.get_string(64, StringLength::Auto)?)
  );

  // --------------------------------------------------------------------
  // 6) Lay out a C struct and fill an array of them.
  // --------------------------------------------------------------------
  let layout = StructLayout::parse("id:uint32_t; position:float[3]; flags:uc")?;
  let mut points = MemoryBlock::allocate_array(&layout, 4)?;
  for element in 0..4 {
    points.set_member(&layout, element, "id", 0, ScalarValue::UInt(element as u64))?;
    points.set_member(&layout, element, "position", 1, ScalarValue::Float(element as f64 * 0.5))?;
  }
  info!(
    "[6] layout {} ({} bytes per element), points = {}, y of #3 = {:?}",
    layout.encoding(),
    layout.aligned_size(),
    points,
    points.get_member(&layout, 3, "position", 1)?
  );

  // --------------------------------------------------------------------
  // 7) Free explicitly; a second free is caught.
  // --------------------------------------------------------------------
  block.free()?;
  info!("[7] Freed, now {}", block);
  if let Err(error) = block.free() {
    info!("[7] {}", error);
  }

  Ok(())
}
