use std::mem::MaybeUninit;

use seqpool::testing::CountingAllocator;
use seqpool::{GrowthStrategy, SequentialPool};

fn print_state(
  label: &str,
  pool: &SequentialPool<'_, &CountingAllocator>,
  counting: &CountingAllocator,
) {
  println!(
    "[{label}] initial buffer = {}, capacity = {}, cursor = {}, blocks = {}, heap bytes = {}",
    pool.is_using_initial_buffer(),
    pool.current_capacity(),
    pool.current_cursor(),
    pool.block_count(),
    counting.bytes_in_use(),
  );
}

fn main() -> seqpool::Result<()> {
  let counting = CountingAllocator::new();
  let mut buffer = [MaybeUninit::uninit(); 32];

  let mut pool = SequentialPool::builder(&mut buffer)
    .growth_strategy(GrowthStrategy::Geometric)
    .max_buffer_size(256)
    .allocator(&counting)
    .build()?;

  print_state("start", &pool, &counting);

  // --------------------------------------------------------------------
  // 1) Small values come straight out of the 32 byte external buffer.
  // --------------------------------------------------------------------
  {
    let id = pool.alloc(0xDEAD_BEEFu32)?;
    let tag = pool.alloc_str("seq")?;
    println!("\n[1] id = 0x{:X} at {:p}, tag = {tag:?}", *id, id);
    print_state("1", &pool, &counting);

    // ------------------------------------------------------------------
    // 2) 40 bytes do not fit: the pool grows into a 64 byte block.
    // ------------------------------------------------------------------
    let values = pool.alloc_slice_copy(&[1u64, 2, 3, 4, 5])?;
    println!("\n[2] values = {values:?} at {:p}", values.as_ptr());
    print_state("2", &pool, &counting);

    // ------------------------------------------------------------------
    // 3) Each further miss doubles the block until the 256 byte cap.
    // ------------------------------------------------------------------
    for round in 0..4 {
      let bytes = pool.alloc_bytes(100)?;
      bytes.fill(MaybeUninit::new(round));
    }
    println!("\n[3] four 100 byte requests");
    print_state("3", &pool, &counting);
    println!("[3] block sizes requested: {:?}", counting.sizes());
  }

  // --------------------------------------------------------------------
  // 4) Release frees every block and rewinds to the external buffer.
  // --------------------------------------------------------------------
  pool.release();
  println!("\n[4] release (generation {})", pool.generation());
  print_state("4", &pool, &counting);

  Ok(())
}
