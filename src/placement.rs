//! Construct objects directly in pool memory.
//!
//! [`allocate_in`] and [`deallocate_in`] are the placement pair: the first
//! hands out raw pool memory to construct into, the second exists only so
//! cleanup code written against a generic "allocate/deallocate" shape has
//! something to call, and does nothing. Objects are torn down with
//! [`SequentialPool::delete_object`], never by returning their memory.

use std::ptr::NonNull;

use crate::allocator::Allocator;
use crate::error::Result;
use crate::pool::SequentialPool;

/// Returns `size` bytes from `pool` to construct an object into.
///
/// # Errors
///
/// See [`SequentialPool::allocate`].
pub fn allocate_in<A: Allocator>(
  size: usize,
  pool: &SequentialPool<'_, A>,
) -> Result<NonNull<u8>> {
  pool.allocate(size)
}

/// Companion of [`allocate_in`]. Pool memory is only reclaimed by
/// [`SequentialPool::release`], so this does nothing.
pub fn deallocate_in<A: Allocator>(
  _address: NonNull<u8>,
  _pool: &SequentialPool<'_, A>,
) {
}

/// Moves `value` into memory owned by `pool`.
///
/// # Errors
///
/// See [`SequentialPool::allocate`].
pub fn new_in<'p, T, A: Allocator>(
  value: T,
  pool: &'p SequentialPool<'_, A>,
) -> Result<&'p mut T> {
  pool.alloc(value)
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;
  use std::mem::{self, MaybeUninit};

  use super::*;
  use crate::testing::CountingAllocator;

  struct Node<'a> {
    value: u32,
    drops: &'a Cell<usize>,
  }

  impl Drop for Node<'_> {
    fn drop(&mut self) {
      self.drops.set(self.drops.get() + 1);
    }
  }

  #[test]
  fn test_construct_in_place() {
    let mut buffer = [MaybeUninit::uninit(); 64];
    let pool = SequentialPool::new(&mut buffer).unwrap();

    let ptr = allocate_in(mem::size_of::<u64>(), &pool).unwrap().cast::<u64>();
    assert_eq!(ptr.as_ptr() as usize % mem::align_of::<u64>(), 0);

    unsafe {
      ptr.as_ptr().write(99);
      assert_eq!(*ptr.as_ptr(), 99);
    }

    let cursor = pool.current_cursor();
    deallocate_in(ptr.cast(), &pool);
    assert_eq!(pool.current_cursor(), cursor);
  }

  #[test]
  fn test_objects_spill_into_blocks() {
    let drops = Cell::new(0);
    let mut buffer = [MaybeUninit::uninit(); 32];
    let counting = CountingAllocator::new();
    let pool = SequentialPool::new_in(&mut buffer, &counting).unwrap();

    let nodes: Vec<&mut Node> = (0..16)
      .map(|value| {
        new_in(
          Node {
            value,
            drops: &drops,
          },
          &pool,
        )
        .unwrap()
      })
      .collect();

    let values: Vec<u32> = nodes.iter().map(|node| node.value).collect();
    assert_eq!(values, (0..16).collect::<Vec<_>>());
    assert!(counting.blocks_in_use() > 0);

    // Teardown runs destructors only; memory goes back with the pool.
    for node in nodes {
      unsafe { pool.delete_object(node) };
    }

    assert_eq!(drops.get(), 16);
    drop(pool);
    assert_eq!(counting.blocks_in_use(), 0);
  }
}
