use std::cell::Cell;
use std::mem;
use std::ptr::NonNull;

use log::trace;

use crate::align;
use crate::align::MAX_ALIGN;
use crate::allocator::Allocator;
use crate::error::{Error, Result};

/// Intrusive link written at the start of every block.
///
/// ```text
///   ┌───────────────────────┬────────────────────────────────┐
///   │    Block Header       │         Payload                │
///   │  ┌─────────────────┐  │                                │
///   │  │ next: ptr/None  │  │                                │
///   │  │ size: total     │  │                                │
///   │  └─────────────────┘  │                                │
///   │   HEADER_SIZE bytes   │                                │
///   └───────────────────────┴────────────────────────────────┘
///                           ▲
///                           └── MAX_ALIGN-aligned pointer returned
/// ```
#[repr(C)]
struct BlockHeader {
  next: Option<NonNull<BlockHeader>>,
  size: usize,
}

/// Size of the block header, rounded up so the payload is maximally aligned.
pub const HEADER_SIZE: usize = align!(mem::size_of::<BlockHeader>());

/// Chain of whole blocks acquired from a backing allocator.
///
/// Each [`allocate`](Self::allocate) call produces exactly one new block and
/// pushes it on the front of a singly-linked list, so the most recent block is
/// always at the head. Blocks are never freed one by one: [`release`] frees the
/// entire chain, and dropping the chain releases it too.
///
/// [`release`]: Self::release
pub struct BlockChain<A: Allocator> {
  head: Cell<Option<NonNull<BlockHeader>>>,
  blocks: Cell<usize>,
  bytes: Cell<usize>,
  allocator: A,
}

impl<A: Allocator> BlockChain<A> {
  pub const fn new(allocator: A) -> Self {
    Self {
      head: Cell::new(None),
      blocks: Cell::new(0),
      bytes: Cell::new(0),
      allocator,
    }
  }

  /// Acquires a new block with at least `size` usable bytes and returns the
  /// [`MAX_ALIGN`]-aligned address of its payload.
  ///
  /// # Errors
  ///
  /// Whatever the backing allocator reports, unchanged. A size too large to
  /// carry the header is reported as [`Error::OutOfMemory`].
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    debug_assert!(size > 0, "block size must be greater than zero");

    if size > isize::MAX as usize - HEADER_SIZE - MAX_ALIGN {
      return Err(Error::OutOfMemory { requested: size });
    }

    let total = align!(size + HEADER_SIZE);
    let block = self.allocator.allocate(total)?;
    let header = block.cast::<BlockHeader>();

    debug_assert_eq!(block.as_ptr() as usize % MAX_ALIGN, 0, "misaligned block");

    // SAFETY: the `Allocator` contract guarantees a fresh block, disjoint from
    // every live block in the chain, valid for `total` bytes and
    // MAX_ALIGN-aligned. total >= HEADER_SIZE, so the header fits and is
    // properly aligned.
    unsafe {
      header.as_ptr().write(BlockHeader {
        next: self.head.get(),
        size: total,
      });
    }

    self.head.set(Some(header));
    self.blocks.set(self.blocks.get() + 1);
    self.bytes.set(self.bytes.get() + total);

    trace!("acquired block {block:?} of {total} bytes for a {size} byte request");

    // SAFETY: total >= HEADER_SIZE + size, so the payload is inside the block.
    Ok(unsafe { block.add(HEADER_SIZE) })
  }

  /// Frees every block in the chain. Releasing an empty chain does nothing.
  pub fn release(&mut self) {
    let mut current = self.head.take();

    while let Some(header) = current {
      // SAFETY: every header in the chain was written by `allocate` and the
      // block it heads is still owned by this chain.
      unsafe {
        let BlockHeader { next, size } = header.as_ptr().read();

        trace!("freeing block {header:?} of {size} bytes");

        self.allocator.deallocate(header.cast(), size);
        current = next;
      }
    }

    self.blocks.set(0);
    self.bytes.set(0);
  }

  /// Number of blocks currently owned.
  pub fn block_count(&self) -> usize {
    self.blocks.get()
  }

  /// Total bytes requested from the backing allocator, headers included.
  pub fn allocated_bytes(&self) -> usize {
    self.bytes.get()
  }

  pub fn is_empty(&self) -> bool {
    self.head.get().is_none()
  }

  pub fn allocator(&self) -> &A {
    &self.allocator
  }
}

impl<A: Allocator> Drop for BlockChain<A> {
  fn drop(&mut self) {
    self.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::alignment_offset;
  use crate::testing::CountingAllocator;

  #[test]
  fn test_header_size() {
    assert!(HEADER_SIZE >= mem::size_of::<BlockHeader>());
    assert_eq!(HEADER_SIZE % MAX_ALIGN, 0);
  }

  #[test]
  fn test_alloc() {
    let counting = CountingAllocator::new();
    let chain = BlockChain::new(&counting);

    let first = chain.allocate(24).unwrap();
    let second = chain.allocate(100).unwrap();

    assert_ne!(first, second);
    assert_eq!(alignment_offset(first.as_ptr() as usize, MAX_ALIGN), 0);
    assert_eq!(alignment_offset(second.as_ptr() as usize, MAX_ALIGN), 0);

    unsafe {
      std::ptr::write_bytes(first.as_ptr(), 0x11, 24);
      std::ptr::write_bytes(second.as_ptr(), 0x22, 100);

      assert_eq!(*first.as_ptr().add(23), 0x11);
      assert_eq!(*second.as_ptr().add(99), 0x22);
    }

    assert_eq!(chain.block_count(), 2);
    assert_eq!(counting.blocks_in_use(), 2);
    assert_eq!(
      counting.sizes(),
      vec![align!(24 + HEADER_SIZE), align!(100 + HEADER_SIZE)]
    );
    assert_eq!(chain.allocated_bytes(), counting.bytes_in_use());
  }

  #[test]
  fn test_one_block_per_call() {
    let counting = CountingAllocator::new();
    let chain = BlockChain::new(&counting);

    for _ in 0..5 {
      chain.allocate(1).unwrap();
    }

    assert_eq!(chain.block_count(), 5);
    assert_eq!(counting.total_allocations(), 5);
  }

  #[test]
  fn test_release_frees_every_block() {
    let counting = CountingAllocator::new();
    let mut chain = BlockChain::new(&counting);

    for size in [8, 16, 32, 64] {
      chain.allocate(size).unwrap();
    }

    chain.release();

    assert!(chain.is_empty());
    assert_eq!(chain.block_count(), 0);
    assert_eq!(chain.allocated_bytes(), 0);
    assert_eq!(counting.blocks_in_use(), 0);
    assert_eq!(counting.bytes_in_use(), 0);
    assert_eq!(counting.total_deallocations(), 4);
  }

  #[test]
  fn test_release_is_idempotent() {
    let counting = CountingAllocator::new();
    let mut chain = BlockChain::new(&counting);

    chain.release();
    chain.allocate(8).unwrap();
    chain.release();
    chain.release();

    assert_eq!(counting.total_deallocations(), 1);
  }

  #[test]
  fn test_drop_releases() {
    let counting = CountingAllocator::new();

    {
      let chain = BlockChain::new(&counting);
      chain.allocate(8).unwrap();
      chain.allocate(8).unwrap();
      assert_eq!(counting.blocks_in_use(), 2);
    }

    assert_eq!(counting.blocks_in_use(), 0);
  }

  #[test]
  fn test_backing_failure_propagates() {
    let counting = CountingAllocator::with_limit(1);
    let chain = BlockChain::new(&counting);

    chain.allocate(8).unwrap();
    let err = chain.allocate(8).unwrap_err();

    assert!(matches!(err, Error::AllocationLimit { limit: 1 }));
    assert_eq!(chain.block_count(), 1);
  }

  #[test]
  fn test_oversized_request() {
    let chain = BlockChain::new(CountingAllocator::new());
    let err = chain.allocate(usize::MAX).unwrap_err();

    assert!(matches!(err, Error::OutOfMemory { .. }));
    assert!(chain.is_empty());
  }

  #[repr(C, align(64))]
  struct Slab {
    storage: std::cell::UnsafeCell<[u8; 1024]>,
    next: Cell<usize>,
    freed: Cell<usize>,
  }

  // SAFETY: every block is a distinct MAX_ALIGN-aligned slice of the slab and
  // slots are never handed out twice.
  unsafe impl Allocator for Slab {
    fn allocate(
      &self,
      size: usize,
    ) -> Result<NonNull<u8>> {
      let offset = self.next.get();
      let end = offset + align!(size);

      if end > 1024 {
        return Err(Error::OutOfMemory { requested: size });
      }

      self.next.set(end);

      let base = self.storage.get().cast::<u8>();
      // SAFETY: offset + size <= 1024.
      Ok(unsafe { NonNull::new_unchecked(base.add(offset)) })
    }

    unsafe fn deallocate(
      &self,
      _ptr: NonNull<u8>,
      _size: usize,
    ) {
      self.freed.set(self.freed.get() + 1);
    }
  }

  #[test]
  fn test_custom_allocator_blocks_are_disjoint() {
    let slab = Slab {
      storage: std::cell::UnsafeCell::new([0; 1024]),
      next: Cell::new(0),
      freed: Cell::new(0),
    };

    let mut chain = BlockChain::new(&slab);

    let first = chain.allocate(32).unwrap();
    let second = chain.allocate(32).unwrap();
    let third = chain.allocate(32).unwrap();

    let stride = align!(32 + HEADER_SIZE);
    assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, stride);
    assert_eq!(third.as_ptr() as usize - second.as_ptr() as usize, stride);

    unsafe {
      std::ptr::write_bytes(first.as_ptr(), 0x11, 32);
      std::ptr::write_bytes(second.as_ptr(), 0x22, 32);
      std::ptr::write_bytes(third.as_ptr(), 0x33, 32);

      assert_eq!(*first.as_ptr().add(31), 0x11);
      assert_eq!(*second.as_ptr().add(31), 0x22);
    }

    chain.release();

    assert_eq!(slab.freed.get(), 3);
    assert!(chain.is_empty());
  }
}
