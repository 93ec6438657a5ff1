use std::cell::Cell;
use std::ptr::NonNull;

use crate::align::{AlignmentStrategy, alignment_offset};

/// Bump allocator over a single contiguous region it does not own.
///
/// ```text
///   base                        cursor                          capacity
///    │                             │                                │
///    ▼                             ▼                                ▼
///   ┌────┬──┬────────┬──┬──────────┬────────────────────────────────┐
///   │ A1 │▒▒│   A2   │▒▒│    A3    │           Free Space           │
///   └────┴──┴────────┴──┴──────────┴────────────────────────────────┘
///          ▲           ▲
///          └── alignment padding
/// ```
///
/// The cursor counts consumed bytes including padding, so
/// `0 <= cursor <= capacity` always holds. Nothing is ever freed: the only way
/// to reuse the region is to [`bind`](Self::bind) it again.
///
/// All state lives in [`Cell`]s so allocation works through a shared
/// reference. The arena is therefore `!Sync`.
#[derive(Debug)]
pub struct RegionArena {
  base: Cell<NonNull<u8>>,
  capacity: Cell<usize>,
  cursor: Cell<usize>,
  strategy: AlignmentStrategy,
}

impl RegionArena {
  /// Creates an arena bound to no region. Every allocation fails until
  /// [`bind`](Self::bind) is called.
  pub const fn new(strategy: AlignmentStrategy) -> Self {
    Self {
      base: Cell::new(NonNull::dangling()),
      capacity: Cell::new(0),
      cursor: Cell::new(0),
      strategy,
    }
  }

  /// Rebinds the arena to `capacity` bytes starting at `base` and rewinds the
  /// cursor. Pointers issued from the previous region are not tracked.
  ///
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `capacity` bytes for as long
  /// as any pointer later returned by this arena is in use.
  pub unsafe fn bind(
    &self,
    base: NonNull<u8>,
    capacity: usize,
  ) {
    debug_assert!(capacity > 0, "region capacity must be greater than zero");

    self.base.set(base);
    self.capacity.set(capacity);
    self.cursor.set(0);
  }

  /// Bumps out `size` bytes aligned per the arena's strategy, or returns
  /// `None` if they do not fit in what is left of the region.
  #[inline]
  pub fn allocate(
    &self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.allocate_aligned(size, self.strategy.alignment_for(size))
  }

  /// Bumps out `size` bytes at an address that is a multiple of `alignment`.
  #[inline]
  pub fn allocate_aligned(
    &self,
    size: usize,
    alignment: usize,
  ) -> Option<NonNull<u8>> {
    debug_assert!(size > 0, "allocation size must be greater than zero");
    debug_assert!(alignment.is_power_of_two());

    let base = self.base.get();
    let cursor = self.cursor.get();

    let padding = alignment_offset((base.as_ptr() as usize).wrapping_add(cursor), alignment);
    let start = cursor.checked_add(padding)?;
    let end = start.checked_add(size)?;

    if end > self.capacity.get() {
      return None;
    }

    self.cursor.set(end);

    // SAFETY: start < end <= capacity, so the offset stays inside the region.
    Some(unsafe { base.add(start) })
  }

  pub fn strategy(&self) -> AlignmentStrategy {
    self.strategy
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base.get()
  }

  pub fn capacity(&self) -> usize {
    self.capacity.get()
  }

  /// Bytes consumed so far, alignment padding included.
  pub fn cursor(&self) -> usize {
    self.cursor.get()
  }

  pub fn remaining(&self) -> usize {
    self.capacity.get() - self.cursor.get()
  }

  /// Whether `ptr` points into the currently bound region.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let base = self.base.get().as_ptr() as usize;
    let address = ptr as usize;

    address >= base && address - base < self.capacity.get()
  }
}
