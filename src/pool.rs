//! Buffered sequential pool.
//!
//! ```text
//!   SequentialPool
//!   ├── external buffer      (borrowed for 'buf, never freed)
//!   ├── RegionArena          (bound to the external buffer or the newest block)
//!   └── BlockChain<A>        (blocks acquired from A once the buffer runs out)
//!
//!   allocate(n):
//!
//!     RegionArena ──fits──▶ return address
//!         │
//!      exhausted
//!         │
//!         ▼
//!     GrowthStrategy::next_buffer_size ──▶ BlockChain::allocate ──▶ bind ──▶ retry
//! ```

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::slice;

use log::debug;

use crate::align::{AlignmentStrategy, MAX_ALIGN};
use crate::allocator::{Allocator, SystemAllocator};
use crate::block::BlockChain;
use crate::error::{Error, Result};
use crate::growth::GrowthStrategy;
use crate::region::RegionArena;

/// Builder for a [`SequentialPool`].
///
/// Defaults: [`GrowthStrategy::Geometric`], [`AlignmentStrategy::Natural`], no
/// maximum buffer size, and [`SystemAllocator`] as the backing allocator.
///
/// ```rust
/// use std::mem::MaybeUninit;
/// use seqpool::{GrowthStrategy, SequentialPool};
///
/// # fn main() -> seqpool::Result<()> {
/// let mut buffer = [MaybeUninit::uninit(); 256];
/// let pool = SequentialPool::builder(&mut buffer)
///   .growth_strategy(GrowthStrategy::Constant)
///   .max_buffer_size(4096)
///   .build()?;
///
/// assert_eq!(pool.initial_size(), 256);
/// # Ok(())
/// # }
/// ```
pub struct PoolBuilder<'buf, A: Allocator = SystemAllocator> {
  buffer: &'buf mut [MaybeUninit<u8>],
  growth: GrowthStrategy,
  alignment: AlignmentStrategy,
  max_buffer_size: Option<usize>,
  allocator: A,
}

impl<'buf> PoolBuilder<'buf> {
  pub fn new(buffer: &'buf mut [MaybeUninit<u8>]) -> Self {
    Self {
      buffer,
      growth: GrowthStrategy::default(),
      alignment: AlignmentStrategy::default(),
      max_buffer_size: None,
      allocator: SystemAllocator::new(),
    }
  }
}

impl<'buf, A: Allocator> PoolBuilder<'buf, A> {
  #[must_use]
  pub fn growth_strategy(
    mut self,
    growth: GrowthStrategy,
  ) -> Self {
    self.growth = growth;
    self
  }

  #[must_use]
  pub fn alignment_strategy(
    mut self,
    alignment: AlignmentStrategy,
  ) -> Self {
    self.alignment = alignment;
    self
  }

  /// Caps the size of every internally grown buffer. The external buffer must
  /// not be larger than the cap.
  #[must_use]
  pub fn max_buffer_size(
    mut self,
    max_buffer_size: usize,
  ) -> Self {
    self.max_buffer_size = Some(max_buffer_size);
    self
  }

  /// Sets the allocator that supplies blocks once the external buffer is
  /// exhausted. Pass a reference to share one allocator between pools.
  #[must_use]
  pub fn allocator<B: Allocator>(
    self,
    allocator: B,
  ) -> PoolBuilder<'buf, B> {
    PoolBuilder {
      buffer: self.buffer,
      growth: self.growth,
      alignment: self.alignment,
      max_buffer_size: self.max_buffer_size,
      allocator,
    }
  }

  /// Validates the configuration and binds the pool to the external buffer.
  ///
  /// # Errors
  ///
  /// - [`Error::EmptyBuffer`] if the buffer has no bytes.
  /// - [`Error::ZeroMaxBufferSize`] if the maximum buffer size is zero.
  /// - [`Error::BufferExceedsMax`] if the buffer is larger than the maximum
  ///   buffer size.
  pub fn build(self) -> Result<SequentialPool<'buf, A>> {
    let size = self.buffer.len();

    if size == 0 {
      return Err(Error::EmptyBuffer);
    }

    if let Some(max) = self.max_buffer_size {
      if max == 0 {
        return Err(Error::ZeroMaxBufferSize);
      }
      if size > max {
        return Err(Error::BufferExceedsMax { size, max });
      }
    }

    let initial = NonNull::from(self.buffer).cast::<u8>();
    let arena = RegionArena::new(self.alignment);

    // SAFETY: the buffer is borrowed mutably for 'buf, which outlives the pool
    // and therefore every allocation made from it.
    unsafe { arena.bind(initial, size) };

    Ok(SequentialPool {
      initial,
      initial_size: size,
      arena,
      blocks: BlockChain::new(self.allocator),
      growth: self.growth,
      max_buffer_size: self.max_buffer_size,
      generation: 0,
      _buffer: PhantomData,
    })
  }
}

/// Sequential memory pool over an external buffer with a growable fallback.
///
/// Memory is bumped out of the buffer supplied at construction. When a request
/// does not fit in what is left, the pool acquires a new block from its
/// backing allocator, sized by its [`GrowthStrategy`], and continues bumping
/// from there. Individual allocations are never freed; [`release`] drops every
/// block at once and rewinds to the start of the external buffer, whose
/// contents are left as they are.
///
/// Allocation goes through `&self`, and every reference handed out borrows the
/// pool. [`release`] takes `&mut self`, so no allocation can be used across a
/// release. Dropping the pool frees its blocks; the external buffer is never
/// touched.
///
/// The pool is single-writer: it is `Send` when its allocator is, but never
/// `Sync`.
///
/// ```rust
/// use std::mem::MaybeUninit;
/// use seqpool::SequentialPool;
///
/// # fn main() -> seqpool::Result<()> {
/// let mut buffer = [MaybeUninit::uninit(); 64];
/// let mut pool = SequentialPool::new(&mut buffer)?;
///
/// let answer = pool.alloc(42u64)?;
/// *answer += 1;
/// assert_eq!(*answer, 43);
///
/// // Larger than the buffer: served from a block.
/// let bytes = pool.alloc_bytes(1024)?;
/// assert_eq!(bytes.len(), 1024);
/// assert_eq!(pool.block_count(), 1);
///
/// pool.release();
/// assert_eq!(pool.block_count(), 0);
/// # Ok(())
/// # }
/// ```
///
/// [`release`]: Self::release
pub struct SequentialPool<'buf, A: Allocator = SystemAllocator> {
  initial: NonNull<u8>,
  initial_size: usize,
  arena: RegionArena,
  blocks: BlockChain<A>,
  growth: GrowthStrategy,
  max_buffer_size: Option<usize>,
  generation: u64,
  _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

// SAFETY: the pool exclusively borrows its external buffer and exclusively owns
// its blocks. Every reference it hands out borrows the pool, so none can be
// alive while the pool is moved to another thread.
unsafe impl<A: Allocator + Send> Send for SequentialPool<'_, A> {}

impl<'buf> SequentialPool<'buf> {
  /// Pool with the default strategies and the system allocator.
  ///
  /// # Errors
  ///
  /// [`Error::EmptyBuffer`] if the buffer has no bytes.
  pub fn new(buffer: &'buf mut [MaybeUninit<u8>]) -> Result<Self> {
    PoolBuilder::new(buffer).build()
  }

  pub fn builder(buffer: &'buf mut [MaybeUninit<u8>]) -> PoolBuilder<'buf> {
    PoolBuilder::new(buffer)
  }
}

impl<'buf, A: Allocator> SequentialPool<'buf, A> {
  /// Pool with the default strategies that falls back to `allocator`.
  ///
  /// # Errors
  ///
  /// [`Error::EmptyBuffer`] if the buffer has no bytes.
  pub fn new_in(
    buffer: &'buf mut [MaybeUninit<u8>],
    allocator: A,
  ) -> Result<Self> {
    PoolBuilder::new(buffer).allocator(allocator).build()
  }

  /// Returns the address of `size` contiguous bytes aligned per the pool's
  /// alignment strategy.
  ///
  /// The address stays valid until the next [`release`](Self::release) or
  /// until the pool is dropped. `size` must be greater than zero; a zero-byte
  /// request is served as a one-byte request in release builds.
  ///
  /// # Errors
  ///
  /// If a new block is needed and the backing allocator fails, its error is
  /// returned unchanged and the pool is left as it was.
  #[inline]
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    debug_assert!(size > 0, "allocation size must be greater than zero");

    let size = size.max(1);

    self.allocate_aligned(size, self.arena.strategy().alignment_for(size))
  }

  /// Like [`allocate`](Self::allocate), but for `layout`. The address is
  /// aligned to the larger of the layout's alignment and the strategy's.
  /// Zero-sized layouts consume nothing and get a dangling, aligned address.
  ///
  /// # Errors
  ///
  /// See [`allocate`](Self::allocate).
  pub fn allocate_layout(
    &self,
    layout: Layout,
  ) -> Result<NonNull<u8>> {
    if layout.size() == 0 {
      // SAFETY: a layout's alignment is a non-zero power of two.
      return Ok(unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(layout.align())) });
    }

    let alignment = self
      .arena
      .strategy()
      .alignment_for(layout.size())
      .max(layout.align());

    self.allocate_aligned(layout.size(), alignment)
  }

  #[inline]
  fn allocate_aligned(
    &self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    match self.arena.allocate_aligned(size, alignment) {
      Some(ptr) => Ok(ptr),
      None => self.grow(size, alignment),
    }
  }

  /// Binds the arena to a freshly acquired block and serves the request from
  /// it.
  #[cold]
  fn grow(
    &self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    // Blocks start MAX_ALIGN-aligned, so only stricter alignments need slack.
    let needed = size.saturating_add(alignment.saturating_sub(MAX_ALIGN));

    let next_size = self.growth.next_buffer_size(
      self.arena.capacity(),
      self.initial_size,
      self.max_buffer_size,
      needed,
    );

    debug!(
      "buffer of {} bytes exhausted by a {size} byte request, growing to {next_size} bytes ({:?})",
      self.arena.capacity(),
      self.growth,
    );

    let block = self.blocks.allocate(next_size)?;

    // SAFETY: the block holds at least `next_size` bytes and is owned by the
    // chain until the pool is released or dropped, both of which need every
    // outstanding borrow of the pool to have ended.
    unsafe { self.arena.bind(block, next_size) };

    self
      .arena
      .allocate_aligned(size, alignment)
      .ok_or(Error::OutOfMemory { requested: size })
  }

  /// Uninitialized bytes borrowed from the pool.
  ///
  /// # Errors
  ///
  /// See [`allocate`](Self::allocate).
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_bytes(
    &self,
    size: usize,
  ) -> Result<&mut [MaybeUninit<u8>]> {
    let ptr = self.allocate(size)?;

    // SAFETY: `allocate` returned `size` bytes that no other reference covers
    // and that live until the pool is released or dropped.
    Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr().cast(), size.max(1)) })
  }

  /// Moves `value` into the pool.
  ///
  /// The value is never dropped by the pool; call
  /// [`delete_object`](Self::delete_object) to run its destructor.
  ///
  /// # Errors
  ///
  /// See [`allocate`](Self::allocate).
  #[allow(clippy::mut_from_ref)]
  pub fn alloc<T>(
    &self,
    value: T,
  ) -> Result<&mut T> {
    let ptr = self.allocate_layout(Layout::new::<T>())?.cast::<T>();

    // SAFETY: the memory is fresh, sized and aligned for T.
    unsafe {
      ptr.as_ptr().write(value);
      Ok(&mut *ptr.as_ptr())
    }
  }

  /// Copies `src` into the pool.
  ///
  /// # Errors
  ///
  /// See [`allocate`](Self::allocate).
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_copy<T: Copy>(
    &self,
    src: &[T],
  ) -> Result<&mut [T]> {
    let ptr = self.allocate_layout(Layout::for_value(src))?.cast::<T>();

    // SAFETY: the memory is fresh and sized and aligned for `src.len()` Ts.
    unsafe {
      ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
      Ok(slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
    }
  }

  /// Copies `src` into the pool.
  ///
  /// # Errors
  ///
  /// See [`allocate`](Self::allocate).
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_str(
    &self,
    src: &str,
  ) -> Result<&mut str> {
    let bytes = self.alloc_slice_copy(src.as_bytes())?;

    // SAFETY: the bytes were copied from a valid str.
    Ok(unsafe { std::str::from_utf8_unchecked_mut(bytes) })
  }

  /// Runs the destructor of `object` in place. The memory is not returned to
  /// the pool; it is reclaimed only by [`release`](Self::release). A null
  /// pointer is ignored.
  ///
  /// # Safety
  ///
  /// `object` must be null or point to a live value that is not used again.
  pub unsafe fn delete_object<T: ?Sized>(
    &self,
    object: *mut T,
  ) {
    if !object.is_null() {
      unsafe { ptr::drop_in_place(object) };
    }
  }

  /// Frees every block and rewinds to the start of the external buffer,
  /// leaving the pool as it was right after construction. Releasing an
  /// already released pool does nothing beyond the bookkeeping.
  pub fn release(&mut self) {
    debug!(
      "releasing pool: {} blocks, {} bytes",
      self.blocks.block_count(),
      self.blocks.allocated_bytes()
    );

    // SAFETY: the external buffer is still borrowed for 'buf, and `&mut self`
    // guarantees nothing allocated before this point is still referenced.
    unsafe { self.arena.bind(self.initial, self.initial_size) };

    self.blocks.release();
    self.generation += 1;
  }

  /// Borrows the pool and releases it when the guard goes out of scope.
  pub fn auto_release(&mut self) -> AutoRelease<'_, 'buf, A> {
    AutoRelease { pool: self }
  }

  /// Size of the external buffer supplied at construction.
  pub fn initial_size(&self) -> usize {
    self.initial_size
  }

  /// Capacity of the buffer currently being bumped from.
  pub fn current_capacity(&self) -> usize {
    self.arena.capacity()
  }

  /// Bytes consumed from the current buffer, alignment padding included.
  pub fn current_cursor(&self) -> usize {
    self.arena.cursor()
  }

  /// Whether the pool is still bumping from its external buffer.
  pub fn is_using_initial_buffer(&self) -> bool {
    self.arena.base() == self.initial
  }

  /// Number of internal blocks currently held.
  pub fn block_count(&self) -> usize {
    self.blocks.block_count()
  }

  pub fn growth_strategy(&self) -> GrowthStrategy {
    self.growth
  }

  pub fn alignment_strategy(&self) -> AlignmentStrategy {
    self.arena.strategy()
  }

  pub fn max_buffer_size(&self) -> Option<usize> {
    self.max_buffer_size
  }

  /// Number of times the pool has been released.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn allocator(&self) -> &A {
    self.blocks.allocator()
  }
}

impl<A: Allocator> fmt::Debug for SequentialPool<'_, A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("SequentialPool")
      .field("initial", &self.initial)
      .field("initial_size", &self.initial_size)
      .field("arena", &self.arena)
      .field("blocks", &self.blocks.block_count())
      .field("growth", &self.growth)
      .field("max_buffer_size", &self.max_buffer_size)
      .field("generation", &self.generation)
      .finish()
  }
}

/// Scope guard returned by [`SequentialPool::auto_release`].
///
/// Dereferences to the pool, so allocations can be made through it; all of
/// them are released when the guard is dropped.
pub struct AutoRelease<'p, 'buf, A: Allocator> {
  pool: &'p mut SequentialPool<'buf, A>,
}

impl<'buf, A: Allocator> Deref for AutoRelease<'_, 'buf, A> {
  type Target = SequentialPool<'buf, A>;

  fn deref(&self) -> &Self::Target {
    &*self.pool
  }
}

impl<A: Allocator> Drop for AutoRelease<'_, '_, A> {
  fn drop(&mut self) {
    self.pool.release();
  }
}
