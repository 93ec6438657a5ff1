//! Backing allocators.
//!
//! The pool never talks to the heap directly. Whenever its external buffer is
//! exhausted it asks an [`Allocator`] for a whole block, and hands every block
//! back in one sweep on release. Two implementations are provided:
//! [`SystemAllocator`] (the Rust global allocator, used by default) and
//! [`MallocAllocator`] (libc `malloc`/`free`).

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::align::MAX_ALIGN;
use crate::error::{Error, Result};

/// Source of the blocks a pool falls back to.
///
/// References and boxes of an allocator are allocators too, so a single
/// backing allocator can be shared by several pools.
///
/// # Safety
///
/// The pool writes a block header into every block and hands out `&mut`
/// references over the rest, so implementations must uphold:
///
/// - A successful `allocate(size)` returns memory valid for reads and writes of
///   `size` bytes, aligned to at least [`MAX_ALIGN`], and not overlapping any
///   other block that has not been passed to `deallocate` yet.
/// - The memory stays valid until it is passed to `deallocate`.
///
/// The pool only calls `deallocate` with a pointer previously returned by
/// `allocate` on the same allocator, together with the size that was
/// requested, and exactly once per block.
///
/// Implementing the trait without `unsafe` is rejected:
///
/// ```compile_fail
/// use std::ptr::NonNull;
/// use seqpool::{Allocator, Result};
///
/// struct Recycling;
///
/// impl Allocator for Recycling {
///   fn allocate(&self, _size: usize) -> Result<NonNull<u8>> {
///     Ok(NonNull::dangling())
///   }
///
///   unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize) {}
/// }
/// ```
pub unsafe trait Allocator {
  /// Allocates a block of `size` bytes. `size` must be greater than zero.
  ///
  /// # Errors
  ///
  /// Returns an error if the block cannot be supplied. The error is passed
  /// through the pool to its caller unchanged.
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>>;

  /// Returns a block to the allocator.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by `allocate` on this allocator with the
  /// same `size`, and must not have been deallocated already.
  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  );
}

// SAFETY: forwards to an allocator that upholds the contract.
unsafe impl<A: Allocator + ?Sized> Allocator for &A {
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    (**self).allocate(size)
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { (**self).deallocate(ptr, size) }
  }
}

// SAFETY: forwards to an allocator that upholds the contract.
unsafe impl<A: Allocator + ?Sized> Allocator for Box<A> {
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    (**self).allocate(size)
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { (**self).deallocate(ptr, size) }
  }
}

/// The Rust global allocator, asked for [`MAX_ALIGN`]-aligned blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
  pub const fn new() -> Self {
    Self
  }

  fn layout(size: usize) -> Result<Layout> {
    Ok(Layout::from_size_align(size, MAX_ALIGN)?)
  }
}

// SAFETY: every block comes fresh from the global allocator with a
// MAX_ALIGN-aligned layout of the requested size.
unsafe impl Allocator for SystemAllocator {
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    debug_assert!(size > 0, "block size must be greater than zero");

    let layout = Self::layout(size.max(1))?;

    // SAFETY: layout has a non-zero size.
    let ptr = unsafe { alloc::alloc(layout) };

    NonNull::new(ptr).ok_or(Error::OutOfMemory { requested: size })
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    // SAFETY: `allocate` accepted this size with MAX_ALIGN, so the layout is
    // valid, and ptr was allocated with this same layout.
    unsafe {
      let layout = Layout::from_size_align_unchecked(size.max(1), MAX_ALIGN);
      alloc::dealloc(ptr.as_ptr(), layout);
    }
  }
}

/// C `malloc`/`free`. Every block is suitably aligned for `max_align_t`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MallocAllocator;

impl MallocAllocator {
  pub const fn new() -> Self {
    Self
  }
}

// SAFETY: malloc returns fresh blocks of the requested size, suitably aligned
// for max_align_t, whose alignment is MAX_ALIGN.
unsafe impl Allocator for MallocAllocator {
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    debug_assert!(size > 0, "block size must be greater than zero");

    // SAFETY: malloc has no preconditions; a null return is handled below.
    let ptr = unsafe { libc::malloc(size.max(1)) } as *mut u8;

    NonNull::new(ptr).ok_or(Error::OutOfMemory { requested: size })
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    _size: usize,
  ) {
    // SAFETY: ptr came from malloc and has not been freed.
    unsafe { libc::free(ptr.as_ptr() as *mut libc::c_void) };
  }
}
