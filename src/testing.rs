//! Instrumented backing allocator for exercising pools in tests.

use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::allocator::{Allocator, SystemAllocator};
use crate::error::{Error, Result};

/// Wraps another allocator and records what passes through it.
///
/// Optionally fails every request once a number of successful allocations has
/// been reached, which is how exhaustion of the backing allocator is simulated.
/// Counters are atomic so the allocator can be shared between pools living on
/// different threads.
#[derive(Debug, Default)]
pub struct CountingAllocator<A: Allocator = SystemAllocator> {
  inner: A,
  limit: Option<usize>,
  allocations: AtomicUsize,
  deallocations: AtomicUsize,
  bytes_in_use: AtomicUsize,
  sizes: Mutex<Vec<usize>>,
}

impl CountingAllocator {
  pub fn new() -> Self {
    Self::wrap(SystemAllocator::new())
  }

  /// Allocator that serves `limit` allocations and refuses every later one.
  pub fn with_limit(limit: usize) -> Self {
    Self {
      limit: Some(limit),
      ..Self::new()
    }
  }
}

impl<A: Allocator> CountingAllocator<A> {
  pub fn wrap(inner: A) -> Self {
    Self {
      inner,
      limit: None,
      allocations: AtomicUsize::new(0),
      deallocations: AtomicUsize::new(0),
      bytes_in_use: AtomicUsize::new(0),
      sizes: Mutex::new(Vec::new()),
    }
  }

  /// Successful allocations so far.
  pub fn total_allocations(&self) -> usize {
    self.allocations.load(Ordering::Relaxed)
  }

  pub fn total_deallocations(&self) -> usize {
    self.deallocations.load(Ordering::Relaxed)
  }

  /// Blocks handed out and not yet returned.
  pub fn blocks_in_use(&self) -> usize {
    self.total_allocations() - self.total_deallocations()
  }

  pub fn bytes_in_use(&self) -> usize {
    self.bytes_in_use.load(Ordering::Relaxed)
  }

  /// Size of every successful allocation, in request order.
  pub fn sizes(&self) -> Vec<usize> {
    self.sizes.lock().map(|sizes| sizes.clone()).unwrap_or_default()
  }
}

// SAFETY: forwards every block unchanged to an allocator that upholds the
// contract.
unsafe impl<A: Allocator> Allocator for CountingAllocator<A> {
  fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    if let Some(limit) = self.limit {
      if self.total_allocations() >= limit {
        return Err(Error::AllocationLimit { limit });
      }
    }

    let ptr = self.inner.allocate(size)?;

    self.allocations.fetch_add(1, Ordering::Relaxed);
    self.bytes_in_use.fetch_add(size, Ordering::Relaxed);
    if let Ok(mut sizes) = self.sizes.lock() {
      sizes.push(size);
    }

    Ok(ptr)
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    self.deallocations.fetch_add(1, Ordering::Relaxed);
    self.bytes_in_use.fetch_sub(size, Ordering::Relaxed);

    unsafe { self.inner.deallocate(ptr, size) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_counts() {
    let counting = CountingAllocator::new();

    let a = counting.allocate(16).unwrap();
    let b = counting.allocate(48).unwrap();

    assert_eq!(counting.total_allocations(), 2);
    assert_eq!(counting.bytes_in_use(), 64);
    assert_eq!(counting.sizes(), vec![16, 48]);

    unsafe {
      counting.deallocate(a, 16);
      counting.deallocate(b, 48);
    }

    assert_eq!(counting.blocks_in_use(), 0);
    assert_eq!(counting.bytes_in_use(), 0);
  }

  #[test]
  fn test_limit() {
    let counting = CountingAllocator::with_limit(2);

    let a = counting.allocate(8).unwrap();
    let b = counting.allocate(8).unwrap();
    let err = counting.allocate(8).unwrap_err();

    assert!(matches!(err, Error::AllocationLimit { limit: 2 }));
    assert_eq!(counting.total_allocations(), 2);

    unsafe {
      counting.deallocate(a, 8);
      counting.deallocate(b, 8);
    }
  }

  #[test]
  fn test_zero_limit_refuses_everything() {
    let counting = CountingAllocator::with_limit(0);
    assert!(counting.allocate(1).is_err());
    assert!(counting.sizes().is_empty());
  }
}
