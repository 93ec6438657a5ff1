use std::alloc::LayoutError;

use thiserror::Error;

/// Errors reported by the pool and its backing allocators.
#[derive(Debug, Error)]
pub enum Error {
  /// The backing allocator could not supply a block.
  #[error("out of memory: failed to allocate {requested} bytes")]
  OutOfMemory { requested: usize },

  /// An instrumented allocator refused a request past its configured limit.
  #[error("allocation limit of {limit} allocations reached")]
  AllocationLimit { limit: usize },

  #[error("invalid layout: {0}")]
  Layout(#[from] LayoutError),

  /// The external buffer supplied at construction has no bytes.
  #[error("external buffer must not be empty")]
  EmptyBuffer,

  /// The external buffer is larger than the configured maximum buffer size.
  #[error("external buffer of {size} bytes exceeds max buffer size of {max} bytes")]
  BufferExceedsMax { size: usize, max: usize },

  #[error("max buffer size must be greater than zero")]
  ZeroMaxBufferSize,
}

pub type Result<T> = std::result::Result<T, Error>;
