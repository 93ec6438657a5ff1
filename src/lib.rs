//! # seqpool - Buffered Sequential Memory Pool
//!
//! This crate provides a **buffered sequential pool**: a bump allocator that
//! serves variably-sized, aligned blocks out of a buffer supplied by the caller
//! and falls back to blocks from a backing allocator once that buffer runs out.
//!
//! ## Overview
//!
//! ```text
//!   External Buffer (caller owned, e.g. on the stack):
//!
//!   ┌─────┬──┬─────┬─────┬──────────┬──────────────┐
//!   │ A1  │▒▒│ A2  │ A3  │    A4    │ unusable tail│
//!   └─────┴──┴─────┴─────┴──────────┴──────────────┘
//!                                   ▲
//!                                   └── A5 does not fit: grow
//!
//!   Block Chain (backing allocator, newest first):
//!
//!   head ──▶ ┌────────┬──────────────────────────────┐
//!            │ header │ A7 │      Free Space         │   64 bytes
//!            └───┬────┴──────────────────────────────┘
//!                ▼
//!            ┌────────┬───────────────┐
//!            │ header │ A5 │ A6 │▒▒▒▒▒│   32 bytes
//!            └───┬────┴───────────────┘
//!                ▼
//!               None
//! ```
//!
//! While the external buffer has room, allocating costs a pointer bump and
//! never touches the heap. Nothing is ever freed individually: `release()`
//! frees every block and rewinds to the start of the external buffer.
//!
//! ## Crate Structure
//!
//! ```text
//!   seqpool
//!   ├── align      - MAX_ALIGN, align!/align_to! macros, AlignmentStrategy
//!   ├── allocator  - Allocator trait, SystemAllocator, MallocAllocator
//!   ├── region     - RegionArena: bump allocation over one region
//!   ├── block      - BlockChain: whole blocks linked by an intrusive header
//!   ├── growth     - GrowthStrategy: size of the next block
//!   ├── pool       - SequentialPool, PoolBuilder, AutoRelease
//!   ├── placement  - allocate_in / deallocate_in / new_in
//!   ├── error      - Error, Result
//!   └── testing    - CountingAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::mem::MaybeUninit;
//! use seqpool::{AlignmentStrategy, GrowthStrategy, SequentialPool};
//!
//! # fn main() -> seqpool::Result<()> {
//! let mut buffer = [MaybeUninit::uninit(); 128];
//!
//! let mut pool = SequentialPool::builder(&mut buffer)
//!   .growth_strategy(GrowthStrategy::Geometric)
//!   .alignment_strategy(AlignmentStrategy::Natural)
//!   .max_buffer_size(1024)
//!   .build()?;
//!
//! let name = pool.alloc_str("pool")?;
//! let values = pool.alloc_slice_copy(&[1u64, 2, 3])?;
//! assert_eq!(name, "pool");
//! assert_eq!(values.iter().sum::<u64>(), 6);
//!
//! pool.release();
//! # Ok(())
//! # }
//! ```
//!
//! ## Growth
//!
//! - **Geometric** (default): each new block doubles the previous buffer,
//!   starting from the external buffer's size, capped at the max buffer size.
//!   A request larger than the cap gets a block of exactly its size.
//! - **Constant**: every block is the max buffer size, or the external
//!   buffer's size when there is no cap.
//!
//! ## Alignment
//!
//! - **Natural** (default): largest power of two not above the request size,
//!   capped at [`align::MAX_ALIGN`].
//! - **Maximum**: always [`align::MAX_ALIGN`].
//!
//! ## Limitations
//!
//! - **Single writer**: a pool is `Send` but not `Sync`
//! - **No individual free**: memory comes back only on release or drop
//! - **No reuse of abandoned space**: the tail of an exhausted buffer stays
//!   unused until release

pub mod align;
pub mod allocator;
mod block;
pub mod error;
mod growth;
pub mod placement;
mod pool;
mod region;
pub mod testing;

pub use align::AlignmentStrategy;
pub use allocator::{Allocator, MallocAllocator, SystemAllocator};
pub use block::{BlockChain, HEADER_SIZE};
pub use error::{Error, Result};
pub use growth::GrowthStrategy;
pub use pool::{AutoRelease, PoolBuilder, SequentialPool};
pub use region::RegionArena;
