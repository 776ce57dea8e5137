//! Buffer pool management for OxbowDB.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size buffer pool with configurable frame count
//! - Clock (second-chance) eviction policy
//! - Pin counting and dirty-page tracking with write-back
//! - Partitioned page id allocation for cooperating pool instances

mod allocator;
mod disk;
mod frame;
mod pool;
mod replacer;

pub use allocator::PageIdAllocator;
pub use disk::{DiskManager, LogManager, MemDiskManager};
pub use frame::{Frame, FrameId};
pub use pool::{BufferPoolConfig, BufferPoolManager, BufferPoolStats, PageHandle};
pub use replacer::{ClockReplacer, Replacer};
