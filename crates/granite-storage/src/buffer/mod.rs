//! Buffer pool manager for Granite.
//!
//! The buffer pool manages a fixed-size pool of in-memory page frames,
//! converting logical page ids into pinned frame references:
//!
//! - **Page caching**: keep frequently accessed pages in memory
//! - **Pin/unpin**: reference counting so resident pages cannot be
//!   evicted while in use
//! - **Dirty tracking**: modified pages are written back at eviction or
//!   on explicit flush
//! - **LRU replacement**: the least recently unpinned frame is evicted
//!   when the pool is full
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     BufferPoolManager                           │
//! │  ┌───────────────────────────┐  ┌───────────────────────────┐   │
//! │  │        Page Table         │  │         Free List         │   │
//! │  │  HashMap<PageId, FrameId> │  │     VecDeque<FrameId>     │   │
//! │  └───────────────────────────┘  └───────────────────────────┘   │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                     Frame Array                           │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐     ┌─────────┐      │  │
//! │  │  │ Frame 0 │ │ Frame 1 │ │ Frame 2 │ ... │ Frame N │      │  │
//! │  │  │ ─────── │ │ ─────── │ │ ─────── │     │ ─────── │      │  │
//! │  │  │ page_id │ │ page_id │ │ page_id │     │ page_id │      │  │
//! │  │  │ data[]  │ │ data[]  │ │ data[]  │     │ data[]  │      │  │
//! │  │  │ dirty   │ │ dirty   │ │ dirty   │     │ dirty   │      │  │
//! │  │  │ pin_cnt │ │ pin_cnt │ │ pin_cnt │     │ pin_cnt │      │  │
//! │  │  └─────────┘ └─────────┘ └─────────┘     └─────────┘      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │                              ▼                                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                     LRU Replacer                          │  │
//! │  │            (tracks eviction candidates)                   │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use granite_storage::buffer::{BufferPoolManager, BufferPoolConfig};
//! use granite_storage::disk::MemoryDiskManager;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let disk = Arc::new(MemoryDiskManager::new(8192));
//! let config = BufferPoolConfig::new(64);
//! let pool = BufferPoolManager::new(config, disk)?;
//!
//! // Allocate a page, write into it, release the pin
//! let frame = pool.new_page()?;
//! let page_id = frame.page_id();
//! frame.write_data()[..5].copy_from_slice(b"hello");
//! pool.unpin_page(page_id, true)?;
//!
//! // Fetch it back
//! let frame = pool.fetch_page(page_id)?;
//! assert_eq!(&frame.read_data()[..5], b"hello");
//! pool.unpin_page(page_id, false)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod config;
mod error;
mod frame;
mod guard;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{Frame, FrameId};
pub use guard::{PageReadGuard, PageWriteGuard};
pub use pool::BufferPoolManager;
pub use replacer::LruReplacer;

/// Statistics for buffer pool monitoring.
///
/// The partition counts (`pinned_frames`, `free_frames`,
/// `resident_pages`, `evictable_frames`) are taken at a quiescent point
/// under the pool latch, so `free_frames + resident_pages` always
/// equals the pool size and `evictable_frames` equals the number of
/// resident frames with no outstanding pins.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (required disk read).
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of pages written back by explicit flush.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
    /// Current number of resident pages.
    pub resident_pages: usize,
    /// Current number of frames on the free list.
    pub free_frames: usize,
    /// Current number of frames eligible for eviction.
    pub evictable_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
