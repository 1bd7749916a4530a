//! Buffer pool manager implementation.
//!
//! The buffer pool mediates between a fixed-size cache of page frames
//! and the disk manager, handling on-demand load, write-back of dirty
//! frames, and LRU replacement when the cache is full.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{Frame, FrameId};
use super::guard::{PageReadGuard, PageWriteGuard};
use super::replacer::LruReplacer;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::log::LogManager;

/// State protected by the pool latch.
///
/// Every frame id is in exactly one of three places: the free list,
/// the page table with a non-zero pin count, or the page table and the
/// replacer's eligible set.
struct PoolState {
    /// Page table: maps PageId -> FrameId.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page, in FIFO order.
    free_list: VecDeque<FrameId>,
}

/// The buffer pool manager.
///
/// It provides:
/// - Page caching with LRU eviction
/// - Pin counting so resident pages cannot be evicted while in use
/// - Dirty page tracking and write-back through the disk manager
///
/// A single coarse latch protects the page table, the free list, and
/// all frame metadata transitions. The latch is held across replacer
/// and disk manager calls, so disk I/O serialises every operation; this
/// is a deliberate simplicity-over-throughput trade.
///
/// One manager exists per storage instance; it is an explicit value
/// constructed at startup and shared by reference, not process-wide
/// state.
pub struct BufferPoolManager {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames, fixed at construction.
    frames: Vec<Arc<Frame>>,
    /// Page table and free list, behind the pool latch.
    latch: Mutex<PoolState>,
    /// LRU replacer over evictable frames.
    replacer: LruReplacer,
    /// Disk manager for page allocation and I/O.
    disk: Arc<dyn DiskManager>,
    /// Log manager handle; stored for surrounding layers, not consulted
    /// by the pool itself.
    log_manager: Option<Arc<dyn LogManager>>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a new buffer pool over the given disk manager.
    ///
    /// All frames start zeroed on the free list.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskManager>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if disk.page_size() != config.page_size {
            return Err(BufferError::config(format!(
                "disk manager page size {} does not match configured page size {}",
                disk.page_size(),
                config.page_size
            )));
        }

        let pool_size = config.pool_size;
        let frames: Vec<Arc<Frame>> = (0..pool_size)
            .map(|i| Arc::new(Frame::new(FrameId::new(i), config.page_size)))
            .collect();
        let free_list = (0..pool_size).map(FrameId::new).collect();

        Ok(Self {
            config,
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk,
            log_manager: None,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Attaches a log manager handle.
    pub fn with_log_manager(mut self, log_manager: Arc<dyn LogManager>) -> Self {
        self.log_manager = Some(log_manager);
        self
    }

    /// Returns the log manager handle, if one was attached.
    pub fn log_manager(&self) -> Option<&Arc<dyn LogManager>> {
        self.log_manager.as_ref()
    }

    /// Makes `page_id` resident, pins it, and returns its frame.
    ///
    /// On a hit no disk I/O occurs. On a miss a frame is taken from the
    /// free list, or failing that from the replacer; the victim's page
    /// is written back first if dirty. Returns
    /// [`BufferError::NoFreeFrames`] when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<Arc<Frame>> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            self.replacer.pin(frame_id);
            frame.pin();
            return Ok(Arc::clone(frame));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];

        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                drop(data);
                // The frame was emptied for this install; return it to
                // the free list so the partition invariant holds.
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }

        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        Ok(Arc::clone(frame))
    }

    /// Allocates a fresh page and returns it resident and pinned.
    ///
    /// The frame is acquired before the id is allocated, so a full pool
    /// never leaks a page id. The new page's contents are zeroed; no
    /// disk image exists until first write-back.
    pub fn new_page(&self) -> BufferResult<Arc<Frame>> {
        let mut state = self.latch.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.disk.allocate_page();
        let frame = &self.frames[frame_id.index()];

        frame.write_data().fill(0);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);

        tracing::debug!(page_id = %page_id, frame_id = frame_id.index(), "allocated new page");
        Ok(Arc::clone(frame))
    }

    /// Releases one pin held by the caller.
    ///
    /// `is_dirty` marks the page as modified; dirtiness is monotonic
    /// until write-back, so `false` never clears it. When the pin count
    /// drops to zero the frame becomes eligible for eviction.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> BufferResult<()> {
        let state = self.latch.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(BufferError::PageNotFound { page_id }),
        };
        let frame = &self.frames[frame_id.index()];

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.pin_count() == 0 {
            return Err(BufferError::NotPinned { page_id });
        }
        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    /// Forces the current contents of a resident page to disk.
    ///
    /// Clears the dirty bit on success. Pinning state is not altered.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<()> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }
        let state = self.latch.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(BufferError::PageNotFound { page_id }),
        };
        let frame = &self.frames[frame_id.index()];

        {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
        }
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes every resident page to disk and returns the count.
    ///
    /// Pinning state is not altered.
    pub fn flush_all_pages(&self) -> BufferResult<usize> {
        let state = self.latch.lock();

        let mut flushed = 0;
        for (&page_id, &frame_id) in &state.page_table {
            let frame = &self.frames[frame_id.index()];
            {
                let data = frame.read_data();
                self.disk.write_page(page_id, &data)?;
            }
            frame.set_dirty(false);
            flushed += 1;
        }

        self.flush_count.fetch_add(flushed as u64, Ordering::Relaxed);
        Ok(flushed)
    }

    /// Removes a page from the buffer pool and the backing store.
    ///
    /// A page that is not resident is deallocated and reported as
    /// deleted. A resident page must have no outstanding pins; its
    /// contents are discarded without write-back, since a deallocated
    /// page is never read again.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut state = self.latch.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                self.disk.deallocate_page(page_id);
                return Ok(());
            }
        };
        let frame = &self.frames[frame_id.index()];

        if frame.pin_count() != 0 {
            return Err(BufferError::PagePinned { page_id });
        }

        // An unpinned resident frame is tracked by the replacer; remove
        // it before the frame changes state.
        self.replacer.pin(frame_id);
        state.page_table.remove(&page_id);
        frame.write_data().fill(0);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id);

        tracing::debug!(page_id = %page_id, frame_id = frame_id.index(), "deleted page");
        Ok(())
    }

    /// Fetches a page and wraps it in a read guard that unpins on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> BufferResult<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, frame))
    }

    /// Fetches a page and wraps it in a write guard that unpins on drop.
    pub fn fetch_page_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, frame))
    }

    /// Allocates a new page and wraps it in a write guard.
    pub fn new_page_write(&self) -> BufferResult<PageWriteGuard<'_>> {
        let frame = self.new_page()?;
        Ok(PageWriteGuard::new(self, frame))
    }

    /// Returns the number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns true if a page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.latch.lock().page_table.contains_key(&page_id)
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.latch.lock();

        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
            resident_pages: state.page_table.len(),
            free_frames: state.free_list.len(),
            evictable_frames: self.replacer.size(),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Obtains an empty frame: free list first, then a replacer victim.
    ///
    /// A dirty victim is written back before its page leaves the table.
    /// On a write-back failure the victim re-enters the replacer so the
    /// pool state stays consistent.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(BufferError::NoFreeFrames)?;
        let frame = &self.frames[frame_id.index()];
        let old_page_id = frame.page_id();
        debug_assert!(old_page_id.is_valid(), "victim frame holds no page");
        debug_assert_eq!(frame.pin_count(), 0, "victim frame is pinned");

        if frame.is_dirty() {
            let data = frame.read_data();
            if let Err(e) = self.disk.write_page(old_page_id, &data) {
                drop(data);
                self.replacer.unpin(frame_id);
                return Err(e.into());
            }
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(page_id = %old_page_id, frame_id = frame_id.index(), "evicted page");
        Ok(frame_id)
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("stats", &self.stats())
            .finish()
    }
}
