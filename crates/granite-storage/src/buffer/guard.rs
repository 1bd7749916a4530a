//! Page guards (read/write) for safe pin management.
//!
//! This module provides RAII guards that route their unpin through the
//! buffer pool when they go out of scope, so replacer bookkeeping stays
//! consistent with the pin count. The write guard tracks whether the
//! page was modified and reports the dirtiness on drop.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use granite_common::types::PageId;

use super::frame::{Frame, FrameId};
use super::pool::BufferPoolManager;

/// Read guard for a page in the buffer pool.
///
/// This guard:
/// - Provides read-only access to page data
/// - Keeps the frame pinned while held
/// - Automatically unpins when dropped
pub struct PageReadGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<Frame>,
}

impl<'a> PageReadGuard<'a> {
    /// Creates a new read guard over an already pinned frame.
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<Frame>) -> Self {
        Self { pool, frame }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        let _ = self.pool.unpin_page(self.frame.page_id(), false);
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write guard for a page in the buffer pool.
///
/// This guard:
/// - Provides read-write access to page data
/// - Keeps the frame pinned while held
/// - Reports the page dirty on drop if it was modified
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<Frame>,
    /// Track if the page was modified.
    modified: bool,
}

impl<'a> PageWriteGuard<'a> {
    /// Creates a new write guard over an already pinned frame.
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<Frame>) -> Self {
        Self {
            pool,
            frame,
            modified: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable reference to the page data.
    ///
    /// The page will be reported dirty when the guard drops.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.modified = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page as modified without getting a mutable reference.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.modified = true;
    }

    /// Returns true if the page was modified through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        let _ = self.pool.unpin_page(self.frame.page_id(), self.modified);
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id())
            .field("frame_id", &self.frame_id())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
