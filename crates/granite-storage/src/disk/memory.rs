//! In-memory disk manager.
//!
//! Backs pages with a heap map instead of a file. Used by unit tests
//! and tooling that exercise the buffer pool without touching the
//! filesystem; the semantics match [`FileDiskManager`], including
//! zero-fill reads of never-written pages.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};
use super::DiskManager;

/// Disk manager that stores pages in memory.
pub struct MemoryDiskManager {
    /// Fixed page size in bytes.
    page_size: usize,
    /// Next never-allocated page id.
    next_page_id: AtomicU64,
    /// Stored page images, keyed by page id.
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
    /// Deallocated ids awaiting reuse.
    free_ids: Mutex<HashSet<PageId>>,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory store with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            next_page_id: AtomicU64::new(0),
            pages: Mutex::new(HashMap::new()),
            free_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the number of pages with a stored image.
    pub fn stored_pages(&self) -> usize {
        self.pages.lock().len()
    }

    fn check_request(&self, page_id: PageId, buf_len: usize) -> IoResult<()> {
        if !page_id.is_valid() {
            return Err(IoError::InvalidPageId { page_id });
        }
        if buf_len != self.page_size {
            return Err(IoError::BufferSizeMismatch {
                page_size: self.page_size,
                actual: buf_len,
            });
        }
        Ok(())
    }
}

impl DiskManager for MemoryDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate_page(&self) -> PageId {
        let mut free_ids = self.free_ids.lock();
        if let Some(&page_id) = free_ids.iter().next() {
            free_ids.remove(&page_id);
            return page_id;
        }
        PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed))
    }

    fn deallocate_page(&self, page_id: PageId) {
        if !page_id.is_valid() {
            return;
        }
        if page_id.as_u64() >= self.next_page_id.load(Ordering::Relaxed) {
            return;
        }
        self.pages.lock().remove(&page_id);
        self.free_ids.lock().insert(page_id);
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        self.check_request(page_id, buf.len())?;
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        self.check_request(page_id, buf.len())?;
        self.pages.lock().insert(page_id, buf.to_vec());
        Ok(())
    }

    fn sync(&self) -> IoResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("page_size", &self.page_size)
            .field("stored_pages", &self.stored_pages())
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_SIZE: usize = 4096;

    #[test]
    fn test_round_trip() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);

        let page_id = disk.allocate_page();
        disk.write_page(page_id, &vec![3u8; PAGE_SIZE]).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(page_id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 3));
        assert_eq!(disk.stored_pages(), 1);
    }

    #[test]
    fn test_unwritten_page_reads_zero() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);

        let page_id = disk.allocate_page();
        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(page_id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_deallocate_drops_image() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);

        let page_id = disk.allocate_page();
        disk.write_page(page_id, &vec![9u8; PAGE_SIZE]).unwrap();
        disk.deallocate_page(page_id);
        assert_eq!(disk.stored_pages(), 0);

        // The id comes back on the next allocation, with no stale image
        let reused = disk.allocate_page();
        assert_eq!(reused, page_id);
        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(reused, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);
        let page_id = disk.allocate_page();

        let mut short = vec![0u8; 16];
        assert!(disk.read_page(page_id, &mut short).is_err());
        assert!(disk.write_page(page_id, &short).is_err());
    }
}
