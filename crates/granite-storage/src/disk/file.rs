//! File-backed disk manager.
//!
//! Pages live at `page_id * page_size` offsets in a single data file.
//! Page ids are handed out from a monotonic counter, with deallocated
//! ids recycled before the counter advances.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};
use super::DiskManager;

/// Disk manager over a single data file.
///
/// The file grows lazily: a freshly allocated page has no on-disk image
/// until its first write-back, and reading it returns zeroes. All file
/// access is serialised through one seek-and-transfer handle.
pub struct FileDiskManager {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The data file path.
    path: PathBuf,
    /// Fixed page size in bytes.
    page_size: usize,
    /// Next never-allocated page id.
    next_page_id: AtomicU64,
    /// Deallocated ids awaiting reuse.
    free_ids: Mutex<HashSet<PageId>>,
}

impl FileDiskManager {
    /// Opens (or creates) a data file with the given page size.
    ///
    /// The allocation counter resumes past the pages already present in
    /// the file, so reopening a store never re-issues a live id.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| IoError::from_io_with_path(e, &path))?;

        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let next_page_id = len.div_ceil(page_size as u64);

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
            next_page_id: AtomicU64::new(next_page_id),
            free_ids: Mutex::new(HashSet::new()),
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
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

    fn offset(&self, page_id: PageId) -> u64 {
        page_id.as_u64() * self.page_size as u64
    }
}

impl DiskManager for FileDiskManager {
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
        self.free_ids.lock().insert(page_id);
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        self.check_request(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;

        // The page may be entirely or partially beyond EOF when it has
        // never been written back; the missing tail reads as zeroes.
        let mut total_read = 0;
        while total_read < buf.len() {
            let n = file.read(&mut buf[total_read..])?;
            if n == 0 {
                tracing::debug!(
                    page_id = %page_id,
                    bytes = total_read,
                    "page read past end of data file, zero-filling"
                );
                buf[total_read..].fill(0);
                break;
            }
            total_read += n;
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        self.check_request(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(page_id)))?;

        let mut total_written = 0;
        while total_written < buf.len() {
            let n = file.write(&buf[total_written..])?;
            if n == 0 {
                return Err(IoError::short_write(buf.len(), total_written));
            }
            total_written += n;
        }
        file.flush()?;
        Ok(())
    }

    fn sync(&self) -> IoResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}
