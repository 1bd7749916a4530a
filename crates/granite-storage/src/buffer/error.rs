//! Buffer pool errors.

use granite_common::types::PageId;
use thiserror::Error;

use crate::disk::IoError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No frame can be obtained: every frame is pinned.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// Page not resident in the buffer pool.
    #[error("page {page_id} not found in buffer pool")]
    PageNotFound { page_id: PageId },

    /// Operation addressed the invalid page id sentinel.
    #[error("invalid page id: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Unpin of a page whose pin count is already zero.
    #[error("page {page_id} is not pinned")]
    NotPinned { page_id: PageId },

    /// Delete of a page that still has outstanding pins.
    #[error("page {page_id} is pinned and cannot be deleted")]
    PagePinned { page_id: PageId },

    /// Disk manager I/O failure.
    #[error("disk I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a page not found error.
    pub fn page_not_found(page_id: PageId) -> Self {
        Self::PageNotFound { page_id }
    }

    /// Returns true if this is a transient error that can be retried
    /// once the caller has released pins.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames)
    }
}
