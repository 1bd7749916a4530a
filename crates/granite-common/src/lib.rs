//! # granite-common
//!
//! Common types and constants for the Granite storage engine.
//!
//! This crate provides the foundational pieces shared by every Granite
//! component:
//!
//! - **Types**: typed identifiers (`PageId`, `Lsn`) that prevent
//!   accidental mixing of raw integers
//! - **Constants**: system-wide constants and limits (page sizes,
//!   buffer pool sizing)
//!
//! ## Example
//!
//! ```rust
//! use granite_common::types::PageId;
//! use granite_common::constants::DEFAULT_PAGE_SIZE;
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert_eq!(DEFAULT_PAGE_SIZE, 8 * 1024);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
