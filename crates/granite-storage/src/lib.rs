//! # granite-storage
//!
//! Storage engine core for Granite.
//!
//! This crate implements the page cache that sits between the access
//! methods and stable storage:
//!
//! - **Buffer pool**: a fixed-size array of page frames with pin
//!   counting, dirty tracking, and LRU replacement
//! - **Disk management**: page-granular allocation and I/O over a data
//!   file, behind a capability trait the buffer pool consumes

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager and replacement policy
pub mod buffer;

/// Disk manager interface and implementations
pub mod disk;

/// Log manager handle
pub mod log;
