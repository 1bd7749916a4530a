//! LRU replacement policy for the buffer pool.
//!
//! The replacer tracks the frames that are currently eligible for
//! eviction (resident and unpinned) in least-recently-unpinned order.
//! It knows nothing about pages, dirtiness, or disk; the buffer pool
//! tells it which frame ids enter and leave the eligible set.
//!
//! All operations are O(1): a HashMap gives direct access to list nodes,
//! and a doubly-linked list keeps the recency order.

use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::frame::FrameId;

/// A node in the recency list.
struct Node {
    frame_id: FrameId,
    prev: Option<NonNull<Node>>,
    next: Option<NonNull<Node>>,
}

impl Node {
    fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            prev: None,
            next: None,
        }
    }
}

/// The recency order over eligible frames.
///
/// Head is the most recently unpinned frame, tail the least recently
/// unpinned (the next victim).
struct LruList {
    /// Maximum number of tracked frames; a structural bound, never an
    /// eviction trigger.
    capacity: usize,
    /// Map from frame id to its list node.
    map: HashMap<FrameId, NonNull<Node>>,
    /// Head of the list (most recently unpinned).
    head: Option<NonNull<Node>>,
    /// Tail of the list (least recently unpinned).
    tail: Option<NonNull<Node>>,
}

// Safety: LruList owns its nodes and is only reached through the
// replacer's mutex.
unsafe impl Send for LruList {}

impl LruList {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn insert_front(&mut self, frame_id: FrameId) {
        if self.map.contains_key(&frame_id) {
            return;
        }
        if self.map.len() >= self.capacity {
            // The buffer pool never tracks more entries than frames
            // exist; refuse rather than grow past the bound.
            return;
        }

        let node = Box::new(Node::new(frame_id));
        let node_ptr = NonNull::from(Box::leak(node));
        self.push_front(node_ptr);
        self.map.insert(frame_id, node_ptr);
    }

    fn remove(&mut self, frame_id: FrameId) -> bool {
        if let Some(node_ptr) = self.map.remove(&frame_id) {
            self.unlink(node_ptr);
            // Safety: removed from the map, so we own the node
            drop(unsafe { Box::from_raw(node_ptr.as_ptr()) });
            true
        } else {
            false
        }
    }

    fn pop_back(&mut self) -> Option<FrameId> {
        let tail = self.tail?;
        // Safety: tail is a live node owned by this list
        let frame_id = unsafe { (*tail.as_ptr()).frame_id };
        self.remove(frame_id);
        Some(frame_id)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn push_front(&mut self, node_ptr: NonNull<Node>) {
        unsafe {
            (*node_ptr.as_ptr()).prev = None;
            (*node_ptr.as_ptr()).next = self.head;

            if let Some(head) = self.head {
                (*head.as_ptr()).prev = Some(node_ptr);
            }

            self.head = Some(node_ptr);

            if self.tail.is_none() {
                self.tail = Some(node_ptr);
            }
        }
    }

    fn unlink(&mut self, node_ptr: NonNull<Node>) {
        unsafe {
            let prev = (*node_ptr.as_ptr()).prev;
            let next = (*node_ptr.as_ptr()).next;

            if let Some(prev) = prev {
                (*prev.as_ptr()).next = next;
            } else {
                self.head = next;
            }

            if let Some(next) = next {
                (*next.as_ptr()).prev = prev;
            } else {
                self.tail = prev;
            }
        }
    }
}

impl Drop for LruList {
    fn drop(&mut self) {
        let mut current = self.head;
        while let Some(node_ptr) = current {
            unsafe {
                current = (*node_ptr.as_ptr()).next;
                drop(Box::from_raw(node_ptr.as_ptr()));
            }
        }
    }
}

/// LRU replacer over buffer pool frame ids.
///
/// Every operation takes an internal latch, so the replacer is safe to
/// call from multiple threads even without external coordination. The
/// buffer pool additionally holds its own latch across these calls.
pub struct LruReplacer {
    inner: Mutex<LruList>,
}

impl LruReplacer {
    /// Creates a replacer bounded by the number of pool frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            inner: Mutex::new(LruList::new(num_frames)),
        }
    }

    /// Removes and returns the least recently unpinned frame id.
    ///
    /// Returns `None` when no frame is eligible for eviction.
    pub fn victim(&self) -> Option<FrameId> {
        self.inner.lock().pop_back()
    }

    /// Marks a frame as in use, removing it from the eligible set.
    ///
    /// No-op if the frame is not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        self.inner.lock().remove(frame_id);
    }

    /// Marks a frame as eligible for eviction.
    ///
    /// Inserts at the most-recently-used end. Idempotent: a frame that
    /// is already tracked keeps its position.
    pub fn unpin(&self, frame_id: FrameId) {
        self.inner.lock().insert_front(frame_id);
    }

    /// Returns the number of frames eligible for eviction.
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }
}

impl std::fmt::Debug for LruReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruReplacer")
            .field("size", &self.size())
            .finish()
    }
}
