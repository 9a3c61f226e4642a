//! RAII guards for page access.
//!
//! The index code never calls pin/unpin directly. It fetches a guard,
//! reads or writes through it, and lets the guard's `Drop` return the
//! pin. This makes the balanced pin/unpin protocol a property of scopes
//! rather than of call-site discipline:
//! - [`PageReadGuard`] - shared read access (multiple allowed)
//! - [`PageWriteGuard`] - exclusive write access

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned when the guard is dropped.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let data = guard.as_slice();  // Deref to &Page
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    /// Reference back to BPM for unpin on drop.
    bpm: &'a BufferPoolManager,
    /// Frame holding this page.
    frame_id: FrameId,
    /// Page ID for convenience.
    page_id: PageId,
    /// Lock guard providing access to page data.
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    /// Create a new read guard.
    ///
    /// Called by `BufferPoolManager::fetch_page_read()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        // Read guard: not dirty
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. The page is
/// unpinned when the guard is dropped, and marked dirty only if mutable
/// access was actually taken. This lets tree operations fetch nodes with
/// write intent, inspect them, and walk on without forcing a write-back
/// of pages they never touched.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;  // DerefMut marks the page dirty
/// // guard drops here, page unpinned
/// ```
pub struct PageWriteGuard<'a> {
    /// Reference back to BPM for unpin on drop.
    bpm: &'a BufferPoolManager,
    /// Frame holding this page.
    frame_id: FrameId,
    /// Page ID for convenience.
    page_id: PageId,
    /// Whether mutable access was taken.
    dirtied: bool,
    /// Lock guard providing access to page data.
    lock: RwLockWriteGuard<'a, Page>,
}

impl<'a> PageWriteGuard<'a> {
    /// Create a new write guard.
    ///
    /// Called by `BufferPoolManager::fetch_page_write()`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            dirtied: false,
            lock,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Force the page to be written back when the guard drops.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirtied = true;
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.dirtied = true;
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirtied);
    }
}
