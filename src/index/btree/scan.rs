//! Ordered range scans over the leaf chain.

use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::NodeKind;

use super::key::{Key, KeyType};
use super::node::{NodeView, Payload};

/// Forward iterator over leaf entries, in non-decreasing key order.
///
/// The engine positions a scan at its run start (the leftmost entry
/// ≥ the lower bound); the scan then walks the leaf sibling chain on
/// its own, stopping once an entry exceeds the optional upper bound.
///
/// Each step re-pins the current leaf for just that step, so a paused
/// scan holds no pins and cannot starve the buffer pool.
pub struct TreeScan {
    bpm: Arc<BufferPoolManager>,
    key_type: KeyType,
    /// Current (leaf, slot) position, or None once exhausted.
    pos: Option<(PageId, usize)>,
    /// Inclusive upper bound.
    hi: Option<Key>,
}

impl TreeScan {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        key_type: KeyType,
        pos: Option<(PageId, usize)>,
        hi: Option<Key>,
    ) -> Self {
        Self {
            bpm,
            key_type,
            pos,
            hi,
        }
    }

    /// Advance to the next entry within bounds.
    ///
    /// Returns `Ok(None)` when the scan is exhausted; subsequent calls
    /// keep returning `Ok(None)`.
    pub fn next_entry(&mut self) -> Result<Option<(Key, RecordId)>> {
        loop {
            let (page_id, slot) = match self.pos {
                Some(p) => p,
                None => return Ok(None),
            };

            let guard = self.bpm.fetch_page_read(page_id)?;
            let view = NodeView::new(guard.as_slice(), self.key_type);
            view.expect_kind(page_id, NodeKind::Leaf)?;

            if slot < view.slot_count() {
                let entry = view.entry_at(slot)?;
                if let Some(hi) = &self.hi {
                    if entry.key > *hi {
                        self.pos = None;
                        return Ok(None);
                    }
                }
                self.pos = Some((page_id, slot + 1));
                let rid = match entry.payload {
                    Payload::Record(rid) => rid,
                    Payload::Child(_) => return Err(Error::MalformedEntry),
                };
                return Ok(Some((entry.key, rid)));
            }

            // Leaf exhausted (or empty): follow the chain
            let next = view.next();
            drop(guard);
            if next.is_valid() {
                self.pos = Some((next, 0));
            } else {
                self.pos = None;
                return Ok(None);
            }
        }
    }
}

impl Iterator for TreeScan {
    type Item = Result<(Key, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
