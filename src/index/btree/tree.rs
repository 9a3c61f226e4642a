//! The tree engine: insert with split propagation, naive delete,
//! run-start search, scans, and whole-tree destruction.

use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::NodeKind;

use super::header::{DeletePolicy, HeaderView};
use super::key::{Key, KeyType};
use super::node::{NodeView, Payload};
use super::scan::TreeScan;
use super::trace::TraceSink;

/// Hard cap on the per-tree maximum key size.
///
/// Keeps at least two worst-case entries per node so a split always
/// produces two non-empty halves.
pub const MAX_KEY_SIZE: usize = 1024;

/// A disk-resident B+Tree index.
///
/// Maps keys to record ids, duplicates allowed. Every operation pins
/// the header page to find the root, then walks one root-to-leaf path
/// pinning and unpinning node pages through RAII guards, so the pin
/// protocol is balanced on every exit path including errors.
///
/// Single-writer: `&mut self` on all mutating operations; no internal
/// locking beyond the buffer pool's own synchronization.
///
/// # Example
/// ```ignore
/// let bpm = Arc::new(BufferPoolManager::new(64, dm));
/// let mut tree = BTree::open_or_create(
///     bpm, "orders_by_id", KeyType::Int, 4, DeletePolicy::Naive)?;
/// tree.insert(&Key::Int(42), rid)?;
/// for entry in tree.scan(None, None)? {
///     let (key, rid) = entry?;
/// }
/// ```
pub struct BTree {
    bpm: Arc<BufferPoolManager>,
    name: String,
    /// Header page handle; None after close/destroy (operations then
    /// fail fast with `Error::Closed`).
    header_page: Option<PageId>,
    key_type: KeyType,
    max_key_size: usize,
    policy: DeletePolicy,
    trace: Option<TraceSink>,
}

impl BTree {
    /// Open the named tree, creating it if absent.
    ///
    /// When the tree already exists its persisted configuration wins;
    /// the arguments only apply to a fresh tree.
    ///
    /// # Errors
    /// `Error::KeyTooLong` if `max_key_size` exceeds [`MAX_KEY_SIZE`].
    pub fn open_or_create(
        bpm: Arc<BufferPoolManager>,
        name: &str,
        key_type: KeyType,
        max_key_size: usize,
        policy: DeletePolicy,
    ) -> Result<Self> {
        if max_key_size > MAX_KEY_SIZE {
            return Err(Error::KeyTooLong {
                got: max_key_size,
                max: MAX_KEY_SIZE,
            });
        }

        if let Some(header_page) = bpm.file_entry(name) {
            return Self::load(bpm, name, header_page);
        }

        let header_page = {
            let mut guard = bpm.new_page()?;
            let pid = guard.page_id();
            let mut view = HeaderView::new(guard.as_mut_slice());
            view.init(key_type, max_key_size as u16, policy);
            pid
        };
        bpm.add_file_entry(name, header_page)?;

        Ok(Self {
            bpm,
            name: name.to_string(),
            header_page: Some(header_page),
            key_type,
            max_key_size,
            policy,
            trace: None,
        })
    }

    /// Open an existing tree.
    ///
    /// # Errors
    /// `Error::IndexNotFound` if no tree with this name exists.
    pub fn open(bpm: Arc<BufferPoolManager>, name: &str) -> Result<Self> {
        let header_page = bpm
            .file_entry(name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        Self::load(bpm, name, header_page)
    }

    fn load(bpm: Arc<BufferPoolManager>, name: &str, header_page: PageId) -> Result<Self> {
        let (key_type, max_key_size, policy) = {
            let guard = bpm.fetch_page_read(header_page)?;
            let view = HeaderView::new(guard.as_slice());
            view.validate(header_page)?;
            (
                view.key_type(header_page)?,
                view.max_key_size(),
                view.delete_policy(header_page)?,
            )
        };

        Ok(Self {
            bpm,
            name: name.to_string(),
            header_page: Some(header_page),
            key_type,
            max_key_size,
            policy,
            trace: None,
        })
    }

    /// The tree's name in the file directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key discriminator this tree was created with.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The delete policy this tree was created with.
    pub fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    /// The maximum serialized key size in bytes.
    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// The current root page, or `PageId::INVALID` for an empty tree.
    pub fn root_page(&self) -> Result<PageId> {
        self.root()
    }

    /// Number of levels from root to leaf (0 for an empty tree).
    pub fn height(&self) -> Result<usize> {
        let mut page_id = self.root()?;
        if !page_id.is_valid() {
            return Ok(0);
        }
        let mut height = 1;
        loop {
            let child = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let view = NodeView::new(guard.as_slice(), self.key_type);
                match view.kind() {
                    NodeKind::Leaf => None,
                    NodeKind::Index => Some(view.prev()),
                    found => {
                        return Err(Error::UnexpectedNodeKind {
                            page: page_id.0,
                            found,
                        })
                    }
                }
            };
            match child {
                Some(pid) => {
                    page_id = pid;
                    height += 1;
                }
                None => return Ok(height),
            }
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert one (key, record id) pair.
    ///
    /// Duplicates are permitted and not deduplicated. May allocate new
    /// pages; updates the header's root pointer when the root splits.
    ///
    /// # Errors
    /// - `Error::KeyTooLong` / `Error::KeyTypeMismatch` on a bad key
    /// - `Error::Closed` after close/destroy
    /// - storage failures propagate unchanged
    pub fn insert(&mut self, key: &Key, rid: RecordId) -> Result<()> {
        self.header()?;
        key.check(self.key_type, self.max_key_size)?;

        let root = self.root()?;

        // First insert: a single leaf becomes the root
        if !root.is_valid() {
            let leaf = {
                let mut guard = self.bpm.new_page()?;
                let pid = guard.page_id();
                let mut view = NodeView::new(guard.as_mut_slice(), self.key_type);
                view.init(NodeKind::Leaf);
                view.insert_entry(key, Payload::Record(rid))?;
                pid
            };
            if let Some(t) = &mut self.trace {
                t.alloc(leaf, "leaf");
            }
            return self.set_root(leaf);
        }

        if let Some((separator, sibling)) = self.insert_into(root, key, rid)? {
            // Root split: the only case where the tree grows a level
            let new_root = {
                let mut guard = self.bpm.new_page()?;
                let pid = guard.page_id();
                let mut view = NodeView::new(guard.as_mut_slice(), self.key_type);
                view.init(NodeKind::Index);
                view.set_prev(root);
                view.insert_entry(&separator, Payload::Child(sibling))?;
                pid
            };
            if let Some(t) = &mut self.trace {
                t.alloc(new_root, "index");
            }
            self.set_root(new_root)?;
        }

        Ok(())
    }

    /// Recursive descent. Returns the carried-up (separator, sibling)
    /// pair when this subtree's node split, None when the insert was
    /// absorbed.
    fn insert_into(
        &mut self,
        page_id: PageId,
        key: &Key,
        rid: RecordId,
    ) -> Result<Option<(Key, PageId)>> {
        self.trace_visit(page_id)?;

        let kind = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            NodeView::new(guard.as_slice(), self.key_type).kind()
        };

        match kind {
            NodeKind::Leaf => self.insert_into_leaf(page_id, key, rid),
            NodeKind::Index => self.insert_into_index(page_id, key, rid),
            found => Err(Error::UnexpectedNodeKind {
                page: page_id.0,
                found,
            }),
        }
    }

    fn insert_into_leaf(
        &mut self,
        page_id: PageId,
        key: &Key,
        rid: RecordId,
    ) -> Result<Option<(Key, PageId)>> {
        {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            if NodeView::new(guard.as_slice(), self.key_type).fits(key) {
                NodeView::new(guard.as_mut_slice(), self.key_type)
                    .insert_entry(key, Payload::Record(rid))?;
                return Ok(None);
            }
        }
        self.split_leaf(page_id, key, rid)
    }

    fn insert_into_index(
        &mut self,
        page_id: PageId,
        key: &Key,
        rid: RecordId,
    ) -> Result<Option<(Key, PageId)>> {
        let child = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let view = NodeView::new(guard.as_slice(), self.key_type);
            view.expect_kind(page_id, NodeKind::Index)?;
            view.child_for_key(key)?
        };

        let (separator, new_child) = match self.insert_into(child, key, rid)? {
            None => return Ok(None),
            Some(carried) => carried,
        };

        // The child split; try to absorb the carried-up separator here
        {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            if NodeView::new(guard.as_slice(), self.key_type).fits(&separator) {
                NodeView::new(guard.as_mut_slice(), self.key_type)
                    .insert_entry(&separator, Payload::Child(new_child))?;
                return Ok(None);
            }
        }
        self.split_index(page_id, separator, new_child)
    }

    /// Split a full leaf around an incoming entry.
    ///
    /// Links the fresh sibling into the chain both ways (including the
    /// old right neighbour's back pointer) and carries the sibling's
    /// first key up unchanged.
    fn split_leaf(
        &mut self,
        page_id: PageId,
        key: &Key,
        rid: RecordId,
    ) -> Result<Option<(Key, PageId)>> {
        let mut orig_guard = self.bpm.fetch_page_write(page_id)?;
        let mut sib_guard = self.bpm.new_page()?;
        let sib_pid = sib_guard.page_id();

        let carry;
        let old_next;
        {
            let mut orig = NodeView::new(orig_guard.as_mut_slice(), self.key_type);
            let mut sib = NodeView::new(sib_guard.as_mut_slice(), self.key_type);
            sib.init(NodeKind::Leaf);

            Self::split_entries(&mut orig, &mut sib)?;

            // The incoming entry goes to whichever half owns its key range
            if *key >= sib.key_at(0)? {
                sib.insert_entry(key, Payload::Record(rid))?;
            } else {
                orig.insert_entry(key, Payload::Record(rid))?;
            }

            old_next = orig.next();
            sib.set_prev(page_id);
            sib.set_next(old_next);
            orig.set_next(sib_pid);

            carry = sib.key_at(0)?;
        }
        drop(orig_guard);
        drop(sib_guard);

        if old_next.is_valid() {
            let mut guard = self.bpm.fetch_page_write(old_next)?;
            NodeView::new(guard.as_mut_slice(), self.key_type).set_prev(sib_pid);
        }

        if let Some(t) = &mut self.trace {
            t.split(page_id, sib_pid);
        }
        Ok(Some((carry, sib_pid)))
    }

    /// Split a full index node around a carried-up separator.
    ///
    /// The sibling's first entry is absorbed into its leftmost child
    /// pointer and its key becomes the separator carried further up.
    fn split_index(
        &mut self,
        page_id: PageId,
        separator: Key,
        new_child: PageId,
    ) -> Result<Option<(Key, PageId)>> {
        let mut orig_guard = self.bpm.fetch_page_write(page_id)?;
        let mut sib_guard = self.bpm.new_page()?;
        let sib_pid = sib_guard.page_id();

        let carry;
        {
            let mut orig = NodeView::new(orig_guard.as_mut_slice(), self.key_type);
            let mut sib = NodeView::new(sib_guard.as_mut_slice(), self.key_type);
            sib.init(NodeKind::Index);

            Self::split_entries(&mut orig, &mut sib)?;

            if separator >= sib.key_at(0)? {
                sib.insert_entry(&separator, Payload::Child(new_child))?;
            } else {
                orig.insert_entry(&separator, Payload::Child(new_child))?;
            }

            // First sibling entry becomes implicit as the leftmost pointer
            let first = sib.entry_at(0)?;
            let leftmost = match first.payload {
                Payload::Child(pid) => pid,
                Payload::Record(_) => return Err(Error::MalformedEntry),
            };
            sib.set_prev(leftmost);
            sib.delete_at(0)?;
            carry = first.key;
        }
        drop(orig_guard);
        drop(sib_guard);

        if let Some(t) = &mut self.trace {
            t.split(page_id, sib_pid);
        }
        Ok(Some((carry, sib_pid)))
    }

    /// Redistribute an overflowing node's entries into a fresh sibling,
    /// balanced by occupied bytes rather than entry count so
    /// variable-length keys split fairly.
    ///
    /// Moves everything to the sibling, then moves entries back from
    /// the sibling's front while the sibling remains the fuller half;
    /// if the last move overshot, one entry is returned to the sibling.
    fn split_entries(
        orig: &mut NodeView<&mut [u8]>,
        sib: &mut NodeView<&mut [u8]>,
    ) -> Result<()> {
        while !orig.is_empty() {
            let entry = orig.entry_at(0)?;
            orig.delete_at(0)?;
            sib.insert_entry(&entry.key, entry.payload)?;
        }

        while sib.free_space() < orig.free_space() {
            let entry = sib.entry_at(0)?;
            sib.delete_at(0)?;
            orig.insert_entry(&entry.key, entry.payload)?;
        }

        if orig.free_space() < sib.free_space() && !orig.is_empty() {
            let last = orig.slot_count() - 1;
            let entry = orig.entry_at(last)?;
            orig.delete_at(last)?;
            sib.insert_entry(&entry.key, entry.payload)?;
        }

        Ok(())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove the leaf entries matching both `key` and `rid` exactly.
    ///
    /// Naive policy: no merging or redistribution, underfull and even
    /// empty leaves persist. Returns whether anything was removed.
    ///
    /// # Errors
    /// `Error::UnsupportedDeletePolicy` if the tree was created with
    /// the `Full` policy.
    pub fn delete(&mut self, key: &Key, rid: RecordId) -> Result<bool> {
        self.header()?;
        if self.policy != DeletePolicy::Naive {
            return Err(Error::UnsupportedDeletePolicy(self.policy));
        }
        key.check(self.key_type, self.max_key_size)?;

        let (mut page_id, mut slot) = match self.find_run_start(Some(key))? {
            Some(start) => start,
            None => return Ok(false),
        };

        let mut removed = false;
        loop {
            self.trace_visit(page_id)?;

            // Scan first so an untouched leaf stays clean
            let (matches, stop, next) = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let view = NodeView::new(guard.as_slice(), self.key_type);
                view.expect_kind(page_id, NodeKind::Leaf)?;

                let mut matches = Vec::new();
                let mut stop = false;
                for s in slot..view.slot_count() {
                    let entry = view.entry_at(s)?;
                    if entry.key > *key {
                        // Leaf chain is globally sorted; no match past here
                        stop = true;
                        break;
                    }
                    if entry.key == *key && entry.payload == Payload::Record(rid) {
                        matches.push(s);
                    }
                }
                (matches, stop, view.next())
            };

            if !matches.is_empty() {
                let mut guard = self.bpm.fetch_page_write(page_id)?;
                let mut view = NodeView::new(guard.as_mut_slice(), self.key_type);
                for &s in matches.iter().rev() {
                    view.delete_at(s)?;
                }
                removed = true;
            }

            if stop || !next.is_valid() {
                return Ok(removed);
            }
            // Duplicates may continue on the next leaf
            page_id = next;
            slot = 0;
        }
    }

    // ========================================================================
    // Run-start search and scans
    // ========================================================================

    /// Find the leftmost leaf position whose key is ≥ `lo`, or the very
    /// first entry when `lo` is absent.
    ///
    /// Returns None for an empty tree or when every key is below `lo`.
    /// Every page pinned on the way is unpinned before returning.
    pub fn find_run_start(&mut self, lo: Option<&Key>) -> Result<Option<(PageId, usize)>> {
        let mut page_id = self.root()?;
        if !page_id.is_valid() {
            return Ok(None);
        }

        // Descend to a leaf; at separators, ties go left so no entry
        // equal to the bound is skipped
        loop {
            self.trace_visit(page_id)?;
            let child = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let view = NodeView::new(guard.as_slice(), self.key_type);
                match view.kind() {
                    NodeKind::Leaf => None,
                    NodeKind::Index => {
                        let mut child = view.prev();
                        if let Some(lo) = lo {
                            for s in 0..view.slot_count() {
                                if view.key_at(s)? < *lo {
                                    child = view.child_at(s)?;
                                } else {
                                    break;
                                }
                            }
                        }
                        Some(child)
                    }
                    found => {
                        return Err(Error::UnexpectedNodeKind {
                            page: page_id.0,
                            found,
                        })
                    }
                }
            };
            match child {
                Some(pid) => page_id = pid,
                None => break,
            }
        }

        // Walk right along the chain past empty leaves and keys < lo
        let mut slot = 0;
        loop {
            let next = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let view = NodeView::new(guard.as_slice(), self.key_type);
                view.expect_kind(page_id, NodeKind::Leaf)?;

                while slot < view.slot_count() {
                    let bound = match lo {
                        None => return Ok(Some((page_id, slot))),
                        Some(bound) => bound,
                    };
                    if view.key_at(slot)? >= *bound {
                        return Ok(Some((page_id, slot)));
                    }
                    slot += 1;
                }
                view.next()
            };
            if !next.is_valid() {
                return Ok(None);
            }
            page_id = next;
            slot = 0;
        }
    }

    /// Open a range scan over `[lo, hi]` (either bound optional).
    ///
    /// Equal bounds degenerate to an exact-match scan that still yields
    /// every duplicate. An empty tree yields an exhausted iterator
    /// without touching any node page.
    pub fn scan(&mut self, lo: Option<&Key>, hi: Option<&Key>) -> Result<TreeScan> {
        self.header()?;
        for bound in [lo, hi].into_iter().flatten() {
            if bound.key_type() != self.key_type {
                return Err(Error::KeyTypeMismatch {
                    expected: self.key_type,
                    found: bound.key_type(),
                });
            }
        }

        let pos = self.find_run_start(lo)?;
        Ok(TreeScan::new(
            Arc::clone(&self.bpm),
            self.key_type,
            pos,
            hi.cloned(),
        ))
    }

    // ========================================================================
    // Destroy and close
    // ========================================================================

    /// Free every node page, the header page, and the name binding.
    ///
    /// Consumes the tree; the name can be re-created afterwards and
    /// starts empty.
    pub fn destroy(mut self) -> Result<()> {
        let header_page = self.header_page.take().ok_or(Error::Closed)?;

        let root = {
            let guard = self.bpm.fetch_page_read(header_page)?;
            let view = HeaderView::new(guard.as_slice());
            view.validate(header_page)?;
            view.root()
        };

        if root.is_valid() {
            self.destroy_subtree(root)?;
        }

        if let Some(t) = &mut self.trace {
            t.free(header_page);
        }
        self.bpm.free_page(header_page)?;
        self.bpm.delete_file_entry(&self.name)
    }

    /// Postorder page freeing: children first, then the node itself.
    fn destroy_subtree(&mut self, page_id: PageId) -> Result<()> {
        let children = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let view = NodeView::new(guard.as_slice(), self.key_type);
            match view.kind() {
                NodeKind::Leaf => Vec::new(),
                NodeKind::Index => {
                    let mut children = vec![view.prev()];
                    for s in 0..view.slot_count() {
                        children.push(view.child_at(s)?);
                    }
                    children
                }
                found => {
                    return Err(Error::UnexpectedNodeKind {
                        page: page_id.0,
                        found,
                    })
                }
            }
        };

        for child in children {
            self.destroy_subtree(child)?;
        }

        if let Some(t) = &mut self.trace {
            t.free(page_id);
        }
        self.bpm.free_page(page_id)
    }

    /// Flush everything and invalidate the handle.
    ///
    /// Any later operation fails with `Error::Closed`. Closing twice is
    /// a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.header_page.take().is_some() {
            self.bpm.flush_all_pages()?;
        }
        Ok(())
    }

    // ========================================================================
    // Tracing
    // ========================================================================

    /// Attach a diagnostic trace sink writing to `path`.
    pub fn enable_trace<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.trace = Some(TraceSink::create(path)?);
        Ok(())
    }

    /// Detach the trace sink, if any.
    pub fn disable_trace(&mut self) {
        self.trace = None;
    }

    /// Emit a VISIT line plus the visited node's contents.
    fn trace_visit(&mut self, page_id: PageId) -> Result<()> {
        if self.trace.is_none() {
            return Ok(());
        }

        enum Contents {
            Index(Vec<PageId>),
            Leaf(usize),
            Other,
        }
        let contents = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let view = NodeView::new(guard.as_slice(), self.key_type);
            match view.kind() {
                NodeKind::Index => {
                    let mut children = vec![view.prev()];
                    for s in 0..view.slot_count() {
                        children.push(view.child_at(s)?);
                    }
                    Contents::Index(children)
                }
                NodeKind::Leaf => Contents::Leaf(view.slot_count()),
                _ => Contents::Other,
            }
        };

        if let Some(t) = &mut self.trace {
            t.visit(page_id);
            match contents {
                Contents::Index(children) => t.index_node(page_id, &children),
                Contents::Leaf(entries) => t.leaf_node(page_id, entries),
                Contents::Other => {}
            }
        }
        Ok(())
    }

    // ========================================================================
    // Header access
    // ========================================================================

    fn header(&self) -> Result<PageId> {
        self.header_page.ok_or(Error::Closed)
    }

    fn root(&self) -> Result<PageId> {
        let header_page = self.header()?;
        let guard = self.bpm.fetch_page_read(header_page)?;
        let view = HeaderView::new(guard.as_slice());
        view.validate(header_page)?;
        Ok(view.root())
    }

    fn set_root(&mut self, root: PageId) -> Result<()> {
        let header_page = self.header()?;
        {
            let mut guard = self.bpm.fetch_page_write(header_page)?;
            HeaderView::new(guard.as_mut_slice()).set_root(root);
        }
        if let Some(t) = &mut self.trace {
            t.new_root(root);
        }
        Ok(())
    }
}
