//! Slotted-page node views.
//!
//! Index and leaf nodes share one physical layout: a slot directory
//! growing up from the fixed fields, variable-length cells growing down
//! from the end of the page, entries kept in non-decreasing key order.
//!
//! ```text
//! 0        8         10          12     16     20
//! ┌────────┬─────────┬───────────┬──────┬──────┬───────────┬───┬───────┐
//! │ header │ slots n │ cell_start│ prev │ next │ slot dir →│...│← cells│
//! └────────┴─────────┴───────────┴──────┴──────┴───────────┴───┴───────┘
//! ```
//!
//! A cell is the encoded key followed by the payload: a child page id
//! on index nodes, a record id on leaves. On a leaf, `prev`/`next` are
//! the sibling chain; on an index node, `prev` doubles as the leftmost
//! child pointer (keys below the first separator) and `next` is unused.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{NodeKind, PageHeader};

use super::key::{Key, KeyType};

const OFF_SLOT_COUNT: usize = PageHeader::SIZE;
const OFF_CELL_START: usize = OFF_SLOT_COUNT + 2;
const OFF_PREV: usize = OFF_CELL_START + 2;
const OFF_NEXT: usize = OFF_PREV + 4;
const SLOTS_OFF: usize = OFF_NEXT + 4;

/// Bytes per slot directory entry: cell offset (u16) + cell length (u16).
const SLOT_SIZE: usize = 4;

/// Payload size for each node kind.
const CHILD_SIZE: usize = 4;

/// An entry's payload: a child pointer or a record id, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Child page (index nodes).
    Child(PageId),
    /// Record id (leaf nodes).
    Record(RecordId),
}

/// A decoded node entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub payload: Payload,
}

/// Typed view over a node page.
///
/// Generic over the underlying buffer: wrapping a `&[u8]` (from a read
/// guard) exposes only the inspection methods, wrapping a `&mut [u8]`
/// (from a write guard) adds mutation.
pub struct NodeView<B> {
    buf: B,
    key_type: KeyType,
}

impl<B: AsRef<[u8]>> NodeView<B> {
    /// Wrap a page buffer.
    pub fn new(buf: B, key_type: KeyType) -> Self {
        Self { buf, key_type }
    }

    /// The node's kind tag.
    pub fn kind(&self) -> NodeKind {
        PageHeader::from_bytes(self.buf.as_ref()).kind
    }

    /// Fail unless this node carries the expected kind tag.
    pub fn expect_kind(&self, page_id: PageId, expected: NodeKind) -> Result<()> {
        let found = self.kind();
        if found != expected {
            return Err(Error::NodeTypeMismatch {
                page: page_id.0,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Number of entries in this node.
    pub fn slot_count(&self) -> usize {
        let data = self.buf.as_ref();
        u16::from_le_bytes([data[OFF_SLOT_COUNT], data[OFF_SLOT_COUNT + 1]]) as usize
    }

    /// Whether the node holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }

    /// Previous sibling (leaf) or leftmost child (index).
    pub fn prev(&self) -> PageId {
        self.read_page_id(OFF_PREV)
    }

    /// Next sibling (leaf only).
    pub fn next(&self) -> PageId {
        self.read_page_id(OFF_NEXT)
    }

    /// Unused bytes between the slot directory and the cell area.
    pub fn free_space(&self) -> usize {
        self.cell_start() - (SLOTS_OFF + SLOT_SIZE * self.slot_count())
    }

    /// Whether an entry with this key still fits.
    pub fn fits(&self, key: &Key) -> bool {
        self.entry_size(key) + SLOT_SIZE <= self.free_space()
    }

    /// Cell bytes an entry with this key occupies (key + payload).
    pub fn entry_size(&self, key: &Key) -> usize {
        key.encoded_len() + self.payload_size()
    }

    /// The key stored at a slot.
    pub fn key_at(&self, slot: usize) -> Result<Key> {
        let cell = self.cell(slot)?;
        let (key, _) = Key::decode(self.key_type, cell)?;
        Ok(key)
    }

    /// The full entry stored at a slot.
    pub fn entry_at(&self, slot: usize) -> Result<Entry> {
        let kind = self.kind();
        let cell = self.cell(slot)?;
        let (key, used) = Key::decode(self.key_type, cell)?;
        let rest = &cell[used..];

        let payload = match kind {
            NodeKind::Index => {
                if rest.len() < CHILD_SIZE {
                    return Err(Error::MalformedEntry);
                }
                Payload::Child(PageId::new(u32::from_le_bytes([
                    rest[0], rest[1], rest[2], rest[3],
                ])))
            }
            NodeKind::Leaf => {
                if rest.len() < RecordId::SIZE {
                    return Err(Error::MalformedEntry);
                }
                Payload::Record(RecordId::from_bytes(rest))
            }
            _ => return Err(Error::MalformedEntry),
        };

        Ok(Entry { key, payload })
    }

    /// The child pointer at a slot (index nodes).
    pub fn child_at(&self, slot: usize) -> Result<PageId> {
        match self.entry_at(slot)?.payload {
            Payload::Child(pid) => Ok(pid),
            Payload::Record(_) => Err(Error::MalformedEntry),
        }
    }

    /// The record id at a slot (leaf nodes).
    pub fn record_at(&self, slot: usize) -> Result<RecordId> {
        match self.entry_at(slot)?.payload {
            Payload::Record(rid) => Ok(rid),
            Payload::Child(_) => Err(Error::MalformedEntry),
        }
    }

    /// The child an index node routes `key` into.
    ///
    /// Follows the greatest separator ≤ `key`; keys below the first
    /// separator go to the leftmost child. Equal keys route right of
    /// their separator, matching the left-to-right duplicate ordering
    /// in the leaf chain.
    pub fn child_for_key(&self, key: &Key) -> Result<PageId> {
        let mut child = self.prev();
        for slot in 0..self.slot_count() {
            if self.key_at(slot)? <= *key {
                child = self.child_at(slot)?;
            } else {
                break;
            }
        }
        Ok(child)
    }

    fn payload_size(&self) -> usize {
        match self.kind() {
            NodeKind::Leaf => RecordId::SIZE,
            _ => CHILD_SIZE,
        }
    }

    fn cell_start(&self) -> usize {
        let data = self.buf.as_ref();
        u16::from_le_bytes([data[OFF_CELL_START], data[OFF_CELL_START + 1]]) as usize
    }

    fn slot(&self, slot: usize) -> Result<(usize, usize)> {
        if slot >= self.slot_count() {
            return Err(Error::MalformedEntry);
        }
        let data = self.buf.as_ref();
        let base = SLOTS_OFF + SLOT_SIZE * slot;
        let off = u16::from_le_bytes([data[base], data[base + 1]]) as usize;
        let len = u16::from_le_bytes([data[base + 2], data[base + 3]]) as usize;
        Ok((off, len))
    }

    fn cell(&self, slot: usize) -> Result<&[u8]> {
        let (off, len) = self.slot(slot)?;
        let data = self.buf.as_ref();
        if off + len > data.len() {
            return Err(Error::MalformedEntry);
        }
        Ok(&data[off..off + len])
    }

    fn read_page_id(&self, offset: usize) -> PageId {
        let data = self.buf.as_ref();
        PageId::new(u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodeView<B> {
    /// Initialize a freshly allocated page as an empty node.
    pub fn init(&mut self, kind: NodeKind) {
        let data = self.buf.as_mut();
        PageHeader::new(kind).write_to(data);
        data[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2].copy_from_slice(&0u16.to_le_bytes());
        data[OFF_CELL_START..OFF_CELL_START + 2]
            .copy_from_slice(&(PAGE_SIZE as u16).to_le_bytes());
        data[OFF_PREV..OFF_PREV + 4].copy_from_slice(&PageId::INVALID.0.to_le_bytes());
        data[OFF_NEXT..OFF_NEXT + 4].copy_from_slice(&PageId::INVALID.0.to_le_bytes());
    }

    /// Set the previous sibling (leaf) or leftmost child (index).
    pub fn set_prev(&mut self, page_id: PageId) {
        self.buf.as_mut()[OFF_PREV..OFF_PREV + 4]
            .copy_from_slice(&page_id.0.to_le_bytes());
    }

    /// Set the next sibling (leaf only).
    pub fn set_next(&mut self, page_id: PageId) {
        self.buf.as_mut()[OFF_NEXT..OFF_NEXT + 4]
            .copy_from_slice(&page_id.0.to_le_bytes());
    }

    /// Insert an entry at its sorted position, returning its slot.
    ///
    /// Duplicates insert after their equals, so repeated keys keep
    /// insertion order left to right.
    ///
    /// # Errors
    /// `Error::NodeFull` if the entry does not fit. Callers check
    /// `fits` first and split; hitting this is an invariant breach.
    pub fn insert_entry(&mut self, key: &Key, payload: Payload) -> Result<usize> {
        if !self.fits(key) {
            return Err(Error::NodeFull);
        }

        // First slot with a strictly greater key
        let count = self.slot_count();
        let mut pos = count;
        for slot in 0..count {
            if self.key_at(slot)? > *key {
                pos = slot;
                break;
            }
        }

        let mut cell = Vec::with_capacity(self.entry_size(key));
        key.encode_into(&mut cell);
        match payload {
            Payload::Child(pid) => cell.extend_from_slice(&pid.0.to_le_bytes()),
            Payload::Record(rid) => {
                let mut buf = [0u8; RecordId::SIZE];
                rid.write_to(&mut buf);
                cell.extend_from_slice(&buf);
            }
        }

        let cell_off = self.cell_start() - cell.len();
        let data = self.buf.as_mut();
        data[cell_off..cell_off + cell.len()].copy_from_slice(&cell);

        // Shift the slot directory right to open slot `pos`
        let src = SLOTS_OFF + SLOT_SIZE * pos;
        let end = SLOTS_OFF + SLOT_SIZE * count;
        data.copy_within(src..end, src + SLOT_SIZE);
        data[src..src + 2].copy_from_slice(&(cell_off as u16).to_le_bytes());
        data[src + 2..src + 4].copy_from_slice(&(cell.len() as u16).to_le_bytes());

        self.set_slot_count(count + 1);
        self.set_cell_start(cell_off);

        Ok(pos)
    }

    /// Remove the entry at a slot, compacting the cell area.
    pub fn delete_at(&mut self, slot: usize) -> Result<()> {
        let count = self.slot_count();
        let (off, len) = self.slot(slot)?;
        let cell_start = self.cell_start();

        let data = self.buf.as_mut();

        // Close the slot directory gap
        let src = SLOTS_OFF + SLOT_SIZE * (slot + 1);
        let end = SLOTS_OFF + SLOT_SIZE * count;
        data.copy_within(src..end, src - SLOT_SIZE);

        // Slide cells below the removed one up over the hole
        data.copy_within(cell_start..off, cell_start + len);

        self.set_slot_count(count - 1);
        self.set_cell_start(cell_start + len);

        // Re-point slots whose cells moved
        for s in 0..count - 1 {
            let base = SLOTS_OFF + SLOT_SIZE * s;
            let data = self.buf.as_mut();
            let s_off =
                u16::from_le_bytes([data[base], data[base + 1]]) as usize;
            if s_off < off {
                data[base..base + 2]
                    .copy_from_slice(&((s_off + len) as u16).to_le_bytes());
            }
        }

        Ok(())
    }

    fn set_slot_count(&mut self, count: usize) {
        self.buf.as_mut()[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2]
            .copy_from_slice(&(count as u16).to_le_bytes());
    }

    fn set_cell_start(&mut self, cell_start: usize) {
        self.buf.as_mut()[OFF_CELL_START..OFF_CELL_START + 2]
            .copy_from_slice(&(cell_start as u16).to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_buf() -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);
        view.init(NodeKind::Leaf);
        buf
    }

    fn rid(n: u32) -> RecordId {
        RecordId::new(PageId::new(n), n as u16)
    }

    #[test]
    fn test_init_empty_leaf() {
        let buf = leaf_buf();
        let view = NodeView::new(&buf[..], KeyType::Int);

        assert_eq!(view.kind(), NodeKind::Leaf);
        assert!(view.is_empty());
        assert!(!view.prev().is_valid());
        assert!(!view.next().is_valid());
        assert_eq!(view.free_space(), PAGE_SIZE - SLOTS_OFF);
    }

    #[test]
    fn test_insert_sorted() {
        let mut buf = leaf_buf();
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);

        view.insert_entry(&Key::Int(30), Payload::Record(rid(3))).unwrap();
        view.insert_entry(&Key::Int(10), Payload::Record(rid(1))).unwrap();
        view.insert_entry(&Key::Int(20), Payload::Record(rid(2))).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Int);
        assert_eq!(view.slot_count(), 3);
        assert_eq!(view.key_at(0).unwrap(), Key::Int(10));
        assert_eq!(view.key_at(1).unwrap(), Key::Int(20));
        assert_eq!(view.key_at(2).unwrap(), Key::Int(30));
        assert_eq!(view.record_at(1).unwrap(), rid(2));
    }

    #[test]
    fn test_duplicates_insert_after_equals() {
        let mut buf = leaf_buf();
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);

        view.insert_entry(&Key::Int(5), Payload::Record(rid(1))).unwrap();
        view.insert_entry(&Key::Int(5), Payload::Record(rid(2))).unwrap();
        view.insert_entry(&Key::Int(5), Payload::Record(rid(3))).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Int);
        assert_eq!(view.record_at(0).unwrap(), rid(1));
        assert_eq!(view.record_at(1).unwrap(), rid(2));
        assert_eq!(view.record_at(2).unwrap(), rid(3));
    }

    #[test]
    fn test_delete_compacts_cells() {
        let mut buf = leaf_buf();
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);

        for k in [10, 20, 30, 40] {
            view.insert_entry(&Key::Int(k), Payload::Record(rid(k as u32)))
                .unwrap();
        }
        let free_before = view.free_space();

        view.delete_at(1).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Int);
        assert_eq!(view.slot_count(), 3);
        assert_eq!(view.key_at(0).unwrap(), Key::Int(10));
        assert_eq!(view.key_at(1).unwrap(), Key::Int(30));
        assert_eq!(view.key_at(2).unwrap(), Key::Int(40));
        assert_eq!(view.record_at(1).unwrap(), rid(30));
        // One entry's cell and slot were reclaimed
        assert_eq!(
            view.free_space(),
            free_before + view.entry_size(&Key::Int(20)) + SLOT_SIZE
        );
    }

    #[test]
    fn test_variable_length_str_keys() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut buf[..], KeyType::Str);
        view.init(NodeKind::Leaf);

        view.insert_entry(&Key::Str("banana".into()), Payload::Record(rid(2)))
            .unwrap();
        view.insert_entry(&Key::Str("apple".into()), Payload::Record(rid(1)))
            .unwrap();
        view.insert_entry(&Key::Str("cherry".into()), Payload::Record(rid(3)))
            .unwrap();
        view.delete_at(0).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Str);
        assert_eq!(view.key_at(0).unwrap(), Key::Str("banana".into()));
        assert_eq!(view.key_at(1).unwrap(), Key::Str("cherry".into()));
        assert_eq!(view.record_at(0).unwrap(), rid(2));
    }

    #[test]
    fn test_node_full() {
        let mut buf = leaf_buf();
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);

        let mut k = 0;
        while view.fits(&Key::Int(k)) {
            view.insert_entry(&Key::Int(k), Payload::Record(rid(0))).unwrap();
            k += 1;
        }

        match view.insert_entry(&Key::Int(k), Payload::Record(rid(0))) {
            Err(Error::NodeFull) => {}
            other => panic!("expected NodeFull, got {:?}", other),
        }
        // A 4KB page of (4-byte key, 6-byte rid, 4-byte slot) entries
        assert_eq!(view.slot_count(), (PAGE_SIZE - SLOTS_OFF) / 14);
    }

    #[test]
    fn test_sibling_links() {
        let mut buf = leaf_buf();
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);

        view.set_prev(PageId::new(4));
        view.set_next(PageId::new(9));

        let view = NodeView::new(&buf[..], KeyType::Int);
        assert_eq!(view.prev(), PageId::new(4));
        assert_eq!(view.next(), PageId::new(9));
    }

    #[test]
    fn test_child_for_key() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);
        view.init(NodeKind::Index);
        view.set_prev(PageId::new(100)); // keys < 10

        view.insert_entry(&Key::Int(10), Payload::Child(PageId::new(101))).unwrap();
        view.insert_entry(&Key::Int(20), Payload::Child(PageId::new(102))).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Int);
        assert_eq!(view.child_for_key(&Key::Int(5)).unwrap(), PageId::new(100));
        // Equal keys route right of their separator
        assert_eq!(view.child_for_key(&Key::Int(10)).unwrap(), PageId::new(101));
        assert_eq!(view.child_for_key(&Key::Int(15)).unwrap(), PageId::new(101));
        assert_eq!(view.child_for_key(&Key::Int(20)).unwrap(), PageId::new(102));
        assert_eq!(view.child_for_key(&Key::Int(99)).unwrap(), PageId::new(102));
    }

    #[test]
    fn test_index_entry_payload() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut view = NodeView::new(&mut buf[..], KeyType::Int);
        view.init(NodeKind::Index);
        view.insert_entry(&Key::Int(7), Payload::Child(PageId::new(55))).unwrap();

        let view = NodeView::new(&buf[..], KeyType::Int);
        let entry = view.entry_at(0).unwrap();
        assert_eq!(entry.key, Key::Int(7));
        assert_eq!(entry.payload, Payload::Child(PageId::new(55)));
        assert_eq!(view.child_at(0).unwrap(), PageId::new(55));
        assert!(view.record_at(0).is_err());
    }

    #[test]
    fn test_out_of_range_slot() {
        let buf = leaf_buf();
        let view = NodeView::new(&buf[..], KeyType::Int);
        assert!(view.key_at(0).is_err());
    }
}
