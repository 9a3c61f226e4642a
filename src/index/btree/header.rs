//! The per-tree header page.
//!
//! Every tree owns one header page holding its root pointer and its
//! immutable configuration. The engine pins it at the start of each
//! operation to find the root, and rewrites it (through a write guard,
//! which dirties the page) whenever the root changes.

use crate::common::{Error, PageId, Result};
use crate::storage::page::{NodeKind, PageHeader};

use super::key::KeyType;

/// Magic constant identifying a valid tree header page.
const HEADER_MAGIC: u32 = 0x4254_5245; // "BTRE"

/// Header page layout, after the generic [`PageHeader`].
const OFF_MAGIC: usize = PageHeader::SIZE;
const OFF_ROOT: usize = OFF_MAGIC + 4;
const OFF_KEY_TYPE: usize = OFF_ROOT + 4;
const OFF_POLICY: usize = OFF_KEY_TYPE + 1;
const OFF_MAX_KEY: usize = OFF_POLICY + 1;

/// Deletion policy an index was created with.
///
/// Only [`DeletePolicy::Naive`] is implemented: deletes remove entries
/// without merging or redistributing underfull pages. `Full` is a
/// recognized configuration value but deleting under it fails.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove entries in place; never rebalance.
    Naive = 0,
    /// Merge/redistribute underfull pages. Recognized, not implemented.
    Full = 1,
}

impl DeletePolicy {
    /// Convert from the persisted byte, if valid.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeletePolicy::Naive),
            1 => Some(DeletePolicy::Full),
            _ => None,
        }
    }
}

/// Typed view over a tree's header page.
///
/// Generic over the underlying buffer so read guards yield read-only
/// views and write guards yield mutable ones.
pub struct HeaderView<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> HeaderView<B> {
    /// Wrap a page buffer without validation.
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    /// Check the page's kind tag and magic constant.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeader` if either is wrong.
    pub fn validate(&self, page_id: PageId) -> Result<()> {
        let data = self.buf.as_ref();
        if PageHeader::from_bytes(data).kind != NodeKind::Header {
            return Err(Error::InvalidHeader(page_id.0));
        }
        let magic = u32::from_le_bytes([
            data[OFF_MAGIC],
            data[OFF_MAGIC + 1],
            data[OFF_MAGIC + 2],
            data[OFF_MAGIC + 3],
        ]);
        if magic != HEADER_MAGIC {
            return Err(Error::InvalidHeader(page_id.0));
        }
        Ok(())
    }

    /// The root page, or `PageId::INVALID` for an empty tree.
    pub fn root(&self) -> PageId {
        let data = self.buf.as_ref();
        PageId::new(u32::from_le_bytes([
            data[OFF_ROOT],
            data[OFF_ROOT + 1],
            data[OFF_ROOT + 2],
            data[OFF_ROOT + 3],
        ]))
    }

    /// The key discriminator this tree was created with.
    pub fn key_type(&self, page_id: PageId) -> Result<KeyType> {
        KeyType::from_u8(self.buf.as_ref()[OFF_KEY_TYPE])
            .ok_or(Error::InvalidHeader(page_id.0))
    }

    /// The delete policy this tree was created with.
    pub fn delete_policy(&self, page_id: PageId) -> Result<DeletePolicy> {
        DeletePolicy::from_u8(self.buf.as_ref()[OFF_POLICY])
            .ok_or(Error::InvalidHeader(page_id.0))
    }

    /// The maximum serialized key size in bytes.
    pub fn max_key_size(&self) -> usize {
        let data = self.buf.as_ref();
        u16::from_le_bytes([data[OFF_MAX_KEY], data[OFF_MAX_KEY + 1]]) as usize
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderView<B> {
    /// Initialize a freshly allocated page as a tree header.
    ///
    /// The root starts out invalid (empty tree).
    pub fn init(&mut self, key_type: KeyType, max_key_size: u16, policy: DeletePolicy) {
        let data = self.buf.as_mut();
        PageHeader::new(NodeKind::Header).write_to(data);
        data[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(&HEADER_MAGIC.to_le_bytes());
        data[OFF_ROOT..OFF_ROOT + 4].copy_from_slice(&PageId::INVALID.0.to_le_bytes());
        data[OFF_KEY_TYPE] = key_type as u8;
        data[OFF_POLICY] = policy as u8;
        data[OFF_MAX_KEY..OFF_MAX_KEY + 2].copy_from_slice(&max_key_size.to_le_bytes());
    }

    /// Point the tree at a new root.
    pub fn set_root(&mut self, root: PageId) {
        let data = self.buf.as_mut();
        data[OFF_ROOT..OFF_ROOT + 4].copy_from_slice(&root.0.to_le_bytes());
    }
}
