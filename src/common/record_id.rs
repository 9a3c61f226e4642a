//! Record identifier type.

use std::fmt;

use crate::common::PageId;

/// Identifies a data record in an external heap file.
///
/// The B+Tree stores `RecordId`s as leaf payloads but never dereferences
/// them; to the index they are opaque 6-byte handles that must round-trip
/// through a page and compare for exact-match deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Page of the heap file holding the record.
    pub page: PageId,
    /// Slot within that page.
    pub slot: u16,
}

impl RecordId {
    /// Serialized size in bytes (4-byte page + 2-byte slot).
    pub const SIZE: usize = 6;

    /// Create a new RecordId.
    #[inline]
    pub fn new(page: PageId, slot: u16) -> Self {
        Self { page, slot }
    }

    /// Read a RecordId from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < RecordId::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for RecordId");
        let page = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let slot = u16::from_le_bytes([data[4], data[5]]);
        Self {
            page: PageId::new(page),
            slot,
        }
    }

    /// Write this RecordId to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < RecordId::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for RecordId");
        data[0..4].copy_from_slice(&self.page.0.to_le_bytes());
        data[4..6].copy_from_slice(&self.slot.to_le_bytes());
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page.0, self.slot)
    }
}
