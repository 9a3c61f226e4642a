//! Page header and node-kind definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - [`NodeKind`] discriminator
//! - CRC32 checksum for integrity

/// Kind of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
/// The index engine branches on this symbolically; raw numeric tags never
/// appear in control flow.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// The file directory page (page 0): file entries and free-list head.
    Directory = 1,
    /// A B+Tree header page: root pointer and per-tree configuration.
    Header = 2,
    /// A B+Tree internal (non-leaf) node.
    Index = 3,
    /// A B+Tree leaf node.
    Leaf = 4,
    /// Page on the free list.
    Free = 5,
}

impl NodeKind {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => NodeKind::Directory,
            2 => NodeKind::Header,
            3 => NodeKind::Index,
            4 => NodeKind::Leaf,
            5 => NodeKind::Free,
            _ => NodeKind::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (8 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     kind (NodeKind as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       3     reserved
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself set to zero. This allows verification without special handling.
/// The disk manager verifies it on every read; writers stamp it via
/// [`Page::update_checksum`](super::Page::update_checksum) before flushing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Kind of this page.
    pub kind: NodeKind,
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
}

impl PageHeader {
    /// Size of the header in bytes (node payload starts here).
    pub const SIZE: usize = 8;

    /// Offset of each field within the header.
    pub const OFFSET_KIND: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;

    /// Create a new header with the given node kind.
    ///
    /// Checksum is initialized to zero.
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, checksum: 0 }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let kind = NodeKind::from_u8(data[Self::OFFSET_KIND]);

        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);

        Self { kind, checksum }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_KIND] = self.kind as u8;

        let checksum_bytes = self.checksum.to_le_bytes();
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4].copy_from_slice(&checksum_bytes);
    }

    /// Compute CRC32 checksum of a page.
    ///
    /// The checksum is computed with the checksum field (bytes 1-4) zeroed
    /// out, so the checksum doesn't include itself.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();

        // Hash bytes before checksum field (just byte 0: kind)
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);

        // Skip checksum field by feeding zeros instead
        hasher.update(&[0u8; 4]);

        // Hash bytes after checksum field to end of page
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);

        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    // --- NodeKind tests ---

    #[test]
    fn test_node_kind_from_u8() {
        assert_eq!(NodeKind::from_u8(0), NodeKind::Invalid);
        assert_eq!(NodeKind::from_u8(1), NodeKind::Directory);
        assert_eq!(NodeKind::from_u8(2), NodeKind::Header);
        assert_eq!(NodeKind::from_u8(3), NodeKind::Index);
        assert_eq!(NodeKind::from_u8(4), NodeKind::Leaf);
        assert_eq!(NodeKind::from_u8(5), NodeKind::Free);
        assert_eq!(NodeKind::from_u8(255), NodeKind::Invalid);
    }

    #[test]
    fn test_node_kind_default() {
        assert_eq!(NodeKind::default(), NodeKind::Invalid);
    }

    // --- PageHeader tests ---

    #[test]
    fn test_page_header_new() {
        let header = PageHeader::new(NodeKind::Leaf);
        assert_eq!(header.kind, NodeKind::Leaf);
        assert_eq!(header.checksum, 0);
    }

    #[test]
    fn test_page_header_roundtrip() {
        let original = PageHeader {
            kind: NodeKind::Index,
            checksum: 0xDEADBEEF,
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        original.write_to(&mut buffer);

        let recovered = PageHeader::from_bytes(&buffer);
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_page_header_byte_layout() {
        let header = PageHeader {
            kind: NodeKind::Header,
            checksum: 0x04030201, // Little-endian: 01 02 03 04
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer[0], 2); // NodeKind::Header
        assert_eq!(buffer[1], 0x01); // checksum byte 0 (LSB)
        assert_eq!(buffer[2], 0x02);
        assert_eq!(buffer[3], 0x03);
        assert_eq!(buffer[4], 0x04); // checksum byte 3 (MSB)
    }

    // --- Checksum tests ---

    #[test]
    fn test_checksum_deterministic() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;
        page_data[1000] = 0xCD;

        let checksum1 = PageHeader::compute_checksum(&page_data);
        let checksum2 = PageHeader::compute_checksum(&page_data);

        assert_eq!(checksum1, checksum2);
        assert_ne!(checksum1, 0);
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let mut page1 = [0u8; PAGE_SIZE];
        let mut page2 = [0u8; PAGE_SIZE];

        page1[500] = 0xFF;
        page2[500] = 0xFE;

        assert_ne!(
            PageHeader::compute_checksum(&page1),
            PageHeader::compute_checksum(&page2)
        );
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let checksum1 = PageHeader::compute_checksum(&page_data);

        // Write different value in checksum field (bytes 1-4)
        page_data[1] = 0xFF;
        page_data[2] = 0xFF;
        page_data[3] = 0xFF;
        page_data[4] = 0xFF;

        let checksum2 = PageHeader::compute_checksum(&page_data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_verify() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let checksum = PageHeader::compute_checksum(&page_data);
        let header = PageHeader {
            kind: NodeKind::Leaf,
            checksum,
        };

        assert!(header.verify_checksum(&page_data));

        // Corrupt the page
        page_data[100] = 0xFF;
        assert!(!header.verify_checksum(&page_data));
    }
}
