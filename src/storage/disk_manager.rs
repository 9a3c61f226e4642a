//! Disk Manager - low-level file I/O for index pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages (with checksum verification/stamping)
//! - Allocating and freeing pages through an on-disk free list
//! - The file directory: the name → header-page bindings for the
//!   index trees stored in this file

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{NodeKind, Page, PageHeader};

/// Magic constant identifying the directory page of a treeline file.
const DIRECTORY_MAGIC: u32 = 0x544C_4E31; // "TLN1"

/// Directory page layout, after the generic [`PageHeader`].
const OFF_DIR_MAGIC: usize = PageHeader::SIZE;
const OFF_DIR_FREE_HEAD: usize = OFF_DIR_MAGIC + 4;
const OFF_DIR_ENTRY_COUNT: usize = OFF_DIR_FREE_HEAD + 4;
const OFF_DIR_ENTRIES: usize = OFF_DIR_ENTRY_COUNT + 2;

/// On a freed page, the next free-list link lives right after the header.
const OFF_FREE_NEXT: usize = PageHeader::SIZE;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// The file is a sequence of `PAGE_SIZE` pages:
/// ```text
/// ┌───────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0    │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ directory │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └───────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:    0     4096      8192    ...    N×4096
/// ```
///
/// Page 0 is the **directory page**: a magic constant, the head of the
/// free-page list, and the table of (index name, header page id) entries.
/// It is rewritten after every directory mutation. Freed pages chain
/// through a next pointer stored in their bodies, so `allocate_page`
/// reuses them before extending the file.
///
/// # Integrity
/// Every page written carries a CRC32 checksum in its [`PageHeader`];
/// `read_page` verifies it and surfaces [`Error::Corrupt`] on mismatch.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is
/// responsible for serializing access to the disk manager.
///
/// # Durability
/// All writes are followed by `fsync()`. This is conservative but keeps
/// the free list and directory consistent with the data pages.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file (including the directory page).
    page_count: u32,
    /// Head of the free-page list, or INVALID if empty.
    free_head: PageId,
    /// In-memory copy of the directory's file entries.
    entries: HashMap<String, PageId>,
}

impl DiskManager {
    /// Create a new index file with an empty directory.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            page_count: 1,
            free_head: PageId::INVALID,
            entries: HashMap::new(),
        };
        dm.write_directory()?;

        Ok(dm)
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or
    /// its directory page is not a valid treeline directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let metadata = file.metadata()?;
        let page_count = (metadata.len() / PAGE_SIZE as u64) as u32;

        let mut dm = Self {
            file,
            page_count,
            free_head: PageId::INVALID,
            entries: HashMap::new(),
        };

        if page_count == 0 {
            // Empty file: initialize a fresh directory.
            dm.page_count = 1;
            dm.write_directory()?;
        } else {
            dm.load_directory()?;
        }

        Ok(dm)
    }

    /// Open an existing index file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// Read a page from disk, verifying its checksum.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist
    /// - `Error::Corrupt` if the checksum doesn't match
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        if !page.verify_checksum() {
            return Err(Error::Corrupt(page_id.0));
        }

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated and must already carry
    /// a valid checksum (see [`Page::update_checksum`]).
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?; // fsync for durability

        Ok(())
    }

    // ========================================================================
    // Page allocation / free list
    // ========================================================================

    /// Allocate a page, reusing a freed page if one is available.
    ///
    /// Returns the `PageId` of the allocated page. The page on disk is
    /// zeroed (apart from the checksum) in both paths.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if self.free_head.is_valid() {
            // Pop the free list.
            let page_id = self.free_head;
            let freed = self.read_page(page_id)?;
            let data = freed.as_slice();
            let next = u32::from_le_bytes([
                data[OFF_FREE_NEXT],
                data[OFF_FREE_NEXT + 1],
                data[OFF_FREE_NEXT + 2],
                data[OFF_FREE_NEXT + 3],
            ]);
            self.free_head = PageId::new(next);

            let mut fresh = Page::new();
            fresh.update_checksum();
            self.write_page(page_id, &fresh)?;
            self.write_directory()?;

            return Ok(page_id);
        }

        // Extend the file with a zeroed page.
        let page_id = PageId::new(self.page_count);
        self.page_count += 1;

        let mut fresh = Page::new();
        fresh.update_checksum();
        self.write_page(page_id, &fresh)?;

        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// The caller must no longer reference the page; its contents are
    /// replaced by a free-list link.
    ///
    /// # Errors
    /// Returns `Error::InvalidPageId` for the directory page or a page
    /// past the end of the file.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if page_id.0 == 0 || page_id.0 >= self.page_count {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut page = Page::new();
        page.set_header(&PageHeader::new(NodeKind::Free));
        page.as_mut_slice()[OFF_FREE_NEXT..OFF_FREE_NEXT + 4]
            .copy_from_slice(&self.free_head.0.to_le_bytes());
        page.update_checksum();
        self.write_page(page_id, &page)?;

        self.free_head = page_id;
        self.write_directory()
    }

    // ========================================================================
    // File directory
    // ========================================================================

    /// Look up the page bound to a name.
    pub fn file_entry(&self, name: &str) -> Option<PageId> {
        self.entries.get(name).copied()
    }

    /// Bind a name to a page, replacing any previous binding.
    ///
    /// # Errors
    /// Returns `Error::DirectoryFull` if the directory page cannot hold
    /// the new entry.
    pub fn add_file_entry(&mut self, name: &str, page_id: PageId) -> Result<()> {
        let extra = if self.entries.contains_key(name) {
            0
        } else {
            2 + name.len() + 4
        };
        if OFF_DIR_ENTRIES + self.entries_size() + extra > PAGE_SIZE {
            return Err(Error::DirectoryFull);
        }

        self.entries.insert(name.to_string(), page_id);
        self.write_directory()
    }

    /// Remove a name binding. Removing an absent name is a no-op.
    pub fn delete_file_entry(&mut self, name: &str) -> Result<()> {
        if self.entries.remove(name).is_some() {
            self.write_directory()?;
        }
        Ok(())
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Get the number of pages in the file (including the directory page).
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    // ========================================================================
    // Internal: directory page codec
    // ========================================================================

    fn entries_size(&self) -> usize {
        self.entries
            .iter()
            .map(|(name, _)| 2 + name.len() + 4)
            .sum()
    }

    /// Serialize and persist the directory page.
    fn write_directory(&mut self) -> Result<()> {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(NodeKind::Directory));

        let data = page.as_mut_slice();
        data[OFF_DIR_MAGIC..OFF_DIR_MAGIC + 4].copy_from_slice(&DIRECTORY_MAGIC.to_le_bytes());
        data[OFF_DIR_FREE_HEAD..OFF_DIR_FREE_HEAD + 4]
            .copy_from_slice(&self.free_head.0.to_le_bytes());

        let count = self.entries.len() as u16;
        data[OFF_DIR_ENTRY_COUNT..OFF_DIR_ENTRY_COUNT + 2].copy_from_slice(&count.to_le_bytes());

        let mut pos = OFF_DIR_ENTRIES;
        for (name, page_id) in &self.entries {
            let bytes = name.as_bytes();
            if pos + 2 + bytes.len() + 4 > PAGE_SIZE {
                return Err(Error::DirectoryFull);
            }
            data[pos..pos + 2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
            pos += 2;
            data[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
            data[pos..pos + 4].copy_from_slice(&page_id.0.to_le_bytes());
            pos += 4;
        }

        page.update_checksum();
        self.write_page(PageId::new(0), &page)
    }

    /// Read and parse the directory page.
    fn load_directory(&mut self) -> Result<()> {
        let page = self.read_page(PageId::new(0))?;
        let data = page.as_slice();

        if page.header().kind != NodeKind::Directory {
            return Err(Error::Corrupt(0));
        }

        let magic = u32::from_le_bytes([
            data[OFF_DIR_MAGIC],
            data[OFF_DIR_MAGIC + 1],
            data[OFF_DIR_MAGIC + 2],
            data[OFF_DIR_MAGIC + 3],
        ]);
        if magic != DIRECTORY_MAGIC {
            return Err(Error::Corrupt(0));
        }

        let free_head = u32::from_le_bytes([
            data[OFF_DIR_FREE_HEAD],
            data[OFF_DIR_FREE_HEAD + 1],
            data[OFF_DIR_FREE_HEAD + 2],
            data[OFF_DIR_FREE_HEAD + 3],
        ]);
        self.free_head = PageId::new(free_head);

        let count = u16::from_le_bytes([data[OFF_DIR_ENTRY_COUNT], data[OFF_DIR_ENTRY_COUNT + 1]]);

        let mut pos = OFF_DIR_ENTRIES;
        for _ in 0..count {
            if pos + 2 > PAGE_SIZE {
                return Err(Error::Corrupt(0));
            }
            let len = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
            pos += 2;
            if pos + len + 4 > PAGE_SIZE {
                return Err(Error::Corrupt(0));
            }
            let name = String::from_utf8(data[pos..pos + len].to_vec())
                .map_err(|_| Error::Corrupt(0))?;
            pos += len;
            let page_id = u32::from_le_bytes([
                data[pos],
                data[pos + 1],
                data[pos + 2],
                data[pos + 3],
            ]);
            pos += 4;
            self.entries.insert(name, PageId::new(page_id));
        }

        Ok(())
    }
}
