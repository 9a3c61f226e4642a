//! Treeline - a disk-resident B+Tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Treeline                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)              │   │
//! │  │   BTree engine + node views + scans + trace sink     │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                            ↓                                │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                   │   │
//! │  │   BufferPoolManager + RAII page guards + replacer    │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                            ↓                                │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                │   │
//! │  │   DiskManager + Page + checksums + file directory    │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`storage`] - Disk I/O, page formats, free list, file directory
//! - [`buffer`] - Buffer pool management and page guards
//! - [`index`] - The B+Tree engine
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use treeline::buffer::BufferPoolManager;
//! use treeline::index::btree::{BTree, DeletePolicy, Key, KeyType};
//! use treeline::storage::DiskManager;
//! use treeline::{PageId, RecordId};
//!
//! let dm = DiskManager::open_or_create("orders.tln").unwrap();
//! let bpm = Arc::new(BufferPoolManager::new(64, dm));
//!
//! let mut tree = BTree::open_or_create(
//!     bpm, "orders_by_id", KeyType::Int, 4, DeletePolicy::Naive,
//! ).unwrap();
//!
//! tree.insert(&Key::Int(42), RecordId::new(PageId::new(7), 3)).unwrap();
//! for entry in tree.scan(None, None).unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{:?} -> {}", key, rid);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::{BTree, DeletePolicy, Key, KeyType, TreeScan};
pub use storage::page::{NodeKind, Page, PageHeader};
pub use storage::DiskManager;
