//! Disk-resident B+Tree index.
//!
//! A sorted, duplicate-tolerant key → record-id mapping spread across
//! fixed-size pages managed by the buffer pool:
//! - [`BTree`] - the engine: insert with recursive split propagation,
//!   naive (non-merging) delete, run-start search, destroy
//! - [`TreeScan`] - ordered range scans over the leaf sibling chain
//! - [`Key`] / [`KeyType`] - the key model (integer or string)
//! - [`NodeView`] / [`HeaderView`] - typed views over node pages
//! - [`TraceSink`] - optional append-only diagnostics

mod header;
mod key;
mod node;
mod scan;
mod trace;
mod tree;

pub use header::{DeletePolicy, HeaderView};
pub use key::{Key, KeyType};
pub use node::{Entry, NodeView, Payload};
pub use scan::TreeScan;
pub use trace::TraceSink;
pub use tree::{BTree, MAX_KEY_SIZE};
