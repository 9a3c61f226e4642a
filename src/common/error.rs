//! Error types for treeline.

use thiserror::Error;

use crate::index::btree::{DeletePolicy, KeyType};
use crate::storage::page::NodeKind;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in treeline.
///
/// A single error type keeps error handling consistent across the storage,
/// buffer, and index layers. The index engine never suppresses or retries
/// any of these; a failure aborts the current call and propagates upward
/// (page guards unpin on the way out).
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// The provided page ID is invalid (e.g., the directory page, or past
    /// the end of the file).
    #[error("invalid page id {0}")]
    InvalidPageId(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// Attempted to free a page that is still pinned.
    #[error("page {0} is still pinned")]
    PagePinned(u32),

    /// A page read from disk failed checksum verification.
    #[error("page {0} failed checksum verification")]
    Corrupt(u32),

    /// The directory page cannot hold another file entry.
    #[error("directory page has no room for another file entry")]
    DirectoryFull,

    /// No index file with the given name is registered.
    #[error("no index named `{0}`")]
    IndexNotFound(String),

    /// A page expected to be an index header carries the wrong tag or magic.
    #[error("page {0} is not a valid index header")]
    InvalidHeader(u32),

    /// The index handle was closed or destroyed.
    #[error("index handle is closed")]
    Closed,

    /// Inserted key exceeds the configured maximum key size.
    #[error("key of {got} bytes exceeds the maximum of {max}")]
    KeyTooLong { got: usize, max: usize },

    /// Key's runtime type disagrees with the index header's key type.
    #[error("key type {found:?} does not match index key type {expected:?}")]
    KeyTypeMismatch { expected: KeyType, found: KeyType },

    /// A page expected to be an index or leaf node carries an unexpected
    /// type tag. Indicates data corruption or a logic error.
    #[error("page {page} is a {found:?} node, expected {expected:?}")]
    NodeTypeMismatch {
        page: u32,
        expected: NodeKind,
        found: NodeKind,
    },

    /// A tree traversal reached a page that is neither an index node
    /// nor a leaf. Indicates data corruption or a logic error.
    #[error("page {page} holds a {found:?} page where a tree node was expected")]
    UnexpectedNodeKind { page: u32, found: NodeKind },

    /// Delete requested under the unimplemented "full" (merging) policy.
    #[error("delete policy {0:?} is not supported")]
    UnsupportedDeletePolicy(DeletePolicy),

    /// A node page had no room for an entry the caller expected to fit.
    #[error("node page has no room for the entry")]
    NodeFull,

    /// A node entry could not be decoded.
    #[error("malformed node entry")]
    MalformedEntry,
}
