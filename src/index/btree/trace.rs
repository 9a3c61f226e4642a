//! Diagnostic trace sink.
//!
//! An optionally attached, append-only log of the pages the engine
//! visits and the structural events it performs. Writes are best-effort:
//! a full disk or a closed file must never turn a correct insert into an
//! error, so all I/O failures are swallowed here.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::common::{PageId, Result};

/// Append-only diagnostic sink attached to one engine instance.
///
/// Attached with `BTree::enable_trace`, detached with `disable_trace`.
/// Never consulted by the algorithms; purely observational.
pub struct TraceSink {
    out: BufWriter<File>,
}

impl TraceSink {
    /// Create (truncate) the trace file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Record a page visit during descent.
    pub fn visit(&mut self, page_id: PageId) {
        self.line(&format!("VISIT {}", page_id.0));
    }

    /// Record a node allocation.
    pub fn alloc(&mut self, page_id: PageId, what: &str) {
        self.line(&format!("ALLOC {} {}", what, page_id.0));
    }

    /// Record a visited index node's children, leftmost first.
    pub fn index_node(&mut self, page_id: PageId, children: &[PageId]) {
        let ids: Vec<String> = children.iter().map(|c| c.0.to_string()).collect();
        self.line(&format!("NODE {} index children=[{}]", page_id.0, ids.join(" ")));
    }

    /// Record a visited leaf's entry count.
    pub fn leaf_node(&mut self, page_id: PageId, entries: usize) {
        self.line(&format!("NODE {} leaf entries={}", page_id.0, entries));
    }

    /// Record a node split.
    pub fn split(&mut self, original: PageId, sibling: PageId) {
        self.line(&format!("SPLIT {} -> {}", original.0, sibling.0));
    }

    /// Record a page being freed during destroy.
    pub fn free(&mut self, page_id: PageId) {
        self.line(&format!("FREE {}", page_id.0));
    }

    /// Record a root change.
    pub fn new_root(&mut self, root: PageId) {
        self.line(&format!("ROOT {}", root.0));
    }

    fn line(&mut self, text: &str) {
        // Best effort only
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}
