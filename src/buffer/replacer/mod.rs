//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`FifoReplacer`] - FIFO eviction, adequate for the mostly-sequential
//!   access patterns of index builds and scans

mod fifo;

pub use fifo::FifoReplacer;
