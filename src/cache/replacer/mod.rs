//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`FifoReplacer`] - evicts in admission order

mod fifo;

pub use fifo::FifoReplacer;
