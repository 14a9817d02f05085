//! Storage layer - stream I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`PageStream`] - Reads pages and the descriptor from a serialized index
//! - [`PageAllocator`] / [`StreamPageAllocator`] - The write path
//! - [`BloomFilter`] - Negative key tests stored after the descriptor
//! - [`Codec`] - Binary encoding of keys and items
//! - [`page`] - Page types and layouts

mod allocator;
mod bloom;
pub mod codec;
pub mod page;
mod stream;

pub use allocator::{PageAllocator, StreamPageAllocator};
pub use bloom::BloomFilter;
pub use codec::Codec;
pub use stream::PageStream;
