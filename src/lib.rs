//! pagetree - a paged B+Tree index with incremental measures.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Index                                │
//! │        seek / add / replace / remove / range scans              │
//! │        measures folded bottom-up on every page                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       PageProvider                              │
//! │   MemoryPageProvider (writable)  |  StreamPageProvider (read)   │
//! │                                   │  PageCache (FIFO) + Bloom    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                          Storage                                │
//! │   PageAllocator → [leaf pages][inner pages][descriptor][bloom]  │
//! │   PageStream    ← checksummed pages read back by offset         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - shared primitives (PageRef, Error, config)
//! - [`index`] - the tree, its pages, seeks, scans and measures
//! - [`provider`] - page providers
//! - [`cache`] - page cache and its statistics
//! - [`storage`] - page codec, stream layout, Bloom filter
//!
//! # Quick Start
//! ```
//! use pagetree::{CountMeasure, IndexBuilder, StreamPageAllocator};
//! use std::io::Cursor;
//!
//! let mut index = IndexBuilder::new(|v: &u64| *v)
//!     .page_size(8)
//!     .measure(CountMeasure)
//!     .build()
//!     .unwrap();
//! for v in 0..100 {
//!     index.add(v).unwrap();
//! }
//!
//! let mut allocator = StreamPageAllocator::new(Cursor::new(Vec::new()));
//! index.serialize(&mut allocator).unwrap();
//!
//! let bytes = allocator.into_inner().into_inner();
//! let reopened = IndexBuilder::new(|v: &u64| *v)
//!     .measure(CountMeasure)
//!     .open_stream(Cursor::new(bytes))
//!     .unwrap();
//! assert_eq!(reopened.get(&42).unwrap(), Some(42));
//! assert_eq!(reopened.measure("count").unwrap(), Some(100));
//! ```

pub mod cache;
pub mod common;
pub mod index;
pub mod provider;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{Error, IndexConfig, PageRef, Result};

pub use cache::{CacheStats, StatsSnapshot};
pub use index::measure::{CountMeasure, MaxMeasure, Measure, MeasureSet, MinMeasure, SumMeasure};
pub use index::{
    Cursor, Direction, Entire, Index, IndexBuilder, IndexItem, IndexKey, KeyExtractor, RangeIter,
    Ray, SeekResult, SeekResultType,
};
pub use provider::{MemoryPageProvider, PageProvider, StreamPageProvider};
pub use storage::{BloomFilter, Codec, PageAllocator, StreamPageAllocator};
