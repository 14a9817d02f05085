//! B+Tree index.
//!
//! # Implementation
//! - [`page`] - leaf and inner pages, page-level seek/split/merge
//! - [`Index`] - descent, insertion, replacement, removal, root changes
//! - [`RangeIter`] - ordered scans in either direction
//! - [`measure`] - incrementally maintained aggregates
//! - [`IndexBuilder`] - creating and reopening indexes

mod builder;
mod iter;
pub mod measure;
pub mod page;
mod seek;
mod serialize;
mod tree;
mod verify;

use std::fmt::Debug;
use std::hash::Hash;

pub use builder::IndexBuilder;
pub use iter::RangeIter;
pub use seek::{Cursor, Direction, Entire, Ray, SeekResult, SeekResultType};
pub use tree::{Index, KeyExtractor};

/// Requirements on index keys.
///
/// `Hash` is needed by the Bloom filter of persisted indexes.
pub trait IndexKey: Ord + Clone + Hash + Debug + Send + Sync + 'static {}

impl<T> IndexKey for T where T: Ord + Clone + Hash + Debug + Send + Sync + 'static {}

/// Requirements on indexed items.
pub trait IndexItem: Clone + Debug + Send + Sync + 'static {}

impl<T> IndexItem for T where T: Clone + Debug + Send + Sync + 'static {}
