//! Page caching.
//!
//! The cache sits between the page providers and the backing store. It
//! keeps a bounded number of resident pages and lets them go under
//! pressure; providers transparently reload evicted pages.
//!
//! # Components
//! - [`PageCache`] - the bounded page map
//! - [`CacheStats`] - hit/miss/read counters
//! - [`replacer`] - eviction policy implementations

mod page_cache;
pub mod replacer;
mod stats;

pub use page_cache::{EvictionCallback, PageCache};
pub use stats::{CacheStats, StatsSnapshot};
