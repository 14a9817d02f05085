//! Configuration for pagetree indexes.

use super::{Error, Result};

/// Default maximum number of slots per page.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Smallest page size that still leaves two slots per half after a split.
pub const MIN_PAGE_SIZE: usize = 4;

/// Default number of resident pages kept by caching providers.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Default target false positive rate of the Bloom filter.
pub const DEFAULT_BLOOM_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Width of a persisted page offset in bytes.
pub const OFFSET_SIZE: usize = 8;

/// Build-time options of an index.
///
/// `page_size` and `use_bloom_filter` are persisted in the descriptor page;
/// `cache_size` only affects the provider that reads the index back.
///
/// # Example
/// ```
/// use pagetree::IndexConfig;
///
/// let config = IndexConfig::new().with_page_size(16).with_bloom_filter(true);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.page_size, 16);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Maximum slots per page; drives split and merge thresholds.
    pub page_size: usize,

    /// Resident page budget of the page cache (0 disables caching).
    pub cache_size: usize,

    /// Whether a Bloom filter is written next to the descriptor page.
    pub use_bloom_filter: bool,

    /// Target false positive rate used when sizing the Bloom filter.
    pub bloom_false_positive_rate: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            use_bloom_filter: false,
            bloom_false_positive_rate: DEFAULT_BLOOM_FALSE_POSITIVE_RATE,
        }
    }
}

impl IndexConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the cache size (in pages).
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Enables or disables the Bloom filter.
    pub fn with_bloom_filter(mut self, enable: bool) -> Self {
        self.use_bloom_filter = enable;
        self
    }

    /// Sets the Bloom filter false positive rate.
    pub fn with_bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.bloom_false_positive_rate = rate;
        self
    }

    /// Slot count below which a non-root page is merged with a sibling.
    #[inline]
    pub fn min_page_fill(&self) -> usize {
        self.page_size / 2
    }

    /// Check that the options describe a usable index.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.page_size > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "page size {} does not fit the page header",
                self.page_size
            )));
        }
        if !(self.bloom_false_positive_rate > 0.0 && self.bloom_false_positive_rate < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "bloom false positive rate {} must be in (0, 1)",
                self.bloom_false_positive_rate
            )));
        }
        Ok(())
    }
}
