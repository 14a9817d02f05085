//! Index construction.

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use super::measure::{Measure, MeasureSet};
use super::tree::{Index, KeyExtractor};
use super::{IndexItem, IndexKey};
use crate::common::{IndexConfig, Result};
use crate::provider::{MemoryPageProvider, PageProvider, StreamPageProvider};
use crate::storage::Codec;

/// Configures and creates or reopens an [`Index`].
///
/// Measures are stored positionally on every page: reopen a persisted index
/// with the same measures registered in the same order.
///
/// # Example
/// ```
/// use pagetree::{CountMeasure, IndexBuilder, SumMeasure};
///
/// let index = IndexBuilder::new(|item: &(u64, i64)| item.0)
///     .page_size(16)
///     .measure(CountMeasure)
///     .measure(SumMeasure::new("total", |item: &(u64, i64)| item.1))
///     .build()
///     .unwrap();
///
/// assert!(index.is_empty());
/// ```
pub struct IndexBuilder<K, I> {
    config: IndexConfig,
    key_of: KeyExtractor<K, I>,
    measures: MeasureSet<I>,
}

impl<K: IndexKey, I: IndexItem> IndexBuilder<K, I> {
    /// Start with the default configuration and no measures.
    pub fn new(key_of: impl Fn(&I) -> K + Send + Sync + 'static) -> Self {
        Self {
            config: IndexConfig::default(),
            key_of: Arc::new(key_of),
            measures: MeasureSet::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    /// Write a Bloom filter when the index is serialized.
    pub fn bloom_filter(mut self, enable: bool) -> Self {
        self.config.use_bloom_filter = enable;
        self
    }

    /// Register another measure.
    pub fn measure(mut self, measure: impl Measure<I> + 'static) -> Self {
        self.measures.push(measure);
        self
    }

    /// A fresh index over an in-memory provider.
    pub fn build(self) -> Result<Index<K, I>> {
        let provider: Arc<dyn PageProvider<K, I>> = Arc::new(MemoryPageProvider::<K, I>::new());
        self.create(provider)
    }

    /// A fresh index over `provider`.
    pub fn create(self, provider: Arc<dyn PageProvider<K, I>>) -> Result<Index<K, I>> {
        Index::create_in(self.config, provider, self.key_of, self.measures)
    }

    /// Restore the index persisted behind `provider`.
    ///
    /// `page_size` and `use_bloom_filter` are taken from the descriptor.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the provider holds no index or the number of
    /// registered measures differs from the persisted one.
    pub fn open(self, provider: Arc<dyn PageProvider<K, I>>) -> Result<Index<K, I>> {
        Index::open_in(self.config, provider, self.key_of, self.measures)
    }
}

impl<K: IndexKey + Codec, I: IndexItem + Codec> IndexBuilder<K, I> {
    /// Open a serialized index from any seekable stream.
    pub fn open_stream<S>(self, stream: S) -> Result<Index<K, I>>
    where
        S: Read + Seek + Send + 'static,
    {
        let provider = StreamPageProvider::<K, I, S>::new(stream, self.config.cache_size)?;
        self.open(Arc::new(provider))
    }

    /// Open a serialized index file.
    pub fn open_file<P: AsRef<Path>>(self, path: P) -> Result<Index<K, I>> {
        let provider = StreamPageProvider::<K, I, _>::open(path, self.config.cache_size)?;
        self.open(Arc::new(provider))
    }
}
