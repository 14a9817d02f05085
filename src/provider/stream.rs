//! Stream-backed, read-only page provider.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{PageProvider, ProviderState};
use crate::cache::{PageCache, StatsSnapshot};
use crate::common::{Error, PageRef, Result};
use crate::index::page::{Node, Page, PageHandle};
use crate::index::{IndexItem, IndexKey};
use crate::storage::page::{decode_node, DescriptorPage};
use crate::storage::{BloomFilter, Codec, PageStream};

/// Read-only provider over a serialized index.
///
/// # Architecture
/// ```text
/// resolve(ref) ──▶ cache.get ──hit──▶ page
///                     │
///                    miss
///                     ▼
///          stream.lock().read_page   (no cache lock held)
///                     ▼
///          decode ──▶ cache.insert ──▶ page
/// ```
///
/// Pages are addressed by their byte offset. The Bloom filter stored after
/// the descriptor is loaded once by [`initialize`](PageProvider::initialize)
/// and answers [`might_contain`](PageProvider::might_contain) without
/// touching the stream.
///
/// Mutations (`create_page`, `release_page`, `flush`, `clear`) fail with
/// `Error::UnsupportedOperation`; the write path is a
/// [`PageAllocator`](crate::storage::PageAllocator).
pub struct StreamPageProvider<K, I, S> {
    stream: Mutex<Option<PageStream<S>>>,
    cache: PageCache<PageHandle<K, I>>,
    bloom: RwLock<Option<BloomFilter>>,
    state: Mutex<ProviderState>,
    _marker: PhantomData<fn() -> (K, I)>,
}

impl<K: 'static, I: 'static> StreamPageProvider<K, I, BufReader<File>> {
    /// Open a serialized index file with a cache of `cache_size` pages.
    pub fn open<P: AsRef<Path>>(path: P, cache_size: usize) -> Result<Self> {
        Ok(Self::from_stream(PageStream::open(path)?, cache_size))
    }
}

impl<K: 'static, I: 'static, S: Read + Seek> StreamPageProvider<K, I, S> {
    /// Serve pages from `stream` with a cache of `cache_size` pages.
    pub fn new(stream: S, cache_size: usize) -> Result<Self> {
        Ok(Self::from_stream(PageStream::new(stream)?, cache_size))
    }

    fn from_stream(stream: PageStream<S>, cache_size: usize) -> Self {
        let cache = PageCache::new(cache_size).with_eviction_callback(|page_ref, page: &PageHandle<K, I>| {
            // A page still borrowed by a scan stays alive through its handle
            tracing::trace!(%page_ref, shared = Arc::strong_count(page) > 1, "evicting page");
        });

        Self {
            stream: Mutex::new(Some(stream)),
            cache,
            bloom: RwLock::new(None),
            state: Mutex::new(ProviderState::Created),
            _marker: PhantomData,
        }
    }

    /// Number of resident pages.
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }
}

impl<K, I, S> PageProvider<K, I> for StreamPageProvider<K, I, S>
where
    K: IndexKey + Codec,
    I: IndexItem + Codec,
    S: Read + Seek + Send,
{
    fn is_writable(&self) -> bool {
        false
    }

    fn initialize(&self) -> Result<Option<DescriptorPage>> {
        let mut state = self.state.lock();
        if *state != ProviderState::Created {
            return state.initialize().map(|_| None);
        }

        let (descriptor, bloom) = {
            let mut guard = self.stream.lock();
            let stream = guard.as_mut().ok_or(Error::Disposed)?;
            stream
                .read_descriptor()
                .map_err(|e| Error::persistence(PageRef::DESCRIPTOR, e))?
        };

        if descriptor.use_bloom_filter && bloom.is_none() {
            return Err(Error::corruption(PageRef::DESCRIPTOR, "bloom filter is missing"));
        }

        tracing::debug!(
            root = %descriptor.root,
            items = descriptor.item_count,
            page_size = descriptor.page_size,
            bloom = bloom.is_some(),
            "opened persisted index"
        );

        *self.bloom.write() = bloom;
        state.initialize()?;
        Ok(Some(descriptor))
    }

    fn resolve(&self, page_ref: PageRef) -> Result<PageHandle<K, I>> {
        self.state.lock().ensure_ready()?;
        if !page_ref.is_defined() {
            return Err(Error::corruption(page_ref, "cannot resolve a reserved reference"));
        }

        if let Some(page) = self.cache.get(page_ref) {
            return Ok(page);
        }

        let stored = {
            let mut guard = self.stream.lock();
            let stream = guard.as_mut().ok_or(Error::Disposed)?;
            stream
                .read_page(page_ref.offset())
                .map_err(|e| Error::persistence(page_ref, e))?
        };
        self.cache.stats().record_read();

        let (node, measures) = decode_node(&stored).map_err(|e| Error::persistence(page_ref, e))?;
        let page = Arc::new(RwLock::new(Page::new(page_ref, node, measures)));
        Ok(self.cache.insert(page_ref, page))
    }

    fn create_page(&self, _node: Node<K, I>, _measures: Vec<i64>) -> Result<PageHandle<K, I>> {
        Err(Error::UnsupportedOperation("create_page on a read-only provider"))
    }

    fn release_page(&self, _page_ref: PageRef) -> Result<()> {
        Err(Error::UnsupportedOperation("release_page on a read-only provider"))
    }

    fn might_contain(&self, key: &K) -> bool {
        match self.bloom.read().as_ref() {
            Some(bloom) if !bloom.contains(key) => {
                self.cache.stats().record_bloom_rejection();
                false
            }
            _ => true,
        }
    }

    fn flush(&self) -> Result<()> {
        Err(Error::UnsupportedOperation("flush on a read-only provider"))
    }

    fn clear(&self) -> Result<()> {
        Err(Error::UnsupportedOperation("clear on a read-only provider"))
    }

    fn dispose(&self) -> Result<()> {
        *self.state.lock() = ProviderState::Disposed;
        self.stream.lock().take();
        self.cache.clear();
        *self.bloom.write() = None;
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.cache.stats().snapshot()
    }
}
