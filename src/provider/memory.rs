//! In-memory page provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{PageProvider, ProviderState};
use crate::cache::{CacheStats, StatsSnapshot};
use crate::common::{Error, PageRef, Result};
use crate::index::page::{Node, Page, PageHandle};
use crate::storage::page::DescriptorPage;

/// Writable provider keeping every page resident.
///
/// Identifiers are sequential page numbers starting at zero, so the first
/// page of a fresh index (its root leaf) is always `PageRef(0)`.
///
/// # Example
/// ```
/// use pagetree::{MemoryPageProvider, PageProvider};
///
/// let provider: MemoryPageProvider<u32, u32> = MemoryPageProvider::new();
/// provider.initialize().unwrap();
/// assert!(provider.is_writable());
/// ```
pub struct MemoryPageProvider<K, I> {
    pages: RwLock<HashMap<PageRef, PageHandle<K, I>>>,
    next_id: AtomicU64,
    state: Mutex<ProviderState>,
    stats: CacheStats,
}

impl<K, I> MemoryPageProvider<K, I> {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            state: Mutex::new(ProviderState::Created),
            stats: CacheStats::new(),
        }
    }

    /// Number of live pages.
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }
}

impl<K, I> Default for MemoryPageProvider<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, I> PageProvider<K, I> for MemoryPageProvider<K, I>
where
    K: Send + Sync,
    I: Send + Sync,
{
    fn is_writable(&self) -> bool {
        true
    }

    fn initialize(&self) -> Result<Option<DescriptorPage>> {
        self.state.lock().initialize()?;
        Ok(None)
    }

    fn resolve(&self, page_ref: PageRef) -> Result<PageHandle<K, I>> {
        self.state.lock().ensure_ready()?;
        if !page_ref.is_defined() {
            return Err(Error::corruption(page_ref, "cannot resolve a reserved reference"));
        }

        match self.pages.read().get(&page_ref) {
            Some(page) => {
                self.stats.record_hit();
                Ok(Arc::clone(page))
            }
            None => Err(Error::corruption(page_ref, "page is not part of the index")),
        }
    }

    fn create_page(&self, node: Node<K, I>, measures: Vec<i64>) -> Result<PageHandle<K, I>> {
        self.state.lock().ensure_ready()?;

        let page_ref = PageRef::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let page = Arc::new(RwLock::new(Page::new(page_ref, node, measures)));
        self.pages.write().insert(page_ref, Arc::clone(&page));
        Ok(page)
    }

    fn release_page(&self, page_ref: PageRef) -> Result<()> {
        self.state.lock().ensure_ready()?;
        self.pages.write().remove(&page_ref);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.state.lock().ensure_ready()
    }

    fn clear(&self) -> Result<()> {
        self.state.lock().ensure_ready()?;
        self.pages.write().clear();
        self.next_id.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        *self.state.lock() = ProviderState::Disposed;
        self.pages.write().clear();
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::page::LeafPage;

    fn provider() -> MemoryPageProvider<u32, u32> {
        let provider = MemoryPageProvider::new();
        provider.initialize().unwrap();
        provider
    }

    #[test]
    fn test_first_page_is_zero() {
        let provider = provider();
        let page = provider.create_page(Node::Leaf(LeafPage::new()), vec![]).unwrap();
        assert_eq!(page.read().id(), PageRef::new(0));

        let second = provider.create_page(Node::Leaf(LeafPage::new()), vec![]).unwrap();
        assert_eq!(second.read().id(), PageRef::new(1));
        assert_eq!(provider.page_count(), 2);
    }

    #[test]
    fn test_resolve_returns_same_page() {
        let provider = provider();
        let page = provider.create_page(Node::Leaf(LeafPage::new()), vec![3]).unwrap();
        let id = page.read().id();

        let resolved = provider.resolve(id).unwrap();
        assert!(Arc::ptr_eq(&page, &resolved));
        assert_eq!(provider.stats().cache_hits, 1);
    }

    #[test]
    fn test_resolve_reserved_is_corruption() {
        let provider = provider();
        assert!(matches!(
            provider.resolve(PageRef::UNDEFINED),
            Err(Error::StructuralCorruption { .. })
        ));
        assert!(matches!(
            provider.resolve(PageRef::new(42)),
            Err(Error::StructuralCorruption { .. })
        ));
    }

    #[test]
    fn test_release_and_clear() {
        let provider = provider();
        let page = provider.create_page(Node::Leaf(LeafPage::new()), vec![]).unwrap();
        let id = page.read().id();

        provider.release_page(id).unwrap();
        assert!(provider.resolve(id).is_err());

        provider.create_page(Node::Leaf(LeafPage::new()), vec![]).unwrap();
        provider.clear().unwrap();
        assert_eq!(provider.page_count(), 0);

        // Identifiers restart after a clear
        let page = provider.create_page(Node::Leaf(LeafPage::new()), vec![]).unwrap();
        assert_eq!(page.read().id(), PageRef::new(0));
    }

    #[test]
    fn test_lifecycle() {
        let provider: MemoryPageProvider<u32, u32> = MemoryPageProvider::new();
        assert!(provider.create_page(Node::Leaf(LeafPage::new()), vec![]).is_err());

        assert_eq!(provider.initialize().unwrap(), None);
        assert!(matches!(provider.initialize(), Err(Error::AlreadyInitialized)));

        provider.dispose().unwrap();
        assert!(matches!(provider.resolve(PageRef::new(0)), Err(Error::Disposed)));
    }
}
