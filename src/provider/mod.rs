//! Page providers.
//!
//! A provider is the seam between the tree and where its pages live. It
//! resolves [`PageRef`]s to pages, assigns identifiers to new pages and, for
//! persisted indexes, loads pages from the backing stream on demand.
//!
//! - [`MemoryPageProvider`] - writable, every page resident
//! - [`StreamPageProvider`] - read-only view of a serialized index

mod memory;
mod stream;

pub use memory::MemoryPageProvider;
pub use stream::StreamPageProvider;

use crate::cache::StatsSnapshot;
use crate::common::{Error, PageRef, Result};
use crate::index::page::{Node, PageHandle};
use crate::storage::page::DescriptorPage;

/// Source of index pages.
///
/// All methods take `&self`: providers are shared behind an `Arc` and use
/// interior locking so concurrent readers can resolve pages.
pub trait PageProvider<K, I>: Send + Sync {
    /// Whether `create_page` / `release_page` / `flush` / `clear` are supported.
    fn is_writable(&self) -> bool;

    /// Prepare the provider for use.
    ///
    /// Returns the persisted descriptor, or `None` for a fresh provider.
    ///
    /// # Errors
    /// - `Error::AlreadyInitialized` on a second call
    /// - `Error::Persistence` if the descriptor cannot be read
    fn initialize(&self) -> Result<Option<DescriptorPage>>;

    /// Resolve a reference to its page, loading it if it is not resident.
    ///
    /// # Errors
    /// - `Error::StructuralCorruption` for undefined or unknown references
    /// - `Error::Persistence` if the page cannot be read back
    /// - `Error::Disposed` after [`dispose`](Self::dispose)
    fn resolve(&self, page_ref: PageRef) -> Result<PageHandle<K, I>>;

    /// Register a new page and assign its identifier.
    fn create_page(&self, node: Node<K, I>, measures: Vec<i64>) -> Result<PageHandle<K, I>>;

    /// Forget a page that is no longer part of the tree.
    fn release_page(&self, page_ref: PageRef) -> Result<()>;

    /// `false` only if `key` is definitely absent from the index.
    fn might_contain(&self, _key: &K) -> bool {
        true
    }

    /// Make pending changes durable.
    fn flush(&self) -> Result<()>;

    /// Drop every page.
    fn clear(&self) -> Result<()>;

    /// Release the backing resources; later calls fail with `Error::Disposed`.
    fn dispose(&self) -> Result<()>;

    fn stats(&self) -> StatsSnapshot;
}

/// Lifecycle shared by the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ProviderState {
    #[default]
    Created,
    Initialized,
    Disposed,
}

impl ProviderState {
    /// Transition `Created -> Initialized`.
    pub(crate) fn initialize(&mut self) -> Result<()> {
        match self {
            ProviderState::Created => {
                *self = ProviderState::Initialized;
                Ok(())
            }
            ProviderState::Initialized => Err(Error::AlreadyInitialized),
            ProviderState::Disposed => Err(Error::Disposed),
        }
    }

    /// Fail unless the provider was initialized and not yet disposed.
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self {
            ProviderState::Initialized => Ok(()),
            ProviderState::Created => Err(Error::UnsupportedOperation("provider is not initialized")),
            ProviderState::Disposed => Err(Error::Disposed),
        }
    }
}
