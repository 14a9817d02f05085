//! Error types for pagetree.

use thiserror::Error;

use super::PageRef;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the index engine.
///
/// Only cache misses are recovered internally (the page is re-resolved).
/// Everything else is surfaced to the caller unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// `add` was called with a key that is already present.
    #[error("an item with the same key has already been added")]
    DuplicateKey,

    /// Point lookup or replacement of a key that is not present.
    #[error("key not found")]
    KeyNotFound,

    /// The page graph is inconsistent (undefined reference, wrong page kind, ...).
    ///
    /// This indicates a bug or a damaged backing store and is not recoverable.
    #[error("structural corruption at {page_ref}: {reason}")]
    StructuralCorruption { page_ref: PageRef, reason: String },

    /// Mutation attempted through a provider that cannot write.
    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// A page could not be serialized or deserialized.
    #[error("failed to read or write {page_ref}: {source}")]
    Persistence {
        page_ref: PageRef,
        #[source]
        source: std::io::Error,
    },

    /// I/O error not tied to a specific page.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected configuration or a persisted index opened with mismatching options.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `initialize` was called twice on the same provider.
    #[error("provider is already initialized")]
    AlreadyInitialized,

    /// The provider has been disposed and can no longer resolve pages.
    #[error("provider has been disposed")]
    Disposed,
}

impl Error {
    /// Build a [`Error::StructuralCorruption`] and log it with the offending reference.
    pub(crate) fn corruption(page_ref: PageRef, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!(%page_ref, %reason, "index structure is corrupted");
        Error::StructuralCorruption { page_ref, reason }
    }

    /// Wrap an I/O failure with the page it happened on.
    pub(crate) fn persistence(page_ref: PageRef, source: std::io::Error) -> Self {
        Error::Persistence { page_ref, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::KeyNotFound;
        assert_eq!(format!("{}", err), "key not found");

        let err = Error::UnsupportedOperation("flush");
        assert_eq!(format!("{}", err), "operation not supported: flush");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_persistence_keeps_source() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err = Error::persistence(PageRef::new(128), io_err);

        assert!(format!("{}", err).contains("Page(128)"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_corruption_mentions_reference() {
        let err = Error::corruption(PageRef::UNDEFINED, "undefined reference");
        assert_eq!(
            format!("{}", err),
            "structural corruption at Page(UNDEFINED): undefined reference"
        );
    }
}
