//! Page reference type.

use std::fmt;

/// Opaque identifier of an index page.
///
/// While a page lives in memory the reference is a sequential page number
/// handed out by the provider. Once persisted it is the byte offset of the
/// page inside the backing stream. Two values are reserved:
/// - [`PageRef::DESCRIPTOR`] names the descriptor page,
/// - [`PageRef::UNDEFINED`] marks "no page" and is never resolvable.
///
/// # Example
/// ```
/// use pagetree::PageRef;
///
/// let page_ref = PageRef::new(42);
/// assert!(page_ref.is_defined());
/// assert_eq!(page_ref.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageRef(pub u64);

impl PageRef {
    /// Sentinel for "no page".
    pub const UNDEFINED: PageRef = PageRef(u64::MAX);

    /// Well-known reference of the descriptor page.
    pub const DESCRIPTOR: PageRef = PageRef(u64::MAX - 1);

    /// Create a new PageRef.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageRef(id)
    }

    /// Check if this reference points at a regular page.
    #[inline]
    pub fn is_defined(&self) -> bool {
        *self != Self::UNDEFINED && *self != Self::DESCRIPTOR
    }

    /// Check if this is the descriptor page reference.
    #[inline]
    pub fn is_descriptor(&self) -> bool {
        *self == Self::DESCRIPTOR
    }

    /// Byte offset of a persisted page.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.0
    }

    /// Map the on-disk sentinel back to `None`.
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        let page_ref = PageRef(raw);
        (page_ref != Self::UNDEFINED).then_some(page_ref)
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNDEFINED => write!(f, "Page(UNDEFINED)"),
            Self::DESCRIPTOR => write!(f, "Page(DESCRIPTOR)"),
            PageRef(id) => write!(f, "Page({})", id),
        }
    }
}
