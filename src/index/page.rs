//! Index pages.
//!
//! A [`Page`] is either a leaf (sorted `(key, item)` entries plus a link to
//! the next leaf) or an inner page (sorted separator keys routing to
//! `len + 1` children). Both shapes share the identifier and the measure
//! accumulators; behaviour is dispatched by matching on [`Node`].
//!
//! ```text
//!            Inner [ 10 | 20 ]
//!           /        |        \
//!   Leaf[1 5] -> Leaf[10 15] -> Leaf[20 30] -> None
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use super::seek::SeekResult;
use crate::common::{Error, PageRef, Result};

/// Shared handle to a resident page.
///
/// Pages are handed out by a provider; the tree only keeps the
/// [`PageRef`] and re-resolves it on every access.
pub type PageHandle<K, I> = Arc<RwLock<Page<K, I>>>;

/// A page of the tree.
#[derive(Debug, Clone)]
pub struct Page<K, I> {
    id: PageRef,
    measures: Vec<i64>,
    node: Node<K, I>,
}

/// Payload of a page.
#[derive(Debug, Clone)]
pub enum Node<K, I> {
    Leaf(LeafPage<K, I>),
    Inner(InnerPage<K>),
}

impl<K, I> Page<K, I> {
    pub fn new(id: PageRef, node: Node<K, I>, measures: Vec<i64>) -> Self {
        Self { id, measures, node }
    }

    #[inline]
    pub fn id(&self) -> PageRef {
        self.id
    }

    #[inline]
    pub fn measures(&self) -> &[i64] {
        &self.measures
    }

    pub fn set_measures(&mut self, measures: Vec<i64>) {
        self.measures = measures;
    }

    #[inline]
    pub fn node(&self) -> &Node<K, I> {
        &self.node
    }

    pub fn set_node(&mut self, node: Node<K, I>) {
        self.node = node;
    }

    /// Split borrow of the node and the accumulators.
    #[inline]
    pub fn parts_mut(&mut self) -> (&mut Node<K, I>, &mut Vec<i64>) {
        (&mut self.node, &mut self.measures)
    }

    /// Number of slots in use: entries for a leaf, separators for an inner page.
    pub fn current_size(&self) -> usize {
        match &self.node {
            Node::Leaf(leaf) => leaf.len(),
            Node::Inner(inner) => inner.len(),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.node, Node::Leaf(_))
    }

    pub fn as_leaf(&self) -> Result<&LeafPage<K, I>> {
        match &self.node {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Inner(_) => Err(Error::corruption(self.id, "expected a leaf page")),
        }
    }

    pub fn as_inner(&self) -> Result<&InnerPage<K>> {
        match &self.node {
            Node::Inner(inner) => Ok(inner),
            Node::Leaf(_) => Err(Error::corruption(self.id, "expected an inner page")),
        }
    }
}

/// Result of merging two sibling pages.
#[derive(Debug, PartialEq, Eq)]
pub enum MergeOutcome<K> {
    /// The right page was emptied into the left one and must be unlinked.
    Absorbed,
    /// Entries were redistributed; the parent separator must become `separator`.
    Rebalanced { separator: K },
}

// ============================================================================
// Leaf pages
// ============================================================================

/// Sorted entries of a leaf plus the link to the next leaf.
#[derive(Debug, Clone)]
pub struct LeafPage<K, I> {
    entries: Vec<(K, I)>,
    right: Option<PageRef>,
}

impl<K, I> Default for LeafPage<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, I> LeafPage<K, I> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            right: None,
        }
    }

    pub fn from_entries(entries: Vec<(K, I)>, right: Option<PageRef>) -> Self {
        Self { entries, right }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[(K, I)] {
        &self.entries
    }

    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&(K, I)> {
        self.entries.get(position)
    }

    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(|(key, _)| key)
    }

    #[inline]
    pub fn right(&self) -> Option<PageRef> {
        self.right
    }

    pub fn set_right(&mut self, right: Option<PageRef>) {
        self.right = right;
    }

    pub fn insert(&mut self, position: usize, key: K, item: I) {
        self.entries.insert(position, (key, item));
    }

    pub fn remove(&mut self, position: usize) -> (K, I) {
        self.entries.remove(position)
    }

    /// Swap the item at `position`, returning the previous one.
    pub fn replace(&mut self, position: usize, item: I) -> I {
        std::mem::replace(&mut self.entries[position].1, item)
    }

    /// Move entries `[at..]` into a new leaf that inherits the right link.
    pub fn split_off(&mut self, at: usize) -> LeafPage<K, I> {
        LeafPage {
            entries: self.entries.split_off(at),
            right: self.right,
        }
    }
}

impl<K: Ord + Clone, I> LeafPage<K, I> {
    /// Locate `key` inside this leaf.
    ///
    /// - `Exact(i)`: present at `i`
    /// - `Nearest(i)`: absent, would be inserted at `0 < i < len`
    /// - `Default(0)` / `Default(len)`: before the first / after the last entry
    pub fn seek(&self, key: &K) -> SeekResult<usize> {
        match self.entries.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(position) => SeekResult::exact(position),
            Err(position) if position == 0 || position == self.entries.len() => {
                SeekResult::default_at(position)
            }
            Err(position) => SeekResult::nearest(position),
        }
    }

    /// Number of entries with a key `< key` (or `<= key` when `inclusive`).
    pub fn rank(&self, key: &K, inclusive: bool) -> usize {
        if inclusive {
            self.entries.partition_point(|(k, _)| k <= key)
        } else {
            self.entries.partition_point(|(k, _)| k < key)
        }
    }

    /// Merge `right` (the next sibling) into this leaf.
    ///
    /// If both fit into one page the right leaf is drained and unlinked,
    /// otherwise entries are split evenly between the two.
    pub fn merge(&mut self, right: &mut LeafPage<K, I>, page_size: usize) -> MergeOutcome<K> {
        if self.len() + right.len() <= page_size {
            self.entries.append(&mut right.entries);
            self.right = right.right.take();
            return MergeOutcome::Absorbed;
        }

        self.entries.append(&mut right.entries);
        let mid = self.entries.len() / 2;
        right.entries = self.entries.split_off(mid);
        let separator = right.entries[0].0.clone();
        MergeOutcome::Rebalanced { separator }
    }
}

// ============================================================================
// Inner pages
// ============================================================================

/// Separator keys and child references.
///
/// Child `i` holds keys in `[keys[i - 1], keys[i])`; the first child is
/// unbounded below and the last one unbounded above.
#[derive(Debug, Clone)]
pub struct InnerPage<K> {
    keys: Vec<K>,
    children: Vec<PageRef>,
}

impl<K> InnerPage<K> {
    /// A page routing between two children.
    pub fn new_root(left: PageRef, separator: K, right: PageRef) -> Self {
        Self {
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    /// Build from raw parts.
    ///
    /// # Panics
    /// Panics unless `children.len() == keys.len() + 1`.
    pub fn from_parts(keys: Vec<K>, children: Vec<PageRef>) -> Self {
        assert_eq!(children.len(), keys.len() + 1, "inner page shape");
        Self { keys, children }
    }

    /// Number of separators (children minus one).
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub fn children(&self) -> &[PageRef] {
        &self.children
    }

    #[inline]
    pub fn child(&self, slot: usize) -> PageRef {
        self.children[slot]
    }

    #[inline]
    pub fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub fn set_key(&mut self, index: usize, key: K) {
        self.keys[index] = key;
    }

    /// Insert `child` right after slot `slot`, separated by `key`.
    pub fn insert_after(&mut self, slot: usize, key: K, child: PageRef) {
        self.keys.insert(slot, key);
        self.children.insert(slot + 1, child);
    }

    /// Unlink child `slot` (never the first one) and the separator before it.
    pub fn remove_child(&mut self, slot: usize) -> (K, PageRef) {
        debug_assert!(slot > 0, "first child has no separator of its own");
        let key = self.keys.remove(slot - 1);
        let child = self.children.remove(slot);
        (key, child)
    }

    /// Split an overfull page at its median separator.
    ///
    /// The median moves up to the parent and is returned together with the
    /// new right page.
    pub fn split(&mut self) -> (K, InnerPage<K>) {
        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let separator = self.keys.remove(mid);
        (
            separator,
            InnerPage {
                keys: right_keys,
                children: right_children,
            },
        )
    }

    /// Merge `right` into this page, pulling `separator` down from the parent.
    pub fn merge(
        &mut self,
        separator: K,
        right: &mut InnerPage<K>,
        page_size: usize,
    ) -> MergeOutcome<K> {
        let fits = self.len() + 1 + right.len() <= page_size;

        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
        if fits {
            return MergeOutcome::Absorbed;
        }

        let (separator, rest) = self.split();
        *right = rest;
        MergeOutcome::Rebalanced { separator }
    }
}

impl<K: Ord> InnerPage<K> {
    /// Child slot to descend into for `key`.
    pub fn seek(&self, key: &K) -> SeekResult<usize> {
        let slot = self.keys.partition_point(|k| k <= key);
        if slot > 0 && self.keys[slot - 1] == *key {
            SeekResult::exact(slot)
        } else {
            SeekResult::nearest(slot)
        }
    }
}
