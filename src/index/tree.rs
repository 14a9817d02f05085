//! The index orchestrator: descent, insertion, replacement and removal.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::measure::MeasureSet;
use super::page::{InnerPage, LeafPage, MergeOutcome, Node, PageHandle};
use super::seek::{Cursor, Direction, Entire, Ray, SeekResult, SeekResultType};
use super::{IndexItem, IndexKey};
use crate::cache::StatsSnapshot;
use crate::common::{Error, IndexConfig, PageRef, Result};
use crate::provider::PageProvider;

/// Extracts the key of an item.
pub type KeyExtractor<K, I> = Arc<dyn Fn(&I) -> K + Send + Sync>;

/// A split travelling up the tree: separator and the new right page.
type Split<K, I> = Option<(K, PageHandle<K, I>)>;

/// Pages resolved before a mutation starts, so the mutation itself never
/// calls the provider.
struct Pinned<K, I> {
    pages: HashMap<PageRef, PageHandle<K, I>>,
}

impl<K, I> Pinned<K, I> {
    fn new() -> Self {
        Self { pages: HashMap::new() }
    }

    fn insert(&mut self, handle: PageHandle<K, I>) {
        let page_ref = handle.read().id();
        self.pages.insert(page_ref, handle);
    }

    fn get(&self, page_ref: PageRef) -> Result<PageHandle<K, I>> {
        self.pages
            .get(&page_ref)
            .cloned()
            .ok_or_else(|| Error::corruption(page_ref, "page was not resolved ahead of the mutation"))
    }
}

fn take_reserved<K, I>(
    reserved: &mut impl Iterator<Item = PageHandle<K, I>>,
    page_ref: PageRef,
) -> Result<PageHandle<K, I>> {
    reserved
        .next()
        .ok_or_else(|| Error::corruption(page_ref, "split cascade outgrew its reserved pages"))
}

/// An ordered, paged key → item index.
///
/// The index owns the root and rightmost-leaf references and performs every
/// operation by descending from the root through its
/// [`PageProvider`]. Pages are always re-resolved by reference, never held
/// across operations.
///
/// Reads take `&self`; mutations take `&mut self`, so there is a single
/// writer per index.
///
/// # Example
/// ```
/// use pagetree::{CountMeasure, IndexBuilder};
///
/// let mut index = IndexBuilder::new(|item: &(u32, String)| item.0)
///     .page_size(4)
///     .measure(CountMeasure)
///     .build()
///     .unwrap();
///
/// index.add((1, "one".to_string())).unwrap();
/// index.add((2, "two".to_string())).unwrap();
///
/// assert_eq!(index.get_item(&2).unwrap().1, "two");
/// assert_eq!(index.measure("count").unwrap(), Some(2));
/// ```
pub struct Index<K, I> {
    pub(super) config: IndexConfig,
    pub(super) provider: Arc<dyn PageProvider<K, I>>,
    pub(super) key_of: KeyExtractor<K, I>,
    pub(super) measures: MeasureSet<I>,
    pub(super) root: PageRef,
    pub(super) rightmost: PageRef,
    pub(super) len: usize,
}

impl<K: IndexKey, I: IndexItem> Index<K, I> {
    /// Start an empty index: a single empty leaf becomes the root.
    pub(super) fn create_in(
        config: IndexConfig,
        provider: Arc<dyn PageProvider<K, I>>,
        key_of: KeyExtractor<K, I>,
        measures: MeasureSet<I>,
    ) -> Result<Self> {
        config.validate()?;
        if provider.initialize()?.is_some() {
            return Err(Error::InvalidConfig(
                "provider already holds an index, open it instead".to_string(),
            ));
        }

        let root = provider.create_page(Node::Leaf(LeafPage::new()), measures.identity())?;
        let root = root.read().id();

        Ok(Self {
            config,
            provider,
            key_of,
            measures,
            root,
            rightmost: root,
            len: 0,
        })
    }

    /// Restore an index from the descriptor persisted by its provider.
    pub(super) fn open_in(
        mut config: IndexConfig,
        provider: Arc<dyn PageProvider<K, I>>,
        key_of: KeyExtractor<K, I>,
        measures: MeasureSet<I>,
    ) -> Result<Self> {
        let descriptor = provider
            .initialize()?
            .ok_or_else(|| Error::InvalidConfig("provider holds no persisted index".to_string()))?;

        if descriptor.measure_count as usize != measures.len() {
            return Err(Error::InvalidConfig(format!(
                "index was built with {} measures, {} registered",
                descriptor.measure_count,
                measures.len()
            )));
        }

        config.page_size = descriptor.page_size as usize;
        config.use_bloom_filter = descriptor.use_bloom_filter;
        config.validate()?;

        Ok(Self {
            config,
            provider,
            key_of,
            measures,
            root: descriptor.root,
            rightmost: descriptor.rightmost,
            len: descriptor.item_count as usize,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[inline]
    pub fn root_ref(&self) -> PageRef {
        self.root
    }

    /// The last leaf of the chain.
    #[inline]
    pub fn rightmost_ref(&self) -> PageRef {
        self.rightmost
    }

    pub fn provider(&self) -> &Arc<dyn PageProvider<K, I>> {
        &self.provider
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.provider.stats()
    }

    /// Extract the key of `item`.
    pub fn key_of(&self, item: &I) -> K {
        (self.key_of)(item)
    }

    /// Number of levels (1 for a single leaf).
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut page_ref = self.root;
        while let Some(child) = self.first_child(page_ref)? {
            page_ref = child;
            height += 1;
        }
        Ok(height)
    }

    /// Root accumulators, one per registered measure.
    pub fn measures(&self) -> Result<Vec<i64>> {
        Ok(self.provider.resolve(self.root)?.read().measures().to_vec())
    }

    /// Root value of the measure called `name`, `None` for unknown names.
    pub fn measure(&self, name: &str) -> Result<Option<i64>> {
        let Some(position) = self.measures.position(name) else {
            return Ok(None);
        };
        Ok(self.measures()?.get(position).copied())
    }

    pub fn measure_names(&self) -> impl Iterator<Item = &str> {
        self.measures.names()
    }

    // ========================================================================
    // Point lookups
    // ========================================================================

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        if !self.provider.might_contain(key) {
            return Ok(false);
        }
        let leaf = self.find_leaf(key)?;
        let page = leaf.read();
        Ok(page.as_leaf()?.seek(key).is_exact())
    }

    /// # Errors
    /// `Error::KeyNotFound` if the key is absent.
    pub fn get_item(&self, key: &K) -> Result<I> {
        self.get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Like [`get_item`](Self::get_item) but `None` on a miss.
    pub fn get(&self, key: &K) -> Result<Option<I>> {
        if !self.provider.might_contain(key) {
            return Ok(None);
        }
        let leaf = self.find_leaf(key)?;
        let page = leaf.read();
        let leaf = page.as_leaf()?;
        let result = leaf.seek(key);
        Ok(result
            .is_exact()
            .then(|| leaf.entries()[result.pointer].1.clone()))
    }

    // ========================================================================
    // Seek
    // ========================================================================

    /// Position of `key`, or of the first greater key.
    ///
    /// `Default` is only returned when no such position exists (empty index
    /// or `key` past the last entry), with the cursor just after the end.
    pub fn seek(&self, key: &K) -> Result<SeekResult<Cursor>> {
        self.seek_ray(&Ray::new(key.clone(), Direction::Positive))
    }

    /// Starting position of a scan along `ray`.
    ///
    /// A positive ray lands on the smallest key `>= point`, a negative ray on
    /// the greatest key `<= point`. `Exact` means the point itself is present.
    pub fn seek_ray(&self, ray: &Ray<K>) -> Result<SeekResult<Cursor>> {
        match (&ray.point, ray.direction) {
            (Entire::NegativeInfinity, Direction::Positive) => {
                let leaf = self.leftmost_leaf()?;
                let page = leaf.read();
                let cursor = Cursor::new(page.id(), 0);
                Ok(if page.as_leaf()?.is_empty() {
                    SeekResult::default_at(cursor)
                } else {
                    SeekResult::nearest(cursor)
                })
            }
            (Entire::PositiveInfinity, Direction::Positive) => {
                let leaf = self.provider.resolve(self.rightmost)?;
                let page = leaf.read();
                Ok(SeekResult::default_at(Cursor::new(page.id(), page.as_leaf()?.len())))
            }
            (Entire::NegativeInfinity, Direction::Negative) => {
                let leaf = self.leftmost_leaf()?;
                let id = leaf.read().id();
                Ok(SeekResult::default_at(Cursor::new(id, 0)))
            }
            (Entire::PositiveInfinity, Direction::Negative) => {
                let leaf = self.provider.resolve(self.rightmost)?;
                let page = leaf.read();
                let len = page.as_leaf()?.len();
                Ok(if len == 0 {
                    SeekResult::default_at(Cursor::new(page.id(), 0))
                } else {
                    SeekResult::nearest(Cursor::new(page.id(), len - 1))
                })
            }
            (Entire::Value(key), Direction::Positive) => self.seek_forward(key),
            (Entire::Value(key), Direction::Negative) => self.seek_backward(key),
        }
    }

    fn seek_forward(&self, key: &K) -> Result<SeekResult<Cursor>> {
        let leaf = self.find_leaf(key)?;
        let page = leaf.read();
        let leaf_page = page.as_leaf()?;
        let result = leaf_page.seek(key);
        let cursor = Cursor::new(page.id(), result.pointer);

        Ok(match result.result_type {
            SeekResultType::Default if result.pointer == 0 && !leaf_page.is_empty() => {
                SeekResult::nearest(cursor)
            }
            SeekResultType::Default if result.pointer > 0 => match leaf_page.right() {
                Some(right) => SeekResult::nearest(Cursor::new(right, 0)),
                None => SeekResult::default_at(cursor),
            },
            _ => SeekResult {
                result_type: result.result_type,
                pointer: cursor,
            },
        })
    }

    fn seek_backward(&self, key: &K) -> Result<SeekResult<Cursor>> {
        let (leaf, left_subtree) = self.locate(key)?;
        let page = leaf.read();
        let leaf_page = page.as_leaf()?;

        let result = leaf_page.seek(key);
        if result.is_exact() {
            return Ok(SeekResult::exact(Cursor::new(page.id(), result.pointer)));
        }

        let below = leaf_page.rank(key, false);
        if below > 0 {
            return Ok(SeekResult::nearest(Cursor::new(page.id(), below - 1)));
        }

        // Every key of this leaf is greater: step to the predecessor leaf
        let cursor = Cursor::new(page.id(), 0);
        drop(page);
        match left_subtree {
            Some(subtree) => {
                let previous = self.rightmost_leaf_of(subtree)?;
                let previous = previous.read();
                let len = previous.as_leaf()?.len();
                Ok(if len == 0 {
                    SeekResult::default_at(cursor)
                } else {
                    SeekResult::nearest(Cursor::new(previous.id(), len - 1))
                })
            }
            None => Ok(SeekResult::default_at(cursor)),
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert `item` under its extracted key.
    ///
    /// Every page a split cascade needs is allocated before any page is
    /// touched, so a failing provider leaves the index as it was.
    ///
    /// # Errors
    /// `Error::DuplicateKey` if the key is present; the index is unchanged.
    pub fn add(&mut self, item: I) -> Result<()> {
        self.ensure_writable()?;
        let key = (self.key_of)(&item);
        let delta = self.measures.item_values(&item);

        let (path, leaf) = self.descend(&key)?;
        let (position, leaf_full) = {
            let page = leaf.read();
            let result = page.as_leaf()?.seek(&key);
            if result.is_exact() {
                return Err(Error::DuplicateKey);
            }
            (result.pointer, page.current_size() >= self.config.page_size)
        };

        // Splits run upwards from the leaf through every full ancestor
        let mut splits = usize::from(leaf_full);
        if leaf_full {
            for (parent, _) in path.iter().rev() {
                if parent.read().current_size() < self.config.page_size {
                    break;
                }
                splits += 1;
            }
        }
        let grows = splits == path.len() + 1;

        let mut pins = Pinned::new();
        for (parent, _) in path.iter().rev().take(splits.saturating_sub(1)) {
            self.pin_children(parent, &mut pins)?;
        }
        let mut reserved = self.reserve_pages(splits + usize::from(grows))?.into_iter();

        let mut split = self.insert_into_leaf(&leaf, position, key, item, &delta, &mut reserved)?;
        for (parent, slot) in path.iter().rev() {
            split = self.insert_into_inner(parent, *slot, split, &delta, &mut reserved, &mut pins)?;
        }
        if let Some((separator, right)) = split {
            let old_root = path.first().map_or(&leaf, |(handle, _)| handle);
            self.grow_root(old_root, separator, &right, &mut reserved)?;
        }
        self.len += 1;
        Ok(())
    }

    fn insert_into_leaf(
        &mut self,
        handle: &PageHandle<K, I>,
        position: usize,
        key: K,
        item: I,
        delta: &[i64],
        reserved: &mut impl Iterator<Item = PageHandle<K, I>>,
    ) -> Result<Split<K, I>> {
        let mut page = handle.write();
        let page_ref = page.id();
        let (node, measures) = page.parts_mut();
        let Node::Leaf(leaf) = node else {
            return Err(Error::corruption(page_ref, "page changed kind during insert"));
        };

        if leaf.len() < self.config.page_size {
            leaf.insert(position, key, item);
            self.measures.add_values(measures, delta);
            return Ok(None);
        }

        let new_handle = take_reserved(reserved, page_ref)?;
        let new_ref = new_handle.read().id();

        let half = self.config.page_size / 2;
        let mut right = leaf.split_off(half);
        if position < half {
            leaf.insert(position, key, item);
        } else {
            right.insert(position - half, key, item);
        }
        leaf.set_right(Some(new_ref));

        let was_last = right.right().is_none();
        let separator = right
            .first_key()
            .cloned()
            .ok_or_else(|| Error::corruption(page_ref, "split produced an empty leaf"))?;
        *measures = self.measures.fold_items(leaf.items());
        let right_measures = self.measures.fold_items(right.items());
        drop(page);

        {
            let mut new_page = new_handle.write();
            new_page.set_node(Node::Leaf(right));
            new_page.set_measures(right_measures);
        }

        if was_last {
            self.rightmost = new_ref;
        }
        tracing::debug!(%page_ref, %new_ref, "split leaf page");
        Ok(Some((separator, new_handle)))
    }

    /// Route a split coming from child `slot` into `handle`, splitting it in turn if full.
    fn insert_into_inner(
        &self,
        handle: &PageHandle<K, I>,
        slot: usize,
        split: Split<K, I>,
        delta: &[i64],
        reserved: &mut impl Iterator<Item = PageHandle<K, I>>,
        pins: &mut Pinned<K, I>,
    ) -> Result<Split<K, I>> {
        let Some((separator, child)) = split else {
            let mut page = handle.write();
            let (_, measures) = page.parts_mut();
            self.measures.add_values(measures, delta);
            return Ok(None);
        };
        let child_ref = child.read().id();
        pins.insert(child);

        let mut page = handle.write();
        let page_ref = page.id();
        let (node, measures) = page.parts_mut();
        let Node::Inner(inner) = node else {
            return Err(Error::corruption(page_ref, "page changed kind during insert"));
        };

        if inner.len() < self.config.page_size {
            inner.insert_after(slot, separator, child_ref);
            self.measures.add_values(measures, delta);
            return Ok(None);
        }

        let new_handle = take_reserved(reserved, page_ref)?;
        let new_ref = new_handle.read().id();

        inner.insert_after(slot, separator, child_ref);
        let (median, right) = inner.split();
        *measures = self.fold_pinned(inner, pins)?;
        let right_measures = self.fold_pinned(&right, pins)?;
        drop(page);

        {
            let mut new_page = new_handle.write();
            new_page.set_node(Node::Inner(right));
            new_page.set_measures(right_measures);
        }

        tracing::debug!(%page_ref, %new_ref, "split inner page");
        Ok(Some((median, new_handle)))
    }

    /// Turn a reserved page into a root over the old root and its new sibling.
    fn grow_root(
        &mut self,
        old_root: &PageHandle<K, I>,
        separator: K,
        right: &PageHandle<K, I>,
        reserved: &mut impl Iterator<Item = PageHandle<K, I>>,
    ) -> Result<()> {
        let handle = take_reserved(reserved, self.root)?;
        let right_ref = right.read().id();
        let measures = {
            let left = old_root.read();
            let right = right.read();
            self.measures.fold_values([left.measures(), right.measures()])
        };

        let mut page = handle.write();
        let new_root = page.id();
        page.set_node(Node::Inner(InnerPage::new_root(self.root, separator, right_ref)));
        page.set_measures(measures);

        tracing::debug!(old_root = %self.root, %new_root, "tree grew a level");
        self.root = new_root;
        Ok(())
    }

    /// Create `count` placeholder pages, all or none.
    fn reserve_pages(&self, count: usize) -> Result<Vec<PageHandle<K, I>>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            match self
                .provider
                .create_page(Node::Leaf(LeafPage::new()), self.measures.identity())
            {
                Ok(page) => pages.push(page),
                Err(e) => {
                    let created = pages.iter().map(|page| page.read().id()).collect();
                    self.release_pages(created).ok();
                    return Err(e);
                }
            }
        }
        Ok(pages)
    }

    // ========================================================================
    // Replacement
    // ========================================================================

    /// Swap the stored item having the same key as `item`; returns the old one.
    ///
    /// # Errors
    /// `Error::KeyNotFound` if no item has this key.
    pub fn replace(&mut self, item: I) -> Result<I> {
        self.ensure_writable()?;
        let key = (self.key_of)(&item);
        let new_values = self.measures.item_values(&item);

        let (path, leaf) = self.descend(&key)?;
        let old_values = {
            let page = leaf.read();
            let leaf_page = page.as_leaf()?;
            let result = leaf_page.seek(&key);
            if !result.is_exact() {
                return Err(Error::KeyNotFound);
            }
            self.measures.item_values(&leaf_page.entries()[result.pointer].1)
        };

        // Ancestors that cannot subtract the old values are refolded from their children
        let mut pins = Pinned::new();
        for (parent, _) in &path {
            let mut values = parent.read().measures().to_vec();
            if !self.measures.subtract_values(&mut values, &old_values) {
                self.pin_children(parent, &mut pins)?;
            }
        }

        let old = {
            let mut page = leaf.write();
            let page_ref = page.id();
            let (node, measures) = page.parts_mut();
            let Node::Leaf(leaf_page) = node else {
                return Err(Error::corruption(page_ref, "page changed kind during replace"));
            };
            let position = leaf_page.seek(&key).pointer;
            let old = leaf_page.replace(position, item);
            if !self.swap_values(measures, &old_values, &new_values) {
                *measures = self.measures.fold_items(leaf_page.items());
            }
            old
        };

        for (parent, _) in path.iter().rev() {
            let mut page = parent.write();
            let (node, measures) = page.parts_mut();
            if !self.swap_values(measures, &old_values, &new_values) {
                if let Node::Inner(inner) = node {
                    *measures = self.fold_pinned(inner, &pins)?;
                }
            }
        }
        Ok(old)
    }

    /// `measures = measures - old + new`; `false` if a recompute is needed.
    fn swap_values(&self, measures: &mut [i64], old: &[i64], new: &[i64]) -> bool {
        if !self.measures.subtract_values(measures, old) {
            return false;
        }
        self.measures.add_values(measures, new);
        true
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove the item stored under `key`, returning it.
    ///
    /// A missing key is not an error: `Ok(None)` and the index is unchanged.
    ///
    /// Pages emptied by merges are released once the tree is consistent
    /// again. If releasing fails the item stays removed and the release
    /// error is returned.
    pub fn remove(&mut self, key: &K) -> Result<Option<I>> {
        self.ensure_writable()?;
        let (path, leaf) = self.descend(key)?;
        if !leaf.read().as_leaf()?.seek(key).is_exact() {
            return Ok(None);
        }

        let min_fill = self.config.min_page_fill();
        let mut pins = Pinned::new();
        pins.insert(Arc::clone(&leaf));
        for (level, (parent, slot)) in path.iter().enumerate() {
            pins.insert(Arc::clone(parent));
            self.pin_children(parent, &mut pins)?;

            // A child at the minimum may merge, which refolds its siblings
            let child = path.get(level + 1).map_or(&leaf, |(handle, _)| handle);
            if child.read().current_size() > min_fill {
                continue;
            }
            let children = parent.read().as_inner()?.children().to_vec();
            for sibling in [slot.checked_sub(1), Some(slot + 1)].into_iter().flatten() {
                if let Some(&sibling) = children.get(sibling) {
                    let sibling = pins.get(sibling)?;
                    self.pin_children(&sibling, &mut pins)?;
                }
            }
        }

        let item = {
            let mut page = leaf.write();
            let page_ref = page.id();
            let (node, measures) = page.parts_mut();
            let Node::Leaf(leaf_page) = node else {
                return Err(Error::corruption(page_ref, "page changed kind during remove"));
            };
            let position = leaf_page.seek(key).pointer;
            let (_, item) = leaf_page.remove(position);
            if !self.measures.subtract_values(measures, &self.measures.item_values(&item)) {
                *measures = self.measures.fold_items(leaf_page.items());
            }
            item
        };
        let values = self.measures.item_values(&item);

        let mut freed = Vec::new();
        for (level, (parent, slot)) in path.iter().enumerate().rev() {
            let child = path.get(level + 1).map_or(&leaf, |(handle, _)| handle);
            if child.read().current_size() < min_fill {
                self.merge_child(parent, *slot, &pins, &mut freed)?;
            }

            let mut page = parent.write();
            let (node, measures) = page.parts_mut();
            if !self.measures.subtract_values(measures, &values) {
                if let Node::Inner(inner) = node {
                    *measures = self.fold_pinned(inner, &pins)?;
                }
            }
        }

        self.len -= 1;
        self.collapse_root(&pins, &mut freed)?;
        self.release_pages(freed)?;
        Ok(Some(item))
    }

    /// Merge the underfull child at `slot` with one of its siblings.
    ///
    /// The first child pairs with its right neighbour, the last one with its
    /// left neighbour, any other with the left neighbour if it is strictly
    /// smaller than the right one. An absorbed page is queued on `freed`.
    fn merge_child(
        &mut self,
        parent: &PageHandle<K, I>,
        slot: usize,
        pins: &Pinned<K, I>,
        freed: &mut Vec<PageRef>,
    ) -> Result<()> {
        let (parent_ref, children) = {
            let page = parent.read();
            (page.id(), page.as_inner()?.children().to_vec())
        };
        if children.len() < 2 {
            return Ok(());
        }

        let left_slot = if slot == 0 {
            0
        } else if slot == children.len() - 1 {
            slot - 1
        } else {
            let left = pins.get(children[slot - 1])?.read().current_size();
            let right = pins.get(children[slot + 1])?.read().current_size();
            if left < right {
                slot - 1
            } else {
                slot
            }
        };

        let left_ref = children[left_slot];
        let right_ref = children[left_slot + 1];
        let separator = parent.read().as_inner()?.key(left_slot).clone();

        let left_handle = pins.get(left_ref)?;
        let right_handle = pins.get(right_ref)?;
        let outcome = {
            let mut left = left_handle.write();
            let mut right = right_handle.write();
            let (left_node, left_measures) = left.parts_mut();
            let (right_node, right_measures) = right.parts_mut();

            let outcome = match (left_node, right_node) {
                (Node::Leaf(l), Node::Leaf(r)) => {
                    let outcome = l.merge(r, self.config.page_size);
                    if let MergeOutcome::Rebalanced { .. } = outcome {
                        *left_measures = self.measures.fold_items(l.items());
                        *right_measures = self.measures.fold_items(r.items());
                    }
                    outcome
                }
                (Node::Inner(l), Node::Inner(r)) => {
                    let outcome = l.merge(separator, r, self.config.page_size);
                    if let MergeOutcome::Rebalanced { .. } = outcome {
                        *left_measures = self.fold_pinned(l, pins)?;
                        *right_measures = self.fold_pinned(r, pins)?;
                    }
                    outcome
                }
                _ => return Err(Error::corruption(parent_ref, "siblings on different levels")),
            };
            if outcome == MergeOutcome::Absorbed {
                self.measures.add_values(left_measures, right_measures);
            }
            outcome
        };

        let mut page = parent.write();
        let (node, _) = page.parts_mut();
        let Node::Inner(inner) = node else {
            return Err(Error::corruption(parent_ref, "page changed kind during merge"));
        };

        match outcome {
            MergeOutcome::Absorbed => {
                inner.remove_child(left_slot + 1);
                if self.rightmost == right_ref {
                    self.rightmost = left_ref;
                }
                freed.push(right_ref);
                tracing::debug!(%left_ref, %right_ref, "merged sibling pages");
            }
            MergeOutcome::Rebalanced { separator } => {
                inner.set_key(left_slot, separator);
                tracing::debug!(%left_ref, %right_ref, "rebalanced sibling pages");
            }
        }
        Ok(())
    }

    /// Replace an inner root left without separators by its only child.
    fn collapse_root(&mut self, pins: &Pinned<K, I>, freed: &mut Vec<PageRef>) -> Result<()> {
        loop {
            let only_child = {
                let root = pins.get(self.root)?;
                let page = root.read();
                match page.node() {
                    Node::Inner(inner) if inner.is_empty() => inner.child(0),
                    _ => return Ok(()),
                }
            };

            tracing::debug!(old_root = %self.root, new_root = %only_child, "tree lost a level");
            freed.push(self.root);
            self.root = only_child;
        }
    }

    /// Hand pages that left the tree back to the provider.
    ///
    /// Every page is attempted; the first failure is returned.
    fn release_pages(&self, pages: Vec<PageRef>) -> Result<()> {
        let mut result = Ok(());
        for page_ref in pages {
            if let Err(e) = self.provider.release_page(page_ref) {
                tracing::warn!(%page_ref, error = %e, "failed to release page");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Remove every item, leaving a single empty leaf.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.provider.clear()?;
        let root = self
            .provider
            .create_page(Node::Leaf(LeafPage::new()), self.measures.identity())?;
        self.root = root.read().id();
        self.rightmost = self.root;
        self.len = 0;
        Ok(())
    }

    /// Make pending changes durable through the provider.
    pub fn flush(&self) -> Result<()> {
        self.provider.flush()
    }

    /// Release the provider's resources. The index is unusable afterwards.
    pub fn dispose(self) -> Result<()> {
        self.provider.dispose()
    }

    // ========================================================================
    // Descent helpers
    // ========================================================================

    fn ensure_writable(&self) -> Result<()> {
        if self.provider.is_writable() {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation("mutation of a read-only index"))
        }
    }

    /// The leaf whose range holds `key`.
    pub(super) fn find_leaf(&self, key: &K) -> Result<PageHandle<K, I>> {
        self.locate(key).map(|(leaf, _)| leaf)
    }

    /// The leaf for `key`, plus the deepest subtree immediately left of the
    /// descent path. The rightmost leaf of that subtree precedes the leaf.
    pub(super) fn locate(&self, key: &K) -> Result<(PageHandle<K, I>, Option<PageRef>)> {
        let mut page_ref = self.root;
        let mut left_subtree = None;
        loop {
            let handle = self.provider.resolve(page_ref)?;
            let next = match handle.read().node() {
                Node::Leaf(_) => None,
                Node::Inner(inner) => {
                    let slot = inner.seek(key).pointer;
                    if slot > 0 {
                        left_subtree = Some(inner.child(slot - 1));
                    }
                    Some(inner.child(slot))
                }
            };
            match next {
                Some(child) => page_ref = child,
                None => return Ok((handle, left_subtree)),
            }
        }
    }

    /// The leaf preceding the one that starts with `first_key`.
    pub(super) fn predecessor_leaf(&self, first_key: &K) -> Result<Option<PageHandle<K, I>>> {
        match self.locate(first_key)?.1 {
            Some(subtree) => self.rightmost_leaf_of(subtree).map(Some),
            None => Ok(None),
        }
    }

    pub(super) fn leftmost_leaf(&self) -> Result<PageHandle<K, I>> {
        let mut page_ref = self.root;
        while let Some(child) = self.first_child(page_ref)? {
            page_ref = child;
        }
        self.provider.resolve(page_ref)
    }

    fn rightmost_leaf_of(&self, mut page_ref: PageRef) -> Result<PageHandle<K, I>> {
        loop {
            let handle = self.provider.resolve(page_ref)?;
            let next = match handle.read().node() {
                Node::Leaf(_) => None,
                Node::Inner(inner) => inner.children().last().copied(),
            };
            match next {
                Some(child) => page_ref = child,
                None => return Ok(handle),
            }
        }
    }

    fn first_child(&self, page_ref: PageRef) -> Result<Option<PageRef>> {
        let handle = self.provider.resolve(page_ref)?;
        let page = handle.read();
        Ok(match page.node() {
            Node::Leaf(_) => None,
            Node::Inner(inner) => Some(inner.child(0)),
        })
    }

    /// Root-to-leaf path for `key`: each inner page with the slot taken, then the leaf.
    fn descend(&self, key: &K) -> Result<(Vec<(PageHandle<K, I>, usize)>, PageHandle<K, I>)> {
        let mut path = Vec::new();
        let mut handle = self.provider.resolve(self.root)?;
        loop {
            let next = match handle.read().node() {
                Node::Leaf(_) => None,
                Node::Inner(inner) => {
                    let slot = inner.seek(key).pointer;
                    Some((slot, inner.child(slot)))
                }
            };
            match next {
                Some((slot, child)) => {
                    let child = self.provider.resolve(child)?;
                    path.push((std::mem::replace(&mut handle, child), slot));
                }
                None => return Ok((path, handle)),
            }
        }
    }

    /// Resolve every child of `handle` into `pins`.
    fn pin_children(&self, handle: &PageHandle<K, I>, pins: &mut Pinned<K, I>) -> Result<()> {
        let children = match handle.read().node() {
            Node::Inner(inner) => inner.children().to_vec(),
            Node::Leaf(_) => return Ok(()),
        };
        for child in children {
            if !pins.pages.contains_key(&child) {
                pins.insert(self.provider.resolve(child)?);
            }
        }
        Ok(())
    }

    /// Fold the accumulators of every child of `inner`.
    pub(super) fn fold_children(&self, inner: &InnerPage<K>) -> Result<Vec<i64>> {
        let children = inner
            .children()
            .iter()
            .map(|child| self.provider.resolve(*child))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.fold_handles(&children))
    }

    fn fold_pinned(&self, inner: &InnerPage<K>, pins: &Pinned<K, I>) -> Result<Vec<i64>> {
        let children = inner
            .children()
            .iter()
            .map(|child| pins.get(*child))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.fold_handles(&children))
    }

    fn fold_handles(&self, children: &[PageHandle<K, I>]) -> Vec<i64> {
        let pages: Vec<_> = children.iter().map(|child| child.read()).collect();
        self.measures.fold_values(pages.iter().map(|page| page.measures()))
    }
}

impl<K, I> fmt::Debug for Index<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("root", &self.root)
            .field("rightmost", &self.rightmost)
            .field("len", &self.len)
            .field("page_size", &self.config.page_size)
            .field("measures", &self.measures)
            .finish()
    }
}
