//! Ordered range scans.

use std::collections::VecDeque;

use super::seek::{Cursor, Direction, Ray, SeekResultType};
use super::tree::Index;
use super::{IndexItem, IndexKey};
use crate::common::{PageRef, Result};

/// Where the next leaf comes from once the buffered one is exhausted.
enum Next<K> {
    /// Forward scans follow the leaf chain.
    Right(PageRef),
    /// Backward scans ask for the leaf preceding the one starting with this key.
    Before(K),
    Done,
}

/// Lazy scan over `(key, item)` pairs, one leaf buffered at a time.
///
/// The scan holds no page lock between calls; dropping it early is free.
/// A resolve failure is yielded once as `Err` and ends the scan.
pub struct RangeIter<'a, K, I> {
    index: &'a Index<K, I>,
    direction: Direction,
    buffer: VecDeque<(K, I)>,
    next: Next<K>,
}

impl<'a, K: IndexKey, I: IndexItem> RangeIter<'a, K, I> {
    fn empty(index: &'a Index<K, I>, direction: Direction) -> Self {
        Self {
            index,
            direction,
            buffer: VecDeque::new(),
            next: Next::Done,
        }
    }

    /// Start at `cursor` and continue in `direction`.
    fn starting_at(index: &'a Index<K, I>, cursor: Cursor, direction: Direction) -> Result<Self> {
        let mut iter = Self::empty(index, direction);
        let handle = index.provider.resolve(cursor.page)?;
        let page = handle.read();
        let leaf = page.as_leaf()?;

        match direction {
            Direction::Positive => {
                let start = cursor.position.min(leaf.len());
                iter.buffer.extend(leaf.entries()[start..].iter().cloned());
                iter.next = leaf.right().map_or(Next::Done, Next::Right);
            }
            Direction::Negative => {
                let end = (cursor.position + 1).min(leaf.len());
                iter.buffer.extend(leaf.entries()[..end].iter().rev().cloned());
                iter.next = leaf.first_key().cloned().map_or(Next::Done, Next::Before);
            }
        }
        Ok(iter)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn load_next(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.next, Next::Done) {
            Next::Done => {}
            Next::Right(page_ref) => {
                let handle = self.index.provider.resolve(page_ref)?;
                let page = handle.read();
                let leaf = page.as_leaf()?;
                self.buffer.extend(leaf.entries().iter().cloned());
                self.next = leaf.right().map_or(Next::Done, Next::Right);
            }
            Next::Before(first_key) => {
                if let Some(handle) = self.index.predecessor_leaf(&first_key)? {
                    let page = handle.read();
                    let leaf = page.as_leaf()?;
                    self.buffer.extend(leaf.entries().iter().rev().cloned());
                    self.next = leaf.first_key().cloned().map_or(Next::Done, Next::Before);
                }
            }
        }
        Ok(())
    }
}

impl<K: IndexKey, I: IndexItem> Iterator for RangeIter<'_, K, I> {
    type Item = Result<(K, I)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if matches!(self.next, Next::Done) {
                return None;
            }
            if let Err(e) = self.load_next() {
                self.next = Next::Done;
                return Some(Err(e));
            }
        }
    }
}

impl<K: IndexKey, I: IndexItem> Index<K, I> {
    /// All items in ascending key order.
    pub fn iter(&self) -> Result<RangeIter<'_, K, I>> {
        self.iter_from(&Ray::first())
    }

    /// All items in descending key order.
    pub fn iter_rev(&self) -> Result<RangeIter<'_, K, I>> {
        self.iter_from(&Ray::last())
    }

    /// Items from the ray's point (inclusive) onwards in its direction.
    ///
    /// # Example
    /// ```
    /// use pagetree::{Direction, IndexBuilder, Ray};
    ///
    /// let mut index = IndexBuilder::new(|v: &u32| *v).page_size(4).build().unwrap();
    /// for v in 1..=20 {
    ///     index.add(v).unwrap();
    /// }
    ///
    /// let down: Vec<u32> = index
    ///     .iter_from(&Ray::new(12, Direction::Negative))
    ///     .unwrap()
    ///     .map(|entry| entry.map(|(k, _)| k))
    ///     .collect::<pagetree::Result<_>>()
    ///     .unwrap();
    /// assert_eq!(down, (1..=12).rev().collect::<Vec<_>>());
    /// ```
    pub fn iter_from(&self, ray: &Ray<K>) -> Result<RangeIter<'_, K, I>> {
        let result = self.seek_ray(ray)?;
        if ray.direction == Direction::Negative && result.result_type == SeekResultType::Default {
            return Ok(RangeIter::empty(self, ray.direction));
        }
        RangeIter::starting_at(self, result.pointer, ray.direction)
    }
}
