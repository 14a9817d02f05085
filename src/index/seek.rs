//! Seek results, rays and cursors.

use crate::common::PageRef;

/// Outcome of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekResultType {
    /// The key is present at the returned position.
    Exact,
    /// The key is absent; the position is where it would be inserted
    /// (or, for a negative ray, the closest smaller entry).
    Nearest,
    /// The key lies outside the range covered by the page or the index.
    Default,
}

/// A position tagged with how it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekResult<T> {
    pub result_type: SeekResultType,
    pub pointer: T,
}

impl<T> SeekResult<T> {
    #[inline]
    pub fn exact(pointer: T) -> Self {
        Self {
            result_type: SeekResultType::Exact,
            pointer,
        }
    }

    #[inline]
    pub fn nearest(pointer: T) -> Self {
        Self {
            result_type: SeekResultType::Nearest,
            pointer,
        }
    }

    #[inline]
    pub fn default_at(pointer: T) -> Self {
        Self {
            result_type: SeekResultType::Default,
            pointer,
        }
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.result_type == SeekResultType::Exact
    }
}

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending key order.
    #[default]
    Positive,
    /// Descending key order.
    Negative,
}

/// A key extended with both infinities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entire<K> {
    NegativeInfinity,
    Value(K),
    PositiveInfinity,
}

/// Starting point and direction of an ordered scan.
///
/// # Example
/// ```
/// use pagetree::{Direction, Ray};
///
/// let ray = Ray::new(10u32, Direction::Negative);
/// assert_eq!(ray.direction, Direction::Negative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ray<K> {
    pub point: Entire<K>,
    pub direction: Direction,
}

impl<K> Ray<K> {
    /// Scan from `key` (inclusive) in `direction`.
    pub fn new(key: K, direction: Direction) -> Self {
        Self {
            point: Entire::Value(key),
            direction,
        }
    }

    /// Ascending scan over the whole index.
    pub fn first() -> Self {
        Self {
            point: Entire::NegativeInfinity,
            direction: Direction::Positive,
        }
    }

    /// Descending scan over the whole index.
    pub fn last() -> Self {
        Self {
            point: Entire::PositiveInfinity,
            direction: Direction::Negative,
        }
    }
}

/// Absolute position of an entry: a leaf page and a slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page: PageRef,
    pub position: usize,
}

impl Cursor {
    #[inline]
    pub fn new(page: PageRef, position: usize) -> Self {
        Self { page, position }
    }
}
