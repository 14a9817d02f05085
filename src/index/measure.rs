//! Aggregate measures maintained on every page.
//!
//! Each page stores one `i64` accumulator per registered [`Measure`]. Leaf
//! accumulators fold over the page's items, inner accumulators fold over the
//! children's accumulators. Mutations update the accumulators bottom-up
//! along the access path instead of rescanning the tree.

use std::fmt;
use std::sync::Arc;

/// An incrementally maintained aggregate over items of type `I`.
///
/// `combine` must be associative and commutative with `identity` as its
/// neutral element, so that a page's value is the same whichever way its
/// children were grouped.
pub trait Measure<I>: Send + Sync {
    /// Name used to look the value up on an index.
    fn name(&self) -> &str;

    /// Value of an empty page.
    fn identity(&self) -> i64;

    /// Contribution of a single item.
    fn value_of(&self, item: &I) -> i64;

    /// Merge two accumulated values.
    fn combine(&self, left: i64, right: i64) -> i64;

    /// Remove a previously combined value.
    ///
    /// Returns `None` when the aggregate cannot be reversed (min/max lost
    /// their extreme); the caller then recomputes the page from scratch.
    fn subtract(&self, total: i64, value: i64) -> Option<i64>;
}

/// Number of items.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountMeasure;

impl<I> Measure<I> for CountMeasure {
    fn name(&self) -> &str {
        "count"
    }

    fn identity(&self) -> i64 {
        0
    }

    fn value_of(&self, _item: &I) -> i64 {
        1
    }

    fn combine(&self, left: i64, right: i64) -> i64 {
        left + right
    }

    fn subtract(&self, total: i64, value: i64) -> Option<i64> {
        Some(total - value)
    }
}

type Selector<I> = Arc<dyn Fn(&I) -> i64 + Send + Sync>;

/// Sum of a numeric field.
pub struct SumMeasure<I> {
    name: String,
    selector: Selector<I>,
}

impl<I> SumMeasure<I> {
    /// Sum `selector(item)` over all items.
    pub fn new(name: impl Into<String>, selector: impl Fn(&I) -> i64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            selector: Arc::new(selector),
        }
    }
}

impl<I> Measure<I> for SumMeasure<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> i64 {
        0
    }

    fn value_of(&self, item: &I) -> i64 {
        (self.selector)(item)
    }

    fn combine(&self, left: i64, right: i64) -> i64 {
        left.wrapping_add(right)
    }

    fn subtract(&self, total: i64, value: i64) -> Option<i64> {
        Some(total.wrapping_sub(value))
    }
}

/// Smallest value of a numeric field (`i64::MAX` when empty).
pub struct MinMeasure<I> {
    name: String,
    selector: Selector<I>,
}

impl<I> MinMeasure<I> {
    pub fn new(name: impl Into<String>, selector: impl Fn(&I) -> i64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            selector: Arc::new(selector),
        }
    }
}

impl<I> Measure<I> for MinMeasure<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> i64 {
        i64::MAX
    }

    fn value_of(&self, item: &I) -> i64 {
        (self.selector)(item)
    }

    fn combine(&self, left: i64, right: i64) -> i64 {
        left.min(right)
    }

    fn subtract(&self, total: i64, value: i64) -> Option<i64> {
        // Removing anything above the minimum leaves it untouched
        (value > total).then_some(total)
    }
}

/// Largest value of a numeric field (`i64::MIN` when empty).
pub struct MaxMeasure<I> {
    name: String,
    selector: Selector<I>,
}

impl<I> MaxMeasure<I> {
    pub fn new(name: impl Into<String>, selector: impl Fn(&I) -> i64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            selector: Arc::new(selector),
        }
    }
}

impl<I> Measure<I> for MaxMeasure<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> i64 {
        i64::MIN
    }

    fn value_of(&self, item: &I) -> i64 {
        (self.selector)(item)
    }

    fn combine(&self, left: i64, right: i64) -> i64 {
        left.max(right)
    }

    fn subtract(&self, total: i64, value: i64) -> Option<i64> {
        (value < total).then_some(total)
    }
}

/// The ordered list of measures attached to an index.
///
/// Page accumulators are stored positionally, so the order of registration
/// must be the same every time a persisted index is reopened.
pub struct MeasureSet<I> {
    measures: Vec<Arc<dyn Measure<I>>>,
}

impl<I> MeasureSet<I> {
    /// An empty set: pages carry no accumulators.
    pub fn new() -> Self {
        Self {
            measures: Vec::new(),
        }
    }

    /// Register another measure.
    pub fn push(&mut self, measure: impl Measure<I> + 'static) {
        self.measures.push(Arc::new(measure));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.measures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Position of the measure called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.measures.iter().position(|m| m.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.measures.iter().map(|m| m.name())
    }

    /// Accumulators of an empty page.
    pub fn identity(&self) -> Vec<i64> {
        self.measures.iter().map(|m| m.identity()).collect()
    }

    /// Accumulators of a single item.
    pub fn item_values(&self, item: &I) -> Vec<i64> {
        self.measures.iter().map(|m| m.value_of(item)).collect()
    }

    /// Fold a sequence of items from scratch.
    pub fn fold_items<'a>(&self, items: impl IntoIterator<Item = &'a I>) -> Vec<i64>
    where
        I: 'a,
    {
        let mut values = self.identity();
        if self.is_empty() {
            return values;
        }
        for item in items {
            for (value, measure) in values.iter_mut().zip(&self.measures) {
                *value = measure.combine(*value, measure.value_of(item));
            }
        }
        values
    }

    /// Fold accumulators of several pages from scratch.
    pub fn fold_values<'a>(&self, pages: impl IntoIterator<Item = &'a [i64]>) -> Vec<i64> {
        let mut values = self.identity();
        for other in pages {
            self.add_values(&mut values, other);
        }
        values
    }

    /// `values += other`
    pub fn add_values(&self, values: &mut [i64], other: &[i64]) {
        for ((value, measure), other) in values.iter_mut().zip(&self.measures).zip(other) {
            *value = measure.combine(*value, *other);
        }
    }

    /// `values -= other`; returns `false` if any measure must be recomputed.
    #[must_use]
    pub fn subtract_values(&self, values: &mut [i64], other: &[i64]) -> bool {
        let mut exact = true;
        for ((value, measure), other) in values.iter_mut().zip(&self.measures).zip(other) {
            match measure.subtract(*value, *other) {
                Some(v) => *value = v,
                None => exact = false,
            }
        }
        exact
    }
}

impl<I> Default for MeasureSet<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Clone for MeasureSet<I> {
    fn clone(&self) -> Self {
        Self {
            measures: self.measures.clone(),
        }
    }
}

impl<I> fmt::Debug for MeasureSet<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
