//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Evicts entries in the order they were first admitted.
///
/// Re-accessing a resident entry does not move it.
#[derive(Debug)]
pub struct FifoReplacer<T> {
    /// Insertion order (front = oldest).
    queue: VecDeque<T>,

    /// Live ids, for O(1) membership checks.
    resident: HashSet<T>,
}

impl<T: Copy + Eq + Hash> FifoReplacer<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            resident: HashSet::new(),
        }
    }

    /// Record that `id` was accessed; only admits it if not yet tracked.
    pub fn record_access(&mut self, id: T) {
        if self.resident.insert(id) {
            self.queue.push_back(id);
        }
    }

    /// Select the oldest live id and stop tracking it.
    pub fn evict(&mut self) -> Option<T> {
        let id = self.queue.pop_front()?;
        self.resident.remove(&id);
        Some(id)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.resident.clear();
    }

    /// Number of tracked ids.
    pub fn size(&self) -> usize {
        self.resident.len()
    }
}

impl<T: Copy + Eq + Hash> Default for FifoReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}
