//! Bounded diagnostic history

use std::collections::VecDeque;

/// Ring buffer keeping the most recent `capacity` entries.
///
/// Once full, every push evicts the oldest entry. `total_pushed` keeps
/// counting so callers can tell how much was dropped.
#[derive(Debug, Clone)]
pub struct History<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    total_pushed: u64,
}

impl<T> History<T> {
    /// Create a history retaining at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.total_pushed += 1;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries ever pushed, evicted ones included
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn latest(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// Oldest retained entry first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl<T: Clone> History<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(10_000)
    }
}
