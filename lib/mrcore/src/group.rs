//! Sort/group stage: turns a partition's raw pair sequence into contiguous
//! key ranges ("key slots") with a read cursor per slot.

use std::ops::Range;

use rayon::prelude::*;

use crate::index::IntermediateIndex;
use crate::store::KeyValuePair;

#[derive(Debug)]
pub struct GroupedPartition {
    pairs: Vec<KeyValuePair>,
    starts: Vec<usize>,
    ends: Vec<usize>,
    cursors: Vec<usize>,
    index: IntermediateIndex<usize>,
}

impl GroupedPartition {
    /// Sorts `pairs` by key bytes and records one slot per distinct key.
    /// Slots are numbered in ascending key order.
    pub fn build(mut pairs: Vec<KeyValuePair>) -> Self {
        // par_sort_by is stable: equal keys keep their emit order
        pairs.par_sort_by(|a, b| a.key().as_bytes().cmp(b.key().as_bytes()));

        let num_keys = count_distinct_keys(&pairs);
        let mut starts = Vec::with_capacity(num_keys);
        let mut ends = Vec::with_capacity(num_keys);
        let mut cursors = Vec::with_capacity(num_keys);
        let mut index = IntermediateIndex::with_capacity(num_keys);

        let mut previous: Option<&str> = None;
        for (offset, pair) in pairs.iter().enumerate() {
            if previous == Some(pair.key()) {
                continue;
            }
            if !starts.is_empty() {
                ends.push(offset);
            }
            index.insert(pair.key(), starts.len());
            starts.push(offset);
            cursors.push(offset);
            previous = Some(pair.key());
        }
        if !starts.is_empty() {
            ends.push(pairs.len());
        }

        Self { pairs, starts, ends, cursors, index }
    }

    pub fn num_keys(&self) -> usize {
        self.starts.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Key of `slot`. Panics if `slot >= num_keys()`.
    pub fn key(&self, slot: usize) -> &str {
        self.pairs[self.starts[slot]].key()
    }

    /// Offsets `[start, end)` of `slot` in the sorted pair sequence.
    pub fn range(&self, slot: usize) -> Range<usize> {
        self.starts[slot]..self.ends[slot]
    }

    pub fn slot_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Distinct keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.num_keys()).map(move |slot| self.key(slot))
    }

    pub fn pairs(&self) -> &[KeyValuePair] {
        &self.pairs
    }

    /// Returns the value under the cursor of `key`'s slot and advances it.
    /// `None` for unknown keys and drained slots.
    pub fn next_value(&mut self, key: &str) -> Option<&str> {
        let slot = *self.index.get(key)?;
        let cursor = self.cursors[slot];
        if cursor >= self.ends[slot] {
            return None;
        }
        self.cursors[slot] += 1;
        Some(self.pairs[cursor].value())
    }
}

fn count_distinct_keys(sorted: &[KeyValuePair]) -> usize {
    let mut count = 0;
    let mut previous: Option<&str> = None;
    for pair in sorted {
        if previous != Some(pair.key()) {
            count += 1;
            previous = Some(pair.key());
        }
    }
    count
}
