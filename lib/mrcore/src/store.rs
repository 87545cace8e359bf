//! Per-partition append buffers filled by the map stage.
//!
//! Each partition owns its own lock, so concurrent emits into different
//! partitions never contend.

use parking_lot::Mutex;

use crate::error::{EngineError, Result};

/// Capacity a fresh partition buffer starts with.
pub const INITIAL_PAIR_CAPACITY: usize = 2;

/// Growth policy for partition buffers: start at [`INITIAL_PAIR_CAPACITY`],
/// then double on every overflow.
pub fn next_capacity(current: usize) -> usize {
    if current == 0 {
        INITIAL_PAIR_CAPACITY
    } else {
        current.saturating_mul(2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    key: String,
    value: String,
}

impl KeyValuePair {
    pub fn new(key: &str, value: &str) -> Self {
        Self { key: key.to_owned(), value: value.to_owned() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Append-only pair sequence that grows by [`next_capacity`].
#[derive(Debug, Default)]
pub struct PairBuffer {
    pairs: Vec<KeyValuePair>,
    capacity: usize,
}

impl PairBuffer {
    pub fn new() -> Self {
        Self {
            pairs: Vec::with_capacity(INITIAL_PAIR_CAPACITY),
            capacity: INITIAL_PAIR_CAPACITY,
        }
    }

    pub fn push(&mut self, pair: KeyValuePair) {
        if self.pairs.len() == self.capacity {
            self.capacity = next_capacity(self.capacity);
            self.pairs.reserve_exact(self.capacity - self.pairs.len());
        }
        self.pairs.push(pair);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Capacity as tracked by the growth policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[KeyValuePair] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<KeyValuePair> {
        self.pairs
    }
}

#[derive(Debug)]
pub struct PartitionStore {
    partitions: Vec<Mutex<PairBuffer>>,
}

impl PartitionStore {
    pub fn new(num_partitions: usize) -> Self {
        Self {
            partitions: (0..num_partitions).map(|_| Mutex::new(PairBuffer::new())).collect(),
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Copies `key` and `value` and appends them to `partition`.
    pub fn emit(&self, partition: usize, key: &str, value: &str) -> Result<()> {
        let slot = self.partitions.get(partition).ok_or_else(|| EngineError::PartitionOutOfRange {
            partition,
            num_partitions: self.partitions.len(),
            key: key.to_owned(),
        })?;
        let pair = KeyValuePair::new(key, value);
        slot.lock().push(pair);
        Ok(())
    }

    pub fn pair_count(&self, partition: usize) -> usize {
        self.partitions.get(partition).map_or(0, |slot| slot.lock().len())
    }

    /// Moves the pairs of `partition` out, leaving an empty buffer behind.
    pub fn take_pairs(&self, partition: usize) -> Vec<KeyValuePair> {
        match self.partitions.get(partition) {
            Some(slot) => std::mem::take(&mut *slot.lock()).into_pairs(),
            None => Vec::new(),
        }
    }
}
