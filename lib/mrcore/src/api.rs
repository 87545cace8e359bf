use tracing::warn;

use crate::error::{EngineError, Result};
use crate::group::GroupedPartition;
use crate::partition::Partitioner;
use crate::stats::EmitTally;
use crate::store::PartitionStore;

// ========== Core MapReduce traits ==========

/// Called once per input item by some map worker. Emitting is thread-safe,
/// so a mapper may be invoked concurrently from every map worker.
pub trait Mapper: Sync {
    fn map(&self, item: &str, emitter: &Emitter<'_>) -> Result<()>;
}

impl<F> Mapper for F
where
    F: Fn(&str, &Emitter<'_>) -> Result<()> + Sync,
{
    fn map(&self, item: &str, emitter: &Emitter<'_>) -> Result<()> {
        self(item, emitter)
    }
}

/// Called once per distinct key of a partition, in ascending key order.
/// Values for `key` are pulled through `values` until it returns `None`.
pub trait Reducer: Sync {
    fn reduce(&self, key: &str, values: &mut ValueGetter<'_>, partition: usize);
}

impl<F> Reducer for F
where
    F: Fn(&str, &mut ValueGetter<'_>, usize) + Sync,
{
    fn reduce(&self, key: &str, values: &mut ValueGetter<'_>, partition: usize) {
        self(key, values, partition)
    }
}

// ========== Callback boundaries ==========

/// Handle given to mappers for emitting intermediate pairs.
pub struct Emitter<'a> {
    store: &'a PartitionStore,
    partitioner: &'a dyn Partitioner,
    tally: &'a EmitTally,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(store: &'a PartitionStore, partitioner: &'a dyn Partitioner, tally: &'a EmitTally) -> Self {
        Self { store, partitioner, tally }
    }

    pub fn num_partitions(&self) -> usize {
        self.store.num_partitions()
    }

    /// Routes the pair through the partitioner and appends a copy of it.
    ///
    /// A partitioner result outside `[0, num_partitions)` drops the pair and
    /// returns [`EngineError::PartitionOutOfRange`]; the run as a whole then
    /// fails after the map stage.
    pub fn emit(&self, key: &str, value: &str) -> Result<()> {
        let partition = self.partitioner.partition(key, self.store.num_partitions());
        match self.store.emit(partition, key, value) {
            Ok(()) => {
                self.tally.record_emit(partition);
                Ok(())
            }
            Err(err) => {
                if let EngineError::PartitionOutOfRange { partition, key, .. } = &err {
                    warn!(partition, key = %key, "Partitioner result out of range, pair dropped");
                    self.tally.record_rejection(*partition, key);
                }
                Err(err)
            }
        }
    }
}

/// Per-key value cursor handed to reducers. Bound to the single partition
/// being reduced by the current worker.
pub struct ValueGetter<'a> {
    grouped: &'a mut GroupedPartition,
    partition: usize,
    values_read: u64,
}

impl<'a> ValueGetter<'a> {
    pub(crate) fn new(grouped: &'a mut GroupedPartition, partition: usize) -> Self {
        Self { grouped, partition, values_read: 0 }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Next value of `key` in `partition`, or `None` once the key is drained.
    /// Unknown keys and partitions other than the one being reduced also
    /// return `None`.
    pub fn get(&mut self, key: &str, partition: usize) -> Option<&str> {
        if partition != self.partition {
            warn!(requested = partition, reducing = self.partition, "get() called for a foreign partition");
            return None;
        }
        let value = self.grouped.next_value(key)?;
        self.values_read += 1;
        Some(value)
    }

    pub(crate) fn values_read(&self) -> u64 {
        self.values_read
    }
}
