use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Default, Clone, Debug, Serialize)]
pub struct MapStats {
    pub workers: usize,
    pub inputs: usize,
    pub total_emits: u64,
    pub rejected_emits: u64,
    /// Pairs appended to each partition.
    pub partition_pairs: Vec<u64>,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ReduceStats {
    pub workers: usize,
    pub partitions: usize,
    pub total_keys: u64,
    pub total_values_read: u64,
    pub max_partition_pairs: u64,
    pub min_partition_ms: u64,
    pub max_partition_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct RunStats {
    pub map: MapStats,
    pub reduce: ReduceStats,
}

/// What one reduce worker recorded for one partition.
#[derive(Clone, Debug)]
pub(crate) struct PartitionReport {
    pub pairs: u64,
    pub keys: u64,
    pub values_read: u64,
    pub wall_ms: u64,
}

impl ReduceStats {
    pub(crate) fn aggregate(workers: usize, reports: &[PartitionReport], wall_ms: u64) -> Self {
        Self {
            workers,
            partitions: reports.len(),
            total_keys: reports.iter().map(|r| r.keys).sum(),
            total_values_read: reports.iter().map(|r| r.values_read).sum(),
            max_partition_pairs: reports.iter().map(|r| r.pairs).max().unwrap_or(0),
            min_partition_ms: reports.iter().map(|r| r.wall_ms).min().unwrap_or(0),
            max_partition_ms: reports.iter().map(|r| r.wall_ms).max().unwrap_or(0),
            wall_ms,
        }
    }
}

/// Emit counters shared by all map workers.
#[derive(Debug)]
pub(crate) struct EmitTally {
    per_partition: Vec<AtomicU64>,
    rejected: AtomicU64,
    first_rejection: Mutex<Option<(usize, String)>>,
}

impl EmitTally {
    pub fn new(num_partitions: usize) -> Self {
        Self {
            per_partition: (0..num_partitions).map(|_| AtomicU64::new(0)).collect(),
            rejected: AtomicU64::new(0),
            first_rejection: Mutex::new(None),
        }
    }

    pub fn record_emit(&self, partition: usize) {
        if let Some(counter) = self.per_partition.get(partition) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self, partition: usize, key: &str) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.first_rejection.lock().get_or_insert_with(|| (partition, key.to_owned()));
    }

    pub fn partition_pairs(&self) -> Vec<u64> {
        self.per_partition.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    pub fn total(&self) -> u64 {
        self.per_partition.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn take_first_rejection(&self) -> Option<(usize, String)> {
        self.first_rejection.lock().take()
    }
}
