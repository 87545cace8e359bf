use std::io;

use thiserror::Error;

/// Stage of a run, used to tag worker failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Map,
    Reduce,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Map => f.write_str("map"),
            Stage::Reduce => f.write_str("reduce"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {field} must be at least 1 (got {value})")]
    InvalidConfig { field: &'static str, value: usize },

    #[error("partitioner returned {partition} for key {key:?}, expected a value below {num_partitions}")]
    PartitionOutOfRange {
        partition: usize,
        num_partitions: usize,
        key: String,
    },

    #[error("failed to spawn {stage} worker")]
    WorkerSpawn {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("{stage} worker {worker} panicked")]
    WorkerPanicked { stage: Stage, worker: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
