//! In-process MapReduce engine.
//!
//! Mappers run on a fixed pool of threads and emit string pairs into
//! per-partition append buffers. Once every mapper has joined, a second pool
//! claims partitions one at a time, sorts and groups each, and calls the
//! reducer once per distinct key in ascending key order.

pub mod api;
pub mod config;
pub mod constants;
pub mod distributor;
pub mod error;
pub mod group;
pub mod index;
pub mod partition;
pub mod runtime;
pub mod signal;
pub mod stats;
pub mod store;
pub mod utils;

pub use api::{Emitter, Mapper, Reducer, ValueGetter};
pub use config::{EngineConfig, OrderingMode};
pub use error::{EngineError, Result};
pub use partition::{HashPartitioner, Partitioner, SortedPartitioner};
pub use runtime::{run, run_with_config, RuntimePipeline};
pub use stats::RunStats;
