//! Centralized environment variable names and default values for engine tuning.

// Environment variable names
pub const ENV_NUM_MAPPERS: &str = "MR_NUM_MAPPERS";
pub const ENV_NUM_REDUCERS: &str = "MR_NUM_REDUCERS";
pub const ENV_NUM_PARTITIONS: &str = "MR_NUM_PARTITIONS";
/// `first-key` or `completion`, see [`crate::config::OrderingMode`]
pub const ENV_ORDERING: &str = "MR_ORDERING";

// Defaults. Worker counts fall back to the number of logical CPUs.
pub const DEFAULT_NUM_PARTITIONS: usize = 16;
