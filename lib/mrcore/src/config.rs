use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{DEFAULT_NUM_PARTITIONS, ENV_NUM_MAPPERS, ENV_NUM_PARTITIONS, ENV_NUM_REDUCERS, ENV_ORDERING};
use crate::error::{EngineError, Result};
use crate::utils::env_parse;

/// When the reducer of partition `n` may start, relative to partition `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingMode {
    /// Partition `n - 1` posts once per reduced key and partition `n` waits
    /// for a single post, so `n` may start as soon as `n - 1` has reduced its
    /// first key (or found itself empty).
    #[default]
    FirstKey,
    /// Partition `n - 1` posts once after its last key, so `n` starts only
    /// after `n - 1` has finished.
    Completion,
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingMode::FirstKey => f.write_str("first-key"),
            OrderingMode::Completion => f.write_str("completion"),
        }
    }
}

impl FromStr for OrderingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first-key" | "first_key" | "firstkey" => Ok(OrderingMode::FirstKey),
            "completion" | "complete" => Ok(OrderingMode::Completion),
            other => Err(format!("unknown ordering mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub num_mappers: usize,
    pub num_reducers: usize,
    pub num_partitions: usize,
    pub ordering: OrderingMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            num_mappers: cpus,
            num_reducers: cpus,
            num_partitions: DEFAULT_NUM_PARTITIONS,
            ordering: OrderingMode::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(num_mappers: usize, num_reducers: usize, num_partitions: usize) -> Self {
        Self { num_mappers, num_reducers, num_partitions, ordering: OrderingMode::default() }
    }

    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }

    /// Defaults overridden by `MR_NUM_MAPPERS`, `MR_NUM_REDUCERS`,
    /// `MR_NUM_PARTITIONS` and `MR_ORDERING`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_mappers: env_parse(ENV_NUM_MAPPERS).unwrap_or(defaults.num_mappers),
            num_reducers: env_parse(ENV_NUM_REDUCERS).unwrap_or(defaults.num_reducers),
            num_partitions: env_parse(ENV_NUM_PARTITIONS).unwrap_or(defaults.num_partitions),
            ordering: env_parse(ENV_ORDERING).unwrap_or(defaults.ordering),
        }
    }

    /// Rejects zero worker or partition counts.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("num_mappers", self.num_mappers),
            ("num_reducers", self.num_reducers),
            ("num_partitions", self.num_partitions),
        ] {
            if value == 0 {
                return Err(EngineError::InvalidConfig { field, value });
            }
        }
        Ok(())
    }
}
