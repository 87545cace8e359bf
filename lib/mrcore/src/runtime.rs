use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::{Emitter, Mapper, Reducer, ValueGetter};
use crate::config::{EngineConfig, OrderingMode};
use crate::distributor::WorkDistributor;
use crate::error::{EngineError, Result, Stage};
use crate::group::GroupedPartition;
use crate::partition::Partitioner;
use crate::signal::{CountingSignal, Wake};
use crate::stats::{EmitTally, MapStats, PartitionReport, ReduceStats, RunStats};
use crate::store::PartitionStore;

/// Collects inputs and configuration, then runs one map/reduce pass over them.
pub struct RuntimePipeline {
    inputs: Vec<String>,
    config: EngineConfig,
}

impl RuntimePipeline {
    pub fn new() -> Self {
        Self { inputs: vec![], config: EngineConfig::from_env() }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn add_input(&mut self, input: impl Into<String>) {
        self.inputs.push(input.into());
    }

    pub fn add_inputs<I, S>(&mut self, inputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
    }

    pub fn map_reduce<M, R, P>(&self, mapper: M, reducer: R, partitioner: P) -> Result<RunStats>
    where
        M: Mapper,
        R: Reducer,
        P: Partitioner,
    {
        run_with_config(&self.inputs, &mapper, &reducer, &partitioner, &self.config)
    }
}

impl Default for RuntimePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `mapper` over every input item on `num_mappers` threads, then
/// `reducer` over every partition on `num_reducers` threads.
///
/// Returns once both worker pools have joined. Uses [`OrderingMode::FirstKey`].
pub fn run<I, M, R, P>(
    inputs: &[I],
    mapper: M,
    num_mappers: usize,
    reducer: R,
    num_reducers: usize,
    partitioner: P,
    num_partitions: usize,
) -> Result<RunStats>
where
    I: AsRef<str> + Sync,
    M: Mapper,
    R: Reducer,
    P: Partitioner,
{
    let config = EngineConfig::new(num_mappers, num_reducers, num_partitions);
    run_with_config(inputs, &mapper, &reducer, &partitioner, &config)
}

pub fn run_with_config<I, M, R, P>(
    inputs: &[I],
    mapper: &M,
    reducer: &R,
    partitioner: &P,
    config: &EngineConfig,
) -> Result<RunStats>
where
    I: AsRef<str> + Sync,
    M: Mapper + ?Sized,
    R: Reducer + ?Sized,
    P: Partitioner,
{
    config.validate()?;
    let ctx = RunContext::new(config, partitioner, inputs.len());

    info!(
        mappers = config.num_mappers, reducers = config.num_reducers,
        partitions = config.num_partitions, ordering = %config.ordering, inputs = inputs.len(),
        "Starting map phase"
    );
    let map = ctx.map_stage(inputs, mapper)?;
    info!(phase = "map",
          workers = map.workers, inputs = map.inputs,
          total_emits = map.total_emits, rejected_emits = map.rejected_emits,
          wall_ms = map.wall_ms,
          "Map phase complete");

    let reduce = ctx.reduce_stage(reducer)?;
    info!(phase = "reduce",
          workers = reduce.workers, partitions = reduce.partitions,
          total_keys = reduce.total_keys, total_values_read = reduce.total_values_read,
          min_partition_ms = reduce.min_partition_ms, max_partition_ms = reduce.max_partition_ms,
          wall_ms = reduce.wall_ms,
          "Reduce phase complete");

    Ok(RunStats { map, reduce })
}

/// All state shared by the workers of one run. Owned by the run call and
/// dropped when it returns.
struct RunContext<'a, P> {
    config: &'a EngineConfig,
    partitioner: &'a P,
    store: PartitionStore,
    tally: EmitTally,
    map_work: WorkDistributor,
    reduce_work: WorkDistributor,
    signals: Vec<CountingSignal>,
    mapper_failure: Mutex<Option<EngineError>>,
    reports: Mutex<Vec<PartitionReport>>,
}

impl<'a, P: Partitioner> RunContext<'a, P> {
    fn new(config: &'a EngineConfig, partitioner: &'a P, num_inputs: usize) -> Self {
        let partitions = config.num_partitions;
        Self {
            config,
            partitioner,
            store: PartitionStore::new(partitions),
            tally: EmitTally::new(partitions),
            map_work: WorkDistributor::new(num_inputs),
            reduce_work: WorkDistributor::new(partitions),
            signals: (0..partitions).map(|_| CountingSignal::new()).collect(),
            mapper_failure: Mutex::new(None),
            reports: Mutex::new(Vec::with_capacity(partitions)),
        }
    }

    fn map_stage<I, M>(&self, inputs: &[I], mapper: &M) -> Result<MapStats>
    where
        I: AsRef<str> + Sync,
        M: Mapper + ?Sized,
    {
        let start = Instant::now();
        let workers = self.config.num_mappers;
        run_workers(Stage::Map, workers, |worker| {
            let emitter = Emitter::new(&self.store, self.partitioner, &self.tally);
            let mut items = 0usize;
            for index in self.map_work.claims() {
                if let Err(err) = mapper.map(inputs[index].as_ref(), &emitter) {
                    debug!(worker, index, error = %err, "mapper returned an error");
                    self.mapper_failure.lock().get_or_insert(err);
                }
                items += 1;
            }
            debug!(worker, items, "map worker finished");
        })?;

        if let Some((partition, key)) = self.tally.take_first_rejection() {
            return Err(EngineError::PartitionOutOfRange {
                partition,
                num_partitions: self.config.num_partitions,
                key,
            });
        }
        if let Some(err) = self.mapper_failure.lock().take() {
            return Err(err);
        }

        Ok(MapStats {
            workers,
            inputs: inputs.len(),
            total_emits: self.tally.total(),
            rejected_emits: self.tally.rejected(),
            partition_pairs: self.tally.partition_pairs(),
            wall_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn reduce_stage<R>(&self, reducer: &R) -> Result<ReduceStats>
    where
        R: Reducer + ?Sized,
    {
        let start = Instant::now();
        let workers = self.config.num_reducers;
        run_workers(Stage::Reduce, workers, |worker| {
            for partition in self.reduce_work.claims() {
                debug!(worker, partition, "reduce worker claimed partition");
                let report = self.reduce_partition(reducer, partition);
                self.reports.lock().push(report);
            }
        })?;

        let reports = std::mem::take(&mut *self.reports.lock());
        Ok(ReduceStats::aggregate(workers, &reports, start.elapsed().as_millis() as u64))
    }

    fn reduce_partition<R>(&self, reducer: &R, partition: usize) -> PartitionReport
    where
        R: Reducer + ?Sized,
    {
        let start = Instant::now();
        let signal = &self.signals[partition];
        let _release = ReleaseOnUnwind(signal);

        let mut grouped = GroupedPartition::build(self.store.take_pairs(partition));
        let pairs = grouped.num_pairs() as u64;
        let keys: Vec<String> = grouped.keys().map(str::to_owned).collect();

        if partition > 0 && self.signals[partition - 1].wait() == Wake::Closed {
            warn!(partition, upstream = partition - 1, "Upstream reducer died, continuing without its handoff");
        }

        let mut values = ValueGetter::new(&mut grouped, partition);
        for key in &keys {
            reducer.reduce(key, &mut values, partition);
            if self.config.ordering == OrderingMode::FirstKey {
                signal.post();
            }
        }
        if keys.is_empty() || self.config.ordering == OrderingMode::Completion {
            signal.post();
        }

        PartitionReport {
            pairs,
            keys: keys.len() as u64,
            values_read: values.values_read(),
            wall_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Closes a partition's signal if its reducer unwinds, so reducers of later
/// partitions are not left waiting forever.
struct ReleaseOnUnwind<'a>(&'a CountingSignal);

impl Drop for ReleaseOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

/// Spawns `workers` named threads running `work(worker_id)` and joins them
/// all before returning.
fn run_workers<F>(stage: Stage, workers: usize, work: F) -> Result<()>
where
    F: Fn(usize) + Sync,
{
    thread::scope(|scope| {
        let work = &work;
        let mut handles = Vec::with_capacity(workers);
        let mut failure = None;
        for worker in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("mr-{stage}-{worker}"))
                .spawn_scoped(scope, move || work(worker));
            match spawned {
                Ok(handle) => handles.push((worker, handle)),
                Err(source) => {
                    error!(stage = %stage, worker, error = %source, "failed to spawn worker");
                    failure = Some(EngineError::WorkerSpawn { stage, source });
                    break;
                }
            }
        }
        for (worker, handle) in handles {
            if handle.join().is_err() {
                error!(stage = %stage, worker, "worker panicked");
                failure.get_or_insert(EngineError::WorkerPanicked { stage, worker });
            }
        }
        failure.map_or(Ok(()), Err)
    })
}
