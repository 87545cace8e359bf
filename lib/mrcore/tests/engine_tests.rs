use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use mrcore::error::Stage;
use mrcore::partition::default_hash_partition;
use mrcore::{
    run, run_with_config, Emitter, EngineConfig, EngineError, HashPartitioner, OrderingMode, RuntimePipeline,
    SortedPartitioner, ValueGetter,
};
use parking_lot::Mutex;

fn split_words(item: &str, emitter: &Emitter<'_>) -> mrcore::Result<()> {
    for word in item.split_whitespace() {
        emitter.emit(word, "1")?;
    }
    Ok(())
}

/// Runs a word count and returns `word -> (count, partition)`.
fn word_count(inputs: &[&str], mappers: usize, reducers: usize, partitions: usize) -> BTreeMap<String, (u64, usize)> {
    let counts = Mutex::new(BTreeMap::new());
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        let mut sum = 0u64;
        while let Some(v) = values.get(key, partition) {
            sum += v.parse::<u64>().unwrap();
        }
        let previous = counts.lock().insert(key.to_owned(), (sum, partition));
        assert!(previous.is_none(), "key {key} reduced twice");
    };
    run(inputs, split_words, mappers, reducer, reducers, HashPartitioner, partitions).unwrap();
    counts.into_inner()
}

#[test]
fn two_line_word_count() {
    let counts = word_count(&["apple banana", "banana cherry"], 2, 2, 2);
    assert_eq!(counts.len(), 3);
    assert_eq!(counts["banana"].0, 2);
    assert_eq!(counts["apple"].0, 1);
    assert_eq!(counts["cherry"].0, 1);
    for (word, (_, partition)) in &counts {
        assert_eq!(*partition, default_hash_partition(word, 2));
    }
}

#[test]
fn zero_inputs_finish_without_reducing() {
    let calls = AtomicUsize::new(0);
    let reducer = |_: &str, _: &mut ValueGetter<'_>, _: usize| {
        calls.fetch_add(1, Ordering::SeqCst);
    };
    let inputs: [&str; 0] = [];
    let stats = run(&inputs, split_words, 3, reducer, 3, HashPartitioner, 8).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(stats.map.total_emits, 0);
    assert_eq!(stats.reduce.partitions, 8);
    assert_eq!(stats.reduce.total_keys, 0);
}

#[test]
fn single_partition_reduces_everything() {
    let counts = word_count(&["a b c", "c b", "c"], 3, 4, 1);
    assert_eq!(counts.len(), 3);
    assert_eq!(counts["a"], (1, 0));
    assert_eq!(counts["b"], (2, 0));
    assert_eq!(counts["c"], (3, 0));
}

#[test]
fn every_value_reaches_its_partition_exactly_once() {
    let inputs: Vec<String> = (0..200)
        .map(|i| (0..10).map(|j| format!("k{}:{}", (i * 7 + j) % 37, i * 10 + j)).collect::<Vec<_>>().join(" "))
        .collect();
    let mapper = |item: &str, emitter: &Emitter<'_>| -> mrcore::Result<()> {
        for token in item.split_whitespace() {
            let (key, value) = token.split_once(':').unwrap();
            emitter.emit(key, value)?;
        }
        Ok(())
    };
    let seen = Mutex::new(Vec::new());
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        assert_eq!(partition, default_hash_partition(key, 5));
        let mut local = Vec::new();
        while let Some(v) = values.get(key, partition) {
            local.push(v.parse::<u64>().unwrap());
        }
        assert_eq!(values.get(key, partition), None);
        seen.lock().extend(local);
    };
    let stats = run(&inputs, mapper, 4, reducer, 3, HashPartitioner, 5).unwrap();

    let mut seen = seen.into_inner();
    seen.sort_unstable();
    assert_eq!(seen, (0..2000).collect::<Vec<u64>>());
    assert_eq!(stats.map.total_emits, 2000);
    assert_eq!(stats.map.partition_pairs.iter().sum::<u64>(), 2000);
    assert_eq!(stats.reduce.total_keys, 37);
    assert_eq!(stats.reduce.total_values_read, 2000);
}

#[test]
fn keys_reduce_in_ascending_order_within_partition() {
    let inputs = ["delta alpha charlie", "bravo echo alpha", "foxtrot golf hotel india"];
    let order = Mutex::new(BTreeMap::<usize, Vec<String>>::new());
    let reducer = |key: &str, _: &mut ValueGetter<'_>, partition: usize| {
        order.lock().entry(partition).or_default().push(key.to_owned());
    };
    run(&inputs, split_words, 2, reducer, 2, HashPartitioner, 3).unwrap();
    let order = order.into_inner();
    let mut total = 0;
    for keys in order.values() {
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, &sorted);
        total += keys.len();
    }
    assert_eq!(total, 9);
}

fn numbers_mapper(item: &str, emitter: &Emitter<'_>) -> mrcore::Result<()> {
    for n in item.split(',') {
        emitter.emit(n, n)?;
    }
    Ok(())
}

fn spread_inputs() -> Vec<String> {
    // 20 keys per quarter of the u32 range, zero-padded so byte order is numeric order
    (0..4u64)
        .flat_map(|q| (0..20u64).map(move |i| format!("{:010}", q * (1 << 30) + i * 1000)))
        .collect::<Vec<_>>()
        .chunks(7)
        .map(|chunk| chunk.join(","))
        .collect()
}

#[test]
fn completion_ordering_reduces_partitions_in_sequence() {
    let inputs = spread_inputs();
    let log = Mutex::new(Vec::new());
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        while values.get(key, partition).is_some() {}
        log.lock().push((partition, key.to_owned()));
    };
    let config = EngineConfig::new(3, 4, 4).with_ordering(OrderingMode::Completion);
    run_with_config(&inputs, &numbers_mapper, &reducer, &SortedPartitioner, &config).unwrap();

    let log = log.into_inner();
    assert_eq!(log.len(), 80);
    let partitions: Vec<usize> = log.iter().map(|(p, _)| *p).collect();
    let mut sorted_partitions = partitions.clone();
    sorted_partitions.sort_unstable();
    assert_eq!(partitions, sorted_partitions);
    let keys: Vec<&String> = log.iter().map(|(_, k)| k).collect();
    let mut sorted_keys = keys.clone();
    sorted_keys.sort();
    assert_eq!(keys, sorted_keys);
}

#[test]
fn first_key_ordering_starts_after_upstream_first_key() {
    let inputs = spread_inputs();
    let log = Mutex::new(Vec::new());
    let reducer = |key: &str, _: &mut ValueGetter<'_>, partition: usize| {
        log.lock().push(partition);
        let _ = key;
    };
    run(&inputs, numbers_mapper, 3, reducer, 4, SortedPartitioner, 4).unwrap();

    let log = log.into_inner();
    assert_eq!(log.len(), 80);
    let first_of = |p: usize| log.iter().position(|&q| q == p).unwrap();
    for p in 1..4 {
        assert!(first_of(p - 1) < first_of(p), "partition {p} started before partition {}", p - 1);
    }
}

#[test]
fn empty_upstream_partitions_do_not_block() {
    // only the last of six partitions receives data
    let inputs = ["4294967295", "4294967290,4294967000"];
    let reduced = AtomicUsize::new(0);
    let reducer = |_: &str, _: &mut ValueGetter<'_>, partition: usize| {
        assert_eq!(partition, 5);
        reduced.fetch_add(1, Ordering::SeqCst);
    };
    for ordering in [OrderingMode::FirstKey, OrderingMode::Completion] {
        reduced.store(0, Ordering::SeqCst);
        let config = EngineConfig::new(2, 2, 6).with_ordering(ordering);
        run_with_config(&inputs, &numbers_mapper, &reducer, &SortedPartitioner, &config).unwrap();
        assert_eq!(reduced.load(Ordering::SeqCst), 3);
    }
}

#[test]
fn out_of_range_partitioner_fails_the_run() {
    let reduced = AtomicUsize::new(0);
    let reducer = |_: &str, _: &mut ValueGetter<'_>, _: usize| {
        reduced.fetch_add(1, Ordering::SeqCst);
    };
    let bad_partitioner = |key: &str, n: usize| if key == "bad" { n } else { 0 };
    let err = run(&["good bad good"], split_words, 1, reducer, 1, bad_partitioner, 2).unwrap_err();
    match err {
        EngineError::PartitionOutOfRange { partition, num_partitions, key } => {
            assert_eq!((partition, num_partitions, key.as_str()), (2, 2, "bad"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(reduced.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_config_is_rejected_before_mapping() {
    let mapped = AtomicUsize::new(0);
    let mapper = |_: &str, _: &Emitter<'_>| -> mrcore::Result<()> {
        mapped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    let reducer = |_: &str, _: &mut ValueGetter<'_>, _: usize| {};
    for (m, r, p) in [(0, 1, 1), (1, 0, 1), (1, 1, 0)] {
        let err = run(&["x"], &mapper, m, reducer, r, HashPartitioner, p).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { value: 0, .. }));
    }
    assert_eq!(mapped.load(Ordering::SeqCst), 0);
}

#[test]
fn mapper_error_is_returned() {
    let mapper = |item: &str, _: &Emitter<'_>| -> mrcore::Result<()> {
        Err(EngineError::PartitionOutOfRange { partition: 9, num_partitions: 1, key: item.to_owned() })
    };
    let reducer = |_: &str, _: &mut ValueGetter<'_>, _: usize| {};
    let err = run(&["only"], mapper, 1, reducer, 1, HashPartitioner, 1).unwrap_err();
    assert!(matches!(err, EngineError::PartitionOutOfRange { partition: 9, .. }));
}

#[test]
fn panicking_reducer_releases_downstream_partitions() {
    let inputs = spread_inputs();
    let reduced = Mutex::new(HashSet::new());
    let reducer = |key: &str, _: &mut ValueGetter<'_>, partition: usize| {
        if partition == 0 {
            panic!("reducer failure on {key}");
        }
        reduced.lock().insert(partition);
    };
    let config = EngineConfig::new(2, 2, 4).with_ordering(OrderingMode::Completion);
    let err = run_with_config(&inputs, &numbers_mapper, &reducer, &SortedPartitioner, &config).unwrap_err();
    assert!(matches!(err, EngineError::WorkerPanicked { stage: Stage::Reduce, .. }));
    assert_eq!(reduced.into_inner(), HashSet::from([1, 2, 3]));
}

#[test]
fn panicking_mapper_is_reported() {
    let mapper = |item: &str, _: &Emitter<'_>| -> mrcore::Result<()> {
        if item == "boom" {
            panic!("mapper failure");
        }
        Ok(())
    };
    let reducer = |_: &str, _: &mut ValueGetter<'_>, _: usize| {};
    let err = run(&["a", "boom", "b"], mapper, 2, reducer, 1, HashPartitioner, 1).unwrap_err();
    assert!(matches!(err, EngineError::WorkerPanicked { stage: Stage::Map, .. }));
}

#[test]
fn get_for_foreign_partition_is_eof() {
    let foreign_hits = AtomicUsize::new(0);
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        assert_eq!(values.partition(), partition);
        if values.get(key, partition + 1).is_some() {
            foreign_hits.fetch_add(1, Ordering::SeqCst);
        }
        assert!(values.get(key, partition).is_some());
    };
    run(&["x y z"], split_words, 1, reducer, 2, HashPartitioner, 2).unwrap();
    assert_eq!(foreign_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn pipeline_runs_with_explicit_config() {
    let mut pipeline = RuntimePipeline::new().with_config(EngineConfig::new(2, 2, 3));
    pipeline.add_input("one two");
    pipeline.add_inputs(["two three", "three three"]);
    let counts = Mutex::new(BTreeMap::new());
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        let mut n = 0;
        while values.get(key, partition).is_some() {
            n += 1;
        }
        counts.lock().insert(key.to_owned(), n);
    };
    let stats = pipeline.map_reduce(split_words, reducer, HashPartitioner).unwrap();
    assert_eq!(stats.map.inputs, 3);
    assert_eq!(stats.map.workers, 2);
    let counts = counts.into_inner();
    assert_eq!(counts, BTreeMap::from([("one".to_owned(), 1), ("three".to_owned(), 3), ("two".to_owned(), 2)]));
}
