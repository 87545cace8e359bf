use anyhow::{Context, Result};
use clap::Parser;
use mrcore::partition::parse_unsigned;
use mrcore::{Emitter, EngineConfig, OrderingMode, RuntimePipeline, SortedPartitioner, ValueGetter};
use std::fs;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::{error, warn};

/// Sorts the unsigned 32-bit integers found in the input files (one per
/// line) by range-partitioning them and reducing partitions in order.
#[derive(Parser, Debug)]
struct Args {
    /// Input files, one integer per line
    #[arg(required = true)]
    input: Vec<String>,
    #[arg(long, default_value_t = 4)]
    mappers: usize,
    #[arg(long, default_value_t = 4)]
    reducers: usize,
    #[arg(long, default_value_t = 8)]
    partitions: usize,
    /// Print run statistics as JSON on stderr
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").with_writer(io::stderr).init();
    let args = Args::parse();

    // Completion ordering is what makes the concatenated output globally sorted.
    let config = EngineConfig::new(args.mappers, args.reducers, args.partitions)
        .with_ordering(OrderingMode::Completion);

    let mapper = |path: &str, emitter: &Emitter<'_>| -> mrcore::Result<()> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                error!("read {}: {}", path, e);
                return Ok(());
            }
        };
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let n = parse_unsigned(line);
            if n > u64::from(u32::MAX) {
                warn!(value = line, "skipping value outside the u32 range");
                continue;
            }
            // zero padding makes byte order match numeric order inside a partition
            emitter.emit(&format!("{:010}", n), line)?;
        }
        Ok(())
    };

    let out = Mutex::new(io::BufWriter::new(io::stdout()));
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        let n = parse_unsigned(key.trim_start_matches('0'));
        let Ok(mut out) = out.lock() else { return };
        while values.get(key, partition).is_some() {
            if let Err(e) = writeln!(out, "{}", n) {
                error!("write: {}", e);
                return;
            }
        }
    };

    let mut pipeline = RuntimePipeline::new().with_config(config);
    pipeline.add_inputs(args.input.iter().cloned());
    let stats = pipeline.map_reduce(mapper, reducer, SortedPartitioner)?;

    out.into_inner()
        .map_err(|_| anyhow::anyhow!("stdout writer poisoned"))?
        .flush()
        .context("flush stdout")?;
    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
