use anyhow::{Context, Result};
use clap::Parser;
use mrcore::{Emitter, EngineConfig, HashPartitioner, OrderingMode, RuntimePipeline, ValueGetter};
use regex::Regex;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::error;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
struct Args {
    /// Input files or directories (walked recursively)
    #[arg(required = true)]
    input: Vec<String>,
    /// Output file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    /// Map worker threads (defaults to MR_NUM_MAPPERS or the CPU count)
    #[arg(long)]
    mappers: Option<usize>,
    /// Reduce worker threads (defaults to MR_NUM_REDUCERS or the CPU count)
    #[arg(long)]
    reducers: Option<usize>,
    /// Intermediate partitions (defaults to MR_NUM_PARTITIONS)
    #[arg(long)]
    partitions: Option<usize>,
    /// Cross-partition reduce ordering: first-key or completion
    #[arg(long)]
    ordering: Option<OrderingMode>,
    /// Print run statistics as JSON on stderr
    #[arg(long)]
    stats: bool,
}

fn list_files(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|input| WalkDir::new(input).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().display().to_string())
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let mut config = EngineConfig::from_env();
    if let Some(n) = args.mappers { config.num_mappers = n; }
    if let Some(n) = args.reducers { config.num_reducers = n; }
    if let Some(n) = args.partitions { config.num_partitions = n; }
    if let Some(o) = args.ordering { config.ordering = o; }

    let word_re = Regex::new(r"[A-Za-z0-9_']+")?;
    let mapper = |path: &str, emitter: &Emitter<'_>| -> mrcore::Result<()> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                error!("read {}: {}", path, e);
                return Ok(());
            }
        };
        for cap in word_re.find_iter(&content) {
            emitter.emit(&cap.as_str().to_lowercase(), "1")?;
        }
        Ok(())
    };

    let counts: Mutex<Vec<(String, u64)>> = Mutex::new(Vec::new());
    let reducer = |key: &str, values: &mut ValueGetter<'_>, partition: usize| {
        let mut sum = 0u64;
        while let Some(v) = values.get(key, partition) {
            sum += v.parse::<u64>().unwrap_or(0);
        }
        if let Ok(mut guard) = counts.lock() {
            guard.push((key.to_owned(), sum));
        }
    };

    let mut pipeline = RuntimePipeline::new().with_config(config);
    pipeline.add_inputs(list_files(&args.input));
    let stats = pipeline.map_reduce(mapper, reducer, HashPartitioner)?;

    let mut counts = counts.into_inner().map_err(|_| anyhow::anyhow!("count buffer poisoned"))?;
    counts.sort();
    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(fs::File::create(path).with_context(|| format!("create {}", path.display()))?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    for (word, count) in &counts {
        writeln!(out, "\"{}\"\t{}", word, count)?;
    }
    out.flush()?;

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
