use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use eeg_decoding::{run_all, ClassifierKind, FeatureKind, PipelineConfig, TaskSet};

#[derive(Parser)]
#[command(name = "decode", about = "Time-resolved decoding of cleaned EEG epochs")]
struct Args {
    /// Directory holding the *cleaned.set files and channel_labels.txt
    #[arg(long)]
    input: PathBuf,

    /// Directory receiving one safetensors file per subject and task
    #[arg(long)]
    output: PathBuf,

    /// Voltage (erp) or band-power (ersp) features
    #[arg(long, value_enum, default_value_t = FeatureKind::Ersp)]
    features: FeatureKind,

    /// Which set of contrasts to decode
    #[arg(long, value_enum, default_value_t = TaskSet::Factorial)]
    tasks: TaskSet,

    #[arg(long, value_enum, default_value_t = ClassifierKind::Forest)]
    classifier: ClassifierKind,

    /// Standardise and PCA-reduce trials before binning
    #[arg(long)]
    reduce: bool,

    /// Undersample/bin/cross-validate repetitions per timepoint (default: 10)
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Trials per pseudo-trial (default: 10)
    #[arg(long, default_value_t = 10)]
    bin_size: usize,

    /// Moving-window width in samples (default: 3)
    #[arg(long, default_value_t = 3)]
    smoothing: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Worker threads, 0 = all cores
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut cfg = PipelineConfig {
        features: args.features,
        tasks: args.tasks,
        ..PipelineConfig::default()
    };
    cfg.decode.classifier = args.classifier;
    cfg.decode.reduce = args.reduce;
    cfg.decode.n_iterations = args.iterations;
    cfg.decode.bin_size = args.bin_size;
    cfg.decode.temporal_smoothing = args.smoothing;
    cfg.decode.seed = args.seed;
    cfg.decode.n_jobs = args.jobs;

    let summary = run_all(&args.input, &args.output, &cfg)?;
    println!(
        "{} written, {} already present, {} undecodable → {}",
        summary.written,
        summary.existing,
        summary.undecodable,
        args.output.display()
    );
    Ok(())
}
