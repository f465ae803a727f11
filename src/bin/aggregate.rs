use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use eeg_decoding::{analyse, collect, plot_report, Report, StatsConfig};

#[derive(Parser)]
#[command(name = "aggregate", about = "Across-subject cluster statistics for one decoding family")]
struct Args {
    /// Directory with the decode outputs
    #[arg(long, required_unless_present = "from_report")]
    input: Option<PathBuf>,

    /// Re-use a JSON report written earlier instead of re-running the tests
    #[arg(long, conflicts_with = "input")]
    from_report: Option<PathBuf>,

    /// Family: task, cue, response, target or distractor
    #[arg(long, default_value = "task")]
    family: String,

    /// Levels of the first factor, comma-separated
    #[arg(long, value_delimiter = ',', default_values_t = ["standard".to_string(), "bonus".to_string()])]
    levels_a: Vec<String>,

    /// Levels of the second factor, comma-separated
    #[arg(long, value_delimiter = ',', default_values_t = ["repeat".to_string(), "switch".to_string()])]
    levels_b: Vec<String>,

    /// Moving-average window on accuracy curves (default: 5)
    #[arg(long, default_value_t = 5)]
    smoothing: usize,

    /// Cluster-forming F threshold (default: 2.0)
    #[arg(long, default_value_t = 2.0)]
    threshold: f64,

    #[arg(long, default_value_t = 1000)]
    permutations: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// SVG figure path
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn pair(v: &[String], flag: &str) -> Result<[String; 2]> {
    match v {
        [a, b] => Ok([a.clone(), b.clone()]),
        _ => anyhow::bail!("--{flag} needs exactly two levels, got {}", v.len()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let cfg = StatsConfig {
        smoothing: args.smoothing,
        threshold: args.threshold,
        n_permutations: args.permutations,
        seed: args.seed,
        ..StatsConfig::default()
    };
    let report = match (&args.from_report, &args.input) {
        (Some(path), _) => Report::read_json(path)?,
        (None, Some(input)) => {
            let levels_a = pair(&args.levels_a, "levels-a")?;
            let levels_b = pair(&args.levels_b, "levels-b")?;
            let cells = collect(input, &args.family, &levels_a, &levels_b, cfg.smoothing)?;
            analyse(&cells, &cfg)?
        }
        (None, None) => anyhow::bail!("either --input or --from-report is required"),
    };

    for effect in &report.effects {
        for c in &effect.test.clusters {
            println!(
                "{:<28} {:>7.3} … {:>7.3} s   mass {:>9.2}   p = {:.3}",
                effect.name,
                report.times[c.start],
                report.times[c.stop - 1],
                c.mass,
                c.p_value
            );
        }
    }

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("Report → {}", path.display());
    }
    if let Some(path) = &args.plot {
        plot_report(&report, path)?;
        println!("Figure → {}", path.display());
    }
    Ok(())
}
