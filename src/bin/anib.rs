//! Command-line entry point for the ANIb pipeline.

use anib_rs::{Anib, CancellationToken, Config, JsonStore, LogObserver, RunStatus};
use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about = "Average nucleotide identity (ANIb) over a set of FASTA genomes")]
struct Cli {
    /// Directory holding the input FASTA genomes
    #[arg(short = 'i', long = "indir")]
    indir: PathBuf,

    /// Output directory for fragments, databases, reports and matrices
    #[arg(short = 'o', long = "outdir")]
    outdir: PathBuf,

    /// Path of the persistent store document
    #[arg(long = "dbpath", default_value = "anibdb.json")]
    dbpath: PathBuf,

    /// Genome fragment size in base pairs
    #[arg(long = "fragsize", default_value_t = 1020)]
    fragsize: usize,

    /// Number of worker threads (defaults to the CPU count)
    #[arg(short = 'j', long = "workers")]
    workers: Option<usize>,

    /// Per-job timeout in seconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Reuse aligner output found in the output directory
    #[arg(long = "recovery", default_value_t = false)]
    recovery: bool,

    /// Fail the whole run if any job fails after retry
    #[arg(long = "strict", default_value_t = false)]
    strict: bool,

    /// Display name for the run
    #[arg(long = "name")]
    name: Option<String>,

    /// Tab-separated file of genome display labels
    #[arg(long = "labels")]
    labels: Option<PathBuf>,

    /// Tab-separated file of genome class tags
    #[arg(long = "classes")]
    classes: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut builder = Config::builder()
            .fragment_size(self.fragsize)
            .recovery(self.recovery)
            .tolerate_failures(!self.strict);
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(secs) = self.timeout {
            builder = builder.job_timeout(Duration::from_secs(secs));
        }
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(labels) = self.labels {
            builder = builder.labels_file(labels);
        }
        if let Some(classes) = self.classes {
            builder = builder.classes_file(classes);
        }
        builder.build()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let indir = cli.indir.clone();
    let outdir = cli.outdir.clone();
    let store = JsonStore::open(&cli.dbpath)
        .with_context(|| format!("opening store {}", cli.dbpath.display()))?;

    let report = Anib::new(cli.into_config()).run_with(
        &indir,
        &outdir,
        &store,
        &LogObserver,
        &CancellationToken::new(),
    )?;

    println!(
        "run {} {}: {} genomes, {} pairs ({} existing, {} recovered, {} executed)",
        report.run_id,
        report.status,
        report.n_genomes,
        report.n_pairs,
        report.n_existing,
        report.n_recovered,
        report.n_executed,
    );
    for failure in &report.failures {
        eprintln!("failed: {} ({})", failure.label, failure.error);
    }
    if report.status == RunStatus::Failed {
        bail!("run {} failed", report.run_id);
    }
    Ok(())
}
