//! End-to-end ANIb pipeline.
//!
//! Wires the stages together: collect genomes, fragment, enumerate pairs,
//! drop pairs the store already holds, recover prior on-disk output when
//! asked, execute what remains, fold everything into the summary matrices
//! and move the run to its terminal status. Setup and store failures abort
//! before any job runs; per-job failures are collected into the report.

use crate::blast::BlastRunner;
use crate::compare::{self, ComparisonKey, ComparisonResult};
use crate::config::Config;
use crate::error::{AnibError, Result};
use crate::fragments::{self, FragmentSet};
use crate::genome::{self, Genome};
use crate::matrices::SummaryMatrices;
use crate::observer::Observer;
use crate::recovery;
use crate::scheduler::{self, CancellationToken, Job, JobFailure};
use crate::store::{self, RunStatus, Store};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory holding fragment files.
pub const FRAGMENT_DIR: &str = "fragments";

/// Subdirectory of the output directory holding the reference databases.
pub const DATABASE_DIR: &str = "blastdbs";

/// Name of the per-run failure report written next to the matrices.
pub const FAILURE_REPORT: &str = "failed_jobs.tsv";

/// What one pipeline run did, by the numbers.
#[derive(Debug)]
pub struct RunReport {
    /// Store-assigned run ID
    pub run_id: u64,

    /// Terminal status of the run
    pub status: RunStatus,

    /// Number of genomes compared
    pub n_genomes: usize,

    /// Total ordered pairs, N*(N-1)
    pub n_pairs: usize,

    /// Pairs reused from the store without execution
    pub n_existing: usize,

    /// Pairs recovered from prior on-disk output
    pub n_recovered: usize,

    /// Pairs freshly executed
    pub n_executed: usize,

    /// Jobs that failed after retry
    pub failures: Vec<JobFailure>,

    /// The run's summary matrices
    pub matrices: SummaryMatrices,
}

/// Runs the whole pipeline over the FASTA files in `indir`.
///
/// Fatal errors mark the run failed in the store (when one was created) and
/// propagate; per-job failures end up in the report instead. Cancellation
/// via `cancel` stops dispatch, kills stragglers after the grace period and
/// marks the run failed, never complete.
pub fn run_pipeline(
    indir: &Path,
    outdir: &Path,
    store: &dyn Store,
    config: &Config,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let fragdir = outdir.join(FRAGMENT_DIR);
    let dbdir = outdir.join(DATABASE_DIR);
    fs::create_dir_all(&fragdir)?;
    fs::create_dir_all(&dbdir)?;

    let runner = BlastRunner::new(config)?;
    let version = runner.version()?;
    observer.event("setup", &format!("using blastn {version}"));

    let genomes = genome::collect_genomes(indir, config)?;
    observer.event("setup", &format!("collected {} genomes", genomes.len()));

    let date_run = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("ANIb_%Y-%m-%d_%H-%M-%S").to_string());
    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    let run_id = store.create_run(compare::METHOD, &cmdline, &name, &date_run)?;
    store.add_run_genomes(run_id, &genomes)?;

    match run_stages(
        outdir, store, config, observer, cancel, &runner, &version, &genomes, run_id, &fragdir,
        &dbdir,
    ) {
        Ok(report) => Ok(report),
        Err(error) => {
            // best effort; the original error is the one worth reporting
            if let Err(status_error) = store.set_run_status(run_id, RunStatus::Failed) {
                log::error!("could not mark run {run_id} failed: {status_error}");
            }
            Err(error)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_stages(
    outdir: &Path,
    store: &dyn Store,
    config: &Config,
    observer: &dyn Observer,
    cancel: &CancellationToken,
    runner: &BlastRunner,
    version: &str,
    genomes: &[Genome],
    run_id: u64,
    fragdir: &Path,
    dbdir: &Path,
) -> Result<RunReport> {
    let mut fragment_sets = Vec::with_capacity(genomes.len());
    for genome in genomes {
        let set = fragments::fragment_genome(&genome.path, fragdir, config.fragment_size)?;
        observer.event(
            "fragment",
            &format!("{}: {} fragments", genome.stem, set.lengths.len()),
        );
        fragment_sets.push(set);
    }

    let pairs = compare::enumerate_pairs(genomes);
    observer.event("enumerate", &format!("{} ordered pairs", pairs.len()));

    let (mut pending, existing) = store::filter_existing_comparisons(
        store,
        run_id,
        genomes,
        &pairs,
        version,
        config.fragment_size,
    )?;
    observer.event(
        "filter",
        &format!("{} existing, {} pending", existing.len(), pending.len()),
    );

    let mut recovered = HashMap::new();
    if config.recovery {
        recovered =
            recovery::collect_existing_output(outdir, genomes, &pending, &fragment_sets, config)?;
        pending.retain(|pair| !recovered.contains_key(pair));
        observer.event("recover", &format!("{} jobs recovered", recovered.len()));
        for (&(query, reference), result) in &recovered {
            record_result(
                store, run_id, genomes, version, config, query, reference, result,
            )?;
        }
    }

    if cancel.is_cancelled() {
        return Err(AnibError::Cancelled);
    }

    let jobs = build_jobs(
        runner,
        genomes,
        &fragment_sets,
        &pending,
        outdir,
        dbdir,
        observer,
    )?;
    let (executed, failures) = scheduler::execute_jobs(runner, &jobs, config, observer, cancel)?;
    for (&(query, reference), result) in &executed {
        record_result(
            store, run_id, genomes, version, config, query, reference, result,
        )?;
    }
    if cancel.is_cancelled() {
        return Err(AnibError::Cancelled);
    }

    let mut matrices = SummaryMatrices::new(genomes);
    for source in [&existing, &recovered, &executed] {
        for (&(query, reference), result) in source {
            matrices.fold(query, reference, result);
        }
    }
    matrices.compute_hadamard();
    store.update_matrices(run_id, &matrices)?;
    matrices.write_csv(outdir)?;
    write_failure_report(outdir, genomes, &failures)?;

    let status = if failures.is_empty() {
        RunStatus::Complete
    } else if config.tolerate_failures {
        RunStatus::CompleteWithFailures(failures.len())
    } else {
        RunStatus::Failed
    };
    store.set_run_status(run_id, status.clone())?;
    observer.event("aggregate", &format!("run {run_id} {status}"));

    Ok(RunReport {
        run_id,
        status,
        n_genomes: genomes.len(),
        n_pairs: pairs.len(),
        n_existing: existing.len(),
        n_recovered: recovered.len(),
        n_executed: executed.len(),
        failures,
        matrices,
    })
}

/// Builds the reference databases the pending pairs need, then the job list.
fn build_jobs(
    runner: &BlastRunner,
    genomes: &[Genome],
    fragment_sets: &[FragmentSet],
    pending: &[(usize, usize)],
    outdir: &Path,
    dbdir: &Path,
    observer: &dyn Observer,
) -> Result<Vec<Job>> {
    let mut db_prefixes: HashMap<usize, PathBuf> = HashMap::new();
    for &(_, reference) in pending {
        if !db_prefixes.contains_key(&reference) {
            let prefix = runner.build_database(&genomes[reference], dbdir)?;
            observer.event("makeblastdb", &format!("built {}", genomes[reference].stem));
            db_prefixes.insert(reference, prefix);
        }
    }

    Ok(pending
        .iter()
        .map(|&(query, reference)| Job {
            query,
            reference,
            label: format!("{}_vs_{}", genomes[query].stem, genomes[reference].stem),
            fragment_file: fragment_sets[query].path.clone(),
            fragments: fragment_sets[query].lengths.clone(),
            db_prefix: db_prefixes[&reference].clone(),
            out_path: outdir.join(compare::blast_tab_filename(
                &genomes[query],
                &genomes[reference],
            )),
        })
        .collect())
}

#[allow(clippy::too_many_arguments)]
fn record_result(
    store: &dyn Store,
    run_id: u64,
    genomes: &[Genome],
    version: &str,
    config: &Config,
    query: usize,
    reference: usize,
    result: &ComparisonResult,
) -> Result<()> {
    let key = ComparisonKey::new(
        &genomes[query],
        &genomes[reference],
        version,
        config.fragment_size,
    );
    store.insert_comparison(&key, result)?;
    store.link_comparison_to_run(run_id, &key)
}

/// Writes the failure report, one line per failed job. Removes a stale
/// report when the run had no failures.
fn write_failure_report(
    outdir: &Path,
    genomes: &[Genome],
    failures: &[JobFailure],
) -> Result<()> {
    let path = outdir.join(FAILURE_REPORT);
    if failures.is_empty() {
        if path.exists() {
            fs::remove_file(&path)?;
        }
        return Ok(());
    }

    let mut lines = vec!["query\treference\terror".to_string()];
    for failure in failures {
        lines.push(format!(
            "{}\t{}\t{}",
            genomes[failure.query].stem,
            genomes[failure.reference].stem,
            failure.error.replace(['\t', '\n'], " ")
        ));
    }
    fs::write(&path, lines.join("\n") + "\n")?;
    Ok(())
}
