//! Bounded parallel execution of comparison jobs.
//!
//! Jobs are independent subprocess invocations and run on a worker pool
//! whose size is a configuration option. A failing job is retried up to the
//! configured budget and then recorded against that job only; siblings are
//! unaffected. Cancellation is cooperative: a shared token stops dispatch of
//! new jobs, and in-flight children are killed after the grace period.

use crate::alignment;
use crate::blast::BlastRunner;
use crate::compare::ComparisonResult;
use crate::config::Config;
use crate::error::{AnibError, Result};
use crate::fragments::FragmentMap;
use crate::observer::Observer;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared flag for cooperative run cancellation.
///
/// Clones observe the same flag; cancelling is irreversible for a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the run sharing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One external-aligner invocation to run: the query's fragments against the
/// reference's database, with a pre-assigned output path.
#[derive(Debug, Clone)]
pub struct Job {
    /// Index of the query genome in the run's genome set
    pub query: usize,

    /// Index of the reference genome in the run's genome set
    pub reference: usize,

    /// "query_vs_reference" tag used in logs and the failure report
    pub label: String,

    /// Fragment file of the query genome
    pub fragment_file: PathBuf,

    /// Fragment lengths of the query genome
    pub fragments: FragmentMap,

    /// Database prefix of the reference genome
    pub db_prefix: PathBuf,

    /// Where the tabular report is written
    pub out_path: PathBuf,
}

/// One job that failed after exhausting its retry budget.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Index of the query genome
    pub query: usize,

    /// Index of the reference genome
    pub reference: usize,

    /// "query_vs_reference" tag
    pub label: String,

    /// The last error the job produced
    pub error: String,
}

/// Runs all jobs on a pool of `config.workers` threads.
///
/// Returns the per-pair results of the jobs that succeeded and a failure
/// record for each that did not. Jobs skipped because cancellation was
/// requested before they started are reported as failures; the caller
/// inspects the token to distinguish a cancelled run from one with genuine
/// job failures.
pub fn execute_jobs(
    runner: &BlastRunner,
    jobs: &[Job],
    config: &Config,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> Result<(HashMap<(usize, usize), ComparisonResult>, Vec<JobFailure>)> {
    if jobs.is_empty() {
        return Ok((HashMap::new(), Vec::new()));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| AnibError::Other(format!("failed to build worker pool: {e}")))?;

    let done = AtomicUsize::new(0);
    let total = jobs.len();

    let outcomes: Vec<(usize, usize, String, Result<ComparisonResult>)> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let outcome = run_job(runner, job, config, cancel);
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                match &outcome {
                    Ok(_) => observer.event("blastn", &format!("{} done ({finished}/{total})", job.label)),
                    Err(e) => observer.event("blastn", &format!("{} failed: {e}", job.label)),
                }
                (job.query, job.reference, job.label.clone(), outcome)
            })
            .collect()
    });

    let mut results = HashMap::new();
    let mut failures = Vec::new();
    for (query, reference, label, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                results.insert((query, reference), result);
            }
            Err(error) => failures.push(JobFailure {
                query,
                reference,
                label,
                error: error.to_string(),
            }),
        }
    }
    Ok((results, failures))
}

/// Runs one job with retries. Cancellation short-circuits the retry loop.
fn run_job(
    runner: &BlastRunner,
    job: &Job,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ComparisonResult> {
    let attempts = config.retries + 1;
    let mut last_error = AnibError::Other("job never attempted".to_string());

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(AnibError::Cancelled);
        }
        let outcome = runner
            .run_comparison(&job.fragment_file, &job.db_prefix, &job.out_path, cancel)
            .and_then(|()| {
                alignment::read_fresh_blast_tab(
                    &job.out_path,
                    &job.fragments,
                    config.min_identity_pct,
                    config.min_coverage,
                )
            });
        match outcome {
            Ok(result) => return Ok(result),
            Err(AnibError::Cancelled) => return Err(AnibError::Cancelled),
            Err(error) => {
                if attempt < attempts {
                    log::warn!("{} attempt {attempt} failed, retrying: {error}", job.label);
                } else {
                    log::error!("{} failed after {attempts} attempts: {error}", job.label);
                }
                last_error = error;
            }
        }
    }
    Err(last_error)
}
