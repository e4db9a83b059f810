//! # anib-rs: Average Nucleotide Identity via BLAST+
//!
//! This library computes pairwise whole-genome similarity (ANIb method)
//! across a collection of FASTA genomes, orchestrating the external BLAST+
//! tools as subprocesses.
//!
//! ## Overview
//!
//! For every ordered pair of input genomes, the query genome is split into
//! fixed-size fragments and searched with `blastn` against a database of the
//! reference genome built with `makeblastdb`. Per-pair alignment statistics
//! are reduced into five NxN summary matrices: identity, coverage, alignment
//! length, similarity errors, and their Hadamard combination.
//!
//! The pipeline is incremental: comparisons already held by the persistent
//! store under an identical (genome, program, version, fragment size) key
//! are reused without execution, and recovery mode additionally reuses
//! report files a previous, interrupted run left in the output directory.
//! Re-running over unchanged inputs therefore performs no redundant aligner
//! invocations.
//!
//! ## Example Usage
//!
//! ```no_run
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! use anib_rs::{Anib, Config, JsonStore};
//! use std::path::Path;
//!
//! let config = Config::builder()
//!     .fragment_size(1020)
//!     .workers(8)
//!     .recovery(true)
//!     .build();
//!
//! let store = JsonStore::open(Path::new("anib.json"))?;
//! let report = Anib::new(config).run(
//!     Path::new("genomes/"),
//!     Path::new("output/"),
//!     &store,
//! )?;
//!
//! println!("run {}: {}", report.run_id, report.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - `genome`: input collection, labels/classes, content hashing
//! - `fragments`: genome fragmentation
//! - `compare`: pair enumeration and comparison identity
//! - `store`: persistence interface, bundled JSON store, dedup filter
//! - `recovery`: reuse of prior on-disk aligner output
//! - `blast`/`scheduler`: subprocess execution on a bounded worker pool
//! - `matrices`: summary-matrix aggregation and CSV export
//! - `pipeline`: the end-to-end control flow

pub mod alignment;
pub mod blast;
pub mod compare;
pub mod config;
pub mod error;
pub mod fragments;
pub mod genome;
pub mod matrices;
pub mod observer;
pub mod pipeline;
pub mod recovery;
pub mod scheduler;
pub mod store;

use std::path::Path;

pub use compare::{ComparisonKey, ComparisonResult};
pub use config::{Config, ConfigBuilder};
pub use error::{AnibError, Result};
pub use genome::Genome;
pub use matrices::SummaryMatrices;
pub use observer::{LogObserver, NullObserver, Observer};
pub use pipeline::RunReport;
pub use scheduler::CancellationToken;
pub use store::{JsonStore, Run, RunStatus, Store};

/// Main interface to the ANIb pipeline.
#[derive(Debug, Clone)]
pub struct Anib {
    config: Config,
}

impl Anib {
    /// Creates a pipeline instance with the given configuration.
    pub fn new(config: Config) -> Self {
        Anib { config }
    }

    /// Runs the pipeline over all FASTA files in `indir`, writing fragment
    /// files, databases, reports and matrices under `outdir`.
    ///
    /// Progress events are discarded; use [`Anib::run_with`] to observe them
    /// or to cancel a run.
    ///
    /// # Errors
    /// Returns an error on setup failures (store, output directories, BLAST+
    /// discovery), store failures during dedup, and cancellation. Per-job
    /// failures do not error; they surface in the report, whose status is
    /// [`RunStatus::CompleteWithFailures`] or, when the configuration does
    /// not tolerate partial results, [`RunStatus::Failed`].
    pub fn run(&self, indir: &Path, outdir: &Path, store: &dyn Store) -> Result<RunReport> {
        self.run_with(indir, outdir, store, &NullObserver, &CancellationToken::new())
    }

    /// Like [`Anib::run`], with an injected progress observer and a
    /// cancellation token shared with the caller.
    pub fn run_with(
        &self,
        indir: &Path,
        outdir: &Path,
        store: &dyn Store,
        observer: &dyn Observer,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        pipeline::run_pipeline(indir, outdir, store, &self.config, observer, cancel)
    }
}
