//! Configuration options for ANIb pipeline runs.
//!
//! This module provides a builder pattern for configuring pipeline parameters,
//! covering fragmentation, alignment-row inclusion thresholds, worker-pool
//! sizing, and per-job retry/timeout policy.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an ANIb pipeline run.
///
/// This struct contains all parameters that control how genomes are
/// fragmented, how BLAST+ jobs are scheduled, and which alignment rows are
/// included in the per-pair statistics. Use the builder pattern to construct
/// configurations with non-default values.
///
/// # Default Values
/// - `fragment_size`: 1020 bp
/// - `min_identity_pct`: 30.0 (%)
/// - `min_coverage`: 0.7 (fraction of the fragment aligned, gaps excluded)
/// - `workers`: number of CPU cores
/// - `retries`: 1 (one retry after a first failure)
/// - `job_timeout`: None (jobs may run indefinitely)
#[derive(Debug, Clone)]
pub struct Config {
    /// Genome fragment size in base pairs
    pub fragment_size: usize,

    /// Minimum percentage identity (0.0-100.0) for an alignment row to count
    pub min_identity_pct: f64,

    /// Minimum fraction (0.0-1.0) of a fragment that must align, gaps excluded
    pub min_coverage: f64,

    /// Number of worker threads executing external jobs
    pub workers: usize,

    /// Number of retries after a job's first failed attempt
    pub retries: u32,

    /// Per-attempt time budget for an external job
    pub job_timeout: Option<Duration>,

    /// Grace period before a cancelled in-flight job is killed
    pub cancel_grace: Duration,

    /// Reuse prior aligner output found in the output directory
    pub recovery: bool,

    /// Complete with a failure report instead of failing the whole run
    /// when some jobs fail after retry
    pub tolerate_failures: bool,

    /// Explicit path to the blastn executable (discovered if unset)
    pub blastn_exe: Option<PathBuf>,

    /// Explicit path to the makeblastdb executable (discovered if unset)
    pub makeblastdb_exe: Option<PathBuf>,

    /// Display name for the run (defaults to ANIb_<start-timestamp>)
    pub name: Option<String>,

    /// Tab-separated file mapping genome file stems to display labels
    pub labels_file: Option<PathBuf>,

    /// Tab-separated file mapping genome file stems to class tags
    pub classes_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fragment_size: 1020,
            min_identity_pct: 30.0,
            min_coverage: 0.7,
            workers: num_cpus::get().max(1),
            retries: 1,
            job_timeout: None,
            cancel_grace: Duration::from_secs(5),
            recovery: false,
            tolerate_failures: true,
            blastn_exe: None,
            makeblastdb_exe: None,
            name: None,
            labels_file: None,
            classes_file: None,
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Example
    /// ```
    /// use anib_rs::Config;
    ///
    /// let config = Config::builder()
    ///     .fragment_size(1000)
    ///     .workers(4)
    ///     .recovery(true)
    ///     .build();
    /// ```
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for constructing Config instances.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the genome fragment size in base pairs.
    ///
    /// Default: 1020 bp
    pub fn fragment_size(mut self, size: usize) -> Self {
        assert!(size > 0, "Fragment size must be positive");
        self.config.fragment_size = size;
        self
    }

    /// Sets the minimum percentage identity for alignment rows.
    ///
    /// Rows below this identity are excluded from the per-pair statistics.
    /// Value should be between 0.0 and 100.0.
    /// Default: 30.0
    pub fn min_identity_pct(mut self, pct: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&pct),
            "Identity must be between 0.0 and 100.0"
        );
        self.config.min_identity_pct = pct;
        self
    }

    /// Sets the minimum aligned fraction of a fragment for alignment rows.
    ///
    /// Rows whose ungapped aligned length covers less than this fraction of
    /// their fragment are excluded from the per-pair statistics.
    /// Default: 0.7
    pub fn min_coverage(mut self, coverage: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&coverage),
            "Coverage must be between 0.0 and 1.0"
        );
        self.config.min_coverage = coverage;
        self
    }

    /// Sets the number of worker threads running external jobs.
    ///
    /// Default: Number of CPU cores
    pub fn workers(mut self, workers: usize) -> Self {
        assert!(workers > 0, "Number of workers must be positive");
        self.config.workers = workers;
        self
    }

    /// Sets the number of retries after a job's first failed attempt.
    ///
    /// Default: 1
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Sets the per-attempt time budget for external jobs.
    ///
    /// Default: None (no timeout)
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = Some(timeout);
        self
    }

    /// Sets the grace period before a cancelled in-flight job is killed.
    ///
    /// Default: 5 seconds
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.config.cancel_grace = grace;
        self
    }

    /// Enables or disables recovery of prior on-disk aligner output.
    ///
    /// Default: false
    pub fn recovery(mut self, recovery: bool) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Tolerate per-job failures instead of failing the whole run.
    ///
    /// Default: true
    pub fn tolerate_failures(mut self, tolerate: bool) -> Self {
        self.config.tolerate_failures = tolerate;
        self
    }

    /// Sets an explicit path to the blastn executable.
    ///
    /// Default: discovered next to the current executable or on PATH
    pub fn blastn_exe(mut self, path: PathBuf) -> Self {
        self.config.blastn_exe = Some(path);
        self
    }

    /// Sets an explicit path to the makeblastdb executable.
    ///
    /// Default: discovered next to the current executable or on PATH
    pub fn makeblastdb_exe(mut self, path: PathBuf) -> Self {
        self.config.makeblastdb_exe = Some(path);
        self
    }

    /// Sets the display name for the run.
    ///
    /// Default: `ANIb_<start-timestamp>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Sets the tab-separated genome labels file.
    ///
    /// Default: None (labels default to the genome file stem)
    pub fn labels_file(mut self, path: PathBuf) -> Self {
        self.config.labels_file = Some(path);
        self
    }

    /// Sets the tab-separated genome classes file.
    ///
    /// Default: None (classes default to the genome file stem)
    pub fn classes_file(mut self, path: PathBuf) -> Self {
        self.config.classes_file = Some(path);
        self
    }

    /// Builds the final Config instance.
    pub fn build(self) -> Config {
        self.config
    }
}
