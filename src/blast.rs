//! BLAST+ subprocess invocation.
//!
//! This module handles locating the BLAST+ executables and running them as
//! subprocesses: `makeblastdb` to build one searchable database per reference
//! genome, `blastn` to search a query's fragment file against it. The rest of
//! the pipeline depends only on the tabular report files these produce.

use crate::alignment::OUTFMT_FIELDS;
use crate::config::Config;
use crate::error::{AnibError, Result};
use crate::genome::Genome;
use crate::scheduler::CancellationToken;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Find a BLAST+ executable by name.
///
/// Search order:
/// 1. Explicitly configured path
/// 2. Same directory as the current executable
/// 3. System PATH
pub fn find_binary(name: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(AnibError::BlastNotFound(format!(
            "{name}: configured path {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let candidate = exe_dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    if let Ok(path) = which::which(name) {
        return Ok(path);
    }

    Err(AnibError::BlastNotFound(format!(
        "{name} not found next to the current executable or on PATH"
    )))
}

/// Runner for BLAST+ subprocesses, holding the resolved executable paths.
#[derive(Debug, Clone)]
pub struct BlastRunner {
    blastn: PathBuf,
    makeblastdb: PathBuf,
    config: Config,
}

impl BlastRunner {
    /// Resolves both executables up front; missing binaries are a setup
    /// failure, reported before any job runs.
    pub fn new(config: &Config) -> Result<Self> {
        let blastn = find_binary("blastn", config.blastn_exe.as_deref())?;
        let makeblastdb = find_binary("makeblastdb", config.makeblastdb_exe.as_deref())?;
        Ok(BlastRunner {
            blastn,
            makeblastdb,
            config: config.clone(),
        })
    }

    /// Reports the blastn version string, e.g. "2.14.1+".
    ///
    /// The version becomes part of every comparison key, so results computed
    /// with a different aligner build are never silently reused.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.blastn)
            .arg("-version")
            .output()
            .map_err(|e| AnibError::BlastFailed(format!("failed to run blastn -version: {e}")))?;
        if !output.status.success() {
            return Err(AnibError::BlastFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        let stdout = String::from_utf8(output.stdout)?;
        let first = stdout
            .lines()
            .next()
            .ok_or_else(|| AnibError::BlastFailed("empty blastn -version output".to_string()))?;
        Ok(first.trim_start_matches("blastn:").trim().to_string())
    }

    /// Builds a nucleotide database for one reference genome under `dbdir`.
    ///
    /// Returns the database path prefix that blastn expects as `-db`.
    pub fn build_database(&self, genome: &Genome, dbdir: &Path) -> Result<PathBuf> {
        let db_prefix = dbdir.join(&genome.stem);

        let mut cmd = Command::new(&self.makeblastdb);
        cmd.arg("-dbtype")
            .arg("nucl")
            .arg("-in")
            .arg(&genome.path)
            .arg("-title")
            .arg(&genome.stem)
            .arg("-out")
            .arg(&db_prefix);

        log::debug!("executing: {cmd:?}");
        let output = cmd
            .output()
            .map_err(|e| AnibError::BlastFailed(format!("failed to run makeblastdb: {e}")))?;
        if !output.status.success() {
            return Err(AnibError::BlastFailed(format!(
                "makeblastdb failed for {}: {}",
                genome.stem,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(db_prefix)
    }

    /// Runs one blastn comparison: the query's fragment file against a
    /// reference database, writing the tabular report to `out_path`.
    ///
    /// The child is killed when it exceeds the configured job timeout, or
    /// when the run is cancelled and the grace period has passed.
    pub fn run_comparison(
        &self,
        fragment_file: &Path,
        db_prefix: &Path,
        out_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.blastn);
        cmd.arg("-out")
            .arg(out_path)
            .arg("-query")
            .arg(fragment_file)
            .arg("-db")
            .arg(db_prefix)
            .arg("-task")
            .arg("blastn")
            .arg("-outfmt")
            .arg(format!("6 {OUTFMT_FIELDS}"))
            .arg("-xdrop_gap_final")
            .arg("150")
            .arg("-dust")
            .arg("no")
            .arg("-evalue")
            .arg("1e-15")
            .arg("-max_target_seqs")
            .arg("1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        log::debug!("executing: {cmd:?}");
        let mut child = cmd
            .spawn()
            .map_err(|e| AnibError::BlastFailed(format!("failed to spawn blastn: {e}")))?;

        let start = Instant::now();
        let mut cancelled_at: Option<Instant> = None;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(timeout) = self.config.job_timeout {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AnibError::JobTimeout(timeout.as_secs()));
                }
            }
            if cancel.is_cancelled() {
                let seen = *cancelled_at.get_or_insert_with(Instant::now);
                if seen.elapsed() >= self.config.cancel_grace {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AnibError::Cancelled);
                }
            }
            std::thread::sleep(Duration::from_millis(25));
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                use std::io::Read;
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(AnibError::BlastFailed(format!(
                "blastn exited with {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_binary_explicit_missing_path_errors() {
        let result = find_binary("blastn", Some(Path::new("/nonexistent/blastn")));
        assert!(matches!(result, Err(AnibError::BlastNotFound(_))));
    }

    #[test]
    fn test_find_binary_explicit_existing_path() {
        // any file on disk will do for path resolution
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("blastn");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();

        let found = find_binary("blastn", Some(&exe)).unwrap();
        assert_eq!(found, exe);
    }
}
