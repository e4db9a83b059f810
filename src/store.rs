//! Persistent store for runs and comparison results.
//!
//! The pipeline talks to persistence through the [`Store`] trait: create a
//! run, attach genomes, look up and insert comparisons keyed by
//! (query, reference, program, version, fragment size), update the summary
//! matrices, move the run status. Any engine implementing these operations
//! can back the pipeline; the bundled [`JsonStore`] keeps everything in a
//! single JSON document replaced atomically on every logical update.

use crate::compare::{ComparisonKey, ComparisonResult};
use crate::error::{AnibError, Result};
use crate::genome::Genome;
use crate::matrices::SummaryMatrices;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Lifecycle state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, jobs not yet all resolved
    Started,

    /// All jobs resolved, matrices written
    Complete,

    /// All jobs resolved, but this many failed after retry
    CompleteWithFailures(usize),

    /// Aborted by a fatal error or cancellation
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Started => write!(f, "started"),
            RunStatus::Complete => write!(f, "complete"),
            RunStatus::CompleteWithFailures(n) => {
                write!(f, "completed with {n} failed job{}", if *n == 1 { "" } else { "s" })
            }
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One persisted run: the genome set, the comparisons attached to it and,
/// once aggregation finishes, its summary matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Store-assigned run ID
    pub id: u64,

    /// Method name ("ANIb")
    pub method: String,

    /// Command line the run was started with
    pub cmdline: String,

    /// Start timestamp
    pub date_run: String,

    /// Display name
    pub name: String,

    /// Lifecycle state
    pub status: RunStatus,

    /// Member genomes
    pub genomes: Vec<Genome>,

    /// Keys of the comparisons attached to this run
    pub comparisons: Vec<ComparisonKey>,

    /// Summary matrices, present once aggregation has run
    pub matrices: Option<SummaryMatrices>,
}

/// Operations the pipeline requires of a persistence engine.
///
/// Implementations must serialise their own internal mutation; the pipeline
/// calls these from multiple workers but never holds a store lock across an
/// external-process invocation.
pub trait Store: Send + Sync {
    /// Creates a run with status [`RunStatus::Started`], returns its ID.
    fn create_run(&self, method: &str, cmdline: &str, name: &str, date_run: &str) -> Result<u64>;

    /// Attaches the run's member genomes.
    fn add_run_genomes(&self, run_id: u64, genomes: &[Genome]) -> Result<()>;

    /// Looks up a prior comparison result by its full key.
    fn find_comparison(&self, key: &ComparisonKey) -> Result<Option<ComparisonResult>>;

    /// Inserts one comparison result under its key.
    ///
    /// Re-inserting an identical key replaces the stored result, so
    /// re-aggregation stays idempotent.
    fn insert_comparison(&self, key: &ComparisonKey, result: &ComparisonResult) -> Result<()>;

    /// Links an already-stored comparison into a run's result set.
    fn link_comparison_to_run(&self, run_id: u64, key: &ComparisonKey) -> Result<()>;

    /// Replaces the run's summary matrices.
    fn update_matrices(&self, run_id: u64, matrices: &SummaryMatrices) -> Result<()>;

    /// Moves the run to a new lifecycle state.
    fn set_run_status(&self, run_id: u64, status: RunStatus) -> Result<()>;

    /// Fetches a run by ID.
    fn get_run(&self, run_id: u64) -> Result<Option<Run>>;
}

/// Classifies candidate pairs against the store.
///
/// Pairs with a prior result under an identical key are linked into the
/// current run and returned in the reuse map; the rest come back as the
/// pending set. A store error is fatal to the caller -- it is never treated
/// as "nothing exists", since that would silently recompute or, worse,
/// mis-deduplicate.
pub fn filter_existing_comparisons(
    store: &dyn Store,
    run_id: u64,
    genomes: &[Genome],
    pairs: &[(usize, usize)],
    version: &str,
    fragment_size: usize,
) -> Result<(Vec<(usize, usize)>, HashMap<(usize, usize), ComparisonResult>)> {
    let mut pending = Vec::new();
    let mut reused = HashMap::new();

    for &(query, reference) in pairs {
        let key = ComparisonKey::new(&genomes[query], &genomes[reference], version, fragment_size);
        match store.find_comparison(&key)? {
            Some(result) => {
                store.link_comparison_to_run(run_id, &key)?;
                reused.insert((query, reference), result);
            }
            None => pending.push((query, reference)),
        }
    }
    log::info!(
        "{} of {} comparisons already in the store, {} pending",
        reused.len(),
        pairs.len(),
        pending.len()
    );
    Ok((pending, reused))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredComparison {
    key: ComparisonKey,
    result: ComparisonResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    next_run_id: u64,
    runs: Vec<Run>,
    comparisons: Vec<StoredComparison>,
}

/// Store backed by one JSON document on disk.
///
/// Every mutation rewrites the document through a temporary file in the same
/// directory and renames it into place, so a crash mid-write can never leave
/// a half-written document visible; readers see either the old state or the
/// new one.
pub struct JsonStore {
    path: PathBuf,
    document: Mutex<Document>,
}

impl JsonStore {
    /// Opens the store at `path`, loading the existing document or starting
    /// an empty one if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let document = if path.exists() {
            let text = fs::read_to_string(path)?;
            serde_json::from_str(&text)
                .map_err(|e| AnibError::StoreError(format!("{}: {e}", path.display())))?
        } else {
            Document::default()
        };
        Ok(JsonStore {
            path: path.to_path_buf(),
            document: Mutex::new(document),
        })
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut document = self
            .document
            .lock()
            .map_err(|_| AnibError::StoreError("store lock poisoned".to_string()))?;
        let value = apply(&mut document)?;
        self.save(&document)?;
        Ok(value)
    }

    fn save(&self, document: &Document) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new().prefix(".anibdb-").tempfile_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, document)?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    fn run_mut(document: &mut Document, run_id: u64) -> Result<&mut Run> {
        document
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| AnibError::StoreError(format!("no run with ID {run_id}")))
    }
}

impl Store for JsonStore {
    fn create_run(&self, method: &str, cmdline: &str, name: &str, date_run: &str) -> Result<u64> {
        self.mutate(|document| {
            let id = document.next_run_id;
            document.next_run_id += 1;
            document.runs.push(Run {
                id,
                method: method.to_string(),
                cmdline: cmdline.to_string(),
                date_run: date_run.to_string(),
                name: name.to_string(),
                status: RunStatus::Started,
                genomes: Vec::new(),
                comparisons: Vec::new(),
                matrices: None,
            });
            Ok(id)
        })
    }

    fn add_run_genomes(&self, run_id: u64, genomes: &[Genome]) -> Result<()> {
        self.mutate(|document| {
            let run = Self::run_mut(document, run_id)?;
            run.genomes.extend_from_slice(genomes);
            Ok(())
        })
    }

    fn find_comparison(&self, key: &ComparisonKey) -> Result<Option<ComparisonResult>> {
        let document = self
            .document
            .lock()
            .map_err(|_| AnibError::StoreError("store lock poisoned".to_string()))?;
        Ok(document
            .comparisons
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.result.clone()))
    }

    fn insert_comparison(&self, key: &ComparisonKey, result: &ComparisonResult) -> Result<()> {
        self.mutate(|document| {
            match document.comparisons.iter().position(|c| &c.key == key) {
                Some(idx) => document.comparisons[idx].result = result.clone(),
                None => document.comparisons.push(StoredComparison {
                    key: key.clone(),
                    result: result.clone(),
                }),
            }
            Ok(())
        })
    }

    fn link_comparison_to_run(&self, run_id: u64, key: &ComparisonKey) -> Result<()> {
        self.mutate(|document| {
            if !document.comparisons.iter().any(|c| &c.key == key) {
                return Err(AnibError::StoreError(format!(
                    "cannot link unknown comparison {} vs {} to run {run_id}",
                    key.query_hash, key.reference_hash
                )));
            }
            let run = Self::run_mut(document, run_id)?;
            if !run.comparisons.contains(key) {
                run.comparisons.push(key.clone());
            }
            Ok(())
        })
    }

    fn update_matrices(&self, run_id: u64, matrices: &SummaryMatrices) -> Result<()> {
        self.mutate(|document| {
            let run = Self::run_mut(document, run_id)?;
            run.matrices = Some(matrices.clone());
            Ok(())
        })
    }

    fn set_run_status(&self, run_id: u64, status: RunStatus) -> Result<()> {
        self.mutate(|document| {
            let run = Self::run_mut(document, run_id)?;
            run.status = status;
            Ok(())
        })
    }

    fn get_run(&self, run_id: u64) -> Result<Option<Run>> {
        let document = self
            .document
            .lock()
            .map_err(|_| AnibError::StoreError("store lock poisoned".to_string()))?;
        Ok(document.runs.iter().find(|r| r.id == run_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn genome(stem: &str) -> Genome {
        Genome {
            path: PathBuf::from(format!("{stem}.fasta")),
            stem: stem.to_string(),
            label: stem.to_string(),
            class: stem.to_string(),
            length: 1000,
            n_sequences: 1,
            hash: format!("hash-{stem}"),
        }
    }

    fn result(identity: f64) -> ComparisonResult {
        ComparisonResult {
            aln_length: 900,
            identity,
            coverage: 0.9,
            sim_errors: 10,
        }
    }

    #[test]
    fn test_run_lifecycle() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("anib.json")).unwrap();

        let id = store.create_run("ANIb", "anib -i x", "test-run", "2024-01-01").unwrap();
        store.add_run_genomes(id, &[genome("a"), genome("b")]).unwrap();
        store.set_run_status(id, RunStatus::Complete).unwrap();

        let run = store.get_run(id).unwrap().unwrap();
        assert_eq!(run.name, "test-run");
        assert_eq!(run.genomes.len(), 2);
        assert_eq!(run.status, RunStatus::Complete);
        assert!(store.get_run(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_comparison_roundtrip_and_key_sensitivity() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("anib.json")).unwrap();

        let (a, b) = (genome("a"), genome("b"));
        let key = ComparisonKey::new(&a, &b, "2.14.1+", 1020);
        store.insert_comparison(&key, &result(0.99)).unwrap();

        let found = store.find_comparison(&key).unwrap().unwrap();
        assert_eq!(found.identity, 0.99);

        // any key field differing means a different comparison
        let reversed = ComparisonKey::new(&b, &a, "2.14.1+", 1020);
        let other_version = ComparisonKey::new(&a, &b, "2.15.0+", 1020);
        let other_fragsize = ComparisonKey::new(&a, &b, "2.14.1+", 500);
        assert!(store.find_comparison(&reversed).unwrap().is_none());
        assert!(store.find_comparison(&other_version).unwrap().is_none());
        assert!(store.find_comparison(&other_fragsize).unwrap().is_none());
    }

    #[test]
    fn test_document_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anib.json");

        let key = ComparisonKey::new(&genome("a"), &genome("b"), "2.14.1+", 1020);
        let id = {
            let store = JsonStore::open(&path).unwrap();
            let id = store.create_run("ANIb", "anib", "run", "2024-01-01").unwrap();
            store.insert_comparison(&key, &result(0.95)).unwrap();
            store.link_comparison_to_run(id, &key).unwrap();
            id
        };

        let reopened = JsonStore::open(&path).unwrap();
        let run = reopened.get_run(id).unwrap().unwrap();
        assert_eq!(run.comparisons, vec![key.clone()]);
        assert!(reopened.find_comparison(&key).unwrap().is_some());
    }

    #[test]
    fn test_link_unknown_comparison_is_error() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("anib.json")).unwrap();
        let id = store.create_run("ANIb", "anib", "run", "2024-01-01").unwrap();

        let key = ComparisonKey::new(&genome("a"), &genome("b"), "2.14.1+", 1020);
        assert!(store.link_comparison_to_run(id, &key).is_err());
    }

    #[test]
    fn test_filter_existing_comparisons_splits_pairs() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("anib.json")).unwrap();
        let id = store.create_run("ANIb", "anib", "run", "2024-01-01").unwrap();

        let genomes = vec![genome("a"), genome("b")];
        let key = ComparisonKey::new(&genomes[0], &genomes[1], "2.14.1+", 1020);
        store.insert_comparison(&key, &result(0.97)).unwrap();

        let pairs = vec![(0, 1), (1, 0)];
        let (pending, reused) =
            filter_existing_comparisons(&store, id, &genomes, &pairs, "2.14.1+", 1020).unwrap();

        assert_eq!(pending, vec![(1, 0)]);
        assert_eq!(reused.len(), 1);
        assert_eq!(reused[&(0, 1)].identity, 0.97);

        let run = store.get_run(id).unwrap().unwrap();
        assert_eq!(run.comparisons, vec![key]);
    }
}
