//! Pairwise comparison identity and enumeration.
//!
//! A comparison is an ordered (query, reference) pair: for ANIb the query's
//! fragments are searched against the reference's database, so direction
//! matters and both directions are scheduled.

use crate::genome::Genome;
use serde::{Deserialize, Serialize};

/// Method name recorded against every run.
pub const METHOD: &str = "ANIb";

/// Program name recorded in comparison keys.
pub const PROGRAM: &str = "blastn";

/// Identity of one comparison in the persistent store.
///
/// Two comparisons are the same, and a prior result is reusable, only when
/// every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonKey {
    /// Content hash of the query genome
    pub query_hash: String,

    /// Content hash of the reference genome
    pub reference_hash: String,

    /// Aligner program name
    pub program: String,

    /// Aligner program version
    pub version: String,

    /// Fragment size the query was split into
    pub fragment_size: usize,

    /// Extra method-specific parameter (unused by ANIb, kept in the key)
    pub extra: Option<String>,
}

impl ComparisonKey {
    /// Builds the key for one ordered pair under the given aligner version
    /// and fragment size.
    pub fn new(
        query: &Genome,
        reference: &Genome,
        version: &str,
        fragment_size: usize,
    ) -> Self {
        ComparisonKey {
            query_hash: query.hash.clone(),
            reference_hash: reference.hash.clone(),
            program: PROGRAM.to_string(),
            version: version.to_string(),
            fragment_size,
            extra: None,
        }
    }
}

/// Aggregated alignment statistics for one resolved comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Summed ungapped aligned length in base pairs
    pub aln_length: u64,

    /// Length-weighted mean identity as a fraction (0.0-1.0)
    pub identity: f64,

    /// Aligned length as a fraction of the query's total fragment length
    pub coverage: f64,

    /// Summed similarity errors (mismatches plus gaps)
    pub sim_errors: u64,
}

/// Returns all ordered index pairs (query, reference) with query != reference.
///
/// Pairs come out in input order for deterministic logging; correctness does
/// not depend on this order. Yields N*(N-1) pairs for N genomes.
pub fn enumerate_pairs(genomes: &[Genome]) -> Vec<(usize, usize)> {
    let n = genomes.len();
    let mut pairs = Vec::with_capacity(n.saturating_sub(1) * n);
    for query in 0..n {
        for reference in 0..n {
            if query != reference {
                pairs.push((query, reference));
            }
        }
    }
    pairs
}

/// Deterministic name of the aligner output file for one comparison.
///
/// The recovery scanner reconstructs job identity from this name alone, so
/// executor and scanner must agree on it.
pub fn blast_tab_filename(query: &Genome, reference: &Genome) -> String {
    format!("{}_vs_{}.blast_tab", query.stem, reference.stem)
}
