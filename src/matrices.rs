//! NxN summary matrices.
//!
//! Per-pair comparison results are folded into five tables keyed by genome
//! identity: percentage identity, coverage, alignment length, similarity
//! errors, and the Hadamard matrix (element-wise identity x coverage).
//! Direction matters, so cell (q, r) and cell (r, q) are filled
//! independently. Cells without a resolved comparison stay empty and export
//! as `NA`, never as zero.

use crate::compare::ComparisonResult;
use crate::error::Result;
use crate::genome::Genome;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

type Cells = Vec<Vec<Option<f64>>>;

/// The five summary tables of one run.
///
/// Folding is per-cell and idempotent: re-folding the same results yields
/// identical matrices, and folds for distinct pairs commute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMatrices {
    /// Genome identity (content hash) per row/column index
    pub hashes: Vec<String>,

    /// Display label per row/column index
    pub labels: Vec<String>,

    /// Fractional identity (0.0-1.0)
    pub identity: Cells,

    /// Fractional coverage (0.0-1.0)
    pub coverage: Cells,

    /// Summed aligned length in base pairs
    pub aln_lengths: Cells,

    /// Summed similarity errors
    pub sim_errors: Cells,

    /// Element-wise identity x coverage
    pub hadamard: Cells,
}

impl SummaryMatrices {
    /// Creates matrices for a genome set with only the diagonal filled.
    ///
    /// Self-comparison is fixed: identity 1.0, coverage 1.0, alignment
    /// length equal to the genome length, zero similarity errors.
    pub fn new(genomes: &[Genome]) -> Self {
        let n = genomes.len();
        let empty = || vec![vec![None; n]; n];
        let mut matrices = SummaryMatrices {
            hashes: genomes.iter().map(|g| g.hash.clone()).collect(),
            labels: genomes.iter().map(|g| g.label.clone()).collect(),
            identity: empty(),
            coverage: empty(),
            aln_lengths: empty(),
            sim_errors: empty(),
            hadamard: empty(),
        };
        for (i, genome) in genomes.iter().enumerate() {
            matrices.identity[i][i] = Some(1.0);
            matrices.coverage[i][i] = Some(1.0);
            matrices.aln_lengths[i][i] = Some(genome.length as f64);
            matrices.sim_errors[i][i] = Some(0.0);
        }
        matrices
    }

    /// Number of genomes (rows/columns).
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// True when the matrices cover no genomes.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Places one comparison result into cell (query, reference) of the four
    /// base matrices. No symmetric placement; the opposite direction is its
    /// own comparison.
    pub fn fold(&mut self, query: usize, reference: usize, result: &ComparisonResult) {
        self.identity[query][reference] = Some(result.identity);
        self.coverage[query][reference] = Some(result.coverage);
        self.aln_lengths[query][reference] = Some(result.aln_length as f64);
        self.sim_errors[query][reference] = Some(result.sim_errors as f64);
    }

    /// Recomputes the Hadamard matrix from the identity and coverage tables.
    ///
    /// Called after all folds; a cell is present only when both factors are.
    pub fn compute_hadamard(&mut self) {
        let n = self.len();
        for row in 0..n {
            for col in 0..n {
                self.hadamard[row][col] = match (self.identity[row][col], self.coverage[row][col])
                {
                    (Some(id), Some(cov)) => Some(id * cov),
                    _ => None,
                };
            }
        }
    }

    /// Writes each matrix as a labelled CSV file under `outdir`.
    ///
    /// Empty cells are written as `NA`. Returns the written paths.
    pub fn write_csv(&self, outdir: &Path) -> Result<Vec<PathBuf>> {
        let tables: [(&str, &Cells); 5] = [
            ("matrix_identity.csv", &self.identity),
            ("matrix_coverage.csv", &self.coverage),
            ("matrix_aln_lengths.csv", &self.aln_lengths),
            ("matrix_sim_errors.csv", &self.sim_errors),
            ("matrix_hadamard.csv", &self.hadamard),
        ];

        let mut paths = Vec::with_capacity(tables.len());
        for (name, cells) in tables {
            let path = outdir.join(name);
            let mut writer = csv::Writer::from_path(&path)?;

            let mut header = vec![String::new()];
            header.extend(self.labels.iter().cloned());
            writer.write_record(&header)?;

            for (row, label) in self.labels.iter().enumerate() {
                let mut record = vec![label.clone()];
                for col in 0..self.len() {
                    record.push(match cells[row][col] {
                        Some(value) => value.to_string(),
                        None => "NA".to_string(),
                    });
                }
                writer.write_record(&record)?;
            }
            writer.flush()?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn genome(stem: &str, length: usize) -> Genome {
        Genome {
            path: PathBuf::from(format!("{stem}.fasta")),
            stem: stem.to_string(),
            label: stem.to_string(),
            class: stem.to_string(),
            length,
            n_sequences: 1,
            hash: format!("hash-{stem}"),
        }
    }

    fn result(identity: f64, coverage: f64, aln_length: u64, sim_errors: u64) -> ComparisonResult {
        ComparisonResult {
            aln_length,
            identity,
            coverage,
            sim_errors,
        }
    }

    #[test]
    fn test_diagonal_is_self_comparison() {
        let genomes = vec![genome("a", 1000), genome("b", 2000)];
        let mut matrices = SummaryMatrices::new(&genomes);
        matrices.compute_hadamard();

        assert_eq!(matrices.identity[0][0], Some(1.0));
        assert_eq!(matrices.coverage[1][1], Some(1.0));
        assert_eq!(matrices.aln_lengths[1][1], Some(2000.0));
        assert_eq!(matrices.sim_errors[0][0], Some(0.0));
        assert_eq!(matrices.hadamard[0][0], Some(1.0));
        assert_eq!(matrices.identity[0][1], None);
    }

    #[test]
    fn test_three_genome_fold_matches_hand_computed_values() {
        let genomes = vec![genome("a", 1000), genome("b", 1000), genome("c", 1000)];
        let mut matrices = SummaryMatrices::new(&genomes);

        matrices.fold(0, 1, &result(0.99, 0.90, 900, 9));
        matrices.fold(1, 0, &result(0.98, 0.80, 800, 16));
        matrices.fold(0, 2, &result(0.75, 0.50, 500, 125));
        matrices.fold(2, 0, &result(0.70, 0.40, 400, 120));
        matrices.fold(1, 2, &result(0.80, 0.60, 600, 120));
        matrices.fold(2, 1, &result(0.85, 0.65, 650, 98));
        matrices.compute_hadamard();

        assert_eq!(matrices.identity[0][1], Some(0.99));
        assert_eq!(matrices.identity[1][0], Some(0.98));
        assert_eq!(matrices.coverage[2][1], Some(0.65));
        assert_eq!(matrices.aln_lengths[1][2], Some(600.0));
        assert_eq!(matrices.sim_errors[2][0], Some(120.0));
        assert!((matrices.hadamard[0][1].unwrap() - 0.99 * 0.90).abs() < 1e-12);
        assert!((matrices.hadamard[2][0].unwrap() - 0.70 * 0.40).abs() < 1e-12);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let genomes = vec![genome("a", 1000), genome("b", 1000)];
        let mut once = SummaryMatrices::new(&genomes);
        once.fold(0, 1, &result(0.95, 0.85, 850, 40));
        once.compute_hadamard();

        let mut twice = SummaryMatrices::new(&genomes);
        twice.fold(0, 1, &result(0.95, 0.85, 850, 40));
        twice.fold(0, 1, &result(0.95, 0.85, 850, 40));
        twice.compute_hadamard();
        twice.compute_hadamard();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_unresolved_cell_stays_absent() {
        let genomes = vec![genome("a", 1000), genome("b", 1000)];
        let mut matrices = SummaryMatrices::new(&genomes);
        matrices.fold(0, 1, &result(0.95, 0.85, 850, 40));
        matrices.compute_hadamard();

        assert_eq!(matrices.identity[1][0], None);
        assert_eq!(matrices.hadamard[1][0], None);
    }

    #[test]
    fn test_csv_export_writes_na_for_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let genomes = vec![genome("a", 1000), genome("b", 1000)];
        let mut matrices = SummaryMatrices::new(&genomes);
        matrices.fold(0, 1, &result(0.95, 0.85, 850, 40));
        matrices.compute_hadamard();

        let paths = matrices.write_csv(dir.path()).unwrap();
        assert_eq!(paths.len(), 5);

        let identity = std::fs::read_to_string(dir.path().join("matrix_identity.csv")).unwrap();
        let mut lines = identity.lines();
        assert_eq!(lines.next().unwrap(), ",a,b");
        assert_eq!(lines.next().unwrap(), "a,1,0.95");
        assert_eq!(lines.next().unwrap(), "b,NA,1");
    }
}
