//! BLAST tabular output parsing and per-comparison reduction.
//!
//! The executor asks blastn for a fixed 15-column tabular report. Each row
//! describes one hit of a query fragment against the reference database.
//! Rows are reduced to a single [`ComparisonResult`] per job: the best hit
//! per fragment is kept, the identity/coverage inclusion thresholds are
//! applied, and the surviving rows are summed.

use crate::compare::ComparisonResult;
use crate::error::{AnibError, Result};
use crate::fragments::FragmentMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Column list passed to blastn as `-outfmt "6 ..."`.
pub const OUTFMT_FIELDS: &str =
    "qseqid sseqid length mismatch pident nident qlen slen qstart qend sstart send positive ppos gaps";

/// One row of the blastn tabular report.
#[derive(Debug, Clone, PartialEq)]
pub struct BlastRow {
    /// Query fragment ID
    pub qseqid: String,

    /// Reference sequence ID
    pub sseqid: String,

    /// Alignment length, gaps included
    pub length: u64,

    /// Number of mismatched positions
    pub mismatch: u64,

    /// Percentage identity (0.0-100.0)
    pub pident: f64,

    /// Number of identical positions
    pub nident: u64,

    /// Query fragment length
    pub qlen: u64,

    /// Reference sequence length
    pub slen: u64,

    /// Alignment coordinates
    pub qstart: u64,
    pub qend: u64,
    pub sstart: u64,
    pub send: u64,

    /// Number of positive-scoring positions
    pub positive: u64,

    /// Percentage of positive-scoring positions
    pub ppos: f64,

    /// Total gap length
    pub gaps: u64,
}

impl BlastRow {
    /// Parses one tab-separated report line.
    pub fn from_tab_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 15 {
            return Err(AnibError::TabParseError(format!(
                "row has {} fields, expected 15",
                fields.len()
            )));
        }

        fn num<T: std::str::FromStr>(field: &str, name: &str) -> Result<T> {
            field
                .trim()
                .parse()
                .map_err(|_| AnibError::TabParseError(format!("invalid {name}: {field:?}")))
        }

        Ok(BlastRow {
            qseqid: fields[0].to_string(),
            sseqid: fields[1].to_string(),
            length: num(fields[2], "length")?,
            mismatch: num(fields[3], "mismatch")?,
            pident: num(fields[4], "pident")?,
            nident: num(fields[5], "nident")?,
            qlen: num(fields[6], "qlen")?,
            slen: num(fields[7], "slen")?,
            qstart: num(fields[8], "qstart")?,
            qend: num(fields[9], "qend")?,
            sstart: num(fields[10], "sstart")?,
            send: num(fields[11], "send")?,
            positive: num(fields[12], "positive")?,
            ppos: num(fields[13], "ppos")?,
            gaps: num(fields[14], "gaps")?,
        })
    }

    /// Aligned length with gap positions removed.
    pub fn ungapped_length(&self) -> u64 {
        self.length.saturating_sub(self.gaps)
    }

    // Rows violating basic numeric ranges are dropped from the aggregate,
    // not treated as a parse failure of the whole report.
    fn in_range(&self) -> bool {
        (0.0..=100.0).contains(&self.pident)
            && (0.0..=100.0).contains(&self.ppos)
            && self.length > 0
            && self.gaps <= self.length
            && self.mismatch <= self.length
    }
}

/// Parses a whole tabular report and reduces it to one [`ComparisonResult`].
///
/// Keeps the first-reported (best) hit per fragment, then keeps rows whose
/// identity is at least `min_identity_pct` and whose ungapped aligned length
/// covers at least `min_coverage` of the fragment. Rows below the thresholds
/// are excluded from the aggregate; this is a policy knob, not a defect.
/// Coverage of the final result is the summed aligned length over the total
/// fragment length of the query genome.
pub fn reduce_blast_tab(
    text: &str,
    fragments: &FragmentMap,
    min_identity_pct: f64,
    min_coverage: f64,
) -> Result<ComparisonResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut aln_length = 0u64;
    let mut weighted_identity = 0f64;
    let mut sim_errors = 0u64;
    let mut rejected = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let row = BlastRow::from_tab_line(line)?;

        if !row.in_range() {
            rejected += 1;
            log::warn!("rejecting out-of-range report row for {}", row.qseqid);
            continue;
        }
        let fraglen = match fragments.get(&row.qseqid) {
            Some(len) => *len as f64,
            None => {
                rejected += 1;
                log::warn!("rejecting report row for unknown fragment {}", row.qseqid);
                continue;
            }
        };
        // Best hit per fragment only; blastn reports it first.
        if !seen.insert(row.qseqid.clone()) {
            continue;
        }

        let ungapped = row.ungapped_length();
        if row.pident < min_identity_pct || (ungapped as f64) / fraglen < min_coverage {
            continue;
        }
        aln_length += ungapped;
        weighted_identity += (row.pident / 100.0) * ungapped as f64;
        sim_errors += row.mismatch + row.gaps;
    }

    if rejected > 0 {
        log::warn!("rejected {rejected} malformed report rows");
    }

    let total_fragment_length: usize = fragments.values().sum();
    let identity = if aln_length > 0 {
        weighted_identity / aln_length as f64
    } else {
        0.0
    };
    let coverage = if total_fragment_length > 0 {
        aln_length as f64 / total_fragment_length as f64
    } else {
        0.0
    };

    Ok(ComparisonResult {
        aln_length,
        identity,
        coverage,
        sim_errors,
    })
}

/// Reads and reduces a report written by an invocation that just exited
/// successfully.
///
/// Unlike [`read_blast_tab`], an empty report is accepted as a genuine
/// no-hit result; the exit status vouches for the file being whole.
pub fn read_fresh_blast_tab(
    path: &Path,
    fragments: &FragmentMap,
    min_identity_pct: f64,
    min_coverage: f64,
) -> Result<ComparisonResult> {
    let text = fs::read_to_string(path)?;
    reduce_blast_tab(&text, fragments, min_identity_pct, min_coverage)
}

/// Reads and reduces an on-disk tabular report of unknown provenance.
///
/// An unreadable or empty file is an error so a truncated report from an
/// interrupted run is never mistaken for a no-hit result.
pub fn read_blast_tab(
    path: &Path,
    fragments: &FragmentMap,
    min_identity_pct: f64,
    min_coverage: f64,
) -> Result<ComparisonResult> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(AnibError::TabParseError(format!(
            "report {} is empty",
            path.display()
        )));
    }
    reduce_blast_tab(&text, fragments, min_identity_pct, min_coverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(qseqid: &str, length: u64, mismatch: u64, pident: f64, gaps: u64) -> String {
        // qlen/slen/coords/positive/ppos are carried but unused by reduction
        format!(
            "{qseqid}\tref_contig\t{length}\t{mismatch}\t{pident}\t{nident}\t1020\t50000\t1\t{length}\t1\t{length}\t{nident}\t{pident}\t{gaps}",
            nident = length - mismatch - gaps,
        )
    }

    fn fragments(lens: &[(&str, usize)]) -> FragmentMap {
        lens.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_row() {
        let line = row("frag00001", 1000, 10, 99.0, 5);
        let parsed = BlastRow::from_tab_line(&line).unwrap();
        assert_eq!(parsed.qseqid, "frag00001");
        assert_eq!(parsed.length, 1000);
        assert_eq!(parsed.mismatch, 10);
        assert_eq!(parsed.pident, 99.0);
        assert_eq!(parsed.gaps, 5);
        assert_eq!(parsed.ungapped_length(), 995);
    }

    #[test]
    fn test_parse_row_rejects_garbage() {
        assert!(BlastRow::from_tab_line("too\tfew\tfields").is_err());
        let bad = "frag00001\tref\tnot_a_number\t0\t99.0\t1\t1\t1\t1\t1\t1\t1\t1\t99.0\t0";
        assert!(BlastRow::from_tab_line(bad).is_err());
    }

    #[test]
    fn test_reduce_applies_thresholds() {
        let frags = fragments(&[("frag00001", 1000), ("frag00002", 1000), ("frag00003", 1000)]);
        let text = [
            row("frag00001", 1000, 10, 99.0, 0),
            // below identity threshold
            row("frag00002", 1000, 800, 20.0, 0),
            // below coverage threshold
            row("frag00003", 300, 3, 99.0, 0),
        ]
        .join("\n");

        let result = reduce_blast_tab(&text, &frags, 30.0, 0.7).unwrap();
        assert_eq!(result.aln_length, 1000);
        assert_eq!(result.sim_errors, 10);
        assert!((result.identity - 0.99).abs() < 1e-9);
        assert!((result.coverage - 1000.0 / 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_keeps_best_hit_per_fragment() {
        let frags = fragments(&[("frag00001", 1000)]);
        let text = [
            row("frag00001", 1000, 10, 99.0, 0),
            // secondary hit for the same fragment, must be ignored
            row("frag00001", 900, 200, 77.0, 0),
        ]
        .join("\n");

        let result = reduce_blast_tab(&text, &frags, 30.0, 0.7).unwrap();
        assert_eq!(result.aln_length, 1000);
        assert_eq!(result.sim_errors, 10);
    }

    #[test]
    fn test_reduce_weights_identity_by_length() {
        let frags = fragments(&[("frag00001", 1000), ("frag00002", 500)]);
        let text = [
            row("frag00001", 1000, 0, 100.0, 0),
            row("frag00002", 500, 50, 90.0, 0),
        ]
        .join("\n");

        let result = reduce_blast_tab(&text, &frags, 30.0, 0.7).unwrap();
        // (1.0 * 1000 + 0.9 * 500) / 1500
        assert!((result.identity - (1000.0 + 450.0) / 1500.0).abs() < 1e-9);
        assert!((result.coverage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_skips_out_of_range_rows() {
        let frags = fragments(&[("frag00001", 1000), ("frag00002", 1000)]);
        let text = [
            // identity above 100% is nonsense
            row("frag00001", 1000, 0, 120.0, 0),
            row("frag00002", 1000, 0, 100.0, 0),
        ]
        .join("\n");

        let result = reduce_blast_tab(&text, &frags, 30.0, 0.7).unwrap();
        assert_eq!(result.aln_length, 1000);
    }

    #[test]
    fn test_fresh_empty_report_is_a_no_hit_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_vs_y.blast_tab");
        std::fs::write(&path, "").unwrap();

        let frags = fragments(&[("frag00001", 1000)]);
        let result = read_fresh_blast_tab(&path, &frags, 30.0, 0.7).unwrap();
        assert_eq!(result.aln_length, 0);
        assert_eq!(result.identity, 0.0);
        assert_eq!(result.coverage, 0.0);
    }

    #[test]
    fn test_read_blast_tab_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_vs_y.blast_tab");
        std::fs::write(&path, "").unwrap();

        let frags = fragments(&[("frag00001", 1000)]);
        assert!(read_blast_tab(&path, &frags, 30.0, 0.7).is_err());
    }
}
