//! Recovery of aligner output left behind by an interrupted run.
//!
//! The executor names every report file deterministically from the pair it
//! belongs to, so a prior run's output can be matched back to pending jobs
//! from the filename alone, without an index file. A matched file is parsed
//! with the same parser fresh output goes through; anything unreadable or
//! unparsable is treated as not recovered and the job re-executes.

use crate::alignment;
use crate::compare::ComparisonResult;
use crate::config::Config;
use crate::error::Result;
use crate::fragments::FragmentSet;
use crate::genome::Genome;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const BLAST_TAB_SUFFIX: &str = ".blast_tab";

/// Scans `outdir` for report files covering the pending pairs.
///
/// Returns the parsed result per recovered pair. Files whose name matches no
/// pending pair are ignored; files that fail to parse are logged and left
/// for re-execution.
pub fn collect_existing_output(
    outdir: &Path,
    genomes: &[Genome],
    pending: &[(usize, usize)],
    fragment_sets: &[FragmentSet],
    config: &Config,
) -> Result<HashMap<(usize, usize), ComparisonResult>> {
    let stems: HashMap<&str, usize> = genomes
        .iter()
        .enumerate()
        .map(|(idx, g)| (g.stem.as_str(), idx))
        .collect();
    let wanted: HashSet<(usize, usize)> = pending.iter().copied().collect();

    let mut recovered = HashMap::new();
    for entry in fs::read_dir(outdir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let pair = match parse_report_name(name, &stems) {
            Some(pair) => pair,
            None => continue,
        };
        if !wanted.contains(&pair) {
            continue;
        }

        match alignment::read_blast_tab(
            &path,
            &fragment_sets[pair.0].lengths,
            config.min_identity_pct,
            config.min_coverage,
        ) {
            Ok(result) => {
                log::info!("recovered {name} from a previous run");
                recovered.insert(pair, result);
            }
            Err(error) => {
                log::warn!("{name} matches a pending job but is unusable, re-executing: {error}");
            }
        }
    }
    Ok(recovered)
}

/// Maps a report filename back to (query, reference) genome indices.
fn parse_report_name(name: &str, stems: &HashMap<&str, usize>) -> Option<(usize, usize)> {
    let base = name.strip_suffix(BLAST_TAB_SUFFIX)?;
    let (query_stem, reference_stem) = base.split_once("_vs_")?;
    Some((*stems.get(query_stem)?, *stems.get(reference_stem)?))
}
