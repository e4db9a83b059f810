//! Genome fragmentation.
//!
//! Splits each genome into consecutive fixed-size fragments, the unit of
//! pairwise alignment. Each record of the input is walked in non-overlapping
//! steps; the final fragment of a record keeps whatever remains, so fragment
//! lengths always sum to the genome length.

use crate::error::{AnibError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fragment ID to fragment length, ordered by ID.
pub type FragmentMap = BTreeMap<String, usize>;

/// A genome's fragment file and the lengths of its fragments.
#[derive(Debug, Clone)]
pub struct FragmentSet {
    /// Path to the written fragment FASTA file
    pub path: PathBuf,

    /// Length of each fragment, keyed by fragment ID
    pub lengths: FragmentMap,
}

impl FragmentSet {
    /// Total fragment length, equal to the genome length.
    pub fn total_length(&self) -> usize {
        self.lengths.values().sum()
    }
}

const FASTA_LINE_WIDTH: usize = 60;

/// Splits one genome into `fragment_size` slices and writes them to
/// `<outdir>/<stem>-fragments.fasta`.
///
/// Fragment IDs are `frag00001`, `frag00002`, ... -- a single counter across
/// all records of the genome, restarting for each genome. The file is
/// written through a temporary path in the output directory and renamed into
/// place, so an interrupted write never leaves a partial file under the
/// final name.
pub fn fragment_genome(
    genome_path: &Path,
    outdir: &Path,
    fragment_size: usize,
) -> Result<FragmentSet> {
    let stem = crate::genome::file_stem(genome_path);
    let fragpath = outdir.join(format!("{stem}-fragments.fasta"));

    let mut reader =
        needletail::parse_fastx_file(genome_path).map_err(|e| AnibError::FastaParse {
            path: genome_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".fragments-")
        .tempfile_in(outdir)?;
    let mut lengths = FragmentMap::new();
    let mut count = 0usize;

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| AnibError::FastaParse {
            path: genome_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let seq = record.seq();
        let mut idx = 0usize;
        while idx < seq.len() {
            count += 1;
            let end = (idx + fragment_size).min(seq.len());
            let fragment = &seq[idx..end];
            let id = format!("frag{count:05}");
            write_fasta_record(&mut tmp, &id, fragment)?;
            lengths.insert(id, fragment.len());
            idx += fragment_size;
        }
    }

    tmp.flush()?;
    tmp.persist(&fragpath)?;
    log::debug!(
        "wrote {} fragments for {} to {}",
        count,
        genome_path.display(),
        fragpath.display()
    );

    Ok(FragmentSet {
        path: fragpath,
        lengths,
    })
}

fn write_fasta_record<W: Write>(writer: &mut W, id: &str, seq: &[u8]) -> Result<()> {
    writeln!(writer, ">{id}")?;
    for chunk in seq.chunks(FASTA_LINE_WIDTH) {
        writer.write_all(chunk)?;
        writeln!(writer)?;
    }
    Ok(())
}
