//! Input genome discovery and description.
//!
//! Collects the FASTA files of an input directory into immutable [`Genome`]
//! records carrying the path, display label, class tag, total length and a
//! content hash used as the genome's stable identity in comparison keys.

use crate::config::Config;
use crate::error::{AnibError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One input genome, created once per file at run start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Path to the FASTA file
    pub path: PathBuf,

    /// File stem, used in output-file naming
    pub stem: String,

    /// Display label (defaults to the file stem)
    pub label: String,

    /// Class/category tag (defaults to the file stem)
    pub class: String,

    /// Total sequence length in base pairs
    pub length: usize,

    /// Number of sequence records in the file
    pub n_sequences: usize,

    /// Content hash, the genome's stable identity
    pub hash: String,
}

impl Genome {
    /// Reads one FASTA file into a genome record.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnibError::FileNotFound(path.to_path_buf()));
        }
        let stem = file_stem(path);

        let bytes = fs::read(path)?;
        let hash = format!("{:016x}", fxhash::hash64(&bytes));

        let mut reader = needletail::parse_fastx_file(path).map_err(|e| AnibError::FastaParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut length = 0usize;
        let mut n_sequences = 0usize;
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| AnibError::FastaParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            length += record.num_bases();
            n_sequences += 1;
        }

        Ok(Genome {
            path: path.to_path_buf(),
            label: stem.clone(),
            class: stem.clone(),
            stem,
            length,
            n_sequences,
            hash,
        })
    }
}

/// Returns the file stem used to name fragment files and job output.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Returns true for FASTA files, plain or gzipped.
pub fn is_fasta_file(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_lowercase(),
        None => return false,
    };
    const SUFFIXES: [&str; 6] = [".fasta", ".fna", ".fa", ".fasta.gz", ".fna.gz", ".fa.gz"];
    SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Collects all FASTA genomes in a directory, applying optional label and
/// class sidecar files from the configuration.
///
/// Files are taken in sorted path order so downstream job numbering is
/// deterministic. Errors if the directory holds no FASTA files.
pub fn collect_genomes(indir: &Path, config: &Config) -> Result<Vec<Genome>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(indir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_fasta_file(p))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(AnibError::InvalidConfig(format!(
            "no FASTA files found in {}",
            indir.display()
        )));
    }

    let labels = match &config.labels_file {
        Some(path) => read_sidecar(path)?,
        None => HashMap::new(),
    };
    let classes = match &config.classes_file {
        Some(path) => read_sidecar(path)?,
        None => HashMap::new(),
    };

    let mut genomes = Vec::with_capacity(paths.len());
    for path in &paths {
        let mut genome = Genome::from_path(path)?;
        if let Some(label) = labels.get(&genome.stem) {
            genome.label = label.clone();
        }
        if let Some(class) = classes.get(&genome.stem) {
            genome.class = class.clone();
        }
        log::debug!(
            "collected genome {} ({} bp, {} sequences, hash {})",
            genome.stem,
            genome.length,
            genome.n_sequences,
            genome.hash
        );
        genomes.push(genome);
    }
    Ok(genomes)
}

// Sidecar lines are either "stem\ttext" or "hash\tstem\ttext"; the trailing
// pair is what we key on.
fn read_sidecar(path: &Path) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.len() {
            2 => {
                map.insert(fields[0].to_string(), fields[1].to_string());
            }
            3 => {
                map.insert(fields[1].to_string(), fields[2].to_string());
            }
            _ => {
                log::warn!(
                    "skipping malformed line {} in {}",
                    lineno + 1,
                    path.display()
                );
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_fasta(dir: &Path, name: &str, records: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        for (id, seq) in records {
            writeln!(file, ">{id}").unwrap();
            writeln!(file, "{seq}").unwrap();
        }
        path
    }

    #[test]
    fn test_is_fasta_file() {
        assert!(is_fasta_file(Path::new("x.fasta")));
        assert!(is_fasta_file(Path::new("x.fna.gz")));
        assert!(is_fasta_file(Path::new("GCF_000091165.1_genomic.fna")));
        assert!(!is_fasta_file(Path::new("x.txt")));
        assert!(!is_fasta_file(Path::new("x.blast_tab")));
    }

    #[test]
    fn test_genome_from_path() {
        let dir = tempdir().unwrap();
        let path = write_fasta(
            dir.path(),
            "a.fasta",
            &[("contig1", "ACGTACGT"), ("contig2", "ACGT")],
        );

        let genome = Genome::from_path(&path).unwrap();
        assert_eq!(genome.stem, "a");
        assert_eq!(genome.label, "a");
        assert_eq!(genome.length, 12);
        assert_eq!(genome.n_sequences, 2);
        assert_eq!(genome.hash.len(), 16);
    }

    #[test]
    fn test_hash_tracks_content() {
        let dir = tempdir().unwrap();
        let a = write_fasta(dir.path(), "a.fasta", &[("c", "ACGTACGT")]);
        let b = write_fasta(dir.path(), "b.fasta", &[("c", "ACGTACGT")]);
        let c = write_fasta(dir.path(), "c.fasta", &[("c", "ACGTACGA")]);

        let ha = Genome::from_path(&a).unwrap().hash;
        let hb = Genome::from_path(&b).unwrap().hash;
        let hc = Genome::from_path(&c).unwrap().hash;
        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
    }

    #[test]
    fn test_collect_genomes_sorted_with_labels() {
        let dir = tempdir().unwrap();
        write_fasta(dir.path(), "beta.fasta", &[("c", "ACGT")]);
        write_fasta(dir.path(), "alpha.fasta", &[("c", "ACGT")]);
        let labels = dir.path().join("labels.txt");
        fs::write(&labels, "alpha\tAlpha strain\n").unwrap();

        let config = Config::builder().labels_file(labels).build();
        let genomes = collect_genomes(dir.path(), &config).unwrap();
        assert_eq!(genomes.len(), 2);
        assert_eq!(genomes[0].stem, "alpha");
        assert_eq!(genomes[0].label, "Alpha strain");
        assert_eq!(genomes[1].label, "beta");
    }

    #[test]
    fn test_collect_genomes_empty_dir_errors() {
        let dir = tempdir().unwrap();
        let result = collect_genomes(dir.path(), &Config::default());
        assert!(result.is_err());
    }
}
