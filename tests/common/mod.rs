//! Shared scaffolding for the integration tests: tiny FASTA inputs and stub
//! executables standing in for the BLAST+ binaries.
//!
//! The stubs append every invocation to a log file so tests can count
//! external-process calls, and serve canned tabular reports from a response
//! directory keyed by `<query>_vs_<reference>`.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Stub blastn/makeblastdb pair installed into a scratch directory.
pub struct StubBlast {
    pub blastn: PathBuf,
    pub makeblastdb: PathBuf,
    pub log: PathBuf,
    pub responses: PathBuf,
}

impl StubBlast {
    /// Serves `rows` as the report for `<pair>` ("a_vs_b") invocations.
    pub fn respond(&self, pair: &str, rows: &str) {
        fs::write(self.responses.join(format!("{pair}.tab")), rows).unwrap();
    }

    /// Makes every `<pair>` invocation exit nonzero.
    pub fn fail(&self, pair: &str) {
        fs::write(self.responses.join(format!("{pair}.fail")), "").unwrap();
    }

    /// Number of logged invocations whose line contains `needle`.
    pub fn invocations(&self, needle: &str) -> usize {
        match fs::read_to_string(&self.log) {
            Ok(text) => text.lines().filter(|l| l.contains(needle)).count(),
            Err(_) => 0,
        }
    }

    /// Number of logged comparison searches, excluding version probes.
    pub fn searches(&self) -> usize {
        self.invocations("blastn -out")
    }

    /// Number of logged database builds.
    pub fn database_builds(&self) -> usize {
        self.invocations("makeblastdb")
    }
}

/// Installs the stub executables under `dir` and returns their handles.
pub fn install_stubs(dir: &Path) -> StubBlast {
    let log = dir.join("invocations.log");
    let responses = dir.join("responses");
    fs::create_dir_all(&responses).unwrap();

    let blastn = dir.join("blastn");
    let blastn_script = format!(
        r#"#!/bin/sh
case "$1" in
    -version) echo "blastn: 2.99.7+"; exit 0 ;;
esac
echo "blastn $*" >> "{log}"
out=""; query=""; db=""
while [ $# -gt 0 ]; do
    case "$1" in
        -out) out="$2"; shift ;;
        -query) query="$2"; shift ;;
        -db) db="$2"; shift ;;
    esac
    shift
done
q=$(basename "$query" -fragments.fasta)
r=$(basename "$db")
if [ -f "{responses}/${{q}}_vs_${{r}}.fail" ]; then
    echo "stub blastn: induced failure for ${{q}}_vs_${{r}}" >&2
    exit 3
fi
if [ -f "{responses}/${{q}}_vs_${{r}}.tab" ]; then
    cp "{responses}/${{q}}_vs_${{r}}.tab" "$out"
    exit 0
fi
echo "stub blastn: no canned response for ${{q}}_vs_${{r}}" >&2
exit 2
"#,
        log = log.display(),
        responses = responses.display(),
    );
    write_executable(&blastn, &blastn_script);

    let makeblastdb = dir.join("makeblastdb");
    let makeblastdb_script = format!(
        r#"#!/bin/sh
echo "makeblastdb $*" >> "{log}"
out=""
while [ $# -gt 0 ]; do
    case "$1" in
        -out) out="$2"; shift ;;
    esac
    shift
done
touch "${{out}}.nin"
exit 0
"#,
        log = log.display(),
    );
    write_executable(&makeblastdb, &makeblastdb_script);

    StubBlast {
        blastn,
        makeblastdb,
        log,
        responses,
    }
}

fn write_executable(path: &Path, script: &str) {
    fs::write(path, script).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// Writes a small FASTA file and returns its path.
pub fn write_fasta(dir: &Path, name: &str, records: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    for (id, seq) in records {
        writeln!(file, ">{id}").unwrap();
        writeln!(file, "{seq}").unwrap();
    }
    path
}

/// One 15-column tabular report row in the format the executor requests.
pub fn report_row(qseqid: &str, length: u64, mismatch: u64, pident: f64, gaps: u64) -> String {
    let nident = length - mismatch - gaps;
    format!(
        "{qseqid}\tref_contig\t{length}\t{mismatch}\t{pident}\t{nident}\t{length}\t50000\t1\t{length}\t1\t{length}\t{nident}\t{pident}\t{gaps}\n"
    )
}
