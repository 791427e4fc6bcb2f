//! # Compile Pipeline
//!
//! Turns a directory of predicate source files into a fresh, validated
//! pack snapshot. One file per predicate; the file name minus its `.pl`
//! suffix is the predicate name. Each valid line becomes a fact written
//! through the encoder; invalid lines are warned and skipped; a file whose
//! facts mix arities is rejected wholesale and contributes nothing to the
//! pack.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::encoding::encode_args;
use crate::pack::{PackError, PackWriter};
use crate::parser::parse_fact_line;

/// Compile pipeline errors (environmental; arity violations are reported
/// through [`CompileReport`] instead).
#[derive(Error, Debug)]
pub enum CompileError {
    /// Source directory missing or unreadable
    #[error("source directory unreadable: {}: {source}", path.display())]
    SourceDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Source file unreadable
    #[error("source file unreadable: {}: {source}", path.display())]
    SourceFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Pack store error
    #[error("pack error: {0}")]
    Pack(#[from] PackError),
}

/// Per-predicate compile outcome.
#[derive(Debug, Clone)]
pub struct PredicateSummary {
    pub name: String,
    /// Distinct facts written (duplicate lines collapse onto one key).
    pub facts: usize,
    /// Non-comment lines that failed to parse and were skipped.
    pub invalid_lines: usize,
}

/// A predicate rejected for mixing arities.
#[derive(Debug, Clone)]
pub struct ArityFailure {
    pub predicate: String,
    /// The distinct arities observed, ascending.
    pub arities: Vec<usize>,
    /// Up to five sample lines covering the conflicting arities.
    pub samples: Vec<String>,
}

/// Result of a compile run.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub predicates: Vec<PredicateSummary>,
    pub failed: Vec<ArityFailure>,
}

impl CompileReport {
    /// Whether every source file compiled cleanly. A partial pack from a
    /// failed compile must not be served.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_facts(&self) -> usize {
        self.predicates.iter().map(|p| p.facts).sum()
    }
}

const MAX_SAMPLE_LINES: usize = 5;

/// Compile every `*.pl` file under `source_dir` into a fresh pack at
/// `pack_dir`.
///
/// The pack is committed even when some predicates fail: failed
/// predicates are simply absent from it, and [`CompileReport::success`]
/// tells the caller to exit non-zero.
pub fn compile(source_dir: &Path, pack_dir: &Path) -> Result<CompileReport, CompileError> {
    let mut writer = PackWriter::create(pack_dir)?;
    let mut report = CompileReport::default();

    for (predicate, path) in predicate_files(source_dir)? {
        compile_file(&predicate, &path, &mut writer, &mut report)?;
    }

    let manifest = writer.commit()?;
    tracing::info!(
        pack_id = %manifest.pack_id,
        predicates = report.predicates.len(),
        facts = report.total_facts(),
        failed = report.failed.len(),
        "compile finished"
    );

    Ok(report)
}

/// Enumerate predicate source files, sorted by predicate name for a
/// deterministic pack. Only regular `*.pl` files participate; anything
/// else in the directory is skipped.
fn predicate_files(source_dir: &Path) -> Result<BTreeMap<String, PathBuf>, CompileError> {
    let entries = fs::read_dir(source_dir).map_err(|e| CompileError::SourceDir {
        path: source_dir.to_path_buf(),
        source: e,
    })?;

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| CompileError::SourceDir {
            path: source_dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("pl") {
            tracing::debug!(path = %path.display(), "skipping non-predicate entry");
            continue;
        }

        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.insert(stem.to_string(), path);
        }
    }

    Ok(files)
}

fn compile_file(
    predicate: &str,
    path: &Path,
    writer: &mut PackWriter,
    report: &mut CompileReport,
) -> Result<(), CompileError> {
    let text = fs::read_to_string(path).map_err(|e| CompileError::SourceFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut valid = Vec::new();
    let mut invalid_lines = 0usize;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
            continue;
        }
        match parse_fact_line(line) {
            Some((_, args)) => valid.push((args, trimmed.to_string())),
            None => {
                invalid_lines += 1;
                tracing::warn!(
                    predicate,
                    line = index + 1,
                    text = trimmed,
                    "skipping malformed fact line"
                );
            }
        }
    }

    let mut arities: Vec<usize> = valid.iter().map(|(args, _)| args.len()).collect();
    arities.sort_unstable();
    arities.dedup();

    if arities.len() > 1 {
        let samples = sample_lines(&valid, &arities);
        tracing::error!(
            predicate,
            arities = ?arities,
            samples = ?samples,
            "mixed arities; writing zero facts for this predicate"
        );
        report.failed.push(ArityFailure {
            predicate: predicate.to_string(),
            arities,
            samples,
        });
        return Ok(());
    }

    writer.declare(predicate);
    for (args, _) in &valid {
        let (path_segment, blob) = encode_args(args);
        writer.set(predicate, path_segment.into_bytes(), blob);
    }

    let facts = writer.staged_count(predicate);
    tracing::info!(predicate, facts, invalid_lines, "compiled predicate");
    report.predicates.push(PredicateSummary {
        name: predicate.to_string(),
        facts,
        invalid_lines,
    });

    Ok(())
}

/// Pick up to five sample lines, starting with one per conflicting arity
/// so the error shows the actual disagreement.
fn sample_lines(valid: &[(Vec<crate::ast::Arg>, String)], arities: &[usize]) -> Vec<String> {
    let mut samples = Vec::new();

    for &arity in arities {
        if samples.len() >= MAX_SAMPLE_LINES {
            break;
        }
        if let Some((_, line)) = valid.iter().find(|(args, _)| args.len() == arity) {
            samples.push(line.clone());
        }
    }

    for (_, line) in valid {
        if samples.len() >= MAX_SAMPLE_LINES {
            break;
        }
        if !samples.contains(line) {
            samples.push(line.clone());
        }
    }

    samples
}
