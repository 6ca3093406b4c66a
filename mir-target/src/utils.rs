use anyhow::Result;
use log::info;

use std::path::{Path, PathBuf};

use config::{file_stem, reader, PipelineError};

use crate::core::reconstruct::AlignmentRecord;
use crate::core::score::ScoredTarget;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads a headerless bowtie2 alignment file of miRNAs on targets
pub fn read_alignments(path: &Path) -> Result<Vec<AlignmentRecord>> {
    let contents = reader(path)?;
    Ok(parse_alignments(&contents, &display_name(path))?)
}

pub fn parse_alignments(contents: &str, file: &str) -> Result<Vec<AlignmentRecord>, PipelineError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('@'))
        .map(|(i, line)| AlignmentRecord::parse(line, file, i + 1))
        .collect()
}

/// Reads scored targets from one or more `parsed.csv` files
///
/// The first line of every file is its header.
///
/// # Example
///
/// ```rust, ignore
/// let targets = read_targets(&[PathBuf::from("All.targs.parsed.csv")]).unwrap();
/// ```
pub fn read_targets(paths: &[PathBuf]) -> Result<Vec<ScoredTarget>> {
    let mut targets = Vec::new();

    for path in paths {
        let contents = reader(path)?;
        targets.extend(parse_targets(&contents, &display_name(path))?);
    }

    info!("Scored targets to validate: {}", targets.len());
    Ok(targets)
}

pub fn parse_targets(contents: &str, file: &str) -> Result<Vec<ScoredTarget>, PipelineError> {
    contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| ScoredTarget::parse(line, file, i + 1))
        .collect()
}

/// Sequences of a (multi-line) FASTA transcriptome
pub fn read_sequences(path: &Path) -> Result<Vec<String>> {
    let contents = reader(path)?;
    let sequences = parse_sequences(&contents);

    info!("Transcripts in {:?}: {}", path, sequences.len());
    Ok(sequences)
}

pub fn parse_sequences(contents: &str) -> Vec<String> {
    contents
        .split('>')
        .skip(1)
        .map(|record| record.lines().skip(1).map(|l| l.trim()).collect())
        .collect()
}

/// Library name of a tag count file: its stem up to the first `_`
pub fn library_name(path: &Path) -> String {
    let stem = file_stem(path);
    match stem.split_once('_') {
        Some((lib, _)) if !lib.is_empty() => lib.to_string(),
        _ => stem,
    }
}

/// PARE map files belonging to a library, matched by the `<library>_` file name prefix
pub fn library_maps<'a>(library: &str, maps: &'a [PathBuf]) -> Vec<&'a PathBuf> {
    let prefix = format!("{library}_");
    maps.iter()
        .filter(|m| display_name(m).starts_with(&prefix))
        .collect()
}
