//! Chart inputs for the validated hairpins
//!
//! For each small-RNA library the phasiRNAs of every IR pair are merged
//! with the library reads mapped to the same transcripts, projected onto
//! the hairpin and written as one table per library.

use anyhow::{Context, Result};
use hashbrown::{HashMap, HashSet};
use log::{info, warn};

use std::path::{Path, PathBuf};

use config::{
    file_stem, reader, run_tasks, write_collection, PipelineError, Task, CHART_HEADER,
    CHART_SUFFIX,
};

use crate::core::einverted::{get_ir_coords, HairpinFrame, InvertedRepeatFinder};
use crate::core::geometry::ArmBounds;
use crate::record::{CandidatePair, IrStatus, SmallRna, TranscriptSet, ValidationResult};
use crate::utils::parse_map;

/// A validated IR pair with its hairpin
#[derive(Debug, Clone)]
pub struct ChartPair {
    pub pair: CandidatePair,
    pub frame: HairpinFrame,
}

/// Resolves the hairpin of every distinct IR pair once
pub fn chart_pairs<F: InvertedRepeatFinder + ?Sized>(
    results: &[ValidationResult],
    transcripts: &TranscriptSet,
    finder: &F,
) -> Result<Vec<ChartPair>> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for result in results.iter().filter(|r| r.status == IrStatus::Ir) {
        let pair = CandidatePair::from_hit(&result.hit, config::PAIR_TYPE);
        if !seen.insert(pair.name()) {
            continue;
        }

        let frame = get_ir_coords(&pair, transcripts, finder)?;
        pairs.push(ChartPair { pair, frame });
    }

    info!("IR pairs to chart: {}", pairs.len());
    Ok(pairs)
}

/// Writes `<library>.chart.input.txt` for every library map
///
/// # Arguments
///
/// * `pairs` - IR pairs with their hairpins
/// * `phased` - sense phasiRNAs per transcript, from phased.clust
/// * `maps` - bowtie map file of each library
/// * `outdir` - output directory
///
/// # Returns
///
/// * `Result<Vec<PathBuf>>` - written chart files
pub fn write_charts(
    pairs: &[ChartPair],
    phased: &HashMap<String, Vec<SmallRna>>,
    maps: &[PathBuf],
    outdir: &Path,
) -> Result<Vec<PathBuf>> {
    let tasks: Vec<Task> = maps
        .iter()
        .map(|map| {
            let output = outdir.join(format!("{}.{}", file_stem(map), CHART_SUFFIX));
            Task::new(map.clone(), output)
        })
        .collect();

    run_tasks(&tasks, "Writing chart inputs...", |task| {
        let contents = reader(&task.input)?;
        let library = parse_map(&contents, &task.input.display().to_string())?;
        let lines = chart_lines(pairs, phased, &library)?;

        write_collection(&lines, &task.output)
    })?;

    Ok(tasks.into_iter().map(|t| t.output).collect())
}

/// Chart rows of one library, header included
pub fn chart_lines(
    pairs: &[ChartPair],
    phased: &HashMap<String, Vec<SmallRna>>,
    library: &HashMap<String, Vec<SmallRna>>,
) -> Result<Vec<String>> {
    let mut lines = vec![CHART_HEADER.to_string()];

    for ChartPair { pair, frame } in pairs {
        let arm5 = merge_rnas(&pair.transcript5, phased, library)?;
        let arm3 = merge_rnas(&pair.transcript3, phased, library)?;

        let bounds = ArmBounds::from(frame);
        let offset = frame.shift();

        let valid5: Vec<&SmallRna> = arm5.iter().filter(|r| bounds.in_arm5(r.position)).collect();
        let valid3: Vec<SmallRna> = arm3
            .iter()
            .map(|r| r.at(r.position + offset))
            .filter(|r| bounds.in_arm3(r.position))
            .collect();

        if valid5.is_empty() || valid3.is_empty() {
            warn!(
                "sRNAs of {} fall outside the foldback, skipping",
                pair.name()
            );
            continue;
        }

        let name = format!("{}-{}", pair.transcript5, pair.transcript3);
        lines.extend(valid5.iter().map(|r| {
            format!("{}\t{}\t5", name, r.at(bounds.norm5(r.position)).line())
        }));
        lines.extend(valid3.iter().map(|r| {
            format!("{}\t{}\t3", name, r.at(bounds.norm3(r.position)).line())
        }));
    }

    Ok(lines)
}

/// phasiRNAs of a transcript plus the library reads that are not phasiRNAs
///
/// A phasiRNA also sequenced in the library reports the library abundance.
pub fn merge_rnas(
    transcript: &str,
    phased: &HashMap<String, Vec<SmallRna>>,
    library: &HashMap<String, Vec<SmallRna>>,
) -> Result<Vec<SmallRna>, PipelineError> {
    let phasis = phased.get(transcript).ok_or_else(|| {
        PipelineError::DataConsistency(format!(
            "transcript {} has no block in the phased clusters",
            transcript
        ))
    })?;
    let srnas = library.get(transcript).map(Vec::as_slice).unwrap_or_default();

    let abundances: HashMap<&str, u64> = srnas
        .iter()
        .map(|r| (r.seq.as_str(), r.abundance))
        .collect();

    let mut merged = Vec::with_capacity(phasis.len() + srnas.len());
    let mut phasi_seqs = HashSet::new();

    for phasi in phasis {
        phasi_seqs.insert(phasi.seq.as_str());

        let mut phasi = phasi.clone();
        if let Some(&abundance) = abundances.get(phasi.seq.as_str()) {
            phasi.abundance = abundance;
        }
        merged.push(phasi);
    }

    merged.extend(
        srnas
            .iter()
            .filter(|r| !phasi_seqs.contains(r.seq.as_str()))
            .cloned(),
    );

    Ok(merged)
}

/// Re-reads phased.clust for a chart-only run
pub fn load_phased_clust(path: &Path) -> Result<HashMap<String, Vec<SmallRna>>> {
    let contents = reader(path)?;
    crate::utils::parse_phased_clust(&contents, &path.display().to_string())
        .with_context(|| format!("cannot parse phased clusters from {:?}", path))
}
