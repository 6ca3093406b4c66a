use log::{debug, warn};

use config::{CoordMatch, PhaseMode, PipelineError, Strand, ANTISENSE_OFFSET};

use crate::record::{ClusterBlock, PhasedLocus, PhasedRead};

/// Phase positions of one locus and the reads they come from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseExtraction {
    pub positions: Vec<i64>,
    pub reads: Vec<PhasedRead>,
}

/// Collects the phase positions of a locus from its matching cluster(s)
///
/// A cluster matches when its transcript equals the locus transcript and
/// its header start/end equal the locus start/end under `coord_match`.
/// Several matching clusters (one per library) are concatenated.
///
/// # Arguments
///
/// * `locus` - phased locus to look up
/// * `clusters` - every block of the cluster file
/// * `phase` - phase length
/// * `mode` - observed or guessed positions
/// * `coord_match` - how header coordinates are compared
///
/// # Returns
///
/// * `Result<PhaseExtraction, PipelineError>` - positions and matched reads
pub fn get_phase(
    locus: &PhasedLocus,
    clusters: &[ClusterBlock],
    phase: i64,
    mode: PhaseMode,
    coord_match: CoordMatch,
) -> Result<PhaseExtraction, PipelineError> {
    let mut reads = Vec::new();

    for cluster in clusters.iter().filter(|c| c.transcript == locus.transcript) {
        if coord_match.matches(&cluster.start, &locus.start)
            && coord_match.matches(&cluster.end, &locus.end)
        {
            debug!("Matching cluster {} found for {}", cluster.id, locus.name);
            reads.extend(cluster.reads("cluster")?);
        }
    }

    if reads.is_empty() {
        warn!(
            "No cluster matches locus {} ({}:{}-{})",
            locus.name, locus.transcript, locus.start, locus.end
        );
    }

    let positions = match mode {
        PhaseMode::Observed => observed_positions(&reads),
        PhaseMode::Guessed => guessed_positions(locus, &reads, phase)?,
    };

    Ok(PhaseExtraction { positions, reads })
}

/// sense-strand positions, deduplicated in file order
fn observed_positions(reads: &[PhasedRead]) -> Vec<i64> {
    let mut positions: Vec<i64> = Vec::new();
    for read in reads.iter().filter(|r| r.strand == Strand::Watson) {
        if !positions.contains(&read.position) {
            positions.push(read.position);
        }
    }

    positions
}

/// ladder stepping by `phase` from the first read up to the locus end
fn guessed_positions(
    locus: &PhasedLocus,
    reads: &[PhasedRead],
    phase: i64,
) -> Result<Vec<i64>, PipelineError> {
    let first = reads.first().ok_or_else(|| {
        PipelineError::DataConsistency(format!(
            "locus {} has no matching cluster to guess phases from",
            locus.name
        ))
    })?;
    let end = locus.end_position()?;

    let mut current = match first.strand {
        Strand::Watson => first.position,
        // antisense reads sit phase - 3 nt downstream of the sense phase
        Strand::Crick => first.position - (phase - ANTISENSE_OFFSET),
    };

    let mut positions = Vec::new();
    while current <= end {
        positions.push(current);
        current += phase;
    }

    Ok(positions)
}
