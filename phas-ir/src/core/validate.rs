use anyhow::{Context, Result};
use hashbrown::HashSet;
use log::{info, warn};

use config::{get_progress_bar, PipelineError, FINAL_PAIRS_COLUMNS};

use crate::core::einverted::{get_ir_coords, InvertedRepeatFinder};
use crate::core::geometry::{project, ArmProjection};
use crate::core::overhang::check_overhang;
use crate::core::phase::{get_phase, PhaseExtraction};
use crate::core::IrConfig;
use crate::record::{
    CandidatePair, ClusterBlock, IrStatus, PhasedLocus, PhasedRead, TranscriptSet,
    ValidationResult,
};

/// Everything the validation stage produces
#[derive(Debug, Default, Clone)]
pub struct ValidationOutcome {
    pub results: Vec<ValidationResult>,
    /// phased.clust lines
    pub clusters: Vec<String>,
    /// transcripts of IR rows, first appearance order
    pub paired: Vec<String>,
    /// phased transcripts left without an IR row
    pub unassigned: Vec<String>,
}

impl ValidationOutcome {
    /// finalPairs.txt rows, header included
    pub fn lines(&self, header: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.results.len() + 1);
        lines.push(format!("{}\t{}", header, FINAL_PAIRS_COLUMNS));
        lines.extend(self.results.iter().map(|r| r.line()));
        lines
    }

    pub fn count(&self, status: IrStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Tests every phased-locus combination of every candidate pair
///
/// # Arguments
///
/// * `pairs` - accepted candidate pairs
/// * `loci` - all phased loci
/// * `phased` - distinct phased transcripts
/// * `clusters` - phasing cluster blocks
/// * `transcripts` - sequences of the phased transcripts
/// * `finder` - inverted-repeat finder
/// * `config` - phase length, mode and coordinate matching
///
/// # Returns
///
/// * `Result<ValidationOutcome>` - one row per locus combination
///
/// # Example
///
/// ```rust, ignore
/// let outcome = validate_pairs(&pairs, &loci, &phased, &clusters, &fasta, &Einverted::default(), &config)?;
/// write_collection(&outcome.lines(&rc.header), outdir.join(FINAL_PAIRS))?;
/// ```
pub fn validate_pairs<F: InvertedRepeatFinder + ?Sized>(
    pairs: &[CandidatePair],
    loci: &[PhasedLocus],
    phased: &[String],
    clusters: &[ClusterBlock],
    transcripts: &TranscriptSet,
    finder: &F,
    config: &IrConfig,
) -> Result<ValidationOutcome> {
    info!("Validating {} candidate pairs...", pairs.len());
    let pb = get_progress_bar(pairs.len() as u64, "Validating pairs...");

    let mut outcome = ValidationOutcome::default();
    let mut seen = HashSet::new();

    for pair in pairs {
        let (loci5, loci3) = loci_of(pair, loci);
        if loci5.is_empty() || loci3.is_empty() {
            warn!("Pair {} lacks phased loci on one arm", pair.name());
            pb.inc(1);
            continue;
        }

        let phases5 = extract_all(&loci5, clusters, config)?;
        let phases3 = extract_all(&loci3, clusters, config)?;

        let frame = get_ir_coords(pair, transcripts, finder)?;

        for a in &phases5 {
            for b in &phases3 {
                let projection = project(&a.positions, &b.positions, &frame);
                let (valid5, valid3) = projection.valid_counts();

                if projection.has_valid_arms() {
                    outcome
                        .clusters
                        .extend(cluster_lines(pair, &a.reads, &b.reads));
                }

                let status = match projection {
                    ArmProjection::Outside { .. } => IrStatus::No,
                    ArmProjection::Disjoint { .. } => IrStatus::Fo,
                    ArmProjection::Overlap { arm5, arm3, .. } => {
                        check_overhang(&arm5, &arm3, config.phase, config.mode)
                    }
                };

                if status == IrStatus::Ir {
                    for t in [&pair.transcript5, &pair.transcript3] {
                        if seen.insert(t.clone()) {
                            outcome.paired.push(t.clone());
                        }
                    }
                }

                outcome.results.push(ValidationResult {
                    hit: pair.hit.clone(),
                    total_phased: a.positions.len() + b.positions.len(),
                    valid5,
                    valid3,
                    status,
                });
            }
        }

        pb.inc(1);
    }
    pb.finish_and_clear();

    outcome.unassigned = phased
        .iter()
        .filter(|t| !seen.contains(*t))
        .cloned()
        .collect();

    info!(
        "Pairs tested: {} | IR: {} | Fo: {} | No: {}",
        outcome.results.len(),
        outcome.count(IrStatus::Ir),
        outcome.count(IrStatus::Fo),
        outcome.count(IrStatus::No)
    );
    info!(
        "Total phased transcripts: {} | Unassigned transcripts: {}",
        phased.len(),
        outcome.unassigned.len()
    );

    Ok(outcome)
}

/// phased loci of each arm; a self pair uses the same loci twice
fn loci_of<'a>(
    pair: &CandidatePair,
    loci: &'a [PhasedLocus],
) -> (Vec<&'a PhasedLocus>, Vec<&'a PhasedLocus>) {
    if pair.is_self_pair() {
        let own: Vec<&PhasedLocus> = loci
            .iter()
            .filter(|l| l.transcript == pair.transcript5)
            .collect();
        return (own.clone(), own);
    }

    let mut loci5 = Vec::new();
    let mut loci3 = Vec::new();
    for locus in loci {
        if locus.transcript == pair.transcript5 {
            loci5.push(locus);
        } else if locus.transcript == pair.transcript3 {
            loci3.push(locus);
        }
    }

    (loci5, loci3)
}

fn extract_all(
    loci: &[&PhasedLocus],
    clusters: &[ClusterBlock],
    config: &IrConfig,
) -> Result<Vec<PhaseExtraction>> {
    loci.iter()
        .map(|locus| {
            let phases = get_phase(locus, clusters, config.phase, config.mode, config.coord_match)
                .with_context(|| format!("cannot extract phases for locus {}", locus.name))?;

            if phases.positions.is_empty() {
                return Err(PipelineError::DataConsistency(format!(
                    "no phase coordinates reported for locus {} on {}",
                    locus.name, locus.transcript
                ))
                .into());
            }

            Ok(phases)
        })
        .collect()
}

/// phased.clust block(s) for one locus combination
///
/// A self pair writes a single block; arm 3 reads already written for arm 5
/// (same sequence and position) are skipped.
pub fn cluster_lines(pair: &CandidatePair, reads5: &[PhasedRead], reads3: &[PhasedRead]) -> Vec<String> {
    let mut lines = Vec::with_capacity(reads5.len() + reads3.len() + 2);

    if !pair.is_self_pair() {
        lines.push(format!(">{}", pair.transcript5));
        lines.extend(reads5.iter().map(|r| r.line()));
        lines.push(format!(">{}", pair.transcript3));
        lines.extend(reads3.iter().map(|r| r.line()));
        return lines;
    }

    lines.push(format!(">{}", pair.transcript5));
    let mut written: HashSet<(&str, i64)> = HashSet::new();
    for read in reads5 {
        written.insert((read.seq.as_str(), read.position));
        lines.push(read.line());
    }
    for read in reads3 {
        if !written.contains(&(read.seq.as_str(), read.position)) {
            lines.push(read.line());
        }
    }

    lines
}
