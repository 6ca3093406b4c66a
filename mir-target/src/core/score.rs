//! miRNA-target interaction scoring
//!
//! Read and target are walked from their 3' ends so that the position
//! counter follows the miRNA from its 5' end. Every site is a match, a
//! mismatch, a G:U wobble or a gap, and the chosen policy turns the
//! site profile into a penalty score.

use hashbrown::HashSet;

use config::{PipelineError, ScoringPolicy, CLEAVAGE_PAIR, GAP_SYMBOL, SEED_END, SEED_START};

use crate::core::reconstruct::{mirna_sequence, reconstruct_target, AlignmentRecord};

/// 1-based miRNA positions of every non-matching site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteProfile {
    pub mismatches: Vec<usize>,
    pub gaps: Vec<usize>,
    pub wobbles: Vec<usize>,
}

/// Classifies every aligned site of a read against its target
///
/// # Arguments
///
/// * `read` - aligned read (DNA alphabet)
/// * `target` - reconstructed target (RNA alphabet)
///
/// # Returns
///
/// * `SiteProfile` - positions counted from the miRNA 5' end
pub fn classify(read: &str, target: &str) -> SiteProfile {
    let mut profile = SiteProfile::default();
    let mut nt = 1;

    let read = read.replace('T', "U");
    for (x, y) in read.bytes().rev().zip(target.bytes().rev()) {
        if x == GAP_SYMBOL || y == GAP_SYMBOL {
            profile.gaps.push(nt);
            if y == GAP_SYMBOL {
                nt += 1;
            }
            continue;
        }

        match (x, y) {
            (b'A', b'G') | (b'C', b'U') => profile.wobbles.push(nt),
            (x, y) if x == y => {}
            _ => profile.mismatches.push(nt),
        }
        nt += 1;
    }

    profile
}

/// Penalty score of a site profile
///
/// Seedless: the 10/11 mismatch pair costs 2.5 together, other mismatches
/// 1.0, gaps 1.5 and wobbles 0.5, raised to 1.5 next to one mismatch and
/// 2.0 between two. Standard: mismatches and gaps cost 2.0 inside the
/// seed and 1.0 outside, wobbles 1.0 and 0.5.
pub fn score(profile: &SiteProfile, policy: ScoringPolicy) -> f64 {
    match policy {
        ScoringPolicy::Seedless => seedless(profile),
        ScoringPolicy::Standard => standard(profile),
    }
}

fn seedless(profile: &SiteProfile) -> f64 {
    let mismatches: HashSet<usize> = profile.mismatches.iter().copied().collect();
    let (left, right) = CLEAVAGE_PAIR;
    let cleavage = mismatches.contains(&left) && mismatches.contains(&right);

    let mut score = if cleavage { 2.5 } else { 0.0 };
    score += profile
        .mismatches
        .iter()
        .filter(|&&p| !(cleavage && (p == left || p == right)))
        .count() as f64;
    score += profile.gaps.len() as f64 * 1.5;

    for &w in &profile.wobbles {
        let before = w > 1 && mismatches.contains(&(w - 1));
        let after = mismatches.contains(&(w + 1));

        score += match (before, after) {
            (true, true) => 2.0,
            (true, false) | (false, true) => 1.5,
            (false, false) => 0.5,
        };
    }

    score
}

fn standard(profile: &SiteProfile) -> f64 {
    let seed = |p: usize| (SEED_START..=SEED_END).contains(&p);

    let mismatches: f64 = profile
        .mismatches
        .iter()
        .chain(profile.gaps.iter())
        .map(|&p| if seed(p) { 2.0 } else { 1.0 })
        .sum();
    let wobbles: f64 = profile
        .wobbles
        .iter()
        .map(|&p| if seed(p) { 1.0 } else { 0.5 })
        .sum();

    mismatches + wobbles
}

/// A scored interaction, one row of `<stem>.parsed.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTarget {
    pub mirna: String,
    pub target: String,
    pub bind_site: String,
    pub mir_seq: String,
    pub tar_seq: String,
    pub score: f64,
    pub mismatch: String,
    pub cigar: String,
}

impl ScoredTarget {
    pub fn from_record(record: &AlignmentRecord, policy: ScoringPolicy) -> Self {
        let tar_seq = reconstruct_target(&record.read, &record.cigar, &record.mismatch);
        let profile = classify(&record.read, &tar_seq);

        Self {
            mirna: record.mirna.clone(),
            target: record.target.clone(),
            bind_site: record.bind_site(),
            mir_seq: mirna_sequence(&record.read),
            score: score(&profile, policy),
            tar_seq,
            mismatch: record.mismatch.clone(),
            cigar: record.cigar.clone(),
        }
    }

    /// Reads a row back; a leading `>` on the miRNA name is tolerated
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        if fields.len() < 8 {
            return Err(PipelineError::parse(
                file,
                lineno,
                format!("expected 8 comma-separated columns, found {}", fields.len()),
            ));
        }

        let score = fields[5].trim().parse::<f64>().map_err(|_| {
            PipelineError::parse(file, lineno, format!("score '{}' is not a number", fields[5]))
        })?;

        Ok(Self {
            mirna: fields[0].trim_start_matches('>').to_string(),
            target: fields[1].to_string(),
            bind_site: fields[2].to_string(),
            mir_seq: fields[3].to_string(),
            tar_seq: fields[4].to_string(),
            score,
            mismatch: fields[6].to_string(),
            cigar: fields[7].to_string(),
        })
    }

    /// last target position covered by the miRNA
    pub fn bind_end(&self) -> Option<i64> {
        self.bind_site
            .split_once('-')
            .and_then(|(_, end)| end.trim().parse().ok())
    }

    pub fn line(&self) -> String {
        format!(
            "{},{},{},{},{},{:.1},{},{}",
            self.mirna,
            self.target,
            self.bind_site,
            self.mir_seq,
            self.tar_seq,
            self.score,
            self.mismatch,
            self.cigar
        )
    }
}
