//! Inverted-repeat detection through EMBOSS einverted
//!
//! The candidate pair is rebuilt as one sequence (arm5 followed by arm3,
//! or the single transcript for a self pair), einverted is run on it in a
//! private temporary directory and the reported hairpins are parsed back
//! into arm coordinates.

use anyhow::{Context, Result};
use log::{debug, info};

use std::fs;
use std::process::Command;

use config::{
    PipelineError, EINVERTED, EINVERTED_GAP, EINVERTED_MATCH, EINVERTED_MAX_REPEAT,
    EINVERTED_MISMATCH, EINVERTED_THRESHOLD,
};

use crate::record::{CandidatePair, InvertedRepeatCoords, TranscriptSet};

/// einverted scoring parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EinvertedParams {
    pub binary: String,
    pub gap: i32,
    pub threshold: i32,
    pub match_score: i32,
    pub mismatch: i32,
    pub max_repeat: u32,
}

impl Default for EinvertedParams {
    fn default() -> Self {
        Self {
            binary: EINVERTED.to_string(),
            gap: EINVERTED_GAP,
            threshold: EINVERTED_THRESHOLD,
            match_score: EINVERTED_MATCH,
            mismatch: EINVERTED_MISMATCH,
            max_repeat: EINVERTED_MAX_REPEAT,
        }
    }
}

/// Anything able to report hairpins for a named sequence
pub trait InvertedRepeatFinder: Sync {
    fn find(&self, name: &str, seq: &str) -> Result<Vec<InvertedRepeatCoords>>;
}

#[derive(Debug, Clone, Default)]
pub struct Einverted {
    pub params: EinvertedParams,
}

impl Einverted {
    pub fn new(params: EinvertedParams) -> Self {
        Self { params }
    }
}

impl InvertedRepeatFinder for Einverted {
    fn find(&self, name: &str, seq: &str) -> Result<Vec<InvertedRepeatCoords>> {
        let dir = tempfile::tempdir().context("cannot create a temporary directory")?;
        let input = dir.path().join("hairpin.fa");
        let outfile = dir.path().join("hairpin.inv");
        let outseq = dir.path().join("hairpin.inv.fa");

        fs::write(&input, format!(">{}\n{}\n", name, seq))?;

        let p = &self.params;
        let output = Command::new(&p.binary)
            .arg("-sequence")
            .arg(&input)
            .args(["-gap", &p.gap.to_string()])
            .args(["-threshold", &p.threshold.to_string()])
            .args(["-match", &p.match_score.to_string()])
            .args(["-mismatch", &p.mismatch.to_string()])
            .args(["-maxrepeat", &p.max_repeat.to_string()])
            .arg("-outfile")
            .arg(&outfile)
            .arg("-outseq")
            .arg(&outseq)
            .output()
            .map_err(|e| PipelineError::Tool {
                tool: p.binary.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Tool {
                tool: p.binary.clone(),
                reason: format!(
                    "{} on {}: {}",
                    output.status,
                    name,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }

        let contents = fs::read_to_string(&outfile).map_err(|_| {
            PipelineError::DataConsistency(format!("einverted wrote no result file for {}", name))
        })?;

        Ok(parse_einverted(&contents, name)?)
    }
}

/// Parses an einverted report into hairpin coordinates
///
/// Blocks are separated by a blank line:
///
/// ```text
/// T1-T2: Score 120: 40/45 ( 88%) matches, 0 gaps
///      10 acgt...acgt     54
///         ||||...||||
///     200 tgca...tgca     156
/// ```
pub fn parse_einverted(contents: &str, name: &str) -> Result<Vec<InvertedRepeatCoords>, PipelineError> {
    let mut coords = Vec::new();

    for (i, block) in contents.split("\n\n").enumerate() {
        let lines: Vec<&str> = block
            .trim_matches(|c| c == '\n' || c == '\r')
            .lines()
            .collect();
        if lines.len() < 4 {
            continue;
        }

        coords.push(parse_block(&lines, name, i + 1)?);
    }

    debug!("einverted reported {} hairpins for {}", coords.len(), name);
    Ok(coords)
}

fn parse_block(lines: &[&str], name: &str, block: usize) -> Result<InvertedRepeatCoords, PipelineError> {
    let err = |reason: &str| PipelineError::parse(format!("{name}.inv"), block, reason);

    // name: Score S: M/T ( P%) matches, G gaps
    let mut parts = lines[0].rsplitn(3, ':');
    let (stats, score) = match (parts.next(), parts.next()) {
        (Some(stats), Some(score)) => (stats, score),
        _ => return Err(err("malformed hairpin header")),
    };

    let score = score
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| err("missing score"))?
        .to_string();

    let (matches_info, gaps_info) = stats
        .split_once(',')
        .ok_or_else(|| err("missing gap count"))?;
    let matches = matches_info
        .split_whitespace()
        .next()
        .ok_or_else(|| err("missing match count"))?
        .to_string();
    let gaps = gaps_info
        .split_whitespace()
        .next()
        .ok_or_else(|| err("missing gap count"))?
        .to_string();

    let (matched, total) = matches
        .split_once('/')
        .ok_or_else(|| err("match count is not M/T"))?;
    let matched: u64 = matched.parse().map_err(|_| err("bad matched count"))?;
    let total: u64 = total.parse().map_err(|_| err("bad total count"))?;
    let percent = if total == 0 {
        0.0
    } else {
        (matched as f64 / total as f64 * 100.0).round() / 100.0
    };

    let arm = |line: &str| -> Result<(i64, i64), PipelineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [first, _, last] => Ok((
                first.parse().map_err(|_| err("bad arm coordinate"))?,
                last.parse().map_err(|_| err("bad arm coordinate"))?,
            )),
            _ => Err(err("arm line is not 'coord seq coord'")),
        }
    };

    let (start5, end5) = arm(lines[1])?;
    let (end3, start3) = arm(lines[3])?;

    Ok(InvertedRepeatCoords {
        name: name.to_string(),
        score,
        matches,
        percent,
        gaps,
        align_len: total * 2,
        start5,
        end5,
        start3,
        end3,
        loop_len: start3 - end5,
    })
}

/// Hairpin of a candidate pair and the arm lengths needed to shift arm 3
#[derive(Debug, Clone, PartialEq)]
pub struct HairpinFrame {
    pub coords: InvertedRepeatCoords,
    pub len5: i64,
    pub len3: i64,
    pub self_pair: bool,
}

impl HairpinFrame {
    /// arm 3 offset inside the combined sequence
    pub fn shift(&self) -> i64 {
        if self.self_pair {
            0
        } else {
            self.len5
        }
    }
}

/// Runs the finder on a candidate pair and keeps its first hairpin
///
/// A pair without sequence or without any hairpin is a consistency error.
pub fn get_ir_coords<F: InvertedRepeatFinder + ?Sized>(
    pair: &CandidatePair,
    transcripts: &TranscriptSet,
    finder: &F,
) -> Result<HairpinFrame> {
    let missing = |name: &str| {
        PipelineError::DataConsistency(format!("no sequence found for transcript {}", name))
    };

    let t5 = transcripts
        .get(&pair.transcript5)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing(&pair.transcript5))?;
    let t3 = transcripts
        .get(&pair.transcript3)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing(&pair.transcript3))?;

    let self_pair = pair.is_self_pair();
    let name = pair.name();
    let seq = if self_pair {
        t5.seq.clone()
    } else {
        format!("{}{}", t5.seq, t3.seq)
    };

    let mut hairpins = finder
        .find(&name, &seq)
        .with_context(|| format!("inverted repeat search failed for {}", name))?;
    if hairpins.is_empty() {
        return Err(PipelineError::DataConsistency(format!(
            "no inverted repeat found for {}",
            name
        ))
        .into());
    }

    let coords = hairpins.swap_remove(0);
    info!(
        "IR coords for {} - start1: {} | end1: {} | start2: {} | end2: {}",
        name, coords.start5, coords.end5, coords.start3, coords.end3
    );

    Ok(HairpinFrame {
        coords,
        len5: t5.len() as i64,
        len3: t3.len() as i64,
        self_pair,
    })
}

/// Fixed answers keyed by sequence name
#[cfg(test)]
pub(crate) struct MockFinder(pub hashbrown::HashMap<String, Vec<InvertedRepeatCoords>>);

#[cfg(test)]
impl InvertedRepeatFinder for MockFinder {
    fn find(&self, name: &str, _seq: &str) -> Result<Vec<InvertedRepeatCoords>> {
        Ok(self.0.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
pub(crate) fn coords(name: &str, start5: i64, end5: i64, start3: i64, end3: i64) -> InvertedRepeatCoords {
    InvertedRepeatCoords {
        name: name.to_string(),
        score: "100".to_string(),
        matches: "40/45".to_string(),
        percent: 0.89,
        gaps: "0".to_string(),
        align_len: 90,
        start5,
        end5,
        start3,
        end3,
        loop_len: start3 - end5,
    }
}
