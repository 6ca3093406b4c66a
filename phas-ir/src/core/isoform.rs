//! Isoform summarisation of the transcripts left without an IR pair
//!
//! An unassigned transcript is either an isoform of a paired transcript,
//! or it is grouped with its own unpaired isoforms into a numbered
//! cluster. Unassigned transcripts with reverse-complement hits are
//! reported as non-IR candidates; those without any are listed apart.

use anyhow::Result;
use hashbrown::{HashMap, HashSet};
use log::{info, warn};

use std::cmp::Ordering;

use config::{PipelineError, ISOFORM_TYPE, MIN_ISOFORM_IDENTITY, MIN_ISOFORM_MAP_RATIO};

use crate::record::AlignmentHit;

#[derive(Debug, Clone, PartialEq)]
pub struct Isoform {
    pub name: String,
    pub identity: f64,
    pub map_ratio: f64,
}

/// Unassigned transcripts split by whether an isoform got paired
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoformSplit {
    pub isoform_to_paired: Vec<String>,
    pub no_isoform_pair: Vec<String>,
}

/// Non-IR report of the no-isoform-pair transcripts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonIrReport {
    /// candidateNonIRs.txt lines, header included
    pub candidates: Vec<String>,
    /// nonIRs.list lines
    pub non_irs: Vec<String>,
    pub with_rc: usize,
    pub without_rc: usize,
}

/// A transcript with its cluster id and whether the cluster is shared
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub transcript: String,
    pub cluster: usize,
    pub shared: bool,
}

impl ClusterAssignment {
    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.transcript,
            self.cluster,
            if self.shared { "Y" } else { "N" }
        )
    }
}

/// Isoforms of every phased transcript from the normal (NOR) hits
///
/// # Arguments
///
/// * `nor` - normal-orientation hits between phased transcripts
/// * `phased` - distinct phased transcripts
///
/// # Returns
///
/// * `HashMap<String, Vec<Isoform>>` - one entry per phased transcript
pub fn isoform_map(nor: &[AlignmentHit], phased: &[String]) -> HashMap<String, Vec<Isoform>> {
    let mut isoforms: HashMap<String, Vec<Isoform>> =
        phased.iter().map(|t| (t.clone(), Vec::new())).collect();

    for hit in nor.iter().filter(|h| !h.is_self()) {
        let Some(entry) = isoforms.get_mut(&hit.query) else {
            continue;
        };

        let ratio = hit.map_ratio();
        if hit.identity >= MIN_ISOFORM_IDENTITY && ratio >= MIN_ISOFORM_MAP_RATIO {
            entry.push(Isoform {
                name: hit.subject.clone(),
                identity: hit.identity,
                map_ratio: ratio,
            });
        }
    }

    let with = isoforms.values().filter(|v| !v.is_empty()).count();
    info!(
        "Total uniq phased trans: {} | Trans with isoforms: {} | Trans with no isoforms: {}",
        phased.len(),
        with,
        phased.len() - with
    );

    isoforms
}

/// Splits unassigned transcripts on whether any isoform is paired
pub fn split_unassigned(
    unassigned: &[String],
    isoforms: &HashMap<String, Vec<Isoform>>,
    paired: &HashSet<String>,
) -> IsoformSplit {
    let mut split = IsoformSplit::default();

    for trans in unassigned {
        let has_paired_isoform = isoforms
            .get(trans)
            .map_or(false, |isos| isos.iter().any(|i| paired.contains(&i.name)));

        if has_paired_isoform {
            split.isoform_to_paired.push(trans.clone());
        } else {
            split.no_isoform_pair.push(trans.clone());
        }
    }

    info!(
        "Unassigned - isoform to paired: {} | not isoform to paired: {}",
        split.isoform_to_paired.len(),
        split.no_isoform_pair.len()
    );

    split
}

/// Reverse-complement hits touching each no-isoform-pair transcript
pub fn check_isoforms(no_isoform_pair: &[String], rc: &[AlignmentHit], header: &str) -> NonIrReport {
    let mut report = NonIrReport {
        candidates: vec![format!("{}\ttype", header)],
        ..Default::default()
    };

    for trans in no_isoform_pair {
        let hits: Vec<&AlignmentHit> = rc.iter().filter(|h| h.involves(trans)).collect();

        if hits.is_empty() {
            report.non_irs.push(trans.clone());
            report.without_rc += 1;
            continue;
        }

        report.with_rc += 1;
        report.candidates.extend(
            hits.iter()
                .map(|h| format!("{}\t{}", h.line(), ISOFORM_TYPE)),
        );
    }

    info!(
        "Not isoform to paired - with RC hits: {} | without RC hits: {}",
        report.with_rc, report.without_rc
    );

    report
}

/// Best-scoring hit linking each isoform-to-paired transcript to its paired isoform
///
/// # Returns
///
/// * `Result<Vec<String>>` - isoformToPaired.txt lines, header included;
///   a transcript without any non-self hit is a consistency error
pub fn isoform_pairs(
    nor: &[AlignmentHit],
    isoform_to_paired: &[String],
    paired: &HashSet<String>,
    header: &str,
) -> Result<Vec<String>> {
    let mut sorted: Vec<&AlignmentHit> = nor.iter().filter(|h| !h.is_self()).collect();
    sorted.sort_by(|a, b| {
        b.bitscore
            .partial_cmp(&a.bitscore)
            .unwrap_or(Ordering::Equal)
    });

    let mut lines = vec![format!("{}\ttype\tpaired\tisoform", header)];

    for trans in isoform_to_paired {
        let hits: Vec<&&AlignmentHit> = sorted.iter().filter(|h| h.involves(trans)).collect();
        if hits.is_empty() {
            return Err(PipelineError::DataConsistency(format!(
                "isoform {} has no alignment to another transcript",
                trans
            ))
            .into());
        }

        let best = hits.iter().find_map(|h| {
            if paired.contains(&h.query) {
                Some((h, &h.query, &h.subject))
            } else if paired.contains(&h.subject) {
                Some((h, &h.subject, &h.query))
            } else {
                None
            }
        });

        match best {
            Some((hit, mate, isoform)) => lines.push(format!(
                "{}\t{}\t{}\t{}",
                hit.line(),
                ISOFORM_TYPE,
                mate,
                isoform
            )),
            None => warn!("No paired isoform hit recorded for {}", trans),
        }
    }

    Ok(lines)
}

/// Groups no-isoform-pair transcripts with their unpaired isoforms
///
/// Clusters are numbered from 1 in input order; a transcript already
/// placed through one of its isoforms is not clustered again.
pub fn collapse_isoforms(
    no_isoform_pair: &[String],
    isoforms: &HashMap<String, Vec<Isoform>>,
) -> Vec<ClusterAssignment> {
    let unpaired: HashSet<&String> = no_isoform_pair.iter().collect();
    let mut assigned: HashSet<&String> = HashSet::new();
    let mut assignments = Vec::new();
    let mut cluster = 0;

    for trans in no_isoform_pair {
        if !assigned.insert(trans) {
            continue;
        }

        let mut members = vec![trans];
        if let Some(isos) = isoforms.get(trans) {
            for iso in isos {
                if unpaired.contains(&iso.name) && assigned.insert(&iso.name) {
                    members.push(&iso.name);
                }
            }
        }

        cluster += 1;
        let shared = members.len() > 1;
        assignments.extend(members.into_iter().map(|m| ClusterAssignment {
            transcript: m.clone(),
            cluster,
            shared,
        }));
    }

    info!("Not isoform to paired - collapsed to clusters: {}", cluster);
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hit_line;

    fn hit(q: &str, s: &str, pid: f64, len: u64, qlen: u64, bits: f64) -> AlignmentHit {
        AlignmentHit::parse(&hit_line(q, s, pid, len, qlen, bits), "nor", 1).unwrap()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_isoform_map_thresholds() {
        let nor = vec![
            hit("A", "B", 99.5, 100, 400, 10.0),
            hit("A", "A", 100.0, 400, 400, 10.0),
            hit("A", "C", 98.0, 400, 400, 10.0),
            hit("A", "D", 100.0, 10, 400, 10.0),
            hit("X", "A", 100.0, 400, 400, 10.0),
        ];
        let map = isoform_map(&nor, &names(&["A", "B"]));

        assert_eq!(map.len(), 2);
        assert_eq!(map["A"].len(), 1);
        assert_eq!(map["A"][0].name, "B");
        assert_eq!(map["A"][0].map_ratio, 0.25);
        assert!(map["B"].is_empty());
    }

    #[test]
    fn test_split_unassigned() {
        let nor = vec![hit("A", "P", 100.0, 300, 300, 10.0), hit("B", "C", 100.0, 300, 300, 10.0)];
        let map = isoform_map(&nor, &names(&["A", "B", "C", "P"]));
        let paired: HashSet<String> = names(&["P"]).into_iter().collect();

        let split = split_unassigned(&names(&["A", "B", "C"]), &map, &paired);
        assert_eq!(split.isoform_to_paired, names(&["A"]));
        assert_eq!(split.no_isoform_pair, names(&["B", "C"]));
    }

    #[test]
    fn test_check_isoforms_report() {
        let rc = vec![hit("B", "Z", 90.0, 200, 200, 10.0)];
        let report = check_isoforms(&names(&["B", "C"]), &rc, "h");

        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.candidates[0], "h\ttype");
        assert!(report.candidates[1].ends_with("\tiso"));
        assert_eq!(report.non_irs, names(&["C"]));
        assert_eq!((report.with_rc, report.without_rc), (1, 1));
    }

    #[test]
    fn test_isoform_pairs_best_hit() {
        let nor = vec![
            hit("A", "Q", 100.0, 300, 300, 50.0),
            hit("P", "A", 100.0, 300, 300, 40.0),
            hit("A", "P2", 100.0, 300, 300, 90.0),
        ];
        let paired: HashSet<String> = names(&["P", "P2"]).into_iter().collect();
        let lines = isoform_pairs(&nor, &names(&["A"]), &paired, "h").unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("A\tP2\t"));
        assert!(lines[1].ends_with("\tiso\tP2\tA"));

        let lines = isoform_pairs(&nor[..2], &names(&["A"]), &paired, "h").unwrap();
        assert!(lines[1].ends_with("\tiso\tP\tA"));

        assert!(isoform_pairs(&nor, &names(&["Z"]), &paired, "h").is_err());
    }

    #[test]
    fn test_collapse_isoforms() {
        let nor = vec![
            hit("B", "C", 100.0, 300, 300, 10.0),
            hit("C", "B", 100.0, 300, 300, 10.0),
            hit("D", "P", 100.0, 300, 300, 10.0),
        ];
        let map = isoform_map(&nor, &names(&["B", "C", "D", "P"]));
        let clusters = collapse_isoforms(&names(&["B", "C", "D"]), &map);

        let lines: Vec<String> = clusters.iter().map(|c| c.line()).collect();
        assert_eq!(lines, vec!["B\t1\tY", "C\t1\tY", "D\t2\tN"]);
    }
}
