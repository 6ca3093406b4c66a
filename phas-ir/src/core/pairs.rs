use hashbrown::HashSet;

use std::cmp::Ordering;

use config::{MIN_PAIR_ALIGN_LEN, MIN_PAIR_IDENTITY, MIN_PAIR_LEN_RATIO, PAIR_TYPE};

use crate::record::{AlignmentHit, CandidatePair, TranscriptSet};

/// Outcome of greedy pair inference
#[derive(Debug, Default, Clone)]
pub struct PairInference {
    /// accepted pairs in bit-score-descending order
    pub pairs: Vec<CandidatePair>,
    /// transcripts claimed by an accepted pair
    pub candidates: HashSet<String>,
    /// every transcript seen as query or subject
    pub all: HashSet<String>,
}

impl PairInference {
    /// uniqPairs.txt rows, header included
    pub fn lines(&self, header: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.pairs.len() + 1);
        lines.push(format!("{}\ttype", header));
        lines.extend(
            self.pairs
                .iter()
                .map(|pair| format!("{}\t{}", pair.hit.line(), pair.kind)),
        );

        lines
    }
}

/// Selects the best-scoring, non-conflicting transcript pairs
///
/// # Arguments
///
/// * `hits` - reverse-complement hits between phased transcripts
/// * `transcripts` - transcript lengths; a transcript absent from the
///   collection falls back to the hit's query length
///
/// # Returns
///
/// * `PairInference` - accepted pairs and the transcript sets
///
/// # Example
///
/// ```rust, ignore
/// let inference = infer_pairs(&rc.hits, &transcripts);
/// assert!(inference.pairs.len() * 2 >= inference.candidates.len());
/// ```
pub fn infer_pairs(hits: &[AlignmentHit], transcripts: &TranscriptSet) -> PairInference {
    let mut sorted: Vec<&AlignmentHit> = hits.iter().collect();
    // stable: equal scores keep input order
    sorted.sort_by(|a, b| {
        b.bitscore
            .partial_cmp(&a.bitscore)
            .unwrap_or(Ordering::Equal)
    });

    let mut inference = PairInference::default();

    for hit in sorted {
        inference.all.insert(hit.query.clone());
        inference.all.insert(hit.subject.clone());

        if inference.candidates.contains(&hit.query) || inference.candidates.contains(&hit.subject)
        {
            continue;
        }

        if !passes_thresholds(hit, transcripts) {
            continue;
        }

        inference.candidates.insert(hit.query.clone());
        inference.candidates.insert(hit.subject.clone());
        inference.pairs.push(CandidatePair::from_hit(hit, PAIR_TYPE));
    }

    inference
}

fn passes_thresholds(hit: &AlignmentHit, transcripts: &TranscriptSet) -> bool {
    let len5 = transcripts
        .length_of(&hit.query)
        .unwrap_or(hit.query_length);
    let len3 = transcripts
        .length_of(&hit.subject)
        .unwrap_or(hit.query_length);
    let min_len = len5.min(len3) as f64 * MIN_PAIR_LEN_RATIO;

    hit.length >= MIN_PAIR_ALIGN_LEN
        && hit.identity >= MIN_PAIR_IDENTITY
        && hit.length as f64 >= min_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{hit_line, Transcript};

    fn hit(q: &str, s: &str, pid: f64, len: u64, bits: f64) -> AlignmentHit {
        AlignmentHit::parse(&hit_line(q, s, pid, len, len, bits), "rc.txt", 1).unwrap()
    }

    fn transcripts(spec: &[(&str, usize)]) -> TranscriptSet {
        TranscriptSet::new(
            spec.iter()
                .map(|(name, len)| Transcript::new(name, &"A".repeat(*len)))
                .collect(),
        )
    }

    #[test]
    fn test_pairs_are_disjoint() {
        let hits = vec![
            hit("A", "B", 95.0, 250, 500.0),
            hit("B", "C", 95.0, 250, 450.0),
            hit("C", "D", 95.0, 250, 400.0),
            hit("A", "D", 95.0, 250, 390.0),
        ];
        let set = transcripts(&[("A", 300), ("B", 300), ("C", 300), ("D", 300)]);
        let inference = infer_pairs(&hits, &set);

        assert_eq!(inference.pairs.len(), 2);

        let mut seen = HashSet::new();
        for pair in &inference.pairs {
            assert!(seen.insert(pair.transcript5.clone()));
            assert!(seen.insert(pair.transcript3.clone()));
        }
        assert_eq!(inference.all.len(), 4);
    }

    #[test]
    fn test_higher_bitscore_claims_first() {
        // lower score listed first; sorting must let B-C win
        let hits = vec![hit("A", "B", 95.0, 250, 100.0), hit("B", "C", 95.0, 250, 900.0)];
        let set = transcripts(&[("A", 300), ("B", 300), ("C", 300)]);
        let inference = infer_pairs(&hits, &set);

        assert_eq!(inference.pairs.len(), 1);
        assert_eq!(inference.pairs[0].transcript5, "B");
        assert_eq!(inference.pairs[0].transcript3, "C");
        assert!(!inference.candidates.contains("A"));
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let hits = vec![hit("A", "B", 95.0, 250, 300.0), hit("B", "C", 95.0, 250, 300.0)];
        let set = transcripts(&[("A", 300), ("B", 300), ("C", 300)]);
        let inference = infer_pairs(&hits, &set);

        assert_eq!(inference.pairs[0].transcript5, "A");
    }

    #[test]
    fn test_self_pair_is_accepted() {
        let hits = vec![hit("T1", "T1", 90.0, 200, 300.0)];
        let set = transcripts(&[("T1", 200)]);
        let inference = infer_pairs(&hits, &set);

        assert_eq!(inference.pairs.len(), 1);
        assert!(inference.pairs[0].is_self_pair());
        assert_eq!(inference.candidates.len(), 1);
    }

    #[test]
    fn test_length_floor_overrides_identity() {
        let hits = vec![hit("geneA", "geneB", 92.0, 140, 250.0)];
        let set = transcripts(&[("geneA", 150), ("geneB", 150)]);
        let inference = infer_pairs(&hits, &set);

        assert!(inference.pairs.is_empty());
        assert!(inference.candidates.is_empty());
        assert_eq!(inference.all.len(), 2);
    }

    #[test]
    fn test_identity_and_ratio_thresholds() {
        let set = transcripts(&[("A", 1000), ("B", 1000), ("C", 250), ("D", 250)]);

        // 200 < 0.70 * 1000
        let inference = infer_pairs(&[hit("A", "B", 99.0, 200, 300.0)], &set);
        assert!(inference.pairs.is_empty());

        let inference = infer_pairs(&[hit("C", "D", 84.9, 200, 300.0)], &set);
        assert!(inference.pairs.is_empty());

        let inference = infer_pairs(&[hit("C", "D", 85.0, 200, 300.0)], &set);
        assert_eq!(inference.pairs.len(), 1);
    }

    #[test]
    fn test_uniq_pairs_lines() {
        let hits = vec![hit("T1", "T2", 90.0, 200, 300.0)];
        let set = transcripts(&[("T1", 200), ("T2", 200)]);
        let lines = infer_pairs(&hits, &set).lines("h1\th2");

        assert_eq!(lines[0], "h1\th2\ttype");
        assert!(lines[1].ends_with("\tIR"));
        assert!(lines[1].starts_with("T1\tT2\t"));
    }
}
