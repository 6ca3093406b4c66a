//! PARE (degradome) validation of predicted cleavage sites
//!
//! Degradome tags mapped to the transcripts are indexed per gene and
//! location and every location gets a category (0 best, 4 noise) from
//! its abundance. A predicted target is validated when a tag 5' end sits
//! at the 10th, 11th or 12th miRNA position; its p-value is the chance of
//! hitting a site of that category among the miRNA's targets of the same
//! score.

use hashbrown::HashMap;
use log::warn;

use std::collections::BTreeMap;

use config::{
    field, parse_field, split_tabs, FeatureMode, PipelineError, CLEAVAGE_OFFSETS,
    NOISE_PVALUE, NOISE_WINDOW_RATIO, NUM_CATEGORIES, RELAXED_PVALUE, UNIQUE_MAPQ, WINDOW_FLANK,
};

use crate::core::score::ScoredTarget;

/// Run-wide PARE settings, fixed once from the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PareConfig {
    pub mode: FeatureMode,
    pub tag_len: usize,
    pub repeats: bool,
    pub noise_filter: bool,
    pub keep_cat4: bool,
}

/// Abundance and category of one degradome location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PareSite {
    pub abundance: u64,
    pub category: usize,
}

/// Tag abundances per gene and location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PareIndex {
    pub genes: BTreeMap<String, BTreeMap<i64, u64>>,
    /// abundances above 2, one entry per mapped location
    pub hits: Vec<u64>,
}

/// Categorised degradome sites of one library
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTable {
    pub genes: BTreeMap<String, BTreeMap<i64, PareSite>>,
    pub counts: [usize; NUM_CATEGORIES],
}

/// Transcriptome base counts used as the category denominators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseCounts {
    pub unambiguous: i64,
    pub eligible: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cleavage {
    pub location: i64,
    pub abundance: u64,
    pub category: usize,
}

/// A target with a degradome tag at its cleavage site
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTarget {
    pub target: ScoredTarget,
    pub cleavage: Cleavage,
    pub window: u64,
    pub ratio: f64,
    pub pvalue: f64,
    pub corrected: f64,
}

impl ValidatedTarget {
    pub fn line(&self) -> String {
        format!(
            "{},{},{},{},{:?},{},{:.6},{:.6}",
            self.target.line(),
            self.cleavage.location,
            self.cleavage.abundance,
            self.window,
            self.ratio,
            self.cleavage.category,
            self.pvalue,
            self.corrected
        )
    }

    pub fn passes(&self, config: &PareConfig) -> bool {
        if config.noise_filter {
            self.corrected <= NOISE_PVALUE
                && self.ratio >= NOISE_WINDOW_RATIO
                && (config.keep_cat4 || self.cleavage.category != 4)
        } else {
            self.corrected < RELAXED_PVALUE
        }
    }
}

/// Gene locations of every mapped tag sequence
///
/// # Arguments
///
/// * `contents` - SAM-like PARE map: gene 2, location 3, MAPQ 4, sequence 9
/// * `repeats` - keep multi-mapping tags; otherwise only MAPQ 255
pub fn parse_pare_map(
    contents: &str,
    file: &str,
    repeats: bool,
) -> Result<HashMap<String, BTreeMap<String, Vec<i64>>>, PipelineError> {
    let mut mapped: HashMap<String, BTreeMap<String, Vec<i64>>> = HashMap::new();

    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('@') {
            continue;
        }

        let fields = split_tabs(line);
        if !repeats && field(&fields, 4, file, i + 1)? != UNIQUE_MAPQ {
            continue;
        }

        let gene = field(&fields, 2, file, i + 1)?;
        let location: i64 = parse_field(&fields, 3, file, i + 1)?;
        let sequence = field(&fields, 9, file, i + 1)?;

        mapped
            .entry(sequence.to_string())
            .or_default()
            .entry(gene.to_string())
            .or_default()
            .push(location);
    }

    Ok(mapped)
}

/// `sequence\tabundance` tag counts in file order
pub fn parse_tag_counts(contents: &str, file: &str) -> Result<Vec<(String, u64)>, PipelineError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let fields = split_tabs(line);
            Ok((
                field(&fields, 0, file, i + 1)?.to_string(),
                parse_field(&fields, 1, file, i + 1)?,
            ))
        })
        .collect()
}

/// Spreads every tag abundance over the locations the tag maps to
///
/// A location reached by several tags keeps the last one.
pub fn build_index(
    mapped: &HashMap<String, BTreeMap<String, Vec<i64>>>,
    tags: &[(String, u64)],
) -> PareIndex {
    let mut index = PareIndex::default();

    for (sequence, abundance) in tags {
        let Some(genes) = mapped.get(sequence) else {
            continue;
        };

        for (gene, locations) in genes {
            let sites = index.genes.entry(gene.clone()).or_default();
            for &location in locations {
                sites.insert(location, *abundance);
                if *abundance > 2 {
                    index.hits.push(*abundance);
                }
            }
        }
    }

    index
}

/// Linear-interpolated percentile of sorted values; NaN when empty
pub fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac
}

/// Assigns a category to every indexed location
///
/// Genic: 4 for single reads, 3 up to the gene median, 2 above the median
/// but below the gene maximum, 1 for a shared maximum, 0 for the unique
/// maximum. Intergenic: 4 up to 2 reads, then 3, 2 and 1 up to the
/// global median, 75th and 90th percentiles, 0 above.
pub fn categorize(index: &PareIndex, mode: FeatureMode) -> PageTable {
    let mut table = PageTable::default();

    let mut global = index.hits.clone();
    global.sort_unstable();
    let (median, p75, p90) = (
        percentile(&global, 50.0),
        percentile(&global, 75.0),
        percentile(&global, 90.0),
    );

    for (gene, sites) in &index.genes {
        let mut values: Vec<u64> = sites.values().copied().collect();
        values.sort_unstable();
        let gene_median = percentile(&values, 50.0);
        let max = values.last().copied().unwrap_or_default();
        let shared_max = values.iter().filter(|&&v| v == max).count() > 1;

        let categorized = sites
            .iter()
            .map(|(&location, &abundance)| {
                let hits = abundance as f64;
                let category = match mode {
                    FeatureMode::Genic => {
                        if abundance == 1 {
                            4
                        } else if hits <= gene_median {
                            3
                        } else if abundance != max {
                            2
                        } else if shared_max {
                            1
                        } else {
                            0
                        }
                    }
                    FeatureMode::Intergenic => {
                        if abundance <= 2 {
                            4
                        } else if hits <= median {
                            3
                        } else if hits <= p75 {
                            2
                        } else if hits <= p90 {
                            1
                        } else {
                            0
                        }
                    }
                };

                table.counts[category] += 1;
                (location, PareSite { abundance, category })
            })
            .collect();

        table.genes.insert(gene.clone(), categorized);
    }

    table
}

/// Unambiguous and tag-eligible bases of a transcriptome
///
/// Eligible bases exclude `tag_len` bases at each transcript end and the
/// N bases between them.
pub fn count_bases<'a, I>(sequences: I, tag_len: usize) -> BaseCounts
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BaseCounts::default();

    for seq in sequences {
        let bytes = seq.as_bytes();
        let ns = |s: &[u8]| s.iter().filter(|&&b| b == b'N').count() as i64;

        counts.unambiguous += bytes.len() as i64 - ns(bytes);

        let inner = if bytes.len() > 2 * tag_len {
            &bytes[tag_len..bytes.len() - tag_len]
        } else {
            &[][..]
        };
        counts.eligible += bytes.len() as i64 - 2 * tag_len as i64 - ns(inner);
    }

    counts
}

/// Fraction of eligible bases in each category
pub fn category_fractions(
    table: &PageTable,
    bases: &BaseCounts,
) -> Result<[f64; NUM_CATEGORIES], PipelineError> {
    if bases.eligible <= 0 {
        return Err(PipelineError::DataConsistency(format!(
            "transcriptome has no eligible bases ({})",
            bases.eligible
        )));
    }

    let mut fractions = [0.0; NUM_CATEGORIES];
    for (fraction, count) in fractions.iter_mut().zip(table.counts.iter()) {
        *fraction = *count as f64 / bases.eligible as f64;
    }

    Ok(fractions)
}

/// `<library>_PAGe.txt` lines: sites per gene then the `#` footer
pub fn page_lines(
    table: &PageTable,
    bases: &BaseCounts,
    fractions: &[f64; NUM_CATEGORIES],
    transcriptome: &str,
) -> Vec<String> {
    let mut lines = Vec::new();

    for (gene, sites) in &table.genes {
        lines.push(format!(">{}", gene));
        lines.extend(
            sites
                .iter()
                .map(|(loc, site)| format!("{}\t{}\t{}", loc, site.abundance, site.category)),
        );
    }

    lines.push(format!("# Transcriptome={}", transcriptome));
    lines.push(format!("# Genes={}", table.genes.len()));
    lines.push(format!("# Uncorrected non-ambiguous bases={}", bases.unambiguous));
    lines.push(format!(
        "# Eligible bases for degradome-derived 5 prime ends={}",
        bases.eligible
    ));
    for (i, count) in table.counts.iter().enumerate() {
        lines.push(format!("# Category {}_bases={}", i, count));
    }
    for (i, fraction) in fractions.iter().enumerate() {
        lines.push(format!("# Category {}_fraction={:?}", i, fraction));
    }

    lines
}

/// Best degradome site among the 10th to 12th miRNA positions
///
/// Lowest category wins, then highest abundance, then the position
/// closest to the binding-site end.
pub fn find_cleavage(sites: &BTreeMap<i64, PareSite>, end: i64) -> Option<Cleavage> {
    let mut best: Option<Cleavage> = None;

    for offset in CLEAVAGE_OFFSETS {
        let location = end - offset;
        let Some(site) = sites.get(&location) else {
            continue;
        };

        let better = match best {
            None => true,
            Some(b) => {
                site.category < b.category
                    || (site.category == b.category && site.abundance > b.abundance)
            }
        };

        if better {
            best = Some(Cleavage {
                location,
                abundance: site.abundance,
                category: site.category,
            });
        }
    }

    best
}

/// Tag abundance within `WINDOW_FLANK` nt of a location
pub fn window_abundance(sites: &BTreeMap<i64, PareSite>, location: i64) -> u64 {
    sites
        .range(location - WINDOW_FLANK..=location + WINDOW_FLANK)
        .map(|(_, site)| site.abundance)
        .sum()
}

/// Targets of a miRNA competing at the same score
///
/// Fractional scores compare on their integer part, whole scores
/// compare exactly.
pub fn same_score_targets(targets: &[ScoredTarget], mirna: &str, score: f64) -> usize {
    targets
        .iter()
        .filter(|t| t.mirna == mirna)
        .filter(|t| {
            if score.fract() != 0.0 {
                t.score.trunc() == score.trunc()
            } else {
                t.score == score
            }
        })
        .count()
}

/// `1 - (1 - f)^n`, the chance of at least one site of frequency f in n tries
pub fn binomial_pvalue(fraction: f64, n: usize) -> f64 {
    let miss = 1.0 - fraction;
    match i32::try_from(n) {
        Ok(n) => 1.0 - miss.powi(n),
        Err(_) => 1.0 - miss.powf(n as f64),
    }
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// Validates every target against one library's categorised sites
///
/// # Arguments
///
/// * `targets` - scored targets, all miRNAs
/// * `table` - categorised degradome sites
/// * `fractions` - category fractions of eligible bases
///
/// # Returns
///
/// * `Vec<ValidatedTarget>` - targets with a tag at a cleavage position,
///   unfiltered
pub fn validate_targets(
    targets: &[ScoredTarget],
    table: &PageTable,
    fractions: &[f64; NUM_CATEGORIES],
) -> Vec<ValidatedTarget> {
    let mut validated = Vec::new();

    for target in targets {
        let Some(sites) = table.genes.get(&target.target) else {
            continue;
        };
        let Some(end) = target.bind_end() else {
            warn!(
                "Binding site '{}' of {} on {} cannot be read, skipping",
                target.bind_site, target.mirna, target.target
            );
            continue;
        };
        let Some(cleavage) = find_cleavage(sites, end) else {
            continue;
        };

        let window = window_abundance(sites, cleavage.location);
        let ratio = cleavage.abundance as f64 / window as f64;

        let n = same_score_targets(targets, &target.mirna, target.score);
        let pvalue = round6(binomial_pvalue(fractions[cleavage.category], n));

        validated.push(ValidatedTarget {
            target: target.clone(),
            cleavage,
            window,
            ratio,
            pvalue,
            corrected: pvalue / ratio,
        });
    }

    validated
}

/// Orders targets by miRNA then score
pub fn sort_targets(targets: &mut [ScoredTarget]) {
    targets.sort_by(|a, b| {
        a.mirna
            .cmp(&b.mirna)
            .then(a.score.total_cmp(&b.score))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(mirna: &str, gene: &str, bind: &str, score: f64) -> ScoredTarget {
        ScoredTarget {
            mirna: mirna.to_string(),
            target: gene.to_string(),
            bind_site: bind.to_string(),
            mir_seq: "UGCA".to_string(),
            tar_seq: "ACGU".to_string(),
            score,
            mismatch: "4".to_string(),
            cigar: "4M".to_string(),
        }
    }

    fn sites(entries: &[(i64, u64, usize)]) -> BTreeMap<i64, PareSite> {
        entries
            .iter()
            .map(|&(loc, abundance, category)| (loc, PareSite { abundance, category }))
            .collect()
    }

    #[test]
    fn test_pare_map_unique_filter() {
        let map = "1\t0\tG1\t10\t255\t20M\t*\t0\t0\tAAAA\n\
                   2\t0\tG2\t30\t1\t20M\t*\t0\t0\tAAAA\n\
                   3\t0\tG1\t50\t255\t20M\t*\t0\t0\tCCCC\n";

        let unique = parse_pare_map(map, "m", false).unwrap();
        assert_eq!(unique["AAAA"].len(), 1);
        assert_eq!(unique["AAAA"]["G1"], vec![10]);

        let all = parse_pare_map(map, "m", true).unwrap();
        assert_eq!(all["AAAA"].len(), 2);
    }

    #[test]
    fn test_build_index_spreads_abundance() {
        let mapped = parse_pare_map(
            "1\t0\tG1\t10\t255\t*\t*\t0\t0\tAAAA\n1\t0\tG1\t20\t255\t*\t*\t0\t0\tAAAA\n",
            "m",
            false,
        )
        .unwrap();
        let tags = parse_tag_counts("AAAA\t5\nGGGG\t9\n", "t").unwrap();
        let index = build_index(&mapped, &tags);

        assert_eq!(index.genes["G1"].len(), 2);
        assert_eq!(index.genes["G1"][&20], 5);
        assert_eq!(index.hits, vec![5, 5]);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1, 2, 3, 4];
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 75.0), 3.25);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_genic_categories() {
        let mut index = PareIndex::default();
        index.genes.insert(
            "G1".to_string(),
            [(1, 1), (2, 3), (3, 5), (4, 9), (5, 12)].into_iter().collect(),
        );
        index.genes.insert("G2".to_string(), [(1, 7), (2, 7)].into_iter().collect());

        let table = categorize(&index, FeatureMode::Genic);
        let cats: Vec<usize> = table.genes["G1"].values().map(|s| s.category).collect();
        // median 5
        assert_eq!(cats, vec![4, 3, 3, 2, 0]);
        // a shared maximum equals the median
        let cats: Vec<usize> = table.genes["G2"].values().map(|s| s.category).collect();
        assert_eq!(cats, vec![3, 3]);
        assert_eq!(table.counts, [1, 0, 1, 4, 1]);
    }

    #[test]
    fn test_genic_shared_maximum() {
        let mut index = PareIndex::default();
        index.genes.insert(
            "G1".to_string(),
            [(1, 2), (2, 3), (3, 9), (4, 9)].into_iter().collect(),
        );

        let table = categorize(&index, FeatureMode::Genic);
        let cats: Vec<usize> = table.genes["G1"].values().map(|s| s.category).collect();
        // median 6
        assert_eq!(cats, vec![3, 3, 1, 1]);
    }

    #[test]
    fn test_intergenic_categories() {
        let mut index = PareIndex::default();
        index.genes.insert(
            "G1".to_string(),
            [(1, 2), (2, 3), (3, 5), (4, 8), (5, 20)].into_iter().collect(),
        );
        index.hits = vec![3, 5, 8, 20, 4, 6, 7, 9, 10, 11];

        // sorted 3 4 5 6 7 8 9 10 11 20: median 7.5, p75 9.75, p90 11.9
        let table = categorize(&index, FeatureMode::Intergenic);
        let cats: Vec<usize> = table.genes["G1"].values().map(|s| s.category).collect();
        assert_eq!(cats, vec![4, 3, 3, 2, 0]);
    }

    #[test]
    fn test_count_bases() {
        let seqs = ["AAAANNAAAA", "ACGT"];
        let counts = count_bases(seqs.iter().copied(), 2);

        assert_eq!(counts.unambiguous, 8 + 4);
        // (10 - 4) - 2 and (4 - 4) - 0
        assert_eq!(counts.eligible, 4);
    }

    #[test]
    fn test_find_cleavage_rules() {
        // end 30: positions 21, 20, 19
        let s = sites(&[(21, 4, 2), (20, 9, 1), (19, 3, 1)]);
        let c = find_cleavage(&s, 30).unwrap();
        assert_eq!((c.location, c.category), (20, 1));

        let s = sites(&[(21, 5, 1), (20, 5, 1), (19, 8, 3)]);
        assert_eq!(find_cleavage(&s, 30).unwrap().location, 21);

        let s = sites(&[(25, 5, 0)]);
        assert!(find_cleavage(&s, 30).is_none());
    }

    #[test]
    fn test_window_and_pvalue() {
        let s = sites(&[(10, 2, 4), (15, 6, 0), (20, 2, 4), (21, 100, 0)]);
        assert_eq!(window_abundance(&s, 15), 10);

        assert!((binomial_pvalue(0.1, 2) - 0.19).abs() < 1e-12);
        assert_eq!(binomial_pvalue(0.3, 0), 0.0);
    }

    #[test]
    fn test_pvalue_beyond_i32_counts() {
        let n = i32::MAX as usize + 1;
        let p = binomial_pvalue(1e-12, n);

        assert!(p > binomial_pvalue(1e-12, 1_000_000));
        assert!((p - 0.002145).abs() < 1e-5);
    }

    #[test]
    fn test_same_score_targets() {
        let targets = vec![
            target("miR1", "G1", "1-21", 3.0),
            target("miR1", "G2", "1-21", 3.5),
            target("miR1", "G3", "1-21", 4.0),
            target("miR2", "G1", "1-21", 3.0),
        ];

        assert_eq!(same_score_targets(&targets, "miR1", 3.0), 1);
        assert_eq!(same_score_targets(&targets, "miR1", 3.5), 2);
    }

    #[test]
    fn test_validate_targets_and_filter() {
        let mut table = PageTable::default();
        table
            .genes
            .insert("G1".to_string(), sites(&[(90, 40, 0), (97, 10, 3)]));
        let fractions = [0.1, 0.01, 0.02, 0.05, 0.5];

        let targets = vec![
            target("miR1", "G1", "80-100", 2.0),
            target("miR1", "G2", "80-100", 2.0),
            target("miR2", "G1", "70-95", 1.0),
        ];
        let validated = validate_targets(&targets, &table, &fractions);

        assert_eq!(validated.len(), 1);
        let v = &validated[0];
        assert_eq!(v.cleavage.location, 90);
        assert_eq!(v.window, 40);
        assert_eq!(v.ratio, 1.0);
        // two miR1 targets at score 2.0
        assert_eq!(v.pvalue, 0.19);
        assert!(v.line().ends_with(",90,40,40,1.0,0,0.190000,0.190000"));

        let config = PareConfig {
            mode: FeatureMode::Genic,
            tag_len: 20,
            repeats: false,
            noise_filter: true,
            keep_cat4: false,
        };
        assert!(v.passes(&config));
    }

    #[test]
    fn test_noise_filter_rules() {
        let mut v = ValidatedTarget {
            target: target("miR1", "G1", "1-21", 2.0),
            cleavage: Cleavage {
                location: 10,
                abundance: 2,
                category: 4,
            },
            window: 10,
            ratio: 0.2,
            pvalue: 0.04,
            corrected: 0.2,
        };
        let mut config = PareConfig {
            mode: FeatureMode::Genic,
            tag_len: 20,
            repeats: false,
            noise_filter: true,
            keep_cat4: true,
        };

        // low window ratio
        assert!(!v.passes(&config));
        v.ratio = 0.5;
        assert!(v.passes(&config));
        config.keep_cat4 = false;
        assert!(!v.passes(&config));

        config.noise_filter = false;
        v.corrected = 0.49;
        assert!(v.passes(&config));
        v.corrected = 0.5;
        assert!(!v.passes(&config));
    }
}
