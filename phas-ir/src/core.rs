//! Core module for validating inverted-repeat derived phasiRNA loci
//!
//! This module drives the whole IR pipeline: candidate pairs are inferred
//! from all-vs-all reverse-complement hits between phased transcripts,
//! each pair is folded with einverted and the phase positions of both arms
//! are projected onto the hairpin. Pairs whose arms overlap in phase are
//! scored by overhang consensus and called IR, Fo (foldback only) or No.
//!
//! Transcripts left without an IR pair are then summarised through their
//! isoforms, and, when library maps are given, chart inputs are written
//! per library in parallel.

use anyhow::{Context, Result};
use hashbrown::HashSet;
use log::info;
use serde::Serialize;

use std::fs::create_dir_all;
use std::path::PathBuf;

use config::{
    write_collection, write_summary, CoordMatch, PhaseMode, CANDIDATE_NON_IRS, FINAL_PAIRS,
    IR_SUMMARY, ISOFORM_TO_PAIRED, NON_IRS, NO_ISO_CLUSTERS, PHASED_CLUST, UNIQ_PAIRS,
};

use crate::cli::{ChartArgs, ValidateArgs};
use crate::record::IrStatus;
use crate::utils::{read_blast, read_clusters, read_fasta, read_final_pairs, read_phased_loci};

pub mod chart;
pub mod einverted;
pub mod geometry;
pub mod isoform;
pub mod overhang;
pub mod pairs;
pub mod phase;
pub mod validate;

use chart::{chart_pairs, load_phased_clust, write_charts};
use einverted::{Einverted, InvertedRepeatFinder};
use isoform::{check_isoforms, collapse_isoforms, isoform_map, isoform_pairs, split_unassigned};
use pairs::infer_pairs;
use validate::validate_pairs;

/// Run-wide phase settings, fixed once from the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrConfig {
    pub phase: i64,
    pub mode: PhaseMode,
    pub coord_match: CoordMatch,
}

/// Totals of one validation run, written as summary.json
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct IrSummary {
    pub phased_loci: usize,
    pub phased_transcripts: usize,
    pub rc_hits: usize,
    pub nor_hits: usize,
    pub comp_hits: usize,
    pub candidate_pairs: usize,
    pub tested_combinations: usize,
    pub ir: usize,
    pub foldback: usize,
    pub not_ir: usize,
    pub paired: usize,
    pub unassigned: usize,
    pub isoform_to_paired: usize,
    pub no_isoform_pair: usize,
    pub non_ir_with_rc: usize,
    pub non_ir_without_rc: usize,
    pub isoform_clusters: usize,
    pub charts: Vec<PathBuf>,
}

/// Validates IR pairs from scratch
///
/// # Arguments
///
/// * `args` - validate subcommand arguments
///
/// # Returns
///
/// * `Result<IrSummary>` - run totals; every table is written to `args.outdir`
///
/// # Example
///
/// ```rust, ignore
/// let Command::Validate(args) = Args::from(vec!["validate".into(), "--fasta".into(), ...]).command
/// else { unreachable!() };
/// let summary = run_validate(args).unwrap();
/// ```
pub fn run_validate(args: ValidateArgs) -> Result<IrSummary> {
    info!("Validating IR-based phased loci...");
    let config = args.ir_config()?;
    let finder = Einverted::new(args.einverted_params());

    run_validate_with(&args, &config, &finder)
}

/// same as [`run_validate`] with an explicit inverted-repeat finder
pub fn run_validate_with<F: InvertedRepeatFinder + ?Sized>(
    args: &ValidateArgs,
    config: &IrConfig,
    finder: &F,
) -> Result<IrSummary> {
    create_dir_all(&args.outdir)
        .with_context(|| format!("cannot create output directory {:?}", args.outdir))?;
    let out = |name: &str| args.outdir.join(name);

    let (loci, phased) = read_phased_loci(&args.phased)?;
    let rc = read_blast(&args.blast_rc)?;
    let nor = read_blast(&args.blast_nor)?;
    let comp = match &args.blast_comp {
        Some(path) => read_blast(path)?.len(),
        None => 0,
    };
    info!(
        "Entries in BLAST_RC: {} | BLAST_NOR: {} | BLAST_COMP: {}",
        rc.len(),
        nor.len(),
        comp
    );

    let transcripts = read_fasta(&args.fasta)?;
    let clusters = read_clusters(&args.cluster)?;

    let inference = infer_pairs(&rc.hits, &transcripts);
    info!(
        "Candidate pairs: {} | Transcripts in RC hits: {}",
        inference.pairs.len(),
        inference.all.len()
    );
    write_collection(&inference.lines(&rc.header), out(UNIQ_PAIRS))?;

    let outcome = validate_pairs(
        &inference.pairs,
        &loci,
        &phased,
        &clusters,
        &transcripts,
        finder,
        config,
    )?;
    write_collection(&outcome.lines(&rc.header), out(FINAL_PAIRS))?;
    write_collection(&outcome.clusters, out(PHASED_CLUST))?;

    let paired: HashSet<String> = outcome.paired.iter().cloned().collect();
    let isoforms = isoform_map(&nor.hits, &phased);
    let split = split_unassigned(&outcome.unassigned, &isoforms, &paired);

    let report = check_isoforms(&split.no_isoform_pair, &rc.hits, &rc.header);
    write_collection(&report.candidates, out(CANDIDATE_NON_IRS))?;
    write_collection(&report.non_irs, out(NON_IRS))?;

    let iso_lines = isoform_pairs(&nor.hits, &split.isoform_to_paired, &paired, &rc.header)?;
    write_collection(&iso_lines, out(ISOFORM_TO_PAIRED))?;

    let clusters = collapse_isoforms(&split.no_isoform_pair, &isoforms);
    let mut cluster_lines = vec!["Trans\tClust_id\tClustFlag".to_string()];
    cluster_lines.extend(clusters.iter().map(|c| c.line()));
    write_collection(&cluster_lines, out(NO_ISO_CLUSTERS))?;

    let charts = if args.maps.is_empty() {
        Vec::new()
    } else {
        let pairs = chart_pairs(&outcome.results, &transcripts, finder)?;
        let phased_clust = load_phased_clust(&out(PHASED_CLUST))?;
        write_charts(&pairs, &phased_clust, &args.maps, &args.outdir)?
    };

    let summary = IrSummary {
        phased_loci: loci.len(),
        phased_transcripts: phased.len(),
        rc_hits: rc.len(),
        nor_hits: nor.len(),
        comp_hits: comp,
        candidate_pairs: inference.pairs.len(),
        tested_combinations: outcome.results.len(),
        ir: outcome.count(IrStatus::Ir),
        foldback: outcome.count(IrStatus::Fo),
        not_ir: outcome.count(IrStatus::No),
        paired: outcome.paired.len(),
        unassigned: outcome.unassigned.len(),
        isoform_to_paired: split.isoform_to_paired.len(),
        no_isoform_pair: split.no_isoform_pair.len(),
        non_ir_with_rc: report.with_rc,
        non_ir_without_rc: report.without_rc,
        isoform_clusters: clusters.last().map_or(0, |c| c.cluster),
        charts,
    };
    write_summary(&summary, out(IR_SUMMARY))?;

    Ok(summary)
}

/// Writes chart inputs from a previous validation run
///
/// # Arguments
///
/// * `args` - chart subcommand arguments
///
/// # Returns
///
/// * `Result<Vec<PathBuf>>` - written chart files
pub fn run_chart(args: ChartArgs) -> Result<Vec<PathBuf>> {
    info!("Preparing chart inputs from previous results...");
    let finder = Einverted::new(args.einverted_params());

    run_chart_with(&args, &finder)
}

/// same as [`run_chart`] with an explicit inverted-repeat finder
pub fn run_chart_with<F: InvertedRepeatFinder + ?Sized>(
    args: &ChartArgs,
    finder: &F,
) -> Result<Vec<PathBuf>> {
    create_dir_all(&args.outdir)
        .with_context(|| format!("cannot create output directory {:?}", args.outdir))?;

    let results = read_final_pairs(&args.pairs)?;
    let transcripts = read_fasta(&args.fasta)?;
    let phased = load_phased_clust(&args.clust)?;

    let pairs = chart_pairs(&results, &transcripts, finder)?;
    write_charts(&pairs, &phased, &args.maps, &args.outdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::einverted::{coords, MockFinder};
    use crate::record::hit_line;

    fn write(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn read_line(strand: &str, pos: i64, seq: &str) -> String {
        format!("0\t1\t{strand}\t{pos}\tr|{pos}\t{seq}\t21\t5\tq\tq\tHits=1")
    }

    #[test]
    fn test_end_to_end_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        let fasta = write(
            path,
            "phas.fa",
            &format!(
                ">T1\n{}\n>T2\n{}\n>T3\n{}\n>T4\n{}\n",
                "A".repeat(200),
                "C".repeat(200),
                "G".repeat(200),
                "T".repeat(200)
            ),
        );
        let rc = write(
            path,
            "rc.txt",
            &format!(
                "header\n{}\n{}\n",
                hit_line("T1", "T2", 95.0, 190, 200, 500.0),
                hit_line("T3", "T9", 80.0, 190, 200, 100.0)
            ),
        );
        let nor = write(
            path,
            "nor.txt",
            &format!(
                "header\n{}\n{}\n",
                hit_line("T3", "T4", 100.0, 190, 200, 90.0),
                hit_line("T4", "T3", 100.0, 190, 200, 90.0)
            ),
        );
        let phased = write(
            path,
            "phas.csv",
            "name\tpval\ttrans\tstart\tend\tstrand\tlib\n\
             L1\t1e-9\tT1\t1\t200\tw\t1\n\
             L2\t1e-9\tT2\t1\t200\tw\t1\n\
             L3\t1e-9\tT3\t1\t200\tw\t1\n\
             L4\t1e-9\tT4\t1\t200\tw\t1\n",
        );
        let cluster = write(
            path,
            "all.cluster",
            &format!(
                ">Cluster 1 c1 x y z T1 a b c 1 d 200\n{}\n{}\n\
                 >Cluster 2 c2 x y z T2 a b c 1 d 200\n{}\n{}\n",
                read_line("+", 1, "AAAA"),
                read_line("+", 22, "CCCC"),
                read_line("+", 77, "GGGG"),
                read_line("+", 98, "TTTT"),
            ),
        );
        let map = write(path, "lib1.map", "Tag1_12\t+\tT1\t1\tAAAA\tIIII\t0\t\n");
        let outdir = path.join("out");

        let args = ValidateArgs {
            fasta,
            blast_rc: rc,
            blast_nor: nor,
            blast_comp: None,
            phased,
            cluster,
            maps: vec![map.clone()],
            phase: 21,
            mode: "O".to_string(),
            coord_match: "strict".to_string(),
            einverted: "einverted".to_string(),
            gap: 12,
            threshold: 100,
            match_score: 3,
            mismatch: -4,
            max_repeat: 5000,
            threads: 1,
            outdir: outdir.clone(),
        };
        let config = args.ir_config().unwrap();

        let mut answers = hashbrown::HashMap::new();
        answers.insert("T1-T2".to_string(), vec![coords("T1-T2", 1, 100, 201, 300)]);
        let finder = MockFinder(answers);

        let summary = run_validate_with(&args, &config, &finder).unwrap();

        assert_eq!(summary.candidate_pairs, 1);
        assert_eq!(summary.ir, 1);
        assert_eq!(summary.paired, 2);
        assert_eq!(summary.unassigned, 2);
        assert_eq!(summary.no_isoform_pair, 2);
        assert_eq!(summary.non_ir_with_rc, 1);
        assert_eq!(summary.non_ir_without_rc, 1);
        assert_eq!(summary.isoform_clusters, 1);

        let final_pairs = std::fs::read_to_string(outdir.join(FINAL_PAIRS)).unwrap();
        assert!(final_pairs.lines().nth(1).unwrap().ends_with("\tIR\t4\t2\t2\tIR"));

        let clusts = std::fs::read_to_string(outdir.join(NO_ISO_CLUSTERS)).unwrap();
        assert_eq!(clusts, "Trans\tClust_id\tClustFlag\nT3\t1\tY\nT4\t1\tY\n");

        assert!(outdir.join(IR_SUMMARY).exists());
        assert!(outdir.join("lib1.chart.input.txt").exists());

        // chart-only rerun from the written tables
        let chart = ChartArgs {
            fasta: args.fasta.clone(),
            pairs: outdir.join(FINAL_PAIRS),
            clust: outdir.join(PHASED_CLUST),
            maps: vec![map],
            einverted: "einverted".to_string(),
            gap: 12,
            threshold: 100,
            match_score: 3,
            mismatch: -4,
            max_repeat: 5000,
            threads: 1,
            outdir: path.join("charts"),
        };
        let written = run_chart_with(&chart, &finder).unwrap();
        let contents = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(
            contents,
            std::fs::read_to_string(outdir.join("lib1.chart.input.txt")).unwrap()
        );
    }
}
