//! Core module for scoring miRNA targets and validating them with PARE data
//!
//! Scoring turns every aligner record into a reconstructed target and a
//! penalty score, one `parsed.csv` per alignment file. Validation indexes
//! the degradome tags of each library, categorises every tag location,
//! writes the PAGe table and keeps the targets whose cleavage site is
//! supported by a tag.
//!
//! Alignment files and libraries are independent units: they run on the
//! worker pool and a single failure aborts the whole run.

use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{info, warn};
use serde::Serialize;

use std::fs::create_dir_all;
use std::path::PathBuf;

use config::{
    file_stem, reader, run_tasks, write_collection, write_summary, ScoringPolicy, Task,
    PAGE_SUFFIX, PARSED_HEADER, PARSED_SUFFIX, TARGET_SUMMARY, VALIDATED_COLUMNS,
    VALIDATED_SUFFIX,
};

use crate::cli::{ScoreArgs, ValidateArgs};
use crate::utils::{library_maps, library_name, read_alignments, read_sequences, read_targets};

pub mod pare;
pub mod reconstruct;
pub mod score;

use pare::{
    build_index, categorize, category_fractions, count_bases, page_lines, parse_pare_map,
    parse_tag_counts, sort_targets, validate_targets,
};
use score::ScoredTarget;

/// Scoring settings, fixed once from the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreConfig {
    pub policy: ScoringPolicy,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScoredFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub interactions: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScoreSummary {
    pub files: Vec<ScoredFile>,
    pub interactions: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LibrarySummary {
    pub library: String,
    pub genes: usize,
    pub sites: usize,
    pub categories: [usize; config::NUM_CATEGORIES],
    pub candidates: usize,
    pub validated: usize,
    pub page: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PareSummary {
    pub targets: usize,
    pub unambiguous_bases: i64,
    pub eligible_bases: i64,
    pub libraries: Vec<LibrarySummary>,
}

/// Scores every alignment file into `<stem>.parsed.csv`
///
/// # Arguments
///
/// * `args` - score subcommand arguments
///
/// # Returns
///
/// * `Result<ScoreSummary>` - interactions per file
///
/// # Example
///
/// ```rust, ignore
/// let args = ScoreArgs::from(vec!["--alignments".into(), "frag_1.targ".into()]);
/// let summary = score_alignments(args).unwrap();
/// ```
pub fn score_alignments(args: ScoreArgs) -> Result<ScoreSummary> {
    info!("Scoring miRNA-target interactions...");
    let config = args.score_config()?;

    create_dir_all(&args.outdir)
        .with_context(|| format!("cannot create output directory {:?}", args.outdir))?;

    let tasks: Vec<Task> = args
        .alignments
        .iter()
        .map(|input| {
            let output = args
                .outdir
                .join(format!("{}.{}", file_stem(input), PARSED_SUFFIX));
            Task::new(input.clone(), output)
        })
        .collect();

    let counts: DashMap<PathBuf, usize> = DashMap::new();
    run_tasks(&tasks, "Scoring alignments...", |task| {
        let records = read_alignments(&task.input)?;
        let lines = score_lines(&records, &config);

        counts.insert(task.input.clone(), lines.len() - 1);
        write_collection(&lines, &task.output)
    })?;

    let files: Vec<ScoredFile> = tasks
        .iter()
        .map(|task| ScoredFile {
            input: task.input.clone(),
            output: task.output.clone(),
            interactions: counts.get(&task.input).map_or(0, |c| *c),
        })
        .collect();

    let summary = ScoreSummary {
        interactions: files.iter().map(|f| f.interactions).sum(),
        files,
    };
    info!(
        "Total interactions scored: {} in {} files",
        summary.interactions,
        summary.files.len()
    );

    write_summary(&summary, args.outdir.join(TARGET_SUMMARY))?;
    Ok(summary)
}

/// `parsed.csv` rows of one alignment file, header included
pub fn score_lines(records: &[reconstruct::AlignmentRecord], config: &ScoreConfig) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(PARSED_HEADER.to_string());
    lines.extend(
        records
            .iter()
            .map(|r| ScoredTarget::from_record(r, config.policy).line()),
    );

    lines
}

/// Validates scored targets against every PARE library
///
/// # Arguments
///
/// * `args` - validate subcommand arguments
///
/// # Returns
///
/// * `Result<PareSummary>` - per-library totals; PAGe tables and validated
///   targets are written to `args.outdir`
pub fn validate_cleavage(args: ValidateArgs) -> Result<PareSummary> {
    info!("Validating cleavage sites with PARE libraries...");
    let config = args.pare_config()?;

    create_dir_all(&args.outdir)
        .with_context(|| format!("cannot create output directory {:?}", args.outdir))?;

    let mut targets = read_targets(&args.targets)?;
    sort_targets(&mut targets);

    let sequences = read_sequences(&args.transcriptome)?;
    let bases = count_bases(sequences.iter().map(String::as_str), config.tag_len);
    info!(
        "Unambiguous bases: {} | Eligible bases: {}",
        bases.unambiguous, bases.eligible
    );

    let transcriptome = args.transcriptome.display().to_string();
    let tasks: Vec<Task> = args
        .libs
        .iter()
        .map(|lib| {
            let output = args
                .outdir
                .join(format!("{}_{}", library_name(lib), VALIDATED_SUFFIX));
            Task::new(lib.clone(), output)
        })
        .collect();

    let libraries: DashMap<String, LibrarySummary> = DashMap::new();
    run_tasks(&tasks, "Validating libraries...", |task| {
        let library = library_name(&task.input);
        let maps = library_maps(&library, &args.maps);
        if maps.is_empty() {
            warn!("No PARE map files found for library {}, skipping", library);
            return Ok(());
        }

        let mut mapped = hashbrown::HashMap::new();
        for map in maps {
            let contents = reader(map)?;
            let parsed = parse_pare_map(&contents, &map.display().to_string(), config.repeats)?;
            for (sequence, genes) in parsed {
                let entry: &mut std::collections::BTreeMap<String, Vec<i64>> =
                    mapped.entry(sequence).or_default();
                for (gene, locations) in genes {
                    entry.entry(gene).or_default().extend(locations);
                }
            }
        }

        let contents = reader(&task.input)?;
        let tags = parse_tag_counts(&contents, &task.input.display().to_string())?;
        let index = build_index(&mapped, &tags);

        let table = categorize(&index, config.mode);
        let fractions = category_fractions(&table, &bases)?;

        let page = args
            .outdir
            .join(format!("{}_{}", library, PAGE_SUFFIX));
        write_collection(&page_lines(&table, &bases, &fractions, &transcriptome), &page)?;

        let candidates = validate_targets(&targets, &table, &fractions);
        let mut lines = vec![format!("{},{}", PARSED_HEADER, VALIDATED_COLUMNS)];
        lines.extend(
            candidates
                .iter()
                .filter(|v| v.passes(&config))
                .map(|v| v.line()),
        );
        write_collection(&lines, &task.output)?;

        libraries.insert(
            library.clone(),
            LibrarySummary {
                library,
                genes: table.genes.len(),
                sites: table.genes.values().map(|s| s.len()).sum(),
                categories: table.counts,
                candidates: candidates.len(),
                validated: lines.len() - 1,
                page,
                output: task.output.clone(),
            },
        );

        Ok(())
    })?;

    let mut libraries: Vec<LibrarySummary> = libraries.into_iter().map(|(_, s)| s).collect();
    libraries.sort_by(|a, b| a.library.cmp(&b.library));

    for lib in &libraries {
        info!(
            "Library {}: {} sites on {} genes | validated targets: {} of {}",
            lib.library, lib.sites, lib.genes, lib.validated, lib.candidates
        );
    }

    let summary = PareSummary {
        targets: targets.len(),
        unambiguous_bases: bases.unambiguous,
        eligible_bases: bases.eligible,
        libraries,
    };
    write_summary(&summary, args.outdir.join(TARGET_SUMMARY))?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconstruct::sam_line;

    #[test]
    fn test_score_alignments_writes_parsed_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frag_1.targ");
        std::fs::write(
            &input,
            format!(
                "{}\n{}\n",
                sam_line("ACGTACGT", "8M", "8"),
                sam_line("ACGTACGT", "8M", "7A0")
            ),
        )
        .unwrap();

        let args = ScoreArgs {
            alignments: vec![input.clone()],
            policy: "S".to_string(),
            threads: 1,
            outdir: dir.path().join("predicted"),
        };
        let summary = score_alignments(args).unwrap();

        assert_eq!(summary.interactions, 2);
        let out = dir.path().join("predicted").join("frag_1.parsed.csv");
        let contents = std::fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines[0], PARSED_HEADER);
        assert_eq!(lines[1], "miR1,AT1G01,101-108,UGCAUGCA,ACGUACGU,0.0,8,8M");
        assert_eq!(lines[2], "miR1,AT1G01,101-108,UGCAUGCA,ACGUACGA,1.0,7A0,8M");
        assert!(dir.path().join("predicted").join(TARGET_SUMMARY).exists());
    }

    #[test]
    fn test_validate_cleavage_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        let targets = path.join("All.targs.parsed.csv");
        std::fs::write(
            &targets,
            format!(
                "{}\nmiR1,G1,80-100,UGCA,ACGU,2.0,4,4M\nmiR1,G2,80-100,UGCA,ACGU,2.0,4,4M\n",
                PARSED_HEADER
            ),
        )
        .unwrap();

        let transcriptome = path.join("genomic_seq.fa");
        std::fs::write(&transcriptome, format!(">G1\n{}\n>G2\n{}\n", "A".repeat(45), "C".repeat(45))).unwrap();

        let lib = path.join("5233_chopped.txt");
        std::fs::write(&lib, "AAAA\t40\nCCCC\t2\n").unwrap();

        let map = path.join("5233_genic_map");
        std::fs::write(
            &map,
            "1\t0\tG1\t90\t255\t20M\t*\t0\t0\tAAAA\n\
             2\t0\tG1\t30\t255\t20M\t*\t0\t0\tCCCC\n\
             3\t0\tG2\t90\t1\t20M\t*\t0\t0\tAAAA\n",
        )
        .unwrap();

        let args = ValidateArgs {
            targets: vec![targets],
            transcriptome,
            libs: vec![lib],
            maps: vec![map],
            feature: "genic".to_string(),
            tag_len: 20,
            repeats: false,
            no_noise_filter: false,
            keep_cat4: false,
            threads: 1,
            outdir: path.join("output"),
        };
        let summary = validate_cleavage(args).unwrap();

        // (45 - 40) eligible bases per transcript
        assert_eq!(summary.eligible_bases, 10);
        let lib = &summary.libraries[0];
        assert_eq!(lib.library, "5233");
        assert_eq!(lib.sites, 2);
        // 40 is the unique maximum of G1, 2 sits below the median
        assert_eq!(lib.categories, [1, 0, 0, 1, 0]);
        assert_eq!(lib.candidates, 1);
        assert_eq!(lib.validated, 1);

        let page = std::fs::read_to_string(path.join("output").join("5233_PAGe.txt")).unwrap();
        assert!(page.starts_with(">G1\n30\t2\t3\n90\t40\t0\n# Transcriptome="));
        assert!(page.contains("# Category 0_fraction=0.1\n"));

        let validated =
            std::fs::read_to_string(path.join("output").join("5233_validated.csv")).unwrap();
        let lines: Vec<&str> = validated.lines().collect();
        assert_eq!(lines.len(), 2);
        // f = 0.1 and two miR1 targets at score 2.0
        assert_eq!(
            lines[1],
            "miR1,G1,80-100,UGCA,ACGU,2.0,4,4M,90,40,40,1.0,0,0.190000,0.190000"
        );
    }

    #[test]
    fn test_library_without_maps_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        let targets = path.join("All.targs.parsed.csv");
        std::fs::write(
            &targets,
            format!("{}\nmiR1,G1,80-100,UGCA,ACGU,2.0,4,4M\n", PARSED_HEADER),
        )
        .unwrap();

        let transcriptome = path.join("genomic_seq.fa");
        std::fs::write(&transcriptome, format!(">G1\n{}\n", "A".repeat(45))).unwrap();

        let mapped = path.join("lib1_tags.txt");
        std::fs::write(&mapped, "AAAA\t40\n").unwrap();
        let unmapped = path.join("lib2_tags.txt");
        std::fs::write(&unmapped, "AAAA\t40\n").unwrap();

        let map = path.join("lib1_tags.txt_idx_map");
        std::fs::write(&map, "1\t0\tG1\t90\t255\t20M\t*\t0\t0\tAAAA\n").unwrap();

        let outdir = path.join("output");
        let args = ValidateArgs {
            targets: vec![targets],
            transcriptome,
            libs: vec![mapped, unmapped],
            maps: vec![map],
            feature: "genic".to_string(),
            tag_len: 20,
            repeats: false,
            no_noise_filter: false,
            keep_cat4: false,
            threads: 1,
            outdir: outdir.clone(),
        };
        let summary = validate_cleavage(args).unwrap();

        assert_eq!(summary.libraries.len(), 1);
        assert_eq!(summary.libraries[0].library, "lib1");
        assert!(outdir.join("lib1_PAGe.txt").exists());
        assert!(!outdir.join("lib2_PAGe.txt").exists());
        assert!(!outdir.join("lib2_validated.csv").exists());
    }
}
