//! Shared configuration for the phastools pipelines
//!
//! Universal constants, output file names, run-mode switches and the
//! error taxonomy used by every phastools crate. Thresholds live here so
//! that the IR validation and the target scoring crates agree on them.

pub mod fns;
pub mod mods;

pub use fns::*;
pub use mods::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// pair inference
pub const MIN_PAIR_ALIGN_LEN: u64 = 180; // 180 nt
pub const MIN_PAIR_IDENTITY: f64 = 85.0; // 85%
pub const MIN_PAIR_LEN_RATIO: f64 = 0.70; // 70% of the shorter transcript
pub const PAIR_TYPE: &str = "IR";

// isoforms
pub const MIN_ISOFORM_IDENTITY: f64 = 99.0;
pub const MIN_ISOFORM_MAP_RATIO: f64 = 0.05;
pub const ISOFORM_TYPE: &str = "iso";

// phase geometry
pub const DEFAULT_PHASE: i64 = 21;
pub const TRIM_WIGGLE: i64 = 3; // one phase cycle slop at each end
pub const ANTISENSE_OFFSET: i64 = 3; // first antisense read is shifted by phase - 3
pub const PHASED_OVERHANG: i64 = 3;
pub const DICER_OFFSETS: [i64; 2] = [2, 4];

// einverted defaults
pub const EINVERTED: &str = "einverted";
pub const EINVERTED_GAP: i32 = 12;
pub const EINVERTED_MATCH: i32 = 3;
pub const EINVERTED_MISMATCH: i32 = -4;
pub const EINVERTED_THRESHOLD: i32 = 100;
pub const EINVERTED_MAX_REPEAT: u32 = 5000;

// target scoring
pub const SEED_START: usize = 2;
pub const SEED_END: usize = 13;
pub const CLEAVAGE_PAIR: (usize, usize) = (10, 11);
pub const GAP_SYMBOL: u8 = b'-';

// PARE validation
pub const DEFAULT_TAG_LEN: usize = 20;
pub const UNIQUE_MAPQ: &str = "255";
pub const CLEAVAGE_OFFSETS: [i64; 3] = [9, 10, 11];
pub const WINDOW_FLANK: i64 = 5;
pub const NOISE_PVALUE: f64 = 0.25;
pub const NOISE_WINDOW_RATIO: f64 = 0.25;
pub const RELAXED_PVALUE: f64 = 0.5;
pub const NUM_CATEGORIES: usize = 5;

// file names
pub const UNIQ_PAIRS: &str = "uniqPairs.txt";
pub const FINAL_PAIRS: &str = "finalPairs.txt";
pub const PHASED_CLUST: &str = "phased.clust";
pub const CANDIDATE_NON_IRS: &str = "candidateNonIRs.txt";
pub const NON_IRS: &str = "nonIRs.list";
pub const ISOFORM_TO_PAIRED: &str = "isoformToPaired.txt";
pub const NO_ISO_CLUSTERS: &str = "noIsoToPairedClusts.txt";
pub const IR_SUMMARY: &str = "summary.json";
pub const CHART_SUFFIX: &str = "chart.input.txt";
pub const PARSED_SUFFIX: &str = "parsed.csv";
pub const PAGE_SUFFIX: &str = "PAGe.txt";
pub const VALIDATED_SUFFIX: &str = "validated.csv";
pub const TARGET_SUMMARY: &str = "target_summary.json";

// headers
pub const FINAL_PAIRS_COLUMNS: &str = "type\ttotalPhasi\tvalid5\tvalid3\tfinalStatus";
pub const CHART_HEADER: &str = "pairname\tphasiname\tphasistrand\tphasiabun\tphasiseq\tphasilen\tphasihits\tphasiflag\tphasipos\tphasiarm";
pub const PARSED_HEADER: &str = "miRname,Target,BindSite,miRseq,tarSeq,Score,Mismatch,CIGAR";
pub const VALIDATED_COLUMNS: &str = "cleavage position,PARE reads,10 nt window abundance,PARE reads/window abundance,category,p-value,noise corrected p value";
