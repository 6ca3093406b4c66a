use clap::{Parser, Subcommand};
use config::{ArgCheck, CliError, PipelineError, DEFAULT_TAG_LEN};
use std::path::PathBuf;

use crate::core::pare::PareConfig;
use crate::core::ScoreConfig;

#[derive(Debug, Parser)]
#[command(name = "mir-target")]
#[command(about = "Score miRNA-target alignments and validate them with PARE data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// reconstruct and score miRNA-target alignments
    #[command(name = "score")]
    Score(ScoreArgs),
    /// validate scored targets with degradome (PARE) libraries
    #[command(name = "validate")]
    Validate(ValidateArgs),
}

impl Args {
    pub fn from(args: Vec<String>) -> Self {
        let mut full_args = vec![env!("CARGO_PKG_NAME").to_string()];
        full_args.extend(args);

        Args::parse_from(full_args)
    }

    pub fn threads(&self) -> usize {
        match &self.command {
            Command::Score(args) => args.threads,
            Command::Validate(args) => args.threads,
        }
    }

    pub fn check(&self) -> Result<(), CliError> {
        match &self.command {
            Command::Score(args) => args.check(),
            Command::Validate(args) => args.check(),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ScoreArgs {
    #[arg(
        short = 'a',
        long = "alignments",
        required = true,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "Headerless bowtie2 alignments of miRNAs on targets delimited by comma"
    )]
    pub alignments: Vec<PathBuf>,

    #[arg(
        short = 's',
        long = "policy",
        value_name = "POLICY",
        default_value = "S",
        help = "Scoring policy: S (seedless) or N (standard)"
    )]
    pub policy: String,

    #[arg(
        short = 't',
        long = "threads",
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = num_cpus::get()
    )]
    pub threads: usize,

    #[arg(
        short = 'o',
        long = "outdir",
        required = false,
        value_name = "PATH",
        help = "Output directory path",
        default_value("predicted")
    )]
    pub outdir: PathBuf,
}

impl ScoreArgs {
    pub fn score_config(&self) -> Result<ScoreConfig, PipelineError> {
        Ok(ScoreConfig {
            policy: self.policy.parse()?,
        })
    }
}

impl ArgCheck for ScoreArgs {
    fn check(&self) -> Result<(), CliError> {
        self.validate_args()?;
        self.score_config()
            .map(|_| ())
            .map_err(|e| CliError::InvalidInput(e.to_string()))
    }

    fn get_inputs(&self) -> Vec<&PathBuf> {
        self.alignments.iter().collect()
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    #[arg(
        short = 'p',
        long = "targets",
        required = true,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "Scored targets (parsed.csv) delimited by comma"
    )]
    pub targets: Vec<PathBuf>,

    #[arg(
        short = 'f',
        long = "transcriptome",
        required = true,
        value_name = "PATH",
        help = "FASTA of the features the PARE tags were mapped to"
    )]
    pub transcriptome: PathBuf,

    #[arg(
        short = 'l',
        long = "libs",
        required = true,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "PARE tag count files (sequence, abundance) delimited by comma"
    )]
    pub libs: Vec<PathBuf>,

    #[arg(
        short = 'm',
        long = "maps",
        required = true,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "PARE map files, named after their library, delimited by comma"
    )]
    pub maps: Vec<PathBuf>,

    #[arg(
        short = 'g',
        long = "feature",
        value_name = "MODE",
        default_value = "genic",
        help = "Feature set: genic (0) or intergenic (1)"
    )]
    pub feature: String,

    #[arg(
        long = "tag-len",
        value_name = "NT",
        default_value_t = DEFAULT_TAG_LEN,
        help = "PARE tag length"
    )]
    pub tag_len: usize,

    #[arg(
        long = "repeats",
        default_value_t = false,
        help = "Keep PARE tags mapping to repetitive regions"
    )]
    pub repeats: bool,

    #[arg(
        long = "no-noise-filter",
        default_value_t = false,
        help = "Keep every validation with corrected p-value < 0.5"
    )]
    pub no_noise_filter: bool,

    #[arg(
        long = "keep-cat4",
        default_value_t = false,
        help = "Keep category 4 sites under the noise filter"
    )]
    pub keep_cat4: bool,

    #[arg(
        short = 't',
        long = "threads",
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = num_cpus::get()
    )]
    pub threads: usize,

    #[arg(
        short = 'o',
        long = "outdir",
        required = false,
        value_name = "PATH",
        help = "Output directory path",
        default_value("output")
    )]
    pub outdir: PathBuf,
}

impl ValidateArgs {
    pub fn pare_config(&self) -> Result<PareConfig, PipelineError> {
        if self.tag_len == 0 {
            return Err(PipelineError::Config("tag length must be positive".to_string()));
        }

        Ok(PareConfig {
            mode: self.feature.parse()?,
            tag_len: self.tag_len,
            repeats: self.repeats,
            noise_filter: !self.no_noise_filter,
            keep_cat4: self.keep_cat4,
        })
    }
}

impl ArgCheck for ValidateArgs {
    fn check(&self) -> Result<(), CliError> {
        self.validate_args()?;
        self.pare_config()
            .map(|_| ())
            .map_err(|e| CliError::InvalidInput(e.to_string()))
    }

    fn get_inputs(&self) -> Vec<&PathBuf> {
        let mut inputs: Vec<&PathBuf> = self.targets.iter().collect();
        inputs.push(&self.transcriptome);
        inputs.extend(self.libs.iter());
        inputs
    }

    fn get_optional(&self) -> Vec<&PathBuf> {
        self.maps.iter().collect()
    }
}
