use clap::{Parser, Subcommand};
use config::{ArgCheck, CliError, PipelineError, DEFAULT_PHASE};
use std::path::PathBuf;

use crate::core::einverted::EinvertedParams;
use crate::core::IrConfig;

#[derive(Debug, Parser)]
#[command(name = "phas-ir")]
#[command(about = "Validate inverted-repeat derived phasiRNA loci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// infer candidate pairs, validate them and summarise the leftovers
    #[command(name = "validate")]
    Validate(ValidateArgs),
    /// write chart inputs from an existing finalPairs.txt and phased.clust
    #[command(name = "chart")]
    Chart(ChartArgs),
}

impl Args {
    pub fn from(args: Vec<String>) -> Self {
        let mut full_args = vec![env!("CARGO_PKG_NAME").to_string()];
        full_args.extend(args);

        Args::parse_from(full_args)
    }

    pub fn threads(&self) -> usize {
        match &self.command {
            Command::Validate(args) => args.threads,
            Command::Chart(args) => args.threads,
        }
    }

    pub fn check(&self) -> Result<(), CliError> {
        match &self.command {
            Command::Validate(args) => args.check(),
            Command::Chart(args) => args.check(),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    #[arg(
        short = 'f',
        long = "fasta",
        required = true,
        value_name = "PATH",
        help = "FASTA file with the phased transcripts"
    )]
    pub fasta: PathBuf,

    #[arg(
        short = 'r',
        long = "blast-rc",
        required = true,
        value_name = "PATH",
        help = "Reverse-complement BLAST hits between phased transcripts"
    )]
    pub blast_rc: PathBuf,

    #[arg(
        short = 'n',
        long = "blast-nor",
        required = true,
        value_name = "PATH",
        help = "Normal-orientation BLAST hits between phased transcripts"
    )]
    pub blast_nor: PathBuf,

    #[arg(
        long = "blast-comp",
        required = false,
        value_name = "PATH",
        help = "Complementary BLAST hits [only counted]"
    )]
    pub blast_comp: Option<PathBuf>,

    #[arg(
        short = 'p',
        long = "phased",
        required = true,
        value_name = "PATH",
        help = "Phased loci table from the phasing predictor"
    )]
    pub phased: PathBuf,

    #[arg(
        short = 'c',
        long = "cluster",
        required = true,
        value_name = "PATH",
        help = "Cluster file from the phasing predictor"
    )]
    pub cluster: PathBuf,

    #[arg(
        short = 'm',
        long = "maps",
        required = false,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "Bowtie map files of the sRNA libraries delimited by comma [enables chart inputs]"
    )]
    pub maps: Vec<PathBuf>,

    #[arg(
        short = 'P',
        long = "phase",
        value_name = "NT",
        default_value_t = DEFAULT_PHASE,
        help = "Phase length, usually 21 or 24"
    )]
    pub phase: i64,

    #[arg(
        short = 'M',
        long = "mode",
        value_name = "MODE",
        default_value = "O",
        help = "Phase positions: O (observed) or G (guessed)"
    )]
    pub mode: String,

    #[arg(
        long = "coord-match",
        value_name = "MATCH",
        default_value = "strict",
        help = "Cluster coordinate matching: strict (string) or loose (integer)"
    )]
    pub coord_match: String,

    #[arg(
        long = "einverted",
        value_name = "BIN",
        default_value = config::EINVERTED,
        help = "einverted executable"
    )]
    pub einverted: String,

    #[arg(long = "gap", value_name = "SCORE", default_value_t = config::EINVERTED_GAP, allow_hyphen_values = true)]
    pub gap: i32,

    #[arg(long = "threshold", value_name = "SCORE", default_value_t = config::EINVERTED_THRESHOLD, allow_hyphen_values = true)]
    pub threshold: i32,

    #[arg(long = "match", value_name = "SCORE", default_value_t = config::EINVERTED_MATCH, allow_hyphen_values = true)]
    pub match_score: i32,

    #[arg(long = "mismatch", value_name = "SCORE", default_value_t = config::EINVERTED_MISMATCH, allow_hyphen_values = true)]
    pub mismatch: i32,

    #[arg(long = "maxrepeat", value_name = "NT", default_value_t = config::EINVERTED_MAX_REPEAT)]
    pub max_repeat: u32,

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
        default_value("phas_ir")
    )]
    pub outdir: PathBuf,
}

impl ValidateArgs {
    /// run-wide phase settings
    pub fn ir_config(&self) -> Result<IrConfig, PipelineError> {
        if self.phase <= config::PHASED_OVERHANG {
            return Err(PipelineError::Config(format!(
                "phase length {} is too short",
                self.phase
            )));
        }

        Ok(IrConfig {
            phase: self.phase,
            mode: self.mode.parse()?,
            coord_match: self.coord_match.parse()?,
        })
    }

    pub fn einverted_params(&self) -> EinvertedParams {
        EinvertedParams {
            binary: self.einverted.clone(),
            gap: self.gap,
            threshold: self.threshold,
            match_score: self.match_score,
            mismatch: self.mismatch,
            max_repeat: self.max_repeat,
        }
    }
}

impl ArgCheck for ValidateArgs {
    fn check(&self) -> Result<(), CliError> {
        self.validate_args()?;
        self.ir_config()
            .map(|_| ())
            .map_err(|e| CliError::InvalidInput(e.to_string()))
    }

    fn get_inputs(&self) -> Vec<&PathBuf> {
        vec![
            &self.fasta,
            &self.blast_rc,
            &self.blast_nor,
            &self.phased,
            &self.cluster,
        ]
    }

    fn get_optional(&self) -> Vec<&PathBuf> {
        self.blast_comp.iter().chain(self.maps.iter()).collect()
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ChartArgs {
    #[arg(
        short = 'f',
        long = "fasta",
        required = true,
        value_name = "PATH",
        help = "FASTA file with the phased transcripts"
    )]
    pub fasta: PathBuf,

    #[arg(
        short = 'r',
        long = "pairs",
        required = true,
        value_name = "PATH",
        help = "finalPairs.txt from a previous validation"
    )]
    pub pairs: PathBuf,

    #[arg(
        short = 'c',
        long = "clust",
        required = true,
        value_name = "PATH",
        help = "phased.clust from a previous validation"
    )]
    pub clust: PathBuf,

    #[arg(
        short = 'm',
        long = "maps",
        required = true,
        value_name = "PATHS",
        value_delimiter = ',',
        num_args = 1..,
        help = "Bowtie map files of the sRNA libraries delimited by comma"
    )]
    pub maps: Vec<PathBuf>,

    #[arg(
        long = "einverted",
        value_name = "BIN",
        default_value = config::EINVERTED,
        help = "einverted executable"
    )]
    pub einverted: String,

    #[arg(long = "gap", value_name = "SCORE", default_value_t = config::EINVERTED_GAP, allow_hyphen_values = true)]
    pub gap: i32,

    #[arg(long = "threshold", value_name = "SCORE", default_value_t = config::EINVERTED_THRESHOLD, allow_hyphen_values = true)]
    pub threshold: i32,

    #[arg(long = "match", value_name = "SCORE", default_value_t = config::EINVERTED_MATCH, allow_hyphen_values = true)]
    pub match_score: i32,

    #[arg(long = "mismatch", value_name = "SCORE", default_value_t = config::EINVERTED_MISMATCH, allow_hyphen_values = true)]
    pub mismatch: i32,

    #[arg(long = "maxrepeat", value_name = "NT", default_value_t = config::EINVERTED_MAX_REPEAT)]
    pub max_repeat: u32,

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
        default_value("phas_ir")
    )]
    pub outdir: PathBuf,
}

impl ChartArgs {
    pub fn einverted_params(&self) -> EinvertedParams {
        EinvertedParams {
            binary: self.einverted.clone(),
            gap: self.gap,
            threshold: self.threshold,
            match_score: self.match_score,
            mismatch: self.mismatch,
            max_repeat: self.max_repeat,
        }
    }
}

impl ArgCheck for ChartArgs {
    fn get_inputs(&self) -> Vec<&PathBuf> {
        let mut inputs = vec![&self.fasta, &self.pairs, &self.clust];
        inputs.extend(self.maps.iter());
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_args_defaults() {
        let args = Args::from(
            [
                "validate", "-f", "p.fa", "-r", "rc.txt", "-n", "nor.txt", "-p", "phas.csv", "-c",
                "all.cluster", "--mismatch", "-5",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        let Command::Validate(args) = args.command else {
            panic!("expected validate");
        };
        assert_eq!(args.phase, 21);
        assert_eq!(args.mismatch, -5);
        assert!(args.maps.is_empty());

        let config = args.ir_config().unwrap();
        assert_eq!(config.mode, config::PhaseMode::Observed);
        assert_eq!(config.coord_match, config::CoordMatch::Strict);
        assert_eq!(args.einverted_params().gap, 12);
    }

    #[test]
    fn test_bad_mode_is_config_error() {
        let args = Args::from(
            [
                "validate", "-f", "p.fa", "-r", "rc.txt", "-n", "nor.txt", "-p", "phas.csv", "-c",
                "all.cluster", "-M", "X",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        let Command::Validate(args) = args.command else {
            panic!("expected validate");
        };
        assert!(matches!(args.ir_config(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_chart_args_maps() {
        let args = Args::from(
            [
                "chart", "-f", "p.fa", "-r", "finalPairs.txt", "-c", "phased.clust", "-m",
                "a.map,b.map",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        let Command::Chart(args) = args.command else {
            panic!("expected chart");
        };
        assert_eq!(args.maps.len(), 2);
        assert_eq!(args.get_inputs().len(), 5);
    }
}
