use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// error taxonomy shared by all pipelines
///
/// Soft rejections (a pair failing thresholds, arms that do not
/// overlap) are never errors; they are encoded as statuses.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("External tool '{tool}' failed: {reason}")]
    Tool { tool: String, reason: String },
    #[error("Data consistency error: {0}")]
    DataConsistency(String),
    #[error("Parse error in {file} at line {line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn parse<F: fmt::Display, R: fmt::Display>(file: F, line: usize, reason: R) -> Self {
        PipelineError::Parse {
            file: file.to_string(),
            line,
            reason: reason.to_string(),
        }
    }
}

/// error handling for CLI
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// How phase positions are collected from a matched cluster
///
/// * Observed: sense-strand read positions, deduplicated in file order
/// * Guessed: a synthetic ladder stepping by the phase from the first read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseMode {
    Observed,
    Guessed,
}

impl FromStr for PhaseMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "o" | "observed" => Ok(PhaseMode::Observed),
            "g" | "guessed" => Ok(PhaseMode::Guessed),
            _ => Err(PipelineError::Config(format!(
                "unknown phase mode '{s}', expected 'observed' (O) or 'guessed' (G)"
            ))),
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseMode::Observed => write!(f, "observed"),
            PhaseMode::Guessed => write!(f, "guessed"),
        }
    }
}

/// How cluster header coordinates are compared against a phased locus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordMatch {
    /// exact string equality of the formatted coordinates
    #[default]
    Strict,
    /// integer equality, tolerates padding and formatting differences
    Loose,
}

impl CoordMatch {
    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            CoordMatch::Strict => a == b,
            CoordMatch::Loose => match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                (Ok(x), Ok(y)) => x == y,
                _ => a.trim() == b.trim(),
            },
        }
    }
}

impl FromStr for CoordMatch {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(CoordMatch::Strict),
            "loose" => Ok(CoordMatch::Loose),
            _ => Err(PipelineError::Config(format!(
                "unknown coordinate matching '{s}', expected 'strict' or 'loose'"
            ))),
        }
    }
}

/// miRNA-target scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPolicy {
    Seedless,
    Standard,
}

impl FromStr for ScoringPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "seedless" => Ok(ScoringPolicy::Seedless),
            "n" | "standard" | "normal" => Ok(ScoringPolicy::Standard),
            _ => Err(PipelineError::Config(format!(
                "unknown scoring policy '{s}', expected 'seedless' (S) or 'standard' (N)"
            ))),
        }
    }
}

/// Region the degradome tags were mapped against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    Genic,
    Intergenic,
}

impl FromStr for FeatureMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "genic" => Ok(FeatureMode::Genic),
            "1" | "intergenic" => Ok(FeatureMode::Intergenic),
            _ => Err(PipelineError::Config(format!(
                "unknown feature mode '{s}', expected 'genic' (0) or 'intergenic' (1)"
            ))),
        }
    }
}

/// Read strand in cluster and map files: `w` (sense) or `c` (antisense)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Watson,
    Crick,
}

impl Strand {
    /// accepts both `+`/`-` and the already translated `w`/`c`
    pub fn from_symbol(s: &str) -> Result<Self, PipelineError> {
        match s.trim() {
            "+" | "w" => Ok(Strand::Watson),
            "-" | "c" => Ok(Strand::Crick),
            other => Err(PipelineError::Config(format!(
                "strand marker '{other}' is not recognized"
            ))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Watson => write!(f, "w"),
            Strand::Crick => write!(f, "c"),
        }
    }
}

/// A unit of work handed to the worker pool: one input, one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Task {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_mode_from_str() {
        assert_eq!("O".parse::<PhaseMode>().unwrap(), PhaseMode::Observed);
        assert_eq!("guessed".parse::<PhaseMode>().unwrap(), PhaseMode::Guessed);
        assert!(matches!(
            "X".parse::<PhaseMode>(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_coord_match_strict_and_loose() {
        assert!(CoordMatch::Strict.matches("100", "100"));
        assert!(!CoordMatch::Strict.matches("0100", "100"));
        assert!(CoordMatch::Loose.matches("0100", "100"));
        assert!(!CoordMatch::Loose.matches("101", "100"));
    }

    #[test]
    fn test_strand_symbols() {
        assert_eq!(Strand::from_symbol("+").unwrap(), Strand::Watson);
        assert_eq!(Strand::from_symbol("c").unwrap(), Strand::Crick);
        assert!(Strand::from_symbol("*").is_err());
        assert_eq!(Strand::Crick.to_string(), "c");
    }

    #[test]
    fn test_policy_and_feature_modes() {
        assert_eq!("S".parse::<ScoringPolicy>().unwrap(), ScoringPolicy::Seedless);
        assert_eq!("N".parse::<ScoringPolicy>().unwrap(), ScoringPolicy::Standard);
        assert_eq!("1".parse::<FeatureMode>().unwrap(), FeatureMode::Intergenic);
        assert!("2".parse::<FeatureMode>().is_err());
    }
}
