//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use equate::CoverageThreshold;
use std::path::PathBuf;

use crate::logging::LogFormat;

/// equate: harmonize and validate survey items across cycles
#[derive(Parser)]
#[command(name = "equate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Inputs shared by every command that touches cycle data.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Codebook file (.json, .csv or .tsv)
    #[arg(long, value_name = "FILE")]
    pub codebook: PathBuf,

    /// Directory holding one raw extract per cycle
    #[arg(long, value_name = "DIR")]
    pub raw: PathBuf,

    /// Directory of the harmonized store
    #[arg(long, value_name = "DIR")]
    pub store: PathBuf,

    /// Lexicon (instrument version) the cycles are coded in
    #[arg(short, long)]
    pub lexicon: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a codebook
    Codebook {
        /// Path to the codebook file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Harmonize raw cycles and upsert them into the store
    Harmonize {
        #[command(flatten)]
        source: SourceArgs,

        /// Cycles to harmonize
        #[arg(value_name = "CYCLE", required = true)]
        cycles: Vec<String>,

        /// Write the run's audit trail to this file
        #[arg(long, value_name = "FILE")]
        audit: Option<PathBuf>,
    },

    /// Deliver one harmonized cycle through the coverage-gated path
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Cycle to resolve
        #[arg(value_name = "CYCLE")]
        cycle: String,

        /// Coverage threshold: a column count ("25") or fraction ("0.9", "90%")
        #[arg(short, long)]
        threshold: Option<CoverageThreshold>,

        /// Output file (format from extension; default: TSV on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format when no file extension decides it
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Run the validation suite on stored cycles
    Validate {
        #[command(flatten)]
        source: SourceArgs,

        /// Cycles to validate
        #[arg(value_name = "CYCLE", required = true)]
        cycles: Vec<String>,

        /// Save the full report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Csv,
    Json,
}

impl OutputFormat {
    /// Format implied by a file extension, if recognized.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        ext.parse().ok()
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tsv" | "txt" => Ok(OutputFormat::Tsv),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use tsv, csv, or json.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_with_globals() {
        let cli = Cli::try_parse_from([
            "equate", "-vv", "validate", "--codebook", "cb.json", "--raw", "raw", "--store",
            "out", "-l", "nsch_2016", "2016", "2017", "--json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate { source, cycles, json, .. } => {
                assert_eq!(source.lexicon, "nsch_2016");
                assert_eq!(cycles, vec!["2016", "2017"]);
                assert!(json);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_resolve_threshold() {
        let cli = Cli::try_parse_from([
            "equate", "resolve", "--codebook", "cb.json", "--raw", "raw", "--store", "out",
            "-l", "nsch", "2019", "--threshold", "90%",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve { threshold, .. } => {
                assert_eq!(threshold, Some(CoverageThreshold::Fraction(0.9)));
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_harmonize_requires_cycles() {
        let result = Cli::try_parse_from([
            "equate", "harmonize", "--codebook", "cb.json", "--raw", "raw", "--store", "out",
            "-l", "nsch",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(
            OutputFormat::from_path(std::path::Path::new("out/2019.csv")),
            Some(OutputFormat::Csv)
        );
        assert_eq!(OutputFormat::from_path(std::path::Path::new("out/2019")), None);
    }
}
