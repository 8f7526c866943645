//! Error types for the equate library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harmonization and validation.
#[derive(Debug, Error)]
pub enum EquateError {
    /// Malformed or colliding codebook.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Item id absent from the registry for the given lexicon.
    #[error("Unknown item '{item}' in lexicon '{lexicon}'")]
    UnknownItem { lexicon: String, item: String },

    /// An item has no non-missing observations in a cycle.
    ///
    /// The engine only raises this when configured to reject empty domains;
    /// by default the item yields an all-null column and is reported instead.
    #[error("Empty domain for item '{item}' in cycle '{cycle}'")]
    EmptyDomain { cycle: String, item: String },

    /// The declared item set could not be found at all for a cycle.
    #[error("Coverage mismatch for cycle '{cycle}': {message}")]
    CoverageMismatch { cycle: String, message: String },

    /// One or more hard validation checks failed.
    #[error("Validation failed: {}", failed.join("; "))]
    ValidationFailure { failed: Vec<String> },

    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error interpreting a cell of tabular input.
    #[error("Parse error at row {row}, column '{column}': {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid delimiter detected or specified.
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// Empty file or no data to harmonize.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reading or writing the harmonized store.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EquateError {
    /// Build an IO error tagged with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EquateError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for equate operations.
pub type Result<T> = std::result::Result<T, EquateError>;
