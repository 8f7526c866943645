//! equate: cross-cycle harmonization and validation of survey item codes.
//!
//! Each survey cycle codes its items a little differently: some are asked in
//! the opposite direction, response scales start at different codes, and
//! missing answers hide behind sentinel codes of 90 and above. equate turns
//! every cycle into one comparable layout, where each item lives under a
//! canonical *equate name*, starts at zero and increases with the trait.
//!
//! # Core Principles
//!
//! - **Declarative**: item direction and naming live in a versioned codebook,
//!   not in code
//! - **One transform**: precomputed and on-demand harmonization run the same
//!   engine, so both paths give identical values
//! - **Non-destructive**: raw extracts are never modified
//! - **Verified**: a fixed suite of checks gates promotion of a cycle
//!
//! # Example
//!
//! ```no_run
//! use equate::{CsvRawProvider, EquateConfig, Harmonizer, JsonFileStore, Registry};
//!
//! let registry = Registry::load("codebook.json").unwrap();
//! let config = EquateConfig::default();
//! let raw = CsvRawProvider::new("raw/", config.input.clone());
//! let store = JsonFileStore::open("harmonized/").unwrap();
//!
//! let harmonizer = Harmonizer::with_config(registry, config);
//! harmonizer.harmonize_and_persist(&raw, &store, "nsch_2016", &["2016", "2017"]);
//!
//! let run = harmonizer.validate_cycles(&raw, &store, "nsch_2016", &["2016", "2017"]);
//! println!("Promotable: {}", run.report.is_promotable());
//! ```

pub mod codebook;
pub mod config;
pub mod error;
pub mod input;
pub mod selector;
pub mod stats;
pub mod store;
pub mod table;
pub mod transform;
pub mod validation;

mod harmonizer;

pub use crate::harmonizer::{CycleAudit, CycleOutcome, HarmonizeAudit, Harmonizer, ValidationRun};
pub use codebook::{CodebookEntry, DirectionClassifier, Orientation, Registry};
pub use config::{EquateConfig, MissingPolicy, ValidationConfig};
pub use error::{EquateError, Result};
pub use input::{CsvRawProvider, DataTable, ExtractProvenance};
pub use selector::{select_path, ConsumptionPath, CoverageThreshold, PathDecision};
pub use store::{HarmonizedStore, JsonFileStore, MemoryStore, RawTableProvider};
pub use table::{HarmonizedTable, MergeSummary, RawTable};
pub use transform::{HarmonizeResult, TransformEngine};
pub use validation::{CheckKind, CheckStatus, CycleReport, Severity, ValidationReport};
