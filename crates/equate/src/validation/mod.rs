//! Post-harmonization validation suite and its report.

mod checks;
mod report;

pub use checks::{
    AgeGradientCheck, Check, ColumnCountCheck, ContiguousDomainCheck, MissingExclusionCheck,
    ReverseCodingCheck, TransformEquivalenceCheck, ValidationEngine, ValidationInput,
    ZeroBasedCheck, check_for,
};
pub use report::{
    CheckKind, CheckOutcome, CheckStatus, CycleReport, Finding, Severity, ValidationReport,
};
