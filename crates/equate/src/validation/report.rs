//! Structured validation results.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codebook::CodebookProvenance;
use crate::error::{EquateError, Result};

/// The checks run against every harmonized cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Harmonized columns match the expected equate names.
    ColumnCount,
    /// Every non-empty column starts at zero.
    ZeroBased,
    /// Sampled reverse items correlate negatively with their raw codes.
    ReverseCoding,
    /// Raw missing codes and harmonized nulls coincide.
    MissingExclusion,
    /// An independent recomputation agrees with the harmonized values.
    TransformEquivalence,
    /// Developmental items rise with age.
    AgeGradient,
    /// Each column's distinct values form a run without gaps.
    ContiguousDomain,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::ColumnCount,
        CheckKind::ZeroBased,
        CheckKind::ReverseCoding,
        CheckKind::MissingExclusion,
        CheckKind::TransformEquivalence,
        CheckKind::AgeGradient,
        CheckKind::ContiguousDomain,
    ];

    /// Position in the suite, starting at 1.
    pub fn number(&self) -> usize {
        match self {
            CheckKind::ColumnCount => 1,
            CheckKind::ZeroBased => 2,
            CheckKind::ReverseCoding => 3,
            CheckKind::MissingExclusion => 4,
            CheckKind::TransformEquivalence => 5,
            CheckKind::AgeGradient => 6,
            CheckKind::ContiguousDomain => 7,
        }
    }

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::ColumnCount => "column count",
            CheckKind::ZeroBased => "zero-based encoding",
            CheckKind::ReverseCoding => "reverse coding",
            CheckKind::MissingExclusion => "missing-value exclusion",
            CheckKind::TransformEquivalence => "transformation equivalence",
            CheckKind::AgeGradient => "age gradient",
            CheckKind::ContiguousDomain => "contiguous domain",
        }
    }

    /// Advisory checks can warn but never fail a cycle.
    pub fn is_advisory(&self) -> bool {
        matches!(self, CheckKind::AgeGradient)
    }
}

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

/// One thing a check observed, usually about a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Equate name (or item id) the finding concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
}

impl Finding {
    /// Finding with no column or values attached.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            column: None,
            message: message.into(),
            observed: None,
            expected: None,
        }
    }

    /// Informational finding.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Advisory finding.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Finding that fails a hard check.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Attribute the finding to a harmonized column.
    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attach what was seen.
    pub fn with_observed(mut self, observed: impl Into<Value>) -> Self {
        self.observed = Some(observed.into());
        self
    }

    /// Attach what should have been seen.
    pub fn with_expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// Overall result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl CheckOutcome {
    /// Derive the status from the worst finding.
    ///
    /// Errors fail hard checks; on advisory checks they only warn.
    pub fn from_findings(check: CheckKind, mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|a, b| b.severity.cmp(&a.severity));
        let worst = findings.first().map(|f| f.severity);

        let status = match worst {
            Some(Severity::Error) if !check.is_advisory() => CheckStatus::Fail,
            Some(Severity::Error) | Some(Severity::Warning) => CheckStatus::Warn,
            _ => CheckStatus::Pass,
        };

        Self {
            check,
            status,
            findings,
        }
    }

    /// Whether this outcome blocks promotion.
    pub fn is_hard_failure(&self) -> bool {
        self.status == CheckStatus::Fail
    }

    /// Findings at or above a severity.
    pub fn findings_at_least(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity >= severity)
    }
}

/// All check outcomes for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: String,
    pub lexicon: String,
    pub checks: Vec<CheckOutcome>,
}

impl CycleReport {
    /// Outcome of one check, if it ran.
    pub fn check(&self, kind: CheckKind) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.check == kind)
    }

    /// Checks that failed.
    pub fn failed_hard_checks(&self) -> impl Iterator<Item = CheckKind> + '_ {
        self.checks
            .iter()
            .filter(|c| c.is_hard_failure())
            .map(|c| c.check)
    }

    /// Whether no hard check failed.
    pub fn passed(&self) -> bool {
        self.failed_hard_checks().next().is_none()
    }

    /// Checks that ended in a warning.
    pub fn warning_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warn)
            .count()
    }
}

/// Validation results across cycles, tied to the codebook that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub codebook: CodebookProvenance,
    pub cycles: Vec<CycleReport>,
}

impl ValidationReport {
    /// Stamp a report with the current time.
    pub fn new(codebook: CodebookProvenance, cycles: Vec<CycleReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            codebook,
            cycles,
        }
    }

    /// Report for one cycle.
    pub fn cycle(&self, cycle: &str) -> Option<&CycleReport> {
        self.cycles.iter().find(|c| c.cycle == cycle)
    }

    /// `"<cycle>: <check>"` for every failed hard check.
    pub fn failed_hard_checks(&self) -> Vec<String> {
        self.cycles
            .iter()
            .flat_map(|c| {
                c.failed_hard_checks()
                    .map(move |k| format!("{}: {}", c.cycle, k.label()))
            })
            .collect()
    }

    /// Whether every cycle passed every hard check.
    pub fn is_promotable(&self) -> bool {
        self.cycles.iter().all(|c| c.passed())
    }

    /// Turn hard failures into a `ValidationFailure` error.
    ///
    /// The harmonized data is left as it is either way.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed_hard_checks();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(EquateError::ValidationFailure { failed })
        }
    }

    /// Save the report as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            fs::create_dir_all(parent).map_err(|e| {
                EquateError::Persistence(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(path).map_err(|e| EquateError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| {
            EquateError::Persistence(format!("Failed to serialize validation report: {}", e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(cycle: &str, outcomes: Vec<CheckOutcome>) -> CycleReport {
        CycleReport {
            cycle: cycle.to_string(),
            lexicon: "nsch_2016".to_string(),
            checks: outcomes,
        }
    }

    #[test]
    fn test_status_from_findings() {
        let pass = CheckOutcome::from_findings(
            CheckKind::ZeroBased,
            vec![Finding::info("no data").for_column("calm")],
        );
        assert_eq!(pass.status, CheckStatus::Pass);

        let fail = CheckOutcome::from_findings(
            CheckKind::ZeroBased,
            vec![
                Finding::info("ok"),
                Finding::error("min is 1").with_observed(1).with_expected(0),
            ],
        );
        assert_eq!(fail.status, CheckStatus::Fail);
        assert_eq!(fail.findings[0].severity, Severity::Error);

        let advisory = CheckOutcome::from_findings(
            CheckKind::AgeGradient,
            vec![Finding::error("falls with age")],
        );
        assert_eq!(advisory.status, CheckStatus::Warn);
    }

    #[test]
    fn test_into_result() {
        let ok = ValidationReport::new(
            CodebookProvenance::default(),
            vec![cycle(
                "2016",
                vec![CheckOutcome::from_findings(CheckKind::AgeGradient, vec![Finding::warning("weak")])],
            )],
        );
        assert!(ok.is_promotable());
        assert!(ok.into_result().is_ok());

        let bad = ValidationReport::new(
            CodebookProvenance::default(),
            vec![cycle(
                "2017",
                vec![CheckOutcome::from_findings(CheckKind::ColumnCount, vec![Finding::error("missing")])],
            )],
        );
        match bad.into_result() {
            Err(EquateError::ValidationFailure { failed }) => {
                assert_eq!(failed, vec!["2017: column count"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("validation.json");
        let report = ValidationReport::new(CodebookProvenance::default(), Vec::new());
        report.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let parsed: ValidationReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.cycles.len(), 0);
    }
}
