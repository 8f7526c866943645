//! Run configuration, loadable from TOML.
//!
//! Every section has a default, so a config file only needs to name the
//! values it changes:
//!
//! ```toml
//! fail_on_empty_domain = false
//!
//! [input]
//! unit_id_column = "hhid"
//! cycle_column = "year"
//! covariates = ["sc_age_years"]
//!
//! [coverage]
//! count = 25
//!
//! [validation]
//! age_covariate = "sc_age_years"
//! developmental_items = [{ equate_name = "dev_count", min_age = 3, max_age = 5 }]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EquateError, Result};
use crate::input::ParserConfig;
use crate::selector::CoverageThreshold;

/// Default lower bound of the missing-value sentinel range.
pub const DEFAULT_SENTINEL_FLOOR: f64 = 90.0;

/// Top-level configuration for a harmonization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EquateConfig {
    /// Layout of raw extracts.
    pub input: InputConfig,
    /// Missing-value sentinel policy.
    pub missing: MissingPolicy,
    /// Minimum coverage for the precomputed fast path.
    pub coverage: CoverageThreshold,
    /// Thresholds for the validation suite.
    pub validation: ValidationConfig,
    /// Reject items with no non-missing observations instead of emitting an
    /// all-null column.
    pub fail_on_empty_domain: bool,
}

impl EquateConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EquateConfig = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| EquateError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Reject values no run could use.
    pub fn check(&self) -> Result<()> {
        if self.input.unit_id_column.trim().is_empty() {
            return Err(EquateError::Config(
                "input.unit_id_column must not be empty".to_string(),
            ));
        }
        if !self.missing.sentinel_floor.is_finite() {
            return Err(EquateError::Config(
                "missing.sentinel_floor must be finite".to_string(),
            ));
        }
        if let CoverageThreshold::Fraction(f) = self.coverage {
            if !(0.0..=1.0).contains(&f) {
                return Err(EquateError::Config(format!(
                    "coverage fraction {} outside [0, 1]",
                    f
                )));
            }
        }
        if !(-1.0..=1.0).contains(&self.validation.reverse_correlation_max) {
            return Err(EquateError::Config(
                "validation.reverse_correlation_max must lie in [-1, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.validation.equivalence_min) {
            return Err(EquateError::Config(
                "validation.equivalence_min must lie in [0, 1]".to_string(),
            ));
        }
        for item in &self.validation.developmental_items {
            if item.min_age > item.max_age {
                return Err(EquateError::Config(format!(
                    "developmental item '{}' has min_age > max_age",
                    item.equate_name
                )));
            }
        }
        Ok(())
    }
}

/// Column layout of a raw extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Column holding the household/unit identifier.
    pub unit_id_column: String,
    /// Column holding the cycle tag, when the extract carries one.
    pub cycle_column: Option<String>,
    /// Unit-level covariates kept for validation, never transformed.
    pub covariates: Vec<String>,
    /// Columns present in extracts that are neither items nor covariates.
    pub ignore_columns: Vec<String>,
    /// Field delimiter (None = auto-detect).
    pub delimiter: Option<char>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            unit_id_column: "hhid".to_string(),
            cycle_column: Some("year".to_string()),
            covariates: vec!["age".to_string()],
            ignore_columns: Vec::new(),
            delimiter: None,
        }
    }
}

impl InputConfig {
    /// Parser settings implied by this layout.
    pub fn parser_config(&self) -> Result<ParserConfig> {
        let delimiter = match self.delimiter {
            None => None,
            Some(c) if c.is_ascii() => Some(c as u8),
            Some(c) => {
                return Err(EquateError::InvalidDelimiter(format!(
                    "'{}' is not a single-byte delimiter",
                    c
                )));
            }
        };
        Ok(ParserConfig {
            delimiter,
            ..ParserConfig::default()
        })
    }

    /// Whether a header names a non-item column.
    pub fn is_reserved(&self, header: &str) -> bool {
        header == self.unit_id_column
            || self.cycle_column.as_deref() == Some(header)
            || self.covariates.iter().any(|c| c == header)
            || self.ignore_columns.iter().any(|c| c == header)
    }
}

/// Which raw codes count as missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingPolicy {
    /// Any raw value at or above this floor is a missing sentinel.
    pub sentinel_floor: f64,
}

impl Default for MissingPolicy {
    fn default() -> Self {
        Self {
            sentinel_floor: DEFAULT_SENTINEL_FLOOR,
        }
    }
}

impl MissingPolicy {
    /// Whether a raw code is a missing sentinel.
    pub fn is_sentinel(&self, value: f64) -> bool {
        value >= self.sentinel_floor
    }

    /// The raw value if it is usable data.
    pub fn usable(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|v| !self.is_sentinel(*v))
    }
}

/// Thresholds and sampling for the validation suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest acceptable raw/harmonized correlation for reverse items.
    pub reverse_correlation_max: f64,
    /// Minimum exact-match fraction in the equivalence check (exclusive).
    pub equivalence_min: f64,
    /// Number of reverse items sampled when `reverse_sample` is empty.
    pub reverse_sample_size: usize,
    /// Explicit reverse items (item ids or equate names) to check.
    pub reverse_sample: Vec<String>,
    /// Covariate holding unit age.
    pub age_covariate: String,
    /// Correlation below which a developmental item draws a warning.
    pub age_gradient_min: f64,
    /// Items expected to rise with age within an administered range.
    pub developmental_items: Vec<DevelopmentalItem>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reverse_correlation_max: -0.999,
            equivalence_min: 0.99,
            reverse_sample_size: 10,
            reverse_sample: Vec::new(),
            age_covariate: "age".to_string(),
            age_gradient_min: 0.0,
            developmental_items: Vec::new(),
        }
    }
}

/// A harmonized item expected to track development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentalItem {
    pub equate_name: String,
    pub min_age: f64,
    pub max_age: f64,
}

impl DevelopmentalItem {
    /// Whether the item is asked of a child of this age.
    pub fn administered_at(&self, age: f64) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EquateConfig::default();
        assert_eq!(config.missing.sentinel_floor, 90.0);
        assert_eq!(config.coverage, CoverageThreshold::Fraction(1.0));
        assert_eq!(config.validation.reverse_correlation_max, -0.999);
        assert!(!config.fail_on_empty_domain);
    }

    #[test]
    fn test_partial_toml() {
        let config = EquateConfig::from_toml_str(
            r#"
            [input]
            unit_id_column = "HHID"
            covariates = ["sc_age_years"]

            [coverage]
            count = 25

            [validation]
            age_covariate = "sc_age_years"
            developmental_items = [{ equate_name = "dev_count", min_age = 3, max_age = 5 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.input.unit_id_column, "HHID");
        assert_eq!(config.input.cycle_column.as_deref(), Some("year"));
        assert_eq!(config.coverage, CoverageThreshold::Count(25));
        assert_eq!(config.validation.developmental_items.len(), 1);
        assert!(config.validation.developmental_items[0].administered_at(4.0));
        assert_eq!(config.validation.equivalence_min, 0.99);
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let err = EquateConfig::from_toml_str("[coverage]\nfraction = 1.5\n").unwrap_err();
        assert!(matches!(err, EquateError::Config(_)));
    }

    #[test]
    fn test_missing_policy() {
        let policy = MissingPolicy::default();
        assert!(policy.is_sentinel(90.0));
        assert!(policy.is_sentinel(99.0));
        assert!(!policy.is_sentinel(89.0));
        assert_eq!(policy.usable(None), None);
        assert_eq!(policy.usable(Some(95.0)), None);
        assert_eq!(policy.usable(Some(3.0)), Some(3.0));
    }
}
