//! The validation suite: seven independent checks over one harmonized cycle.

use std::collections::BTreeSet;

use serde_json::json;

use super::report::{CheckKind, CheckOutcome, CycleReport, Finding};
use crate::codebook::{CodebookEntry, Orientation, Registry};
use crate::config::{MissingPolicy, ValidationConfig};
use crate::stats::{self, PairedStats};
use crate::table::{HarmonizedTable, RawTable};

/// Maximum number of unit ids quoted in a finding.
const SAMPLE_UNITS: usize = 5;

/// Everything a check may look at for one cycle.
///
/// Raw and harmonized rows are matched by unit id, so a harmonized table read
/// back from a store in a different row order validates the same way.
pub struct ValidationInput<'a> {
    pub lexicon: &'a str,
    pub registry: &'a Registry,
    pub raw: &'a RawTable,
    pub harmonized: &'a HarmonizedTable,
    pub missing: MissingPolicy,
    pub config: &'a ValidationConfig,
    /// Harmonized row for each raw row, if the unit is present.
    alignment: Vec<Option<usize>>,
}

impl<'a> ValidationInput<'a> {
/// Pair a raw extract with its harmonized table, aligned by unit id.
    pub fn new(
        lexicon: &'a str,
        registry: &'a Registry,
        raw: &'a RawTable,
        harmonized: &'a HarmonizedTable,
        missing: MissingPolicy,
        config: &'a ValidationConfig,
    ) -> Self {
        let index = harmonized.row_index();
        let alignment = raw
            .unit_ids()
            .iter()
            .map(|id| index.get(id.as_str()).copied())
            .collect();

        Self {
            lexicon,
            registry,
            raw,
            harmonized,
            missing,
            config,
            alignment,
        }
    }

    /// Cycle under validation.
    pub fn cycle(&self) -> &str {
        self.harmonized.cycle()
    }

    /// Raw units the harmonized table has no row for.
    fn dropped_units(&self) -> Vec<&'a str> {
        let ids = self.raw.unit_ids();
        self.alignment
            .iter()
            .zip(ids)
            .filter(|(target, _)| target.is_none())
            .map(|(_, id)| id.as_str())
            .collect()
    }

    /// Harmonized units with no raw row behind them.
    fn invented_units(&self) -> Vec<&'a str> {
        let index = self.raw.row_index();
        self.harmonized
            .unit_ids()
            .iter()
            .filter(|id| !index.contains_key(id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Declared entries carried by both the raw and the harmonized table.
    fn paired_entries(&self) -> impl Iterator<Item = &'a CodebookEntry> + '_ {
        self.registry
            .entries(self.lexicon)
            .filter(|e| self.raw.has_item(&e.item) && self.harmonized.has_column(&e.equate_name))
    }

    /// `(unit id, raw, harmonized)` for every unit present in both tables.
    fn pairs(
        &self,
        entry: &CodebookEntry,
    ) -> impl Iterator<Item = (&'a str, Option<f64>, Option<i64>)> + '_ {
        let raw = self.raw.item(&entry.item).unwrap_or(&[]);
        let harmonized = self.harmonized.column(&entry.equate_name).unwrap_or(&[]);
        let ids = self.raw.unit_ids();

        self.alignment
            .iter()
            .enumerate()
            .filter_map(move |(row, target)| {
                let target = (*target)?;
                Some((
                    ids[row].as_str(),
                    raw.get(row).copied().flatten(),
                    harmonized.get(target).copied().flatten(),
                ))
            })
    }
}

/// A single validation check.
pub trait Check: Send + Sync {
    fn kind(&self) -> CheckKind;

    /// Inspect the cycle and report findings; an empty list is a pass.
    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding>;
}

// =============================================================================
// 1. COLUMN COUNT
// =============================================================================

pub struct ColumnCountCheck;

impl Check for ColumnCountCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ColumnCount
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let expected = input.registry.expected_equate_names(input.lexicon);
        let present: BTreeSet<String> = input
            .harmonized
            .column_names()
            .map(str::to_string)
            .collect();

        let missing: Vec<&String> = expected.difference(&present).collect();
        let extra: Vec<&String> = present.difference(&expected).collect();

        if missing.is_empty() && extra.is_empty() {
            return vec![Finding::info(format!(
                "all {} expected columns present",
                expected.len()
            ))];
        }

        let mut findings = Vec::new();
        if !missing.is_empty() {
            findings.push(
                Finding::error(format!("{} expected columns missing", missing.len()))
                    .with_observed(json!({ "count": present.len(), "missing": missing }))
                    .with_expected(expected.len()),
            );
        }
        if !extra.is_empty() {
            findings.push(
                Finding::error(format!("{} unexpected columns present", extra.len()))
                    .with_observed(json!({ "count": present.len(), "extra": extra }))
                    .with_expected(expected.len()),
            );
        }
        findings
    }
}

// =============================================================================
// 2. ZERO-BASED ENCODING
// =============================================================================

pub struct ZeroBasedCheck;

impl Check for ZeroBasedCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ZeroBased
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (name, values) in input.harmonized.columns() {
            match values.iter().flatten().min() {
                None => findings.push(Finding::info("no data").for_column(name)),
                Some(&0) => {}
                Some(&min) => findings.push(
                    Finding::error(format!("minimum is {}", min))
                        .for_column(name)
                        .with_observed(min)
                        .with_expected(0),
                ),
            }
        }
        findings
    }
}

// =============================================================================
// 3. REVERSE-CODING CORRECTNESS
// =============================================================================

pub struct ReverseCodingCheck;

impl ReverseCodingCheck {
    /// The explicit sample if one is configured, else the first reverse
    /// items in codebook order that both tables carry.
    fn sample<'a>(
        &self,
        input: &ValidationInput<'a>,
        findings: &mut Vec<Finding>,
    ) -> Vec<&'a CodebookEntry> {
        if input.config.reverse_sample.is_empty() {
            return input
                .paired_entries()
                .filter(|e| e.orientation == Orientation::Reverse)
                .take(input.config.reverse_sample_size)
                .collect();
        }

        let mut sample = Vec::new();
        for name in &input.config.reverse_sample {
            match input.registry.resolve(input.lexicon, name) {
                None => findings.push(
                    Finding::warning("sampled name is not declared for this lexicon")
                        .for_column(name.clone()),
                ),
                Some(entry) if entry.orientation != Orientation::Reverse => findings.push(
                    Finding::warning("sampled item is not reverse-coded")
                        .for_column(entry.equate_name.clone()),
                ),
                Some(entry)
                    if !input.raw.has_item(&entry.item)
                        || !input.harmonized.has_column(&entry.equate_name) =>
                {
                    findings.push(
                        Finding::info("sampled item not present in this cycle")
                            .for_column(entry.equate_name.clone()),
                    )
                }
                Some(entry) => sample.push(entry),
            }
        }
        sample
    }
}

impl Check for ReverseCodingCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ReverseCoding
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let sample = self.sample(input, &mut findings);

        if sample.is_empty() {
            findings.push(Finding::info("no reverse items to sample"));
            return findings;
        }

        for entry in sample {
            let stats: PairedStats = input
                .pairs(entry)
                .filter_map(|(_, raw, harmonized)| {
                    Some((input.missing.usable(raw)?, harmonized? as f64))
                })
                .collect();

            let name = entry.equate_name.clone();
            match stats.correlation() {
                None if stats.count() == 0 => {
                    findings.push(Finding::info("no data").for_column(name))
                }
                None => findings.push(
                    Finding::info("no variance")
                        .for_column(name)
                        .with_observed(json!({ "pairs": stats.count() })),
                ),
                Some(r) if r > input.config.reverse_correlation_max => findings.push(
                    Finding::error(format!("raw/harmonized correlation {:.4}", r))
                        .for_column(name)
                        .with_observed(r)
                        .with_expected(format!("<= {}", input.config.reverse_correlation_max)),
                ),
                Some(_) => {}
            }
        }
        findings
    }
}

// =============================================================================
// 4. MISSING-VALUE EXCLUSION
// =============================================================================

pub struct MissingExclusionCheck;

impl Check for MissingExclusionCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::MissingExclusion
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        // A lost row is lost data whatever its codes were
        let dropped = input.dropped_units();
        if !dropped.is_empty() {
            findings.push(
                Finding::error(format!("{} raw units have no harmonized row", dropped.len()))
                    .with_observed(json!({
                        "units": input.harmonized.row_count(),
                        "dropped": &dropped[..dropped.len().min(SAMPLE_UNITS)],
                    }))
                    .with_expected(input.raw.row_count()),
            );
        }
        let invented = input.invented_units();
        if !invented.is_empty() {
            findings.push(
                Finding::error(format!("{} harmonized units have no raw row", invented.len()))
                    .with_observed(json!({
                        "units": input.harmonized.row_count(),
                        "invented": &invented[..invented.len().min(SAMPLE_UNITS)],
                    }))
                    .with_expected(input.raw.row_count()),
            );
        }

        for entry in input.paired_entries() {
            let mut sentinels = 0usize;
            let mut blanks = 0usize;
            let mut nulls = 0usize;
            let mut mismatched = Vec::new();

            for (unit, raw, harmonized) in input.pairs(entry) {
                let raw_missing = match raw {
                    None => {
                        blanks += 1;
                        true
                    }
                    Some(v) if input.missing.is_sentinel(v) => {
                        sentinels += 1;
                        true
                    }
                    Some(_) => false,
                };
                if harmonized.is_none() {
                    nulls += 1;
                }
                if raw_missing != harmonized.is_none() {
                    mismatched.push(unit);
                }
            }

            if !mismatched.is_empty() {
                let sample: Vec<&str> = mismatched.iter().take(SAMPLE_UNITS).copied().collect();
                findings.push(
                    Finding::error(format!(
                        "{} units disagree between raw missing codes and harmonized nulls",
                        mismatched.len()
                    ))
                    .for_column(entry.equate_name.clone())
                    .with_observed(json!({
                        "harmonized_null": nulls,
                        "units": sample,
                    }))
                    .with_expected(json!({
                        "raw_sentinel": sentinels,
                        "raw_blank": blanks,
                    })),
                );
            }
        }
        findings
    }
}

// =============================================================================
// 5. TRANSFORMATION EQUIVALENCE
// =============================================================================

pub struct TransformEquivalenceCheck;

impl TransformEquivalenceCheck {
    /// Expected harmonized values straight from the raw column.
    fn recompute(raw: &[Option<f64>], orientation: Orientation, missing: &MissingPolicy) -> Vec<Option<f64>> {
        let usable: Vec<Option<f64>> = raw.iter().map(|v| missing.usable(*v)).collect();
        let (min, max) = usable
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        usable
            .into_iter()
            .map(|v| {
                v.map(|v| match orientation {
                    Orientation::Reverse => max - v,
                    Orientation::Forward => v - min,
                })
            })
            .collect()
    }
}

impl Check for TransformEquivalenceCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::TransformEquivalence
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        for entry in input.paired_entries() {
            let raw = input.raw.item(&entry.item).unwrap_or(&[]);
            let expected = Self::recompute(raw, entry.orientation, &input.missing);
            let harmonized = input.harmonized.column(&entry.equate_name).unwrap_or(&[]);

            let mut compared = 0usize;
            let mut matched = 0usize;
            let mut agreement = PairedStats::new();

            // Raw units without a harmonized row count as mismatches
            for (row, target) in input.alignment.iter().enumerate() {
                compared += 1;
                let Some(target) = *target else { continue };
                let want = expected.get(row).copied().flatten();
                let got = harmonized.get(target).copied().flatten();

                match (want, got) {
                    (None, None) => matched += 1,
                    (Some(w), Some(g)) => {
                        if (w - g as f64).abs() < 1e-9 {
                            matched += 1;
                        }
                        agreement.add(w, g as f64);
                    }
                    _ => {}
                }
            }

            if compared == 0 {
                findings.push(Finding::info("no data").for_column(entry.equate_name.clone()));
                continue;
            }

            let fraction = matched as f64 / compared as f64;
            if fraction <= input.config.equivalence_min {
                findings.push(
                    Finding::error(format!("{:.2}% of units match the recomputation", fraction * 100.0))
                        .for_column(entry.equate_name.clone())
                        .with_observed(json!({
                            "match_fraction": fraction,
                            "correlation": agreement.correlation(),
                            "compared": compared,
                        }))
                        .with_expected(format!("> {}", input.config.equivalence_min)),
                );
            }
        }
        findings
    }
}

// =============================================================================
// 6. AGE-GRADIENT PLAUSIBILITY (advisory)
// =============================================================================

pub struct AgeGradientCheck;

impl Check for AgeGradientCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::AgeGradient
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let config = input.config;
        if config.developmental_items.is_empty() {
            return vec![Finding::info("no developmental items configured")];
        }
        let Some(ages) = input.raw.covariate(&config.age_covariate) else {
            return vec![Finding::info(format!(
                "age covariate '{}' not present",
                config.age_covariate
            ))];
        };

        let mut findings = Vec::new();
        for item in &config.developmental_items {
            let Some(values) = input.harmonized.column(&item.equate_name) else {
                findings.push(Finding::info("not present in this cycle").for_column(item.equate_name.clone()));
                continue;
            };

            let stats: PairedStats = input
                .alignment
                .iter()
                .enumerate()
                .filter_map(|(row, target)| {
                    let age = ages.get(row).copied().flatten()?;
                    let value = values.get((*target)?).copied().flatten()?;
                    item.administered_at(age).then_some((age, value as f64))
                })
                .collect();

            match stats.correlation() {
                None => findings.push(
                    Finding::info("no variance within administered ages")
                        .for_column(item.equate_name.clone())
                        .with_observed(json!({ "pairs": stats.count() })),
                ),
                Some(r) if r < config.age_gradient_min => {
                    tracing::warn!(
                        cycle = input.cycle(),
                        column = %item.equate_name,
                        r,
                        "age gradient below threshold"
                    );
                    findings.push(
                        Finding::warning(format!("age correlation {:.3}", r))
                            .for_column(item.equate_name.clone())
                            .with_observed(r)
                            .with_expected(format!(">= {}", config.age_gradient_min)),
                    )
                }
                Some(r) => findings.push(
                    Finding::info(format!("age correlation {:.3}", r))
                        .for_column(item.equate_name.clone())
                        .with_observed(r),
                ),
            }
        }
        findings
    }
}

// =============================================================================
// 7. CONTIGUOUS DOMAIN
// =============================================================================

pub struct ContiguousDomainCheck;

impl Check for ContiguousDomainCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ContiguousDomain
    }

    fn run(&self, input: &ValidationInput<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (name, values) in input.harmonized.columns() {
            let distinct = stats::distinct_values(values);
            if distinct.is_empty() {
                continue;
            }
            let breaks = stats::domain_breaks(&distinct);
            if !breaks.is_empty() {
                let (first, last) = (distinct[0], distinct[distinct.len() - 1]);
                findings.push(
                    Finding::error(format!("{} gaps between observed codes", breaks.len()))
                        .for_column(name)
                        .with_observed(json!({ "distinct": distinct, "breaks": breaks }))
                        .with_expected(json!({
                            "range": [first, last],
                            "unused": stats::unused_codes(&distinct, first, last),
                        })),
                );
            }
        }
        findings
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// The implementation behind a check kind.
pub fn check_for(kind: CheckKind) -> Box<dyn Check> {
    match kind {
        CheckKind::ColumnCount => Box::new(ColumnCountCheck),
        CheckKind::ZeroBased => Box::new(ZeroBasedCheck),
        CheckKind::ReverseCoding => Box::new(ReverseCodingCheck),
        CheckKind::MissingExclusion => Box::new(MissingExclusionCheck),
        CheckKind::TransformEquivalence => Box::new(TransformEquivalenceCheck),
        CheckKind::AgeGradient => Box::new(AgeGradientCheck),
        CheckKind::ContiguousDomain => Box::new(ContiguousDomainCheck),
    }
}

/// Runs every check against a cycle without short-circuiting.
pub struct ValidationEngine {
    checks: Vec<Box<dyn Check>>,
}

impl ValidationEngine {
    /// Engine with the full suite in its fixed order.
    pub fn new() -> Self {
        Self {
            checks: CheckKind::ALL.iter().map(|&kind| check_for(kind)).collect(),
        }
    }

    /// Engine running only the given checks.
    pub fn with_checks(checks: Vec<Box<dyn Check>>) -> Self {
        Self { checks }
    }

    /// Run every check and collect the outcomes.
    pub fn run(&self, input: &ValidationInput<'_>) -> CycleReport {
        let checks: Vec<CheckOutcome> = self
            .checks
            .iter()
            .map(|check| {
                let outcome = CheckOutcome::from_findings(check.kind(), check.run(input));
                tracing::debug!(
                    cycle = input.cycle(),
                    check = check.kind().label(),
                    status = outcome.status.label(),
                    findings = outcome.findings.len(),
                    "check finished"
                );
                outcome
            })
            .collect();

        let report = CycleReport {
            cycle: input.cycle().to_string(),
            lexicon: input.lexicon.to_string(),
            checks,
        };

        let failed: Vec<&str> = report.failed_hard_checks().map(|k| k.label()).collect();
        if failed.is_empty() {
            tracing::info!(cycle = %report.cycle, warnings = report.warning_count(), "validation passed");
        } else {
            tracing::warn!(cycle = %report.cycle, failed = ?failed, "validation failed");
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::Registry;
    use crate::config::DevelopmentalItem;
    use crate::transform::TransformEngine;
    use crate::validation::CheckStatus;

    fn registry() -> Registry {
        Registry::from_json_str(
            r#"{"lexicons": {"nsch": {
                "k2q01": {"raw_min": 1, "raw_max": 5, "orientation": "reverse", "equate_name": "gen_health"},
                "k6q70": {"raw_min": 1, "raw_max": 4, "orientation": "forward", "equate_name": "calm"},
                "k7q84": {"raw_min": 1, "raw_max": 4, "orientation": "forward", "equate_name": "counts"}
            }}}"#,
        )
        .unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("H{i}")).collect()
    }

    fn raw() -> RawTable {
        RawTable::new("2016", ids(6))
            .unwrap()
            .with_item("k2q01", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(99.0)])
            .unwrap()
            .with_item("k6q70", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(90.0), Some(95.0)])
            .unwrap()
            .with_item("k7q84", vec![Some(1.0), Some(2.0), Some(2.0), Some(3.0), Some(4.0), None])
            .unwrap()
            .with_covariate("age", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)])
            .unwrap()
    }

    fn run(raw: &RawTable, harmonized: &HarmonizedTable, config: &ValidationConfig) -> CycleReport {
        let registry = registry();
        let input = ValidationInput::new(
            "nsch",
            &registry,
            raw,
            harmonized,
            MissingPolicy::default(),
            config,
        );
        ValidationEngine::new().run(&input)
    }

    fn harmonized(raw: &RawTable) -> HarmonizedTable {
        TransformEngine::new()
            .harmonize(&registry(), raw, "nsch")
            .unwrap()
            .into_table()
    }

    #[test]
    fn test_clean_cycle_passes_every_check() {
        let raw = raw();
        let report = run(&raw, &harmonized(&raw), &ValidationConfig::default());

        let kinds: Vec<CheckKind> = report.checks.iter().map(|c| c.check).collect();
        assert_eq!(kinds, CheckKind::ALL);
        assert!(report.passed(), "{:?}", report);
    }

    #[test]
    fn test_check_for_matches_kind() {
        for kind in CheckKind::ALL {
            assert_eq!(check_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_row_order_does_not_matter() {
        let raw = raw();
        let mut shuffled = ids(6);
        shuffled.reverse();
        let harmonized = harmonized(&raw).align_to(&shuffled).unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        assert!(report.passed());
    }

    #[test]
    fn test_detects_broken_reverse_coding() {
        let raw = raw();
        let mut harmonized = harmonized(&raw);
        // Forward-coded where reverse was declared
        harmonized
            .insert_column("gen_health", vec![Some(0), Some(1), Some(2), Some(3), Some(4), None])
            .unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        let failed: Vec<CheckKind> = report.failed_hard_checks().collect();
        assert!(failed.contains(&CheckKind::ReverseCoding));
        assert!(failed.contains(&CheckKind::TransformEquivalence));
        assert!(!failed.contains(&CheckKind::ZeroBased));
    }

    #[test]
    fn test_detects_missing_and_shifted_columns() {
        let raw = raw();
        let harmonized = harmonized(&raw)
            .select(&["gen_health", "counts"])
            .with_column("counts", vec![Some(1), Some(2), Some(2), Some(3), Some(5), None])
            .unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        let failed: Vec<CheckKind> = report.failed_hard_checks().collect();
        assert!(failed.contains(&CheckKind::ColumnCount));
        assert!(failed.contains(&CheckKind::ZeroBased));
        assert!(failed.contains(&CheckKind::ContiguousDomain));

        let column_count = report.check(CheckKind::ColumnCount).unwrap();
        assert!(column_count.findings[0].observed.as_ref().unwrap()["missing"][0] == "calm");
    }

    #[test]
    fn test_detects_sentinel_leak() {
        let raw = raw();
        let mut harmonized = harmonized(&raw);
        harmonized
            .insert_column("calm", vec![Some(0), Some(1), Some(2), Some(3), Some(89), None])
            .unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        let missing = report.check(CheckKind::MissingExclusion).unwrap();
        assert_eq!(missing.status, CheckStatus::Fail);
        assert_eq!(missing.findings[0].column.as_deref(), Some("calm"));
    }

    #[test]
    fn test_empty_domain_reports_no_data() {
        let raw = RawTable::new("2016", ids(3))
            .unwrap()
            .with_item("k2q01", vec![Some(1.0), Some(3.0), Some(5.0)])
            .unwrap()
            .with_item("k6q70", vec![Some(90.0), Some(95.0), Some(99.0)])
            .unwrap()
            .with_item("k7q84", vec![Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();
        let report = run(&raw, &harmonized(&raw), &ValidationConfig::default());

        assert_eq!(report.check(CheckKind::ColumnCount).unwrap().status, CheckStatus::Pass);
        let zero = report.check(CheckKind::ZeroBased).unwrap();
        assert_eq!(zero.status, CheckStatus::Pass);
        assert!(zero
            .findings
            .iter()
            .any(|f| f.message == "no data" && f.column.as_deref() == Some("calm")));
    }

    #[test]
    fn test_detects_dropped_units() {
        let raw = raw();
        let kept: Vec<String> = ids(6).into_iter().take(4).collect();
        let harmonized = harmonized(&raw).align_to(&kept).unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        let failed: Vec<CheckKind> = report.failed_hard_checks().collect();
        assert!(failed.contains(&CheckKind::MissingExclusion));
        assert!(failed.contains(&CheckKind::TransformEquivalence));

        let missing = report.check(CheckKind::MissingExclusion).unwrap();
        let dropped = &missing.findings[0].observed.as_ref().unwrap()["dropped"];
        assert_eq!(dropped, &json!(["H5", "H6"]));
    }

    #[test]
    fn test_detects_invented_units() {
        let raw = raw();
        let mut units = ids(6);
        units.push("H99".to_string());
        let harmonized = harmonized(&raw).align_to(&units).unwrap();

        let report = run(&raw, &harmonized, &ValidationConfig::default());
        let missing = report.check(CheckKind::MissingExclusion).unwrap();
        assert_eq!(missing.status, CheckStatus::Fail);
        assert!(missing.findings.iter().any(|f| {
            f.observed.as_ref().is_some_and(|o| o["invented"] == json!(["H99"]))
        }));
    }

    #[test]
    fn test_age_gradient_is_advisory() {
        let raw = raw();
        let config = ValidationConfig {
            // gen_health falls as age rises in the fixture
            developmental_items: vec![DevelopmentalItem {
                equate_name: "gen_health".to_string(),
                min_age: 0.0,
                max_age: 17.0,
            }],
            ..ValidationConfig::default()
        };

        let report = run(&raw, &harmonized(&raw), &config);
        assert_eq!(report.check(CheckKind::AgeGradient).unwrap().status, CheckStatus::Warn);
        assert!(report.passed());
    }

    #[test]
    fn test_explicit_reverse_sample() {
        let raw = raw();
        let config = ValidationConfig {
            reverse_sample: vec!["calm".to_string(), "gen_health".to_string()],
            ..ValidationConfig::default()
        };

        let report = run(&raw, &harmonized(&raw), &config);
        let reverse = report.check(CheckKind::ReverseCoding).unwrap();
        assert_eq!(reverse.status, CheckStatus::Warn);
        assert_eq!(reverse.findings[0].column.as_deref(), Some("calm"));
    }
}
