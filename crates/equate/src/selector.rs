//! Coverage-gated choice between precomputed and on-demand harmonization.
//!
//! The fast path reads harmonized columns already in the store; the slow path
//! reads raw columns and runs the [`TransformEngine`]. There is one transform
//! and one entry point, so both paths yield identical values for any item.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codebook::Registry;
use crate::error::{EquateError, Result};
use crate::store::{HarmonizedStore, RawTableProvider};
use crate::table::{HarmonizedTable, RawTable};
use crate::transform::TransformEngine;

/// Minimum number of expected columns that must already be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageThreshold {
    /// At least this many expected columns.
    Count(usize),
    /// At least this fraction of expected columns, rounded up.
    Fraction(f64),
}

impl Default for CoverageThreshold {
    fn default() -> Self {
        CoverageThreshold::Fraction(1.0)
    }
}

impl CoverageThreshold {
    /// Columns required for the fast path out of `expected`.
    pub fn required(&self, expected: usize) -> usize {
        match *self {
            CoverageThreshold::Count(n) => n,
            CoverageThreshold::Fraction(f) => {
                let raw = (f.clamp(0.0, 1.0) * expected as f64).ceil() as usize;
                raw.min(expected)
            }
        }
    }
}

impl fmt::Display for CoverageThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageThreshold::Count(n) => write!(f, "{}", n),
            CoverageThreshold::Fraction(x) => write!(f, "{:.0}%", x * 100.0),
        }
    }
}

impl FromStr for CoverageThreshold {
    type Err = EquateError;

    /// `25` is a count; `0.9` and `90%` are fractions.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || EquateError::Config(format!("invalid coverage threshold '{}'", s));

        let fraction = if let Some(pct) = s.strip_suffix('%') {
            Some(pct.trim().parse::<f64>().map_err(|_| bad())? / 100.0)
        } else if s.contains('.') {
            Some(s.parse::<f64>().map_err(|_| bad())?)
        } else {
            None
        };
        if let Some(value) = fraction {
            if !(0.0..=1.0).contains(&value) {
                return Err(bad());
            }
            return Ok(CoverageThreshold::Fraction(value));
        }
        s.parse().map(CoverageThreshold::Count).map_err(|_| bad())
    }
}

/// Which consumption strategy a cycle takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionPath {
    /// Read precomputed harmonized columns.
    FastPath,
    /// Read raw columns and harmonize inline.
    SlowPath,
}

impl ConsumptionPath {
    /// Short name used in logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ConsumptionPath::FastPath => "fast",
            ConsumptionPath::SlowPath => "slow",
        }
    }
}

/// The path chosen for a cycle and the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDecision {
    pub cycle: String,
    pub path: ConsumptionPath,
    /// Expected equate names already persisted.
    pub coverage: usize,
    pub expected: usize,
    pub required: usize,
    /// Expected equate names not yet persisted.
    pub missing: Vec<String>,
}

/// Decide the consumption path for a cycle.
///
/// `coverage = |available ∩ expected|`; the fast path is taken when coverage
/// meets the threshold and at least one expected column is stored. An empty
/// expected set means the declared item set cannot be found at all.
pub fn select_path(
    cycle: &str,
    available_columns: &BTreeSet<String>,
    expected_equate_names: &BTreeSet<String>,
    threshold: CoverageThreshold,
) -> Result<PathDecision> {
    if expected_equate_names.is_empty() {
        return Err(EquateError::CoverageMismatch {
            cycle: cycle.to_string(),
            message: "no expected equate names declared".to_string(),
        });
    }

    let coverage = available_columns
        .intersection(expected_equate_names)
        .count();
    let required = threshold.required(expected_equate_names.len());
    let path = if coverage > 0 && coverage >= required {
        ConsumptionPath::FastPath
    } else {
        ConsumptionPath::SlowPath
    };
    let missing = expected_equate_names
        .difference(available_columns)
        .cloned()
        .collect();

    tracing::info!(
        cycle,
        path = path.label(),
        coverage,
        expected = expected_equate_names.len(),
        required,
        "selected consumption path"
    );

    Ok(PathDecision {
        cycle: cycle.to_string(),
        path,
        coverage,
        expected: expected_equate_names.len(),
        required,
        missing,
    })
}

/// Harmonized data delivered to a consumer, with the decision that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Consumed {
    pub decision: PathDecision,
    pub table: HarmonizedTable,
}

/// Deliver a cycle's harmonized matrix through whichever path coverage allows.
///
/// The returned table carries the expected equate names in codebook order
/// that either path can supply, for every unit of the raw extract. On the
/// fast path, stored rows come first and raw units the store lacks follow;
/// expected columns missing from the store and rows for those units are
/// computed from raw.
///
/// Both paths reject a raw extract carrying an item not declared for
/// `lexicon`, as [`TransformEngine::harmonize`] does.
pub fn consume(
    registry: &Registry,
    engine: &TransformEngine,
    store: &dyn HarmonizedStore,
    provider: &dyn RawTableProvider,
    lexicon: &str,
    cycle: &str,
    threshold: CoverageThreshold,
) -> Result<Consumed> {
    let expected = registry.expected_equate_names(lexicon);
    let available = store.available_columns(cycle)?;
    let decision = select_path(cycle, &available, &expected, threshold)?;

    let ordered: Vec<String> = registry
        .entries(lexicon)
        .map(|e| e.equate_name.clone())
        .collect();

    let table = match decision.path {
        ConsumptionPath::FastPath => {
            let present: Vec<String> = ordered
                .iter()
                .filter(|name| available.contains(*name))
                .cloned()
                .collect();
            let stored = store.read(cycle, &present)?;
            let raw = provider.read_raw(cycle)?;
            ensure_declared(registry, &raw, lexicon)?;

            let stored_rows = stored.row_count();
            let index = stored.row_index();
            let fresh: Vec<String> = raw
                .unit_ids()
                .iter()
                .filter(|id| !index.contains_key(id.as_str()))
                .cloned()
                .collect();
            let units: Vec<String> = stored.unit_ids().iter().chain(&fresh).cloned().collect();
            let mut table = stored.align_to(&units)?;

            let items: Vec<String> = if fresh.is_empty() {
                decision
                    .missing
                    .iter()
                    .filter_map(|name| registry.reverse_lookup(lexicon, name))
                    .filter(|e| raw.has_item(&e.item))
                    .map(|e| e.item.clone())
                    .collect()
            } else {
                raw.item_names().map(str::to_string).collect()
            };

            if !items.is_empty() {
                tracing::debug!(
                    cycle,
                    items = items.len(),
                    fresh_units = fresh.len(),
                    "filling uncovered cells from raw"
                );
                let computed = engine
                    .harmonize_items(registry, &raw, lexicon, &items)?
                    .into_table()
                    .align_to(&units)?;
                for (name, values) in computed.columns() {
                    // Stored cells win; only rows past the stored ones are filled
                    let merged = match table.column(name) {
                        Some(kept) => kept[..stored_rows]
                            .iter()
                            .chain(&values[stored_rows..])
                            .copied()
                            .collect(),
                        None => values.to_vec(),
                    };
                    table.insert_column(name, merged)?;
                }
            }

            table.select(&ordered)
        }
        ConsumptionPath::SlowPath => {
            let raw = provider.read_raw(cycle)?;
            if !registry.entries(lexicon).any(|e| raw.has_item(&e.item)) {
                return Err(EquateError::CoverageMismatch {
                    cycle: cycle.to_string(),
                    message: format!(
                        "neither the store nor the raw extract carries any item of lexicon '{}'",
                        lexicon
                    ),
                });
            }
            ensure_declared(registry, &raw, lexicon)?;

            engine
                .harmonize(registry, &raw, lexicon)?
                .into_table()
                .select(&ordered)
        }
    };

    Ok(Consumed { decision, table })
}

/// `UnknownItem` for the first raw item `lexicon` does not declare.
fn ensure_declared(registry: &Registry, raw: &RawTable, lexicon: &str) -> Result<()> {
    match raw
        .item_names()
        .find(|item| registry.lookup(lexicon, item).is_none())
    {
        Some(item) => Err(EquateError::UnknownItem {
            lexicon: lexicon.to_string(),
            item: item.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> BTreeSet<String> {
        (0..n).map(|i| format!("item_{:02}", i)).collect()
    }

    #[test]
    fn test_threshold_count() {
        let expected = names(29);
        let available: BTreeSet<String> = names(25);

        let fast = select_path("2016", &available, &expected, CoverageThreshold::Count(25)).unwrap();
        assert_eq!(fast.path, ConsumptionPath::FastPath);
        assert_eq!(fast.coverage, 25);
        assert_eq!(fast.missing.len(), 4);

        let slow = select_path("2016", &available, &expected, CoverageThreshold::Count(26)).unwrap();
        assert_eq!(slow.path, ConsumptionPath::SlowPath);
    }

    #[test]
    fn test_unexpected_columns_do_not_count() {
        let expected = names(3);
        let mut available = names(2);
        available.insert("unrelated".to_string());

        let decision =
            select_path("2016", &available, &expected, CoverageThreshold::Count(3)).unwrap();
        assert_eq!(decision.coverage, 2);
        assert_eq!(decision.path, ConsumptionPath::SlowPath);
    }

    #[test]
    fn test_threshold_fraction_rounds_up() {
        assert_eq!(CoverageThreshold::Fraction(0.9).required(29), 27);
        assert_eq!(CoverageThreshold::Fraction(1.0).required(29), 29);
        assert_eq!(CoverageThreshold::Fraction(0.0).required(29), 0);
    }

    #[test]
    fn test_nothing_stored_takes_slow_path() {
        let expected = names(3);
        for threshold in [CoverageThreshold::Count(0), CoverageThreshold::Fraction(0.0)] {
            let decision = select_path("2016", &BTreeSet::new(), &expected, threshold).unwrap();
            assert_eq!(decision.path, ConsumptionPath::SlowPath);
            assert_eq!(decision.missing.len(), 3);
        }
    }

    #[test]
    fn test_empty_expected_is_mismatch() {
        let err = select_path(
            "2016",
            &names(3),
            &BTreeSet::new(),
            CoverageThreshold::Count(0),
        )
        .unwrap_err();
        assert!(matches!(err, EquateError::CoverageMismatch { .. }));
    }

    #[test]
    fn test_threshold_parse() {
        assert_eq!("25".parse::<CoverageThreshold>().unwrap(), CoverageThreshold::Count(25));
        assert_eq!("0.9".parse::<CoverageThreshold>().unwrap(), CoverageThreshold::Fraction(0.9));
        assert_eq!("90%".parse::<CoverageThreshold>().unwrap(), CoverageThreshold::Fraction(0.9));
        assert!("lots".parse::<CoverageThreshold>().is_err());
        assert!("1.5".parse::<CoverageThreshold>().is_err());
    }
}
