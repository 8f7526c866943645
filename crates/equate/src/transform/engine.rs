//! Transformation engine: raw codes to zero-based, positively oriented codes.

use crate::codebook::{DirectionClassifier, Orientation, Registry};
use crate::config::MissingPolicy;
use crate::error::{EquateError, Result};
use crate::stats;
use crate::table::{HarmonizedTable, RawTable};

use super::operations::{HarmonizeResult, ItemTransform, ObservedBounds, TransformNote};

/// Harmonized values of a single column plus what was learned doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTransform {
    pub values: Vec<Option<i64>>,
    /// `None` when every value was missing.
    pub bounds: Option<ObservedBounds>,
    pub sentinel_count: usize,
    pub blank_count: usize,
}

/// Largest raw code magnitude accepted (2^53).
pub const MAX_CODE_MAGNITUDE: f64 = 9_007_199_254_740_992.0;

/// A non-missing raw value that cannot be harmonized as a code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCode {
    /// Zero-based row of the offending value.
    pub row: usize,
    pub value: f64,
    pub reason: InvalidReason,
}

/// Why a raw code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NonIntegral,
    OutOfRange,
}

impl InvalidCode {
    /// Human-readable reason, used in `Parse` errors.
    pub fn describe(&self) -> String {
        match self.reason {
            InvalidReason::NonIntegral => format!("raw code {} is not a whole number", self.value),
            InvalidReason::OutOfRange => format!(
                "raw code {} is outside the harmonizable range of +/-{}",
                self.value, MAX_CODE_MAGNITUDE
            ),
        }
    }
}

/// Transform one raw column.
///
/// Sentinels become null and are excluded from the observed bounds. Reverse
/// items map to `observed_max - raw`, forward items to `raw - observed_min`.
/// The input slice is never modified.
pub fn transform_column(
    values: &[Option<f64>],
    orientation: Orientation,
    policy: &MissingPolicy,
) -> std::result::Result<ColumnTransform, InvalidCode> {
    let mut codes: Vec<Option<i64>> = Vec::with_capacity(values.len());
    let mut sentinel_count = 0;
    let mut blank_count = 0;

    for (row, value) in values.iter().enumerate() {
        match *value {
            None => {
                blank_count += 1;
                codes.push(None);
            }
            Some(v) if policy.is_sentinel(v) => {
                sentinel_count += 1;
                codes.push(None);
            }
            Some(v) => {
                let reason = if !v.is_finite() || v.abs() > MAX_CODE_MAGNITUDE {
                    Some(InvalidReason::OutOfRange)
                } else if v.fract() != 0.0 {
                    Some(InvalidReason::NonIntegral)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(InvalidCode { row, value: v, reason });
                }
                codes.push(Some(v as i64));
            }
        }
    }

    let bounds = observed_bounds(&codes);
    let values = match bounds {
        Some(b) => codes
            .into_iter()
            .enumerate()
            .map(|(row, code)| match code {
                None => Ok(None),
                Some(raw) => match orientation {
                    Orientation::Reverse => b.max.checked_sub(raw),
                    Orientation::Forward => raw.checked_sub(b.min),
                }
                .map(Some)
                .ok_or(InvalidCode {
                    row,
                    value: raw as f64,
                    reason: InvalidReason::OutOfRange,
                }),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => codes,
    };

    Ok(ColumnTransform {
        values,
        bounds,
        sentinel_count,
        blank_count,
    })
}

/// Recover raw codes from harmonized codes and the bounds that produced them.
pub fn restore_column(
    harmonized: &[Option<i64>],
    bounds: ObservedBounds,
    orientation: Orientation,
) -> Vec<Option<i64>> {
    harmonized
        .iter()
        .map(|code| {
            code.map(|h| match orientation {
                Orientation::Reverse => bounds.max - h,
                Orientation::Forward => h + bounds.min,
            })
        })
        .collect()
}

fn observed_bounds(codes: &[Option<i64>]) -> Option<ObservedBounds> {
    let mut present = codes.iter().flatten();
    let first = *present.next()?;
    let (min, max) = present.fold((first, first), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    Some(ObservedBounds { min, max })
}

/// Applies the harmonization transform to a cycle's raw table.
#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    missing: MissingPolicy,
    fail_on_empty_domain: bool,
}

impl TransformEngine {
    /// Create an engine with the default sentinel floor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom missing-value policy.
    pub fn with_policy(missing: MissingPolicy) -> Self {
        Self {
            missing,
            fail_on_empty_domain: false,
        }
    }

    /// Return `EmptyDomain` instead of emitting an all-null column.
    pub fn fail_on_empty_domain(mut self, fail: bool) -> Self {
        self.fail_on_empty_domain = fail;
        self
    }

    /// The policy deciding which raw codes are missing.
    pub fn missing_policy(&self) -> &MissingPolicy {
        &self.missing
    }

    /// Harmonize every item column of `raw` under `lexicon`.
    ///
    /// Every raw item must be declared for the lexicon; an undeclared item
    /// fails the whole cycle rather than being dropped.
    pub fn harmonize(
        &self,
        registry: &Registry,
        raw: &RawTable,
        lexicon: &str,
    ) -> Result<HarmonizeResult> {
        let items: Vec<&str> = raw.item_names().collect();
        self.harmonize_items(registry, raw, lexicon, &items)
    }

    /// Harmonize only the named raw items.
    pub fn harmonize_items<S: AsRef<str>>(
        &self,
        registry: &Registry,
        raw: &RawTable,
        lexicon: &str,
        items: &[S],
    ) -> Result<HarmonizeResult> {
        let classification =
            DirectionClassifier::new(registry).classify(lexicon, items.iter().map(|s| s.as_ref()))?;

        let mut table = HarmonizedTable::new(raw.cycle(), raw.unit_ids().to_vec())?;
        let mut records = Vec::with_capacity(items.len());

        for item in items {
            let item = item.as_ref();
            let entry = registry
                .lookup(lexicon, item)
                .ok_or_else(|| EquateError::UnknownItem {
                    lexicon: lexicon.to_string(),
                    item: item.to_string(),
                })?;
            let orientation = classification
                .orientation_of(item)
                .unwrap_or(entry.orientation);

            let values = raw.item(item).ok_or_else(|| {
                EquateError::Config(format!(
                    "item '{}' requested but absent from cycle '{}'",
                    item,
                    raw.cycle()
                ))
            })?;

            let column = transform_column(values, orientation, &self.missing).map_err(|bad| {
                EquateError::Parse {
                    row: bad.row + 1,
                    column: item.to_string(),
                    message: bad.describe(),
                }
            })?;

            let mut notes = Vec::new();
            match column.bounds {
                None => {
                    if self.fail_on_empty_domain {
                        return Err(EquateError::EmptyDomain {
                            cycle: raw.cycle().to_string(),
                            item: item.to_string(),
                        });
                    }
                    tracing::warn!(
                        cycle = raw.cycle(),
                        item,
                        "no non-missing values; harmonized column is all null"
                    );
                    notes.push(TransformNote::EmptyDomain);
                }
                Some(bounds) => {
                    if !entry.within_declared(bounds.min as f64)
                        || !entry.within_declared(bounds.max as f64)
                    {
                        tracing::warn!(
                            cycle = raw.cycle(),
                            item,
                            observed_min = bounds.min,
                            observed_max = bounds.max,
                            raw_min = entry.raw_min,
                            raw_max = entry.raw_max,
                            "observed codes exceed declared bounds; using observed bounds"
                        );
                        notes.push(TransformNote::DeclaredBoundsExceeded {
                            observed_min: bounds.min,
                            observed_max: bounds.max,
                            raw_min: entry.raw_min,
                            raw_max: entry.raw_max,
                        });
                    }

                    let distinct = stats::distinct_values(&column.values);
                    let unused = stats::unused_codes(&distinct, 0, bounds.span());
                    if !unused.is_empty() {
                        tracing::warn!(
                            cycle = raw.cycle(),
                            item,
                            unused = ?unused,
                            "harmonized domain has gaps"
                        );
                        notes.push(TransformNote::DomainGaps {
                            unused_codes: unused,
                        });
                    }
                }
            }

            let record = ItemTransform {
                item: item.to_string(),
                equate_name: entry.equate_name.clone(),
                orientation,
                observed: column.bounds,
                values_transformed: column.values.iter().filter(|v| v.is_some()).count(),
                sentinel_count: column.sentinel_count,
                blank_count: column.blank_count,
                notes,
            };
            tracing::debug!(cycle = raw.cycle(), "{}", record.description());

            table.insert_column(entry.equate_name.clone(), column.values)?;
            records.push(record);
        }

        let absent_items: Vec<String> = registry
            .entries(lexicon)
            .filter(|e| !raw.has_item(&e.item))
            .map(|e| e.item.clone())
            .collect();

        tracing::info!(
            cycle = raw.cycle(),
            lexicon,
            items = records.len(),
            reverse = classification.reverse.len(),
            absent = absent_items.len(),
            "harmonized cycle"
        );

        Ok(HarmonizeResult {
            table,
            items: records,
            absent_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_forward_with_sentinels() {
        let column = transform_column(
            &some(&[1.0, 2.0, 3.0, 4.0, 90.0, 95.0]),
            Orientation::Forward,
            &MissingPolicy::default(),
        )
        .unwrap();

        assert_eq!(
            column.values,
            vec![Some(0), Some(1), Some(2), Some(3), None, None]
        );
        assert_eq!(column.bounds, Some(ObservedBounds { min: 1, max: 4 }));
        assert_eq!(column.sentinel_count, 2);
    }

    #[test]
    fn test_reverse() {
        let column = transform_column(
            &some(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            Orientation::Reverse,
            &MissingPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            column.values,
            vec![Some(4), Some(3), Some(2), Some(1), Some(0)]
        );
    }

    #[test]
    fn test_observed_not_declared_bounds() {
        // Unused upper code 5 must not shift the reverse mapping
        let column = transform_column(
            &some(&[1.0, 2.0, 3.0, 99.0]),
            Orientation::Reverse,
            &MissingPolicy::default(),
        )
        .unwrap();
        assert_eq!(column.values, vec![Some(2), Some(1), Some(0), None]);
    }

    #[test]
    fn test_all_missing() {
        let column = transform_column(
            &[Some(90.0), None, Some(99.0)],
            Orientation::Forward,
            &MissingPolicy::default(),
        )
        .unwrap();
        assert_eq!(column.values, vec![None, None, None]);
        assert_eq!(column.bounds, None);
        assert_eq!(column.blank_count, 1);
        assert_eq!(column.sentinel_count, 2);
    }

    #[test]
    fn test_non_integral() {
        let err = transform_column(
            &some(&[1.0, 2.5]),
            Orientation::Forward,
            &MissingPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err.row, 1);
        assert_eq!(err.reason, InvalidReason::NonIntegral);
    }

    #[test]
    fn test_huge_codes_are_rejected() {
        for orientation in [Orientation::Forward, Orientation::Reverse] {
            let err = transform_column(
                &[Some(-1.0e19), Some(1.0)],
                orientation,
                &MissingPolicy::default(),
            )
            .unwrap_err();
            assert_eq!(err.row, 0);
            assert_eq!(err.reason, InvalidReason::OutOfRange);
        }

        // Largest magnitudes still harmonize without overflow
        let column = transform_column(
            &[Some(-MAX_CODE_MAGNITUDE), Some(1.0)],
            Orientation::Reverse,
            &MissingPolicy::default(),
        )
        .unwrap();
        assert_eq!(column.values[1], Some(0));
        assert_eq!(column.values[0], Some(1 + (1_i64 << 53)));
    }

    #[test]
    fn test_restore_round_trip() {
        let raw = some(&[2.0, 4.0, 3.0]);
        for orientation in [Orientation::Forward, Orientation::Reverse] {
            let column = transform_column(&raw, orientation, &MissingPolicy::default()).unwrap();
            let restored = restore_column(&column.values, column.bounds.unwrap(), orientation);
            assert_eq!(restored, vec![Some(2), Some(4), Some(3)]);
        }
    }

    fn registry() -> Registry {
        Registry::from_json_str(
            r#"{"lexicons": {"nsch_2016": {
                "k2q01": {"raw_min": 1, "raw_max": 5, "orientation": "reverse", "equate_name": "gen_health"},
                "k6q70": {"raw_min": 1, "raw_max": 4, "orientation": "forward", "equate_name": "calm"},
                "k7q84": {"raw_min": 1, "raw_max": 2, "orientation": "reverse", "equate_name": "bounce_back"}
            }}}"#,
        )
        .unwrap()
    }

    fn raw() -> RawTable {
        RawTable::new("2016", vec!["H1".into(), "H2".into(), "H3".into()])
            .unwrap()
            .with_item("k2q01", some(&[1.0, 5.0, 99.0]))
            .unwrap()
            .with_item("k6q70", some(&[2.0, 3.0, 6.0]))
            .unwrap()
    }

    #[test]
    fn test_harmonize_renames_and_records() {
        let registry = registry();
        let raw = raw();
        let result = TransformEngine::new()
            .harmonize(&registry, &raw, "nsch_2016")
            .unwrap();

        assert_eq!(
            result.table.column("gen_health").unwrap(),
            &[Some(4), Some(0), None]
        );
        assert_eq!(
            result.table.column("calm").unwrap(),
            &[Some(0), Some(1), Some(4)]
        );
        assert!(result.table.column("k2q01").is_none());
        assert_eq!(result.absent_items, vec!["k7q84"]);

        let calm = result.item("k6q70").unwrap();
        assert!(calm
            .notes
            .iter()
            .any(|n| matches!(n, TransformNote::DeclaredBoundsExceeded { .. })));
        assert!(calm
            .notes
            .iter()
            .any(|n| matches!(n, TransformNote::DomainGaps { unused_codes } if unused_codes == &vec![2, 3])));

        // Input is untouched
        assert_eq!(raw.item("k2q01").unwrap(), &[Some(1.0), Some(5.0), Some(99.0)]);
    }

    #[test]
    fn test_harmonize_rejects_undeclared_item() {
        let registry = registry();
        let raw = raw().with_item("zz_new", some(&[1.0, 2.0, 3.0])).unwrap();
        let err = TransformEngine::new()
            .harmonize(&registry, &raw, "nsch_2016")
            .unwrap_err();
        assert!(matches!(err, EquateError::UnknownItem { ref item, .. } if item == "zz_new"));
    }

    #[test]
    fn test_empty_domain_policy() {
        let registry = registry();
        let raw = RawTable::new("2016", vec!["H1".into(), "H2".into()])
            .unwrap()
            .with_item("k7q84", some(&[96.0, 99.0]))
            .unwrap();

        let result = TransformEngine::new()
            .harmonize(&registry, &raw, "nsch_2016")
            .unwrap();
        assert_eq!(result.table.column("bounce_back").unwrap(), &[None, None]);
        assert_eq!(result.empty_domains().count(), 1);

        let err = TransformEngine::new()
            .fail_on_empty_domain(true)
            .harmonize(&registry, &raw, "nsch_2016")
            .unwrap_err();
        assert!(matches!(err, EquateError::EmptyDomain { .. }));
    }
}
