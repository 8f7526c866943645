//! Per-item transform records and results.

use serde::{Deserialize, Serialize};

use crate::codebook::Orientation;
use crate::table::HarmonizedTable;

/// Min and max of an item's non-missing raw codes in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedBounds {
    pub min: i64,
    pub max: i64,
}

impl ObservedBounds {
    /// Number of codes the harmonized domain can span.
    pub fn span(&self) -> i64 {
        self.max - self.min
    }
}

/// Something worth recording about an item's transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformNote {
    /// No non-missing values; the harmonized column is entirely null.
    EmptyDomain,
    /// Observed codes fall outside the codebook's declared bounds.
    DeclaredBoundsExceeded {
        observed_min: i64,
        observed_max: i64,
        raw_min: f64,
        raw_max: f64,
    },
    /// Codes inside the observed range that no unit used.
    DomainGaps { unused_codes: Vec<i64> },
}

/// Audit record for one harmonized item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTransform {
    /// Raw item id.
    pub item: String,
    /// Canonical column the item was written to.
    pub equate_name: String,
    pub orientation: Orientation,
    /// Bounds used for the arithmetic; `None` for an empty domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<ObservedBounds>,
    /// Non-missing values written.
    pub values_transformed: usize,
    /// Raw values at or above the sentinel floor.
    pub sentinel_count: usize,
    /// Raw cells that were already blank.
    pub blank_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<TransformNote>,
}

impl ItemTransform {
    /// Whether the column came out all null.
    pub fn is_empty_domain(&self) -> bool {
        self.observed.is_none()
    }

    /// Harmonized nulls this item produced.
    pub fn null_count(&self) -> usize {
        self.sentinel_count + self.blank_count
    }

    /// Human-readable one-line description.
    pub fn description(&self) -> String {
        match self.observed {
            Some(bounds) => match self.orientation {
                Orientation::Forward => format!(
                    "'{}' → '{}': raw − {} ({} values, {} missing)",
                    self.item,
                    self.equate_name,
                    bounds.min,
                    self.values_transformed,
                    self.null_count()
                ),
                Orientation::Reverse => format!(
                    "'{}' → '{}': {} − raw ({} values, {} missing)",
                    self.item,
                    self.equate_name,
                    bounds.max,
                    self.values_transformed,
                    self.null_count()
                ),
            },
            None => format!(
                "'{}' → '{}': no data ({} missing)",
                self.item,
                self.equate_name,
                self.null_count()
            ),
        }
    }
}

/// Output of harmonizing one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeResult {
    /// Harmonized columns under their equate names.
    pub table: HarmonizedTable,
    /// One record per harmonized item, in raw column order.
    pub items: Vec<ItemTransform>,
    /// Declared items the raw extract did not carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absent_items: Vec<String>,
}

impl HarmonizeResult {
    /// Cycle of the harmonized table.
    pub fn cycle(&self) -> &str {
        self.table.cycle()
    }

    /// Items whose harmonized column is entirely null.
    pub fn empty_domains(&self) -> impl Iterator<Item = &ItemTransform> {
        self.items.iter().filter(|i| i.is_empty_domain())
    }

    /// Record for one raw item.
    pub fn item(&self, item: &str) -> Option<&ItemTransform> {
        self.items.iter().find(|i| i.item == item)
    }

    /// Drop the records and keep the table.
    pub fn into_table(self) -> HarmonizedTable {
        self.table
    }
}
