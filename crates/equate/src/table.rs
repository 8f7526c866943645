//! Typed per-cycle tables: raw item codes in, harmonized codes out.
//!
//! Both tables are column-oriented and keyed by unit id. Raw cells are
//! `Option<f64>` (blank cells are `None`, sentinel codes are still present);
//! harmonized cells are `Option<i64>` where `None` is the only missing marker.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::InputConfig;
use crate::error::{EquateError, Result};
use crate::input::{DataTable, ExtractProvenance};

/// Raw item values and covariates for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    cycle: String,
    unit_ids: Vec<String>,
    items: IndexMap<String, Vec<Option<f64>>>,
    #[serde(default)]
    covariates: IndexMap<String, Vec<Option<f64>>>,
    /// File the table was read from, when it came from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<ExtractProvenance>,
}

impl RawTable {
    /// Create an empty table for the given units.
    pub fn new(cycle: impl Into<String>, unit_ids: Vec<String>) -> Result<Self> {
        check_unique_ids(&unit_ids)?;
        Ok(Self {
            cycle: cycle.into(),
            unit_ids,
            items: IndexMap::new(),
            covariates: IndexMap::new(),
            source: None,
        })
    }

    /// Add a raw item column.
    pub fn with_item(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<Self> {
        self.insert_item(name, values)?;
        Ok(self)
    }

    /// Add a covariate column.
    pub fn with_covariate(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        check_length(&name, values.len(), self.unit_ids.len())?;
        self.covariates.insert(name, values);
        Ok(self)
    }

    /// Add or replace a raw item column.
    pub fn insert_item(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        check_length(&name, values.len(), self.unit_ids.len())?;
        self.items.insert(name, values);
        Ok(())
    }

    /// Type a parsed extract according to the configured layout.
    ///
    /// Every column that is not the unit id, the cycle tag, a covariate or
    /// explicitly ignored is treated as an item. Blank and NA-like cells
    /// become `None`; any other non-numeric cell is an error naming its row.
    pub fn from_data_table(table: &DataTable, layout: &InputConfig, cycle: &str) -> Result<Self> {
        let id_idx = table.column_index(&layout.unit_id_column).ok_or_else(|| {
            EquateError::Config(format!(
                "unit id column '{}' not found in extract for cycle '{}'",
                layout.unit_id_column, cycle
            ))
        })?;

        let mut unit_ids = Vec::with_capacity(table.row_count());
        for (row_idx, value) in table.column_values(id_idx).enumerate() {
            let id = value.trim();
            if DataTable::is_null_value(id) {
                return Err(EquateError::Parse {
                    row: row_idx + 1,
                    column: layout.unit_id_column.clone(),
                    message: "blank unit id".to_string(),
                });
            }
            unit_ids.push(id.to_string());
        }

        if let Some(cycle_idx) = layout
            .cycle_column
            .as_deref()
            .and_then(|c| table.column_index(c))
        {
            for (row_idx, tag) in table.column_values(cycle_idx).enumerate() {
                let tag = tag.trim();
                if tag != cycle {
                    return Err(EquateError::Parse {
                        row: row_idx + 1,
                        column: table.headers[cycle_idx].clone(),
                        message: format!("row tagged cycle '{}' in extract for '{}'", tag, cycle),
                    });
                }
            }
        }

        let mut raw = RawTable::new(cycle, unit_ids)?;

        for (col_idx, header) in table.headers.iter().enumerate() {
            let is_covariate = layout.covariates.iter().any(|c| c == header);
            if layout.is_reserved(header) && !is_covariate {
                continue;
            }

            let values = parse_numeric_column(table, col_idx)?;
            if is_covariate {
                raw.covariates.insert(header.clone(), values);
            } else {
                raw.items.insert(header.clone(), values);
            }
        }

        Ok(raw)
    }

    /// Attach the provenance of the extract this table was read from.
    pub fn with_source(mut self, source: ExtractProvenance) -> Self {
        self.source = Some(source);
        self
    }

    /// Provenance of the extract, when read from one.
    pub fn source(&self) -> Option<&ExtractProvenance> {
        self.source.as_ref()
    }

    /// Cycle label of the extract.
    pub fn cycle(&self) -> &str {
        &self.cycle
    }

    /// Unit ids in row order.
    pub fn unit_ids(&self) -> &[String] {
        &self.unit_ids
    }

    /// Number of units.
    pub fn row_count(&self) -> usize {
        self.unit_ids.len()
    }

    /// Raw values of an item column.
    pub fn item(&self, name: &str) -> Option<&[Option<f64>]> {
        self.items.get(name).map(|v| v.as_slice())
    }

    /// Whether the extract carries the item.
    pub fn has_item(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Item column names in extract order.
    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(|k| k.as_str())
    }

    /// Number of item columns.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Values of a covariate column.
    pub fn covariate(&self, name: &str) -> Option<&[Option<f64>]> {
        self.covariates.get(name).map(|v| v.as_slice())
    }

    /// Row position of every unit id.
    pub fn row_index(&self) -> HashMap<&str, usize> {
        index_ids(&self.unit_ids)
    }
}

/// Harmonized codes for one cycle under canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonizedTable {
    cycle: String,
    unit_ids: Vec<String>,
    columns: IndexMap<String, Vec<Option<i64>>>,
}

/// Outcome of merging one harmonized table into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub units_updated: usize,
    pub units_inserted: usize,
    pub columns_written: usize,
    pub columns_added: usize,
}

impl HarmonizedTable {
    /// Create a table with no columns for the given units.
    pub fn new(cycle: impl Into<String>, unit_ids: Vec<String>) -> Result<Self> {
        check_unique_ids(&unit_ids)?;
        Ok(Self {
            cycle: cycle.into(),
            unit_ids,
            columns: IndexMap::new(),
        })
    }

    /// Add or replace a column.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<i64>>) -> Result<()> {
        let name = name.into();
        check_length(&name, values.len(), self.unit_ids.len())?;
        self.columns.insert(name, values);
        Ok(())
    }

    /// Builder form of [`HarmonizedTable::insert_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<i64>>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Cycle label.
    pub fn cycle(&self) -> &str {
        &self.cycle
    }

    /// Unit ids in row order.
    pub fn unit_ids(&self) -> &[String] {
        &self.unit_ids
    }

    /// Number of units.
    pub fn row_count(&self) -> usize {
        self.unit_ids.len()
    }

    /// Number of harmonized columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Values of a column by equate name.
    pub fn column(&self, name: &str) -> Option<&[Option<i64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Whether the column is present.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Every column with its name, in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<i64>])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Null cells in a column.
    pub fn null_count(&self, name: &str) -> Option<usize> {
        self.column(name)
            .map(|values| values.iter().filter(|v| v.is_none()).count())
    }

    /// Row position of every unit id.
    pub fn row_index(&self) -> HashMap<&str, usize> {
        index_ids(&self.unit_ids)
    }

    /// Copy of the table restricted to the named columns, in the order given.
    ///
    /// Names the table does not carry are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> HarmonizedTable {
        let columns = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.columns
                    .get(name)
                    .map(|values| (name.to_string(), values.clone()))
            })
            .collect();

        HarmonizedTable {
            cycle: self.cycle.clone(),
            unit_ids: self.unit_ids.clone(),
            columns,
        }
    }

    /// Reorder rows to follow `unit_ids`; units this table lacks get nulls.
    pub fn align_to(&self, unit_ids: &[String]) -> Result<HarmonizedTable> {
        let index = self.row_index();
        let mut aligned = HarmonizedTable::new(self.cycle.clone(), unit_ids.to_vec())?;

        for (name, values) in &self.columns {
            let column = unit_ids
                .iter()
                .map(|id| index.get(id.as_str()).and_then(|&row| values[row]))
                .collect();
            aligned.columns.insert(name.clone(), column);
        }

        Ok(aligned)
    }

    /// Upsert `other` into this table keyed by unit id.
    ///
    /// Columns of `other` overwrite matching cells; units new to this table
    /// are appended with nulls in columns `other` does not carry.
    pub fn merge(&mut self, other: &HarmonizedTable) -> Result<MergeSummary> {
        if other.cycle != self.cycle {
            return Err(EquateError::Persistence(format!(
                "cannot merge cycle '{}' into cycle '{}'",
                other.cycle, self.cycle
            )));
        }
        other.check_shape()?;

        let mut summary = MergeSummary::default();
        let mut positions: HashMap<String, usize> = self
            .unit_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        for id in &other.unit_ids {
            if positions.contains_key(id) {
                summary.units_updated += 1;
            } else {
                positions.insert(id.clone(), self.unit_ids.len());
                self.unit_ids.push(id.clone());
                for values in self.columns.values_mut() {
                    values.push(None);
                }
                summary.units_inserted += 1;
            }
        }

        let row_count = self.unit_ids.len();
        for (name, incoming) in &other.columns {
            let target = self.columns.entry(name.clone()).or_insert_with(|| {
                summary.columns_added += 1;
                vec![None; row_count]
            });
            for (id, value) in other.unit_ids.iter().zip(incoming) {
                target[positions[id]] = *value;
            }
            summary.columns_written += 1;
        }

        Ok(summary)
    }

    /// Verify every column has one cell per unit and ids are unique.
    ///
    /// Tables built through this API always pass; deserialized ones may not.
    pub fn check_shape(&self) -> Result<()> {
        check_unique_ids(&self.unit_ids)?;
        for (name, values) in &self.columns {
            check_length(name, values.len(), self.unit_ids.len())?;
        }
        Ok(())
    }

    /// Write the table as delimited text with the unit id column first.
    pub fn write_delimited<W: Write>(&self, writer: W, id_header: &str, delimiter: u8) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(id_header);
        header.extend(self.column_names());
        out.write_record(&header)?;

        for (row, id) in self.unit_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(id.clone());
            for values in self.columns.values() {
                record.push(values[row].map(|v| v.to_string()).unwrap_or_default());
            }
            out.write_record(&record)?;
        }

        out.flush().map_err(|e| EquateError::Persistence(e.to_string()))?;
        Ok(())
    }
}

fn parse_numeric_column(table: &DataTable, col_idx: usize) -> Result<Vec<Option<f64>>> {
    table
        .column_values(col_idx)
        .enumerate()
        .map(|(row_idx, value)| {
            if DataTable::is_null_value(value) {
                return Ok(None);
            }
            value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| EquateError::Parse {
                    row: row_idx + 1,
                    column: table.headers[col_idx].clone(),
                    message: format!("'{}' is not a numeric code", value.trim()),
                })
        })
        .collect()
}

fn index_ids(ids: &[String]) -> HashMap<&str, usize> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect()
}

fn check_unique_ids(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for (row, id) in ids.iter().enumerate() {
        if !seen.insert(id.as_str()) {
            return Err(EquateError::Parse {
                row: row + 1,
                column: "unit id".to_string(),
                message: format!("duplicate unit id '{}'", id),
            });
        }
    }
    Ok(())
}

fn check_length(name: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(EquateError::Parse {
            row: got.min(expected) + 1,
            column: name.to_string(),
            message: format!("column has {} values for {} units", got, expected),
        });
    }
    Ok(())
}
