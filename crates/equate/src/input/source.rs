//! Parsed extract text and where it came from.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of one raw extract file, recorded in harmonize audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractProvenance {
    pub path: PathBuf,
    /// `sha256:<hex>` of the file bytes.
    pub digest: String,
    pub size_bytes: u64,
    pub delimiter: char,
    /// Data rows, header excluded.
    pub rows: usize,
    pub columns: usize,
    pub read_at: DateTime<Utc>,
}

impl ExtractProvenance {
    /// Record provenance for a parsed file.
    pub fn new(path: &Path, digest: String, size_bytes: u64, table: &DataTable) -> Self {
        Self {
            path: path.to_path_buf(),
            digest,
            size_bytes,
            delimiter: table.delimiter as char,
            rows: table.row_count(),
            columns: table.column_count(),
            read_at: Utc::now(),
        }
    }

    /// File name without its directory.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Untyped cells of an extract, stored column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub headers: Vec<String>,
    columns: Vec<Vec<String>>,
    pub delimiter: u8,
}

impl DataTable {
    /// Build from rows; short rows are padded with blanks, long rows cut.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>, delimiter: u8) -> Self {
        let mut columns: Vec<Vec<String>> = (0..headers.len())
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or_default());
            }
        }
        Self {
            headers,
            columns,
            delimiter,
        }
    }

    /// Number of columns, from the header.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Position of a header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of one column in row order; empty when out of range.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.columns
            .get(index)
            .into_iter()
            .flat_map(|column| column.iter().map(String::as_str))
    }

    /// Cell at a row and column.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.columns.get(column)?.get(row).map(String::as_str)
    }

    /// Blank or an NA-like marker.
    ///
    /// Numeric sentinel codes (90 and up) are not null at this level; the
    /// transform decides what counts as missing for an item.
    pub fn is_null_value(value: &str) -> bool {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "" | "." | "na" | "n/a" | "nan" | "null"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null_value() {
        for null in ["", "  ", "NA", "NaN", ".", "null"] {
            assert!(DataTable::is_null_value(null), "{:?}", null);
        }
        assert!(!DataTable::is_null_value("0"));
        assert!(!DataTable::is_null_value("99"));
    }

    #[test]
    fn test_rows_become_columns() {
        let table = DataTable::from_rows(
            vec!["hhid".into(), "k2q01".into()],
            vec![
                vec!["H1".into(), "3".into()],
                vec!["H2".into()],
                vec!["H3".into(), "1".into(), "extra".into()],
            ],
            b',',
        );

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_index("k2q01"), Some(1));
        let values: Vec<&str> = table.column_values(1).collect();
        assert_eq!(values, vec!["3", "", "1"]);
        assert_eq!(table.cell(2, 0), Some("H3"));
        assert_eq!(table.column_values(5).count(), 0);
    }
}
