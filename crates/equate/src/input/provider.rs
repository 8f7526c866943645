//! Raw extracts read from a directory of per-cycle delimited files.

use std::path::{Path, PathBuf};

use super::parser::Parser;
use crate::config::InputConfig;
use crate::error::{EquateError, Result};
use crate::store::RawTableProvider;
use crate::table::RawTable;

/// Extensions tried, in order, when locating a cycle's extract.
const EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Reads `<dir>/<cycle>.csv` (or `.tsv`, `.txt`) and types it with the layout.
#[derive(Debug, Clone)]
pub struct CsvRawProvider {
    dir: PathBuf,
    layout: InputConfig,
}

impl CsvRawProvider {
    /// Provider reading extracts from `dir`.
    pub fn new(dir: impl Into<PathBuf>, layout: InputConfig) -> Self {
        Self {
            dir: dir.into(),
            layout,
        }
    }

    /// Directory searched for extracts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the extract for a cycle, if one exists.
    pub fn locate(&self, cycle: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", cycle, ext)))
            .find(|p| p.is_file())
    }
}

impl RawTableProvider for CsvRawProvider {
    fn read_raw(&self, cycle: &str) -> Result<RawTable> {
        let path = self.locate(cycle).ok_or_else(|| {
            EquateError::io(
                self.dir.join(format!("{}.csv", cycle)),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no raw extract for cycle"),
            )
        })?;

        let parser = Parser::with_config(self.layout.parser_config()?);
        let (data, source) = parser.parse_file(&path)?;
        tracing::debug!(
            cycle,
            file = %source.file_name(),
            digest = %source.digest,
            rows = source.rows,
            "read raw extract"
        );

        Ok(RawTable::from_data_table(&data, &self.layout, cycle)?.with_source(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_reads_cycle_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("2017.tsv"),
            "hhid\tyear\tage\tk2q01\nH1\t2017\t3\t1\nH2\t2017\t5\t95\n",
        )
        .unwrap();

        let provider = CsvRawProvider::new(dir.path(), InputConfig::default());
        let raw = provider.read_raw("2017").unwrap();

        assert_eq!(raw.cycle(), "2017");
        assert_eq!(raw.unit_ids(), &["H1", "H2"]);
        assert_eq!(raw.item("k2q01").unwrap(), &[Some(1.0), Some(95.0)]);
        assert_eq!(raw.covariate("age").unwrap(), &[Some(3.0), Some(5.0)]);
        assert_eq!(raw.source().unwrap().file_name(), "2017.tsv");
    }

    #[test]
    fn test_missing_cycle_file() {
        let dir = tempdir().unwrap();
        let provider = CsvRawProvider::new(dir.path(), InputConfig::default());
        assert!(matches!(provider.read_raw("2030"), Err(EquateError::Io { .. })));
    }
}
