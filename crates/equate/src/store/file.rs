//! Harmonized store backed by one JSON file per cycle.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{EquateError, Result};
use crate::table::{HarmonizedTable, MergeSummary};

use super::HarmonizedStore;

/// Stores each cycle at `<dir>/<cycle>.harmonized.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written cycle.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                EquateError::Persistence(format!(
                    "Failed to create store directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the stored cycles.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the full stored table for a cycle, if one exists.
    pub fn load(&self, cycle: &str) -> Result<Option<HarmonizedTable>> {
        let path = store_path(&self.dir, cycle);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path).map_err(|e| EquateError::io(&path, e))?;
        let table: HarmonizedTable =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                EquateError::Persistence(format!(
                    "Failed to parse harmonized table '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        table.check_shape()?;

        if table.cycle() != cycle {
            return Err(EquateError::Persistence(format!(
                "'{}' holds cycle '{}', expected '{}'",
                path.display(),
                table.cycle(),
                cycle
            )));
        }
        Ok(Some(table))
    }

    fn save(&self, table: &HarmonizedTable) -> Result<()> {
        let path = store_path(&self.dir, table.cycle());
        let tmp = path.with_extension("json.tmp");

        let file = File::create(&tmp).map_err(|e| EquateError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, table).map_err(|e| {
            EquateError::Persistence(format!("Failed to serialize harmonized table: {}", e))
        })?;
        writer.flush().map_err(|e| EquateError::io(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|e| EquateError::io(&path, e))?;
        Ok(())
    }
}

impl HarmonizedStore for JsonFileStore {
    fn available_columns(&self, cycle: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .load(cycle)?
            .map(|t| t.column_names().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn read(&self, cycle: &str, columns: &[String]) -> Result<HarmonizedTable> {
        match self.load(cycle)? {
            Some(table) => Ok(table.select(columns)),
            None => HarmonizedTable::new(cycle, Vec::new()),
        }
    }

    fn upsert(&self, table: &HarmonizedTable) -> Result<MergeSummary> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EquateError::Persistence("file store lock poisoned".to_string()))?;

        let mut stored = match self.load(table.cycle())? {
            Some(stored) => stored,
            None => HarmonizedTable::new(table.cycle(), Vec::new())?,
        };
        let summary = stored.merge(table)?;
        self.save(&stored)?;

        tracing::info!(
            cycle = table.cycle(),
            inserted = summary.units_inserted,
            updated = summary.units_updated,
            columns = summary.columns_written,
            "persisted harmonized columns"
        );
        Ok(summary)
    }
}

/// File a cycle is stored under.
///
/// Characters outside `[A-Za-z0-9._-]` in the cycle are replaced with `_`.
///
/// # Example
///
/// ```
/// use equate::store::store_path;
///
/// let path = store_path("out", "2016/17");
/// assert_eq!(path.to_string_lossy(), "out/2016_17.harmonized.json");
/// ```
pub fn store_path(dir: impl AsRef<Path>, cycle: &str) -> PathBuf {
    let safe: String = cycle
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.as_ref().join(format!("{}.harmonized.json", safe))
}
