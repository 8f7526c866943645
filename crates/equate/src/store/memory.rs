use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{EquateError, Result};
use crate::table::{HarmonizedTable, MergeSummary, RawTable};

use super::{HarmonizedStore, RawTableProvider};

/// In-process harmonized store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cycles: Mutex<HashMap<String, HarmonizedTable>>,
}

impl MemoryStore {
    /// Empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cycles with at least one upsert.
    pub fn cycles(&self) -> Result<Vec<String>> {
        let mut cycles: Vec<String> = self.lock()?.keys().cloned().collect();
        cycles.sort();
        Ok(cycles)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, HarmonizedTable>>> {
        self.cycles
            .lock()
            .map_err(|_| EquateError::Persistence("memory store lock poisoned".to_string()))
    }
}

impl HarmonizedStore for MemoryStore {
    fn available_columns(&self, cycle: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .lock()?
            .get(cycle)
            .map(|t| t.column_names().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn read(&self, cycle: &str, columns: &[String]) -> Result<HarmonizedTable> {
        match self.lock()?.get(cycle) {
            Some(table) => Ok(table.select(columns)),
            None => HarmonizedTable::new(cycle, Vec::new()),
        }
    }

    fn upsert(&self, table: &HarmonizedTable) -> Result<MergeSummary> {
        let mut cycles = self.lock()?;
        let stored = match cycles.entry(table.cycle().to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(HarmonizedTable::new(table.cycle(), Vec::new())?),
        };
        stored.merge(table)
    }
}

/// Raw tables held in memory, keyed by cycle.
#[derive(Debug, Default, Clone)]
pub struct MemoryRawProvider {
    tables: HashMap<String, RawTable>,
}

impl MemoryRawProvider {
    /// Empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`.
    pub fn with_table(mut self, table: RawTable) -> Self {
        self.insert(table);
        self
    }

    /// Register a raw table under its cycle.
    pub fn insert(&mut self, table: RawTable) {
        self.tables.insert(table.cycle().to_string(), table);
    }
}

impl RawTableProvider for MemoryRawProvider {
    fn read_raw(&self, cycle: &str) -> Result<RawTable> {
        self.tables.get(cycle).cloned().ok_or_else(|| {
            EquateError::CoverageMismatch {
                cycle: cycle.to_string(),
                message: "no raw extract for cycle".to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_then_read() {
        let store = MemoryStore::new();
        let table = HarmonizedTable::new("2016", vec!["H1".into(), "H2".into()])
            .unwrap()
            .with_column("calm", vec![Some(0), Some(2)])
            .unwrap()
            .with_column("gen_health", vec![None, Some(1)])
            .unwrap();

        let summary = store.upsert(&table).unwrap();
        assert_eq!(summary.units_inserted, 2);
        assert_eq!(summary.columns_added, 2);

        let columns = store.available_columns("2016").unwrap();
        assert!(columns.contains("calm"));
        assert!(store.available_columns("2017").unwrap().is_empty());

        let read = store.read("2016", &["gen_health".to_string()]).unwrap();
        assert_eq!(read.column_count(), 1);
        assert_eq!(read.column("gen_health").unwrap(), &[None, Some(1)]);
        assert_eq!(store.cycles().unwrap(), vec!["2016"]);
    }

    #[test]
    fn test_missing_raw_cycle() {
        let provider = MemoryRawProvider::new();
        assert!(provider.read_raw("2016").is_err());
    }
}
