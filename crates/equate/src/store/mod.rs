//! Where raw extracts come from and where harmonized columns live.
//!
//! The selector and the harmonizer only talk to these traits, so a cycle can
//! be served from memory in tests and from disk in the CLI.

mod file;
mod memory;

use std::collections::BTreeSet;

use crate::error::Result;
use crate::table::{HarmonizedTable, MergeSummary, RawTable};

pub use file::{store_path, JsonFileStore};
pub use memory::{MemoryRawProvider, MemoryStore};

/// Source of raw per-cycle item tables.
pub trait RawTableProvider: Send + Sync {
    /// Read the raw table for a cycle.
    fn read_raw(&self, cycle: &str) -> Result<RawTable>;
}

/// Persistent home of harmonized columns, keyed by cycle.
pub trait HarmonizedStore: Send + Sync {
    /// Equate names already persisted for a cycle; empty if the cycle is unknown.
    fn available_columns(&self, cycle: &str) -> Result<BTreeSet<String>>;

    /// Read the named columns of a cycle, in the order given.
    ///
    /// Names the store does not hold are skipped.
    fn read(&self, cycle: &str, columns: &[String]) -> Result<HarmonizedTable>;

    /// Insert or update by unit id.
    fn upsert(&self, table: &HarmonizedTable) -> Result<MergeSummary>;
}
