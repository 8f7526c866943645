//! `Harmonizer`: the entry point tying registry, engine, stores and checks together.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codebook::{CodebookProvenance, Registry};
use crate::config::EquateConfig;
use crate::error::{EquateError, Result};
use crate::input::ExtractProvenance;
use crate::selector::{consume, Consumed, CoverageThreshold};
use crate::store::{HarmonizedStore, RawTableProvider};
use crate::table::{HarmonizedTable, MergeSummary, RawTable};
use crate::transform::{HarmonizeResult, ItemTransform, TransformEngine};
use crate::validation::{CycleReport, ValidationEngine, ValidationInput, ValidationReport};

/// Result for one cycle of a multi-cycle run.
///
/// Cycles are independent, so one failing does not stop the others.
#[derive(Debug)]
pub struct CycleOutcome<T> {
    pub cycle: String,
    pub result: Result<T>,
}

impl<T> CycleOutcome<T> {
    /// Whether the cycle harmonized without error.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What harmonizing and persisting one cycle did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleAudit {
    pub cycle: String,
    /// Raw extract the cycle was harmonized from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ExtractProvenance>,
    pub items: Vec<ItemTransform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absent_items: Vec<String>,
    pub merge: MergeSummary,
}

/// Audit trail of a harmonize run, saved alongside the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizeAudit {
    pub generated_at: DateTime<Utc>,
    pub codebook: CodebookProvenance,
    pub lexicon: String,
    pub cycles: Vec<CycleAudit>,
}

impl HarmonizeAudit {
    /// Write the audit as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            fs::create_dir_all(parent).map_err(|e| EquateError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| EquateError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Validation across several cycles; cycles that could not be read are kept apart.
#[derive(Debug)]
pub struct ValidationRun {
    pub report: ValidationReport,
    pub errors: Vec<(String, EquateError)>,
}

/// Harmonizes, resolves and validates cycles against one shared registry.
pub struct Harmonizer {
    registry: Arc<Registry>,
    config: EquateConfig,
    engine: TransformEngine,
    validation: ValidationEngine,
}

impl Harmonizer {
    /// Harmonizer with default configuration.
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self::with_config(registry, EquateConfig::default())
    }

    /// Harmonizer with explicit configuration.
    pub fn with_config(registry: impl Into<Arc<Registry>>, config: EquateConfig) -> Self {
        let engine = TransformEngine::with_policy(config.missing)
            .fail_on_empty_domain(config.fail_on_empty_domain);
        Self {
            registry: registry.into(),
            config,
            engine,
            validation: ValidationEngine::new(),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &EquateConfig {
        &self.config
    }

    /// The transform engine built from the configuration.
    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    /// Harmonize every item of one cycle's raw extract.
    pub fn harmonize_cycle(
        &self,
        provider: &dyn RawTableProvider,
        lexicon: &str,
        cycle: &str,
    ) -> Result<HarmonizeResult> {
        let raw = provider.read_raw(cycle)?;
        self.engine.harmonize(&self.registry, &raw, lexicon)
    }

    /// Harmonize cycles in parallel.
    pub fn harmonize_cycles<S: AsRef<str> + Sync>(
        &self,
        provider: &dyn RawTableProvider,
        lexicon: &str,
        cycles: &[S],
    ) -> Vec<CycleOutcome<HarmonizeResult>> {
        self.per_cycle(cycles, |cycle| self.harmonize_cycle(provider, lexicon, cycle))
    }

    /// Harmonize cycles in parallel and upsert each into the store.
    pub fn harmonize_and_persist<S: AsRef<str> + Sync>(
        &self,
        provider: &dyn RawTableProvider,
        store: &dyn HarmonizedStore,
        lexicon: &str,
        cycles: &[S],
    ) -> Vec<CycleOutcome<CycleAudit>> {
        self.per_cycle(cycles, |cycle| {
            let raw = provider.read_raw(cycle)?;
            let result = self.engine.harmonize(&self.registry, &raw, lexicon)?;
            let merge = store.upsert(&result.table)?;
            Ok(CycleAudit {
                cycle: cycle.to_string(),
                source: raw.source().cloned(),
                items: result.items,
                absent_items: result.absent_items,
                merge,
            })
        })
    }

    /// Deliver one cycle through the coverage-gated path.
    ///
    /// `threshold` overrides the configured coverage threshold.
    pub fn resolve_cycle(
        &self,
        provider: &dyn RawTableProvider,
        store: &dyn HarmonizedStore,
        lexicon: &str,
        cycle: &str,
        threshold: Option<CoverageThreshold>,
    ) -> Result<Consumed> {
        consume(
            &self.registry,
            &self.engine,
            store,
            provider,
            lexicon,
            cycle,
            threshold.unwrap_or(self.config.coverage),
        )
    }

    /// Run the validation suite on an in-memory pair of tables.
    pub fn validate_tables(
        &self,
        lexicon: &str,
        raw: &RawTable,
        harmonized: &HarmonizedTable,
    ) -> CycleReport {
        let input = ValidationInput::new(
            lexicon,
            &self.registry,
            raw,
            harmonized,
            self.config.missing,
            &self.config.validation,
        );
        self.validation.run(&input)
    }

    /// Validate what the store holds for a cycle against its raw extract.
    pub fn validate_cycle(
        &self,
        provider: &dyn RawTableProvider,
        store: &dyn HarmonizedStore,
        lexicon: &str,
        cycle: &str,
    ) -> Result<CycleReport> {
        let raw = provider.read_raw(cycle)?;
        let columns: Vec<String> = store.available_columns(cycle)?.into_iter().collect();
        let harmonized = store.read(cycle, &columns)?;
        Ok(self.validate_tables(lexicon, &raw, &harmonized))
    }

    /// Validate cycles in parallel into one report.
    pub fn validate_cycles<S: AsRef<str> + Sync>(
        &self,
        provider: &dyn RawTableProvider,
        store: &dyn HarmonizedStore,
        lexicon: &str,
        cycles: &[S],
    ) -> ValidationRun {
        let mut reports = Vec::new();
        let mut errors = Vec::new();

        for outcome in self.per_cycle(cycles, |cycle| self.validate_cycle(provider, store, lexicon, cycle)) {
            match outcome.result {
                Ok(report) => reports.push(report),
                Err(e) => errors.push((outcome.cycle, e)),
            }
        }

        ValidationRun {
            report: ValidationReport::new(self.registry.provenance().clone(), reports),
            errors,
        }
    }

    /// Audit record for a finished harmonize run.
    pub fn audit(&self, lexicon: &str, cycles: Vec<CycleAudit>) -> HarmonizeAudit {
        HarmonizeAudit {
            generated_at: Utc::now(),
            codebook: self.registry.provenance().clone(),
            lexicon: lexicon.to_string(),
            cycles,
        }
    }

    fn per_cycle<S, T, F>(&self, cycles: &[S], work: F) -> Vec<CycleOutcome<T>>
    where
        S: AsRef<str> + Sync,
        T: Send,
        F: Fn(&str) -> Result<T> + Sync,
    {
        cycles
            .par_iter()
            .map(|cycle| {
                let cycle = cycle.as_ref();
                let span = tracing::info_span!("cycle", cycle);
                let result = span.in_scope(|| work(cycle));
                if let Err(e) = &result {
                    tracing::error!(cycle, error = %e, "cycle failed");
                }
                CycleOutcome {
                    cycle: cycle.to_string(),
                    result,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ConsumptionPath;
    use crate::store::{MemoryRawProvider, MemoryStore};

    fn registry() -> Registry {
        Registry::from_json_str(
            r#"{"version": "2024.1", "lexicons": {"nsch": {
                "k2q01": {"raw_min": 1, "raw_max": 5, "orientation": "reverse", "equate_name": "gen_health"},
                "k6q70": {"raw_min": 1, "raw_max": 4, "orientation": "forward", "equate_name": "calm"}
            }}}"#,
        )
        .unwrap()
    }

    fn raw(cycle: &str) -> RawTable {
        RawTable::new(cycle, vec!["H1".into(), "H2".into(), "H3".into()])
            .unwrap()
            .with_item("k2q01", vec![Some(1.0), Some(3.0), Some(5.0)])
            .unwrap()
            .with_item("k6q70", vec![Some(2.0), Some(99.0), Some(1.0)])
            .unwrap()
    }

    fn provider() -> MemoryRawProvider {
        MemoryRawProvider::new()
            .with_table(raw("2016"))
            .with_table(raw("2017"))
    }

    #[test]
    fn test_failing_cycle_does_not_stop_others() {
        let harmonizer = Harmonizer::new(registry());
        let outcomes = harmonizer.harmonize_cycles(&provider(), "nsch", &["2016", "2030", "2017"]);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert!(outcomes[2].is_ok());
    }

    #[test]
    fn test_persist_then_resolve_fast() {
        let harmonizer = Harmonizer::new(registry());
        let provider = provider();
        let store = MemoryStore::new();

        let outcomes = harmonizer.harmonize_and_persist(&provider, &store, "nsch", &["2016"]);
        let audit = outcomes.into_iter().next().unwrap().result.unwrap();
        assert_eq!(audit.merge.units_inserted, 3);

        let consumed = harmonizer
            .resolve_cycle(&provider, &store, "nsch", "2016", None)
            .unwrap();
        assert_eq!(consumed.decision.path, ConsumptionPath::FastPath);
        assert_eq!(consumed.table.column("calm").unwrap(), &[Some(1), None, Some(0)]);
    }

    #[test]
    fn test_validate_cycles_reports_per_cycle() {
        let harmonizer = Harmonizer::new(registry());
        let provider = provider();
        let store = MemoryStore::new();
        harmonizer.harmonize_and_persist(&provider, &store, "nsch", &["2016"]);

        let run = harmonizer.validate_cycles(&provider, &store, "nsch", &["2016", "2017"]);

        assert!(run.errors.is_empty());
        assert!(run.report.cycle("2016").unwrap().passed());
        // Nothing persisted for 2017
        assert!(!run.report.cycle("2017").unwrap().passed());
        assert_eq!(run.report.codebook.version.as_deref(), Some("2024.1"));
    }
}
