//! CLI command implementations.

pub mod codebook;
pub mod harmonize;
pub mod resolve;
pub mod validate;

use colored::Colorize;
use equate::{CsvRawProvider, EquateConfig, Harmonizer, JsonFileStore, Registry};

use crate::cli::SourceArgs;

/// Registry, providers and harmonizer for one invocation.
pub struct Workspace {
    pub harmonizer: Harmonizer,
    pub raw: CsvRawProvider,
    pub store: JsonFileStore,
    pub lexicon: String,
}

impl Workspace {
    pub fn open(source: SourceArgs, config: EquateConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if !source.codebook.exists() {
            return Err(format!("Codebook not found: {}", source.codebook.display()).into());
        }
        if !source.raw.is_dir() {
            return Err(format!("Raw directory not found: {}", source.raw.display()).into());
        }

        let registry = Registry::load(&source.codebook)?;
        if !registry.has_lexicon(&source.lexicon) {
            return Err(format!(
                "Lexicon '{}' is not declared in {}",
                source.lexicon,
                source.codebook.display()
            )
            .into());
        }
        tracing::info!(
            codebook = %source.codebook.display(),
            entries = registry.len(),
            "loaded codebook"
        );

        let raw = CsvRawProvider::new(&source.raw, config.input.clone());
        let store = JsonFileStore::open(&source.store)?;

        Ok(Self {
            harmonizer: Harmonizer::with_config(registry, config),
            raw,
            store,
            lexicon: source.lexicon,
        })
    }
}

pub(crate) fn print_cycle_error(cycle: &str, error: &dyn std::error::Error) {
    eprintln!(
        "  {} {} {}",
        "✗".red().bold(),
        cycle.white().bold(),
        error.to_string().red()
    );
}
