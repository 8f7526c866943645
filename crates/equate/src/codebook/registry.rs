//! In-memory index of codebook entries.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entry::{CodebookEntry, Orientation};
use super::source::{CodebookDocument, DeclaredEntry};
use crate::error::{EquateError, Result};
use crate::input::sha256_digest;

static EQUATE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid equate name pattern"));

/// Where a registry came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebookProvenance {
    /// Version string declared by the document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// SHA-256 of the source bytes, when loaded from text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub entry_count: usize,
}

#[derive(Debug, Clone, Default)]
struct Lexicon {
    entries: IndexMap<String, CodebookEntry>,
    by_equate_name: HashMap<String, String>,
}

/// Read-only index of item rules by (lexicon, item).
///
/// Built once per process and shared; every method takes `&self`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    lexicons: IndexMap<String, Lexicon>,
    provenance: CodebookProvenance,
}

impl Registry {
    /// Load a codebook file, choosing the layout from its extension.
    ///
    /// `.json` files are nested documents; `.csv` and `.tsv` are flat.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| EquateError::io(path, e))?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let document = match extension.as_str() {
            "json" => {
                let text = std::str::from_utf8(&bytes).map_err(|e| {
                    EquateError::Schema(format!("codebook is not UTF-8: {}", e))
                })?;
                CodebookDocument::from_json_str(text)?
            }
            "csv" => CodebookDocument::from_flat_reader(bytes.as_slice(), b',')?,
            "tsv" | "txt" => CodebookDocument::from_flat_reader(bytes.as_slice(), b'\t')?,
            other => {
                return Err(EquateError::Config(format!(
                    "unsupported codebook extension '{}' for {}",
                    other,
                    path.display()
                )));
            }
        };

        let mut registry = Self::from_document(document)?;
        registry.provenance.digest = Some(sha256_digest(&bytes));
        registry.provenance.path = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            lexicons = registry.lexicons.len(),
            entries = registry.provenance.entry_count,
            "loaded codebook"
        );

        Ok(registry)
    }

    /// Build a registry from a nested JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut registry = Self::from_document(CodebookDocument::from_json_str(text)?)?;
        registry.provenance.digest = Some(sha256_digest(text.as_bytes()));
        Ok(registry)
    }

    /// Build a registry from a flat delimited codebook.
    pub fn from_flat_str(text: &str, delimiter: u8) -> Result<Self> {
        let document = CodebookDocument::from_flat_reader(text.as_bytes(), delimiter)?;
        let mut registry = Self::from_document(document)?;
        registry.provenance.digest = Some(sha256_digest(text.as_bytes()));
        Ok(registry)
    }

    /// Validate a declared document and index it.
    ///
    /// Fails on the first entry lacking bounds, orientation or equate name,
    /// on inverted bounds, and on two items of one lexicon sharing an
    /// equate name.
    pub fn from_document(document: CodebookDocument) -> Result<Self> {
        let mut lexicons = IndexMap::new();
        let entry_count = document.entry_count();

        for (lexicon_id, items) in document.lexicons {
            let mut lexicon = Lexicon::default();

            for (item, declared) in items {
                let entry = validate_entry(&lexicon_id, &item, declared)?;

                if let Some(existing) = lexicon.by_equate_name.get(&entry.equate_name) {
                    return Err(EquateError::Schema(format!(
                        "items '{}' and '{}' in lexicon '{}' both map to equate name '{}'",
                        existing, item, lexicon_id, entry.equate_name
                    )));
                }

                lexicon
                    .by_equate_name
                    .insert(entry.equate_name.clone(), item.clone());
                lexicon.entries.insert(item, entry);
            }

            lexicons.insert(lexicon_id, lexicon);
        }

        Ok(Self {
            lexicons,
            provenance: CodebookProvenance {
                version: document.version,
                digest: None,
                path: None,
                entry_count,
            },
        })
    }

    /// Rules for one item, if declared.
    pub fn lookup(&self, lexicon: &str, item: &str) -> Option<&CodebookEntry> {
        self.lexicons.get(lexicon)?.entries.get(item)
    }

    /// The entry whose harmonized column carries `equate_name`.
    pub fn reverse_lookup(&self, lexicon: &str, equate_name: &str) -> Option<&CodebookEntry> {
        let lex = self.lexicons.get(lexicon)?;
        let item = lex.by_equate_name.get(equate_name)?;
        lex.entries.get(item)
    }

    /// Resolve a name that may be either an item id or an equate name.
    pub fn resolve(&self, lexicon: &str, name: &str) -> Option<&CodebookEntry> {
        self.lookup(lexicon, name)
            .or_else(|| self.reverse_lookup(lexicon, name))
    }

    /// Canonical name of an item, if declared.
    pub fn equate_name(&self, lexicon: &str, item: &str) -> Option<&str> {
        self.lookup(lexicon, item).map(|e| e.equate_name.as_str())
    }

    /// Item ids of a lexicon with the given orientation.
    ///
    /// Unknown lexicons yield an empty set.
    pub fn items_by_orientation(&self, lexicon: &str, orientation: Orientation) -> BTreeSet<String> {
        self.entries(lexicon)
            .filter(|e| e.orientation == orientation)
            .map(|e| e.item.clone())
            .collect()
    }

    /// Every equate name a fully harmonized cycle of `lexicon` carries.
    pub fn expected_equate_names(&self, lexicon: &str) -> BTreeSet<String> {
        self.entries(lexicon)
            .map(|e| e.equate_name.clone())
            .collect()
    }

    /// Entries of a lexicon in declaration order.
    pub fn entries<'a>(&'a self, lexicon: &str) -> impl Iterator<Item = &'a CodebookEntry> + use<'a> {
        self.lexicons
            .get(lexicon)
            .into_iter()
            .flat_map(|lex| lex.entries.values())
    }

    /// Lexicon names in codebook order.
    pub fn lexicons(&self) -> impl Iterator<Item = &str> {
        self.lexicons.keys().map(|k| k.as_str())
    }

    /// Whether the lexicon is declared.
    pub fn has_lexicon(&self, lexicon: &str) -> bool {
        self.lexicons.contains_key(lexicon)
    }

    /// Number of items declared for a lexicon.
    pub fn item_count(&self, lexicon: &str) -> usize {
        self.lexicons
            .get(lexicon)
            .map(|lex| lex.entries.len())
            .unwrap_or(0)
    }

    /// Declared items across every lexicon.
    pub fn len(&self) -> usize {
        self.provenance.entry_count
    }

    /// Whether no item is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where the codebook came from.
    pub fn provenance(&self) -> &CodebookProvenance {
        &self.provenance
    }
}

fn validate_entry(lexicon: &str, item: &str, declared: DeclaredEntry) -> Result<CodebookEntry> {
    let missing = |field: &str| {
        EquateError::Schema(format!(
            "item '{}' in lexicon '{}' lacks {}",
            item, lexicon, field
        ))
    };

    let orientation: Orientation = declared
        .orientation
        .as_deref()
        .ok_or_else(|| missing("an orientation"))?
        .parse()
        .map_err(|e| match e {
            EquateError::Schema(msg) => EquateError::Schema(format!(
                "item '{}' in lexicon '{}': {}",
                item, lexicon, msg
            )),
            other => other,
        })?;

    let equate_name = declared
        .equate_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| missing("an equate_name"))?;

    if !EQUATE_NAME.is_match(&equate_name) {
        return Err(EquateError::Schema(format!(
            "equate name '{}' for item '{}' is not a valid column identifier",
            equate_name, item
        )));
    }

    let raw_min = declared.raw_min.ok_or_else(|| missing("raw_min"))?;
    let raw_max = declared.raw_max.ok_or_else(|| missing("raw_max"))?;
    if !raw_min.is_finite() || !raw_max.is_finite() || raw_min > raw_max {
        return Err(EquateError::Schema(format!(
            "item '{}' in lexicon '{}' declares bounds [{}, {}]",
            item, lexicon, raw_min, raw_max
        )));
    }

    Ok(CodebookEntry {
        lexicon: lexicon.to_string(),
        item: item.to_string(),
        raw_min,
        raw_max,
        orientation,
        equate_name,
    })
}
