//! Declarative codebook documents as they appear on disk.
//!
//! Two layouts are accepted. A JSON document nests items under lexicons:
//!
//! ```json
//! {
//!   "version": "2024.1",
//!   "lexicons": {
//!     "nsch_2017": {
//!       "k2q01": { "raw_min": 1, "raw_max": 5, "orientation": "reverse", "equate_name": "gen_health" }
//!     }
//!   }
//! }
//! ```
//!
//! A flat delimited file carries one row per item with the columns
//! `lexicon, item, raw_min, raw_max, orientation, equate_name`.

use std::fmt;
use std::io::Read;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EquateError, Result};

/// Item rules exactly as declared; required fields are checked at load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredEntry {
    #[serde(default)]
    pub raw_min: Option<f64>,
    #[serde(default)]
    pub raw_max: Option<f64>,
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub equate_name: Option<String>,
}

/// A whole codebook document keyed by lexicon, then item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodebookDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "unique_lexicons")]
    pub lexicons: IndexMap<String, IndexMap<String, DeclaredEntry>>,
}

/// A JSON object whose keys must not repeat.
struct UniqueKeys<V>(IndexMap<String, V>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for UniqueKeys<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct UniqueKeysVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeysVisitor<V> {
            type Value = UniqueKeys<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with unique keys")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(de::Error::custom(format!("'{}' declared twice", key)));
                    }
                    map.insert(key, value);
                }
                Ok(UniqueKeys(map))
            }
        }

        deserializer.deserialize_map(UniqueKeysVisitor(PhantomData))
    }
}

fn unique_lexicons<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, IndexMap<String, DeclaredEntry>>, D::Error> {
    let lexicons = UniqueKeys::<UniqueKeys<DeclaredEntry>>::deserialize(deserializer)?;
    Ok(lexicons
        .0
        .into_iter()
        .map(|(lexicon, items)| (lexicon, items.0))
        .collect())
}

/// One row of a flat codebook file.
#[derive(Debug, Deserialize)]
struct FlatRow {
    lexicon: String,
    item: String,
    #[serde(default)]
    raw_min: Option<f64>,
    #[serde(default)]
    raw_max: Option<f64>,
    #[serde(default)]
    orientation: Option<String>,
    #[serde(default)]
    equate_name: Option<String>,
}

impl CodebookDocument {
    /// Parse a JSON document.
    ///
    /// Malformed JSON is a `Json` error; well-formed JSON of the wrong shape,
    /// including a lexicon or item declared twice, is a `Schema` error.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => EquateError::Schema(format!("codebook: {}", e)),
            _ => EquateError::Json(e),
        })
    }

    /// Read a flat codebook with the given delimiter.
    ///
    /// A repeated (lexicon, item) pair is a schema error rather than a
    /// silent overwrite.
    pub fn from_flat_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut document = CodebookDocument::default();
        for (row_idx, row) in csv_reader.deserialize::<FlatRow>().enumerate() {
            let row = row?;
            if row.lexicon.is_empty() || row.item.is_empty() {
                return Err(EquateError::Schema(format!(
                    "codebook row {} is missing its lexicon or item id",
                    row_idx + 1
                )));
            }

            let items = document.lexicons.entry(row.lexicon.clone()).or_default();
            if items.contains_key(&row.item) {
                return Err(EquateError::Schema(format!(
                    "item '{}' declared twice in lexicon '{}'",
                    row.item, row.lexicon
                )));
            }
            items.insert(
                row.item,
                DeclaredEntry {
                    raw_min: row.raw_min,
                    raw_max: row.raw_max,
                    orientation: row.orientation.filter(|s| !s.is_empty()),
                    equate_name: row.equate_name.filter(|s| !s.is_empty()),
                },
            );
        }

        Ok(document)
    }

    /// Number of declared items across all lexicons.
    pub fn entry_count(&self) -> usize {
        self.lexicons.values().map(|items| items.len()).sum()
    }
}
