//! Codebook entry and orientation types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EquateError;

/// Direction of an item's raw scale relative to the latent trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Higher raw code means more of the trait.
    Forward,
    /// Higher raw code means less of the trait.
    Reverse,
}

impl Orientation {
    /// Lowercase name as written in codebooks.
    pub fn label(&self) -> &'static str {
        match self {
            Orientation::Forward => "forward",
            Orientation::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Orientation {
    type Err = EquateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "fwd" | "positive" => Ok(Orientation::Forward),
            "reverse" | "rev" | "negative" => Ok(Orientation::Reverse),
            other => Err(EquateError::Schema(format!(
                "unrecognized orientation '{}'",
                other
            ))),
        }
    }
}

/// Declared rules for one item of one lexicon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebookEntry {
    /// Lexicon (instrument version) the item belongs to.
    pub lexicon: String,
    /// Raw item id as it appears in extracts.
    pub item: String,
    /// Declared lowest valid raw code.
    pub raw_min: f64,
    /// Declared highest valid raw code.
    pub raw_max: f64,
    pub orientation: Orientation,
    /// Canonical cross-cycle column name.
    pub equate_name: String,
}

impl CodebookEntry {
    /// Whether the item is reverse coded.
    pub fn is_reverse(&self) -> bool {
        self.orientation == Orientation::Reverse
    }

    /// Whether a non-missing raw value lies inside the declared bounds.
    pub fn within_declared(&self, value: f64) -> bool {
        value >= self.raw_min && value <= self.raw_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parse() {
        assert_eq!("Reverse".parse::<Orientation>().unwrap(), Orientation::Reverse);
        assert_eq!(" fwd ".parse::<Orientation>().unwrap(), Orientation::Forward);
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_orientation_serde() {
        let json = serde_json::to_string(&Orientation::Reverse).unwrap();
        assert_eq!(json, "\"reverse\"");
        assert_eq!(serde_json::from_str::<Orientation>("\"forward\"").unwrap(), Orientation::Forward);
    }
}
