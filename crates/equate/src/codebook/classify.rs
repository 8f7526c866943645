//! Partition item sets by orientation.

use std::collections::BTreeSet;

use serde::Serialize;

use super::entry::Orientation;
use super::registry::Registry;
use crate::error::{EquateError, Result};

/// Forward- and reverse-coded subsets of an item list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub forward: BTreeSet<String>,
    pub reverse: BTreeSet<String>,
}

impl Classification {
    /// Orientation assigned to an item, if classified.
    pub fn orientation_of(&self, item: &str) -> Option<Orientation> {
        if self.forward.contains(item) {
            Some(Orientation::Forward)
        } else if self.reverse.contains(item) {
            Some(Orientation::Reverse)
        } else {
            None
        }
    }

    /// Items classified.
    pub fn len(&self) -> usize {
        self.forward.len() + self.reverse.len()
    }

    /// Whether nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stateless view over a registry that sorts items by orientation.
#[derive(Debug, Clone, Copy)]
pub struct DirectionClassifier<'a> {
    registry: &'a Registry,
}

impl<'a> DirectionClassifier<'a> {
    /// Classifier over a registry.
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Split `items` into forward and reverse subsets.
    ///
    /// Every id must be declared for `lexicon`; the first unknown id aborts
    /// the whole classification.
    pub fn classify<I, S>(&self, lexicon: &str, items: I) -> Result<Classification>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classification = Classification::default();

        for item in items {
            let item = item.as_ref();
            let entry = self
                .registry
                .lookup(lexicon, item)
                .ok_or_else(|| EquateError::UnknownItem {
                    lexicon: lexicon.to_string(),
                    item: item.to_string(),
                })?;

            match entry.orientation {
                Orientation::Forward => classification.forward.insert(item.to_string()),
                Orientation::Reverse => classification.reverse.insert(item.to_string()),
            };
        }

        Ok(classification)
    }
}
