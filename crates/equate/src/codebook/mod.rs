//! Codebook registry: declared rules per (lexicon, item).

mod classify;
mod entry;
mod registry;
mod source;

pub use classify::{Classification, DirectionClassifier};
pub use entry::{CodebookEntry, Orientation};
pub use registry::{CodebookProvenance, Registry};
pub use source::{CodebookDocument, DeclaredEntry};
