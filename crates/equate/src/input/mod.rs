//! Reading raw survey extracts.

mod parser;
mod provider;
mod source;

pub(crate) use parser::sha256_digest;
pub use parser::{Parser, ParserConfig};
pub use provider::CsvRawProvider;
pub use source::{DataTable, ExtractProvenance};
