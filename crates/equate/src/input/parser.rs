//! Delimited-text parser for raw survey extracts.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::source::{DataTable, ExtractProvenance};
use crate::error::{EquateError, Result};

/// Candidates for delimiter sniffing, in order of preference on ties.
const DELIMITERS: [u8; 4] = [b'\t', b',', b'|', b';'];

/// Lines inspected when sniffing.
const SNIFF_LINES: usize = 16;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimiter and quoting for raw extracts.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// `None` sniffs the delimiter from the first lines.
    pub delimiter: Option<u8>,
    pub quote: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            quote: b'"',
        }
    }
}

/// Reads delimited extracts into untyped tables.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Parser that sniffs the delimiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with explicit settings.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a file and record its provenance.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<(DataTable, ExtractProvenance)> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| EquateError::io(path, e))?;

        let table = self.parse_bytes(&bytes)?;
        let provenance =
            ExtractProvenance::new(path, sha256_digest(&bytes), bytes.len() as u64, &table);

        Ok((table, provenance))
    }

    /// Parse in-memory extract text.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<DataTable> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => sniff_delimiter(bytes, self.config.quote)?,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(EquateError::EmptyData("extract has no header".to_string()));
        }

        let rows = reader
            .records()
            .map(|record| Ok(record?.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>>>()?;
        if rows.is_empty() {
            return Err(EquateError::EmptyData("extract has no data rows".to_string()));
        }

        Ok(DataTable::from_rows(headers, rows, delimiter))
    }
}

/// `sha256:<hex>` digest of some bytes.
pub(crate) fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Pick the candidate that splits the header and agrees across sampled lines.
fn sniff_delimiter(bytes: &[u8], quote: u8) -> Result<u8> {
    let lines: Vec<&[u8]> = bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .take(SNIFF_LINES)
        .collect();

    let header = lines
        .first()
        .ok_or_else(|| EquateError::EmptyData("extract is empty".to_string()))?;

    DELIMITERS
        .iter()
        .enumerate()
        .filter_map(|(rank, &delimiter)| {
            let fields = count_unquoted(header, delimiter, quote);
            if fields == 0 {
                return None;
            }
            let agreeing = lines
                .iter()
                .filter(|line| count_unquoted(line, delimiter, quote) == fields)
                .count();
            // agreement first, then width, then preference order
            Some(((agreeing, fields, usize::MAX - rank), delimiter))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, delimiter)| delimiter)
        .ok_or_else(|| {
            EquateError::InvalidDelimiter(
                "could not detect a delimiter; set input.delimiter".to_string(),
            )
        })
}

fn count_unquoted(line: &[u8], delimiter: u8, quote: u8) -> usize {
    let mut quoted = false;
    line.iter()
        .filter(|&&b| {
            if b == quote {
                quoted = !quoted;
            }
            b == delimiter && !quoted
        })
        .count()
}
