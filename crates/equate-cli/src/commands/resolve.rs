//! Resolve command - deliver one harmonized cycle and write it out.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use colored::Colorize;
use equate::{ConsumptionPath, CoverageThreshold, EquateConfig, HarmonizedTable};

use super::Workspace;
use crate::cli::{OutputFormat, SourceArgs};

pub fn run(
    source: SourceArgs,
    cycle: String,
    threshold: Option<CoverageThreshold>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    config: EquateConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let id_header = config.input.unit_id_column.clone();
    let ws = Workspace::open(source, config)?;

    let consumed = ws
        .harmonizer
        .resolve_cycle(&ws.raw, &ws.store, &ws.lexicon, &cycle, threshold)?;
    let decision = &consumed.decision;

    let path_label = match decision.path {
        ConsumptionPath::FastPath => decision.path.label().green().bold(),
        ConsumptionPath::SlowPath => decision.path.label().yellow().bold(),
    };
    // Status goes to stderr so stdout can carry the table
    eprintln!(
        "{} {}  {}  coverage {}/{} (need {})",
        "Resolved".cyan().bold(),
        cycle.white().bold(),
        path_label,
        decision.coverage,
        decision.expected,
        decision.required
    );

    let format = format
        .or_else(|| output.as_deref().and_then(OutputFormat::from_path))
        .unwrap_or_default();

    match output {
        Some(path) => {
            let file = File::create(&path)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
            write_table(&consumed.table, BufWriter::new(file), format, &id_header)?;
            eprintln!(
                "Wrote {} units × {} columns to {}",
                consumed.table.row_count(),
                consumed.table.column_count(),
                path.display().to_string().cyan()
            );
        }
        None => {
            let stdout = io::stdout();
            write_table(&consumed.table, stdout.lock(), format, &id_header)?;
        }
    }

    Ok(())
}

fn write_table<W: Write>(
    table: &HarmonizedTable,
    mut writer: W,
    format: OutputFormat,
    id_header: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Tsv => table.write_delimited(writer, id_header, b'\t')?,
        OutputFormat::Csv => table.write_delimited(writer, id_header, b',')?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, table)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
