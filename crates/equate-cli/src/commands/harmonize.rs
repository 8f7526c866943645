//! Harmonize command - transform raw cycles and upsert them into the store.

use std::path::PathBuf;

use colored::Colorize;
use equate::EquateConfig;

use super::{print_cycle_error, Workspace};
use crate::cli::SourceArgs;

pub fn run(
    source: SourceArgs,
    cycles: Vec<String>,
    audit: Option<PathBuf>,
    config: EquateConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::open(source, config)?;

    println!(
        "{} {} cycle(s) of {}",
        "Harmonizing".cyan().bold(),
        cycles.len().to_string().white().bold(),
        ws.lexicon.white().bold()
    );

    let outcomes = ws
        .harmonizer
        .harmonize_and_persist(&ws.raw, &ws.store, &ws.lexicon, &cycles);

    let mut audits = Vec::new();
    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(cycle_audit) => {
                let empty = cycle_audit.items.iter().filter(|i| i.is_empty_domain()).count();
                println!(
                    "  {} {}  {} items  {} units inserted  {} updated",
                    "✓".green().bold(),
                    outcome.cycle.white().bold(),
                    cycle_audit.items.len(),
                    cycle_audit.merge.units_inserted,
                    cycle_audit.merge.units_updated
                );
                if !cycle_audit.absent_items.is_empty() {
                    println!(
                        "    {} not in extract: {}",
                        "Note:".yellow(),
                        cycle_audit.absent_items.join(", ")
                    );
                }
                if empty > 0 {
                    println!(
                        "    {} {} item(s) had no usable values",
                        "Warning:".yellow().bold(),
                        empty
                    );
                }
                audits.push(cycle_audit);
            }
            Err(e) => {
                failed += 1;
                print_cycle_error(&outcome.cycle, &e);
            }
        }
    }

    println!();
    println!("Store: {}", ws.store.dir().display().to_string().cyan());

    if let Some(path) = audit {
        ws.harmonizer.audit(&ws.lexicon, audits).save(&path)?;
        println!("Audit: {}", path.display().to_string().cyan());
    }

    if failed > 0 {
        return Err(format!("{} of {} cycle(s) failed", failed, cycles.len()).into());
    }
    Ok(())
}
