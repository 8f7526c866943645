//! Codebook command - summarize the lexicons a codebook declares.

use std::path::PathBuf;

use colored::Colorize;
use equate::{Orientation, Registry};
use serde::Serialize;

#[derive(Serialize)]
struct LexiconSummary {
    lexicon: String,
    items: usize,
    forward: usize,
    reverse: usize,
}

pub fn run(file: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("Codebook not found: {}", file.display()).into());
    }

    let registry = Registry::load(&file)?;
    let summaries: Vec<LexiconSummary> = registry
        .lexicons()
        .map(|lexicon| LexiconSummary {
            lexicon: lexicon.to_string(),
            items: registry.item_count(lexicon),
            forward: registry.items_by_orientation(lexicon, Orientation::Forward).len(),
            reverse: registry.items_by_orientation(lexicon, Orientation::Reverse).len(),
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "codebook": registry.provenance(),
            "lexicons": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Codebook".cyan().bold());
    println!("  File:    {}", file.display());
    if let Some(version) = &registry.provenance().version {
        println!("  Version: {}", version.white().bold());
    }
    if let Some(digest) = &registry.provenance().digest {
        println!("  SHA-256: {}", digest.dimmed());
    }
    println!("  Entries: {}", registry.len().to_string().white().bold());
    println!();

    println!("{}", "Lexicons".cyan().bold());
    for summary in &summaries {
        println!(
            "  {:<20} {:>4} items  {} forward  {} reverse",
            summary.lexicon.white().bold(),
            summary.items,
            summary.forward.to_string().green(),
            summary.reverse.to_string().yellow()
        );
    }

    Ok(())
}
