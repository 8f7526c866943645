//! Validate command - run the seven checks on stored cycles.

use std::path::PathBuf;

use colored::{ColoredString, Colorize};
use equate::validation::CheckOutcome;
use equate::{CheckStatus, EquateConfig, EquateError, Severity};

use super::{print_cycle_error, Workspace};
use crate::cli::SourceArgs;

pub fn run(
    source: SourceArgs,
    cycles: Vec<String>,
    report_path: Option<PathBuf>,
    json: bool,
    verbose: bool,
    config: EquateConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let ws = Workspace::open(source, config)?;
    let run = ws
        .harmonizer
        .validate_cycles(&ws.raw, &ws.store, &ws.lexicon, &cycles);

    if let Some(path) = &report_path {
        run.report.save(path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&run.report)?);
    } else {
        for cycle in &run.report.cycles {
            let verdict = if cycle.passed() {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            println!(
                "{} {} ({})  {}",
                "Cycle".cyan().bold(),
                cycle.cycle.white().bold(),
                cycle.lexicon,
                verdict
            );
            for outcome in &cycle.checks {
                print_outcome(outcome, verbose);
            }
            println!();
        }

        if let Some(path) = &report_path {
            println!("Report: {}", path.display().to_string().cyan());
        }
    }

    for (cycle, error) in &run.errors {
        print_cycle_error(cycle, error);
    }
    if !run.errors.is_empty() {
        return Err(format!("{} cycle(s) could not be validated", run.errors.len()).into());
    }

    let failed = run.report.failed_hard_checks();
    if failed.is_empty() {
        if !json {
            println!("{} all cycles promotable", "✓".green().bold());
        }
        Ok(())
    } else {
        Err(EquateError::ValidationFailure { failed }.into())
    }
}

fn status_label(status: CheckStatus) -> ColoredString {
    match status {
        CheckStatus::Pass => status.label().green().bold(),
        CheckStatus::Warn => status.label().yellow().bold(),
        CheckStatus::Fail => status.label().red().bold(),
    }
}

fn print_outcome(outcome: &CheckOutcome, verbose: bool) {
    let advisory = if outcome.check.is_advisory() {
        " (advisory)".dimmed().to_string()
    } else {
        String::new()
    };
    println!(
        "  [{}] {}. {}{}",
        status_label(outcome.status),
        outcome.check.number(),
        outcome.check.label(),
        advisory
    );

    // Info findings only with -v
    let floor = if verbose { Severity::Info } else { Severity::Warning };
    for finding in outcome.findings_at_least(floor) {
        let marker = match finding.severity {
            Severity::Error => "✗".red(),
            Severity::Warning => "!".yellow(),
            Severity::Info => "·".dimmed(),
        };
        match &finding.column {
            Some(column) => println!("      {} {}: {}", marker, column.white(), finding.message),
            None => println!("      {} {}", marker, finding.message),
        }
    }
}
