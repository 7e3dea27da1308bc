//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use gateway_lib::actuator::PushReport;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Log line format on stderr
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Print rows as a rounded table, or `json_value` as pretty JSON
pub fn print_table<T: Tabled, J: Serialize + ?Sized>(
    rows: &[T],
    json_value: &J,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return Ok(());
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(json_value)?,
    }
    Ok(())
}

pub fn print_json<J: Serialize + ?Sized>(value: &J) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a ratio with three decimals
pub fn format_ratio(value: f64) -> String {
    format!("{:.3}", value)
}

/// Color a pressure ratio: green below 0.5, yellow below 0.8, red above
pub fn color_ratio(value: f64) -> String {
    let formatted = format_ratio(value);
    if value >= 0.8 {
        formatted.red().to_string()
    } else if value >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Print one line per pod of a push report
pub fn print_push_report(what: &str, report: &PushReport, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }

    for target in &report.succeeded {
        print_success(&format!("{} pushed to {}", what, target));
    }
    for target in &report.skipped {
        print_warning(&format!("{}: no pod IP known, skipped", target));
    }
    for (target, error) in &report.failed {
        print_error(&format!("{}: {}", target, error));
    }
    if report.succeeded.is_empty() && report.skipped.is_empty() && report.failed.is_empty() {
        print_info("Nothing to push");
    }
    Ok(())
}
