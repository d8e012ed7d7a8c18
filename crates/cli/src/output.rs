//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
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

/// Print rows as a table, or `value` as JSON
pub fn print_rows<T: Tabled, V: Serialize + ?Sized>(
    rows: Vec<T>,
    value: &V,
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
        OutputFormat::Json => print_json(value)?,
    }
    Ok(())
}

pub fn print_json<V: Serialize + ?Sized>(value: &V) -> anyhow::Result<()> {
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

/// Format a score with four decimals
pub fn format_score(score: f64) -> String {
    format!("{:.4}", score)
}

/// Color a score against the promotion threshold
pub fn color_score(score: f64, threshold: f64) -> String {
    let formatted = format_score(score);
    if score >= threshold {
        formatted.green().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a run state by outcome
pub fn color_state(state: &str) -> String {
    match state {
        "Succeeded" => state.green().to_string(),
        "Failed" => state.red().to_string(),
        _ => state.yellow().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.8), "0.8000");
        assert_eq!(format_score(1.0 / 3.0), "0.3333");
    }

    #[test]
    fn test_color_score_keeps_digits() {
        colored::control::set_override(false);
        assert_eq!(color_score(0.75, 0.75), "0.7500");
        assert_eq!(color_state("Failed"), "Failed");
    }
}
