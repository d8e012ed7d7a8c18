//! Quality evaluator command

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use workflow_lib::evaluation::{EvaluationJob, EVALUATION_REPORT_FILE};

use crate::output::{color_score, print_json, OutputFormat};

/// Score predictions against held-out labels and write the report
pub fn evaluate(
    predictions: PathBuf,
    labels: PathBuf,
    output_dir: PathBuf,
    threshold: f64,
    format: OutputFormat,
) -> Result<()> {
    let job = EvaluationJob::new(predictions, labels, &output_dir);
    let report = job.run()?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Evaluation".bold());
            println!("{}", "=".repeat(50));
            println!(
                "Weighted F1:   {}",
                color_score(report.score(), threshold)
            );
            println!("Threshold:     {}", threshold);
            println!(
                "Report:        {}",
                output_dir.join(EVALUATION_REPORT_FILE).display()
            );
        }
    }

    Ok(())
}
