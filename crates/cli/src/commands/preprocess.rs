//! Data splitter command

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;
use workflow_lib::preprocess::ProcessingJob;

use crate::output::{print_rows, print_success, OutputFormat};

#[derive(Debug, Serialize)]
struct SplitResult {
    total_rows: usize,
    train_rows: usize,
    test_rows: usize,
    columns: Vec<String>,
    training_file: PathBuf,
    test_features_file: PathBuf,
    test_labels_file: PathBuf,
}

/// Row for the split artifacts table
#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Artifact")]
    artifact: &'static str,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Path")]
    path: String,
}

pub struct PreprocessArgs {
    pub input_file: String,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub target_attribute: String,
    pub seed: Option<u64>,
}

/// Split one dataset into training and testing artifacts
pub fn preprocess(args: PreprocessArgs, format: OutputFormat) -> Result<()> {
    let job = ProcessingJob::with_roots(&args.target_attribute, &args.input_root, &args.output_root)
        .with_seed(args.seed);
    let summary = job.run(&args.input_file)?;
    let paths = job.output_paths();

    let result = SplitResult {
        total_rows: summary.total_rows,
        train_rows: summary.train_rows,
        test_rows: summary.test_rows,
        columns: summary.columns,
        training_file: paths.training_file(),
        test_features_file: paths.test_features_file(),
        test_labels_file: paths.test_labels_file(),
    };

    let rows = vec![
        ArtifactRow {
            artifact: "training",
            rows: result.train_rows,
            path: result.training_file.display().to_string(),
        },
        ArtifactRow {
            artifact: "test features",
            rows: result.test_rows,
            path: result.test_features_file.display().to_string(),
        },
        ArtifactRow {
            artifact: "test labels",
            rows: result.test_rows,
            path: result.test_labels_file.display().to_string(),
        },
    ];
    if matches!(format, OutputFormat::Table) {
        print_success(&format!(
            "Split {} rows on '{}'",
            result.total_rows, args.target_attribute
        ));
    }
    print_rows(rows, &result, format)
}
