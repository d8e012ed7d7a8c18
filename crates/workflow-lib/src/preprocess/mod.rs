//! Preprocessing stage: train/test split of the uploaded dataset
//!
//! This module provides:
//! - The data splitter that moves the label column last and partitions rows 80/20
//! - The processing-job entry point with its fixed input and output roots

mod job;
mod splitter;

pub use job::{ProcessingJob, DEFAULT_INPUT_ROOT, DEFAULT_OUTPUT_ROOT};
pub use splitter::{
    read_table, test_row_count, DataSplitter, SplitPaths, SplitSummary, Table, TrainTestSplit,
    TEST_PERCENT,
};

/// Training data with header, label column last
pub const TRAINING_FILE: &str = "train_val.csv";

/// Headerless test features, training column order minus the label
pub const TEST_FEATURES_FILE: &str = "x_test.csv";

/// Headerless single-column test labels
pub const TEST_LABELS_FILE: &str = "y_test.csv";
