//! Data splitter
//!
//! Reads a headered CSV, moves the target column to the last position and
//! partitions the rows into a training set and a held-out test set whose
//! features and labels are written to separate headerless files.

use super::{TEST_FEATURES_FILE, TEST_LABELS_FILE, TRAINING_FILE};
use crate::error::{Result, WorkflowError};
use csv::StringRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Share of rows held out for testing, in percent
pub const TEST_PERCENT: usize = 20;

/// Number of test rows for a dataset of `total` rows (rounded up)
pub fn test_row_count(total: usize) -> usize {
    (total * TEST_PERCENT).div_ceil(100)
}

/// Headered tabular data held in memory
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

/// Read a headered CSV file
pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Table { headers, rows })
}

/// Directories the split is written to
#[derive(Debug, Clone)]
pub struct SplitPaths {
    pub training_dir: PathBuf,
    pub testing_dir: PathBuf,
}

impl SplitPaths {
    pub fn new(training_dir: impl Into<PathBuf>, testing_dir: impl Into<PathBuf>) -> Self {
        Self {
            training_dir: training_dir.into(),
            testing_dir: testing_dir.into(),
        }
    }

    pub fn training_file(&self) -> PathBuf {
        self.training_dir.join(TRAINING_FILE)
    }

    pub fn test_features_file(&self) -> PathBuf {
        self.testing_dir.join(TEST_FEATURES_FILE)
    }

    pub fn test_labels_file(&self) -> PathBuf {
        self.testing_dir.join(TEST_LABELS_FILE)
    }
}

/// Row counts and column order of a completed split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub total_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Training column order, label last
    pub columns: Vec<String>,
}

/// In-memory result of a split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    /// Training column order, label last
    pub columns: Vec<String>,
    /// Training rows, features then label
    pub train: Vec<StringRecord>,
    pub test_features: Vec<StringRecord>,
    pub test_labels: Vec<StringRecord>,
}

impl TrainTestSplit {
    pub fn summary(&self) -> SplitSummary {
        SplitSummary {
            total_rows: self.train.len() + self.test_features.len(),
            train_rows: self.train.len(),
            test_rows: self.test_features.len(),
            columns: self.columns.clone(),
        }
    }

    /// Write the three artifacts, creating the output directories
    pub fn write(&self, paths: &SplitPaths) -> Result<SplitSummary> {
        fs::create_dir_all(&paths.training_dir)?;
        fs::create_dir_all(&paths.testing_dir)?;

        let mut training = csv::Writer::from_path(paths.training_file())?;
        training.write_record(&self.columns)?;
        for row in &self.train {
            training.write_record(row)?;
        }
        training.flush()?;

        let mut features = csv::Writer::from_path(paths.test_features_file())?;
        for row in &self.test_features {
            features.write_record(row)?;
        }
        features.flush()?;

        let mut labels = csv::Writer::from_path(paths.test_labels_file())?;
        for row in &self.test_labels {
            labels.write_record(row)?;
        }
        labels.flush()?;

        Ok(self.summary())
    }
}

fn reorder(row: &StringRecord, cols: &[usize]) -> StringRecord {
    cols.iter().map(|&i| row.get(i).unwrap_or_default()).collect()
}

/// Splits a dataset on a named target column
#[derive(Debug, Clone)]
pub struct DataSplitter {
    target_attribute: String,
}

impl DataSplitter {
    pub fn new(target_attribute: impl Into<String>) -> Self {
        Self {
            target_attribute: target_attribute.into(),
        }
    }

    pub fn target_attribute(&self) -> &str {
        &self.target_attribute
    }

    /// Partition a table in memory
    pub fn split<R: Rng + ?Sized>(&self, table: &Table, rng: &mut R) -> Result<TrainTestSplit> {
        let target_idx = table
            .headers
            .iter()
            .position(|h| h == self.target_attribute)
            .ok_or_else(|| {
                WorkflowError::configuration(format!(
                    "Target attribute '{}' not found in dataset header",
                    self.target_attribute
                ))
            })?;

        let total = table.rows.len();
        let test_rows = test_row_count(total);
        if total == 0 || test_rows >= total {
            return Err(WorkflowError::data_shape(format!(
                "Dataset with {} rows is too small for an {}/{} split",
                total,
                100 - TEST_PERCENT,
                TEST_PERCENT
            )));
        }

        // Feature columns keep their relative order, label goes last
        let order: Vec<usize> = (0..table.headers.len())
            .filter(|&i| i != target_idx)
            .chain(std::iter::once(target_idx))
            .collect();
        let columns: Vec<String> = order
            .iter()
            .map(|&i| table.headers[i].to_string())
            .collect();
        debug!(rows = total, columns = columns.len(), "Shape of the data");

        let mut indices: Vec<usize> = (0..total).collect();
        indices.shuffle(rng);
        let (test_idx, train_idx) = indices.split_at(test_rows);

        let feature_cols = &order[..order.len() - 1];
        let label_col = std::slice::from_ref(&target_idx);

        let train = train_idx
            .iter()
            .map(|&i| reorder(&table.rows[i], &order))
            .collect();
        let test_features = test_idx
            .iter()
            .map(|&i| reorder(&table.rows[i], feature_cols))
            .collect();
        let test_labels = test_idx
            .iter()
            .map(|&i| reorder(&table.rows[i], label_col))
            .collect();

        Ok(TrainTestSplit {
            columns,
            train,
            test_features,
            test_labels,
        })
    }

    /// Read `input`, split it and write the artifacts under `paths`
    pub fn split_file<R: Rng + ?Sized>(
        &self,
        input: &Path,
        paths: &SplitPaths,
        rng: &mut R,
    ) -> Result<SplitSummary> {
        info!(input = %input.display(), "Reading file");
        let table = read_table(input)?;
        let split = self.split(&table, rng)?;
        let summary = split.write(paths)?;
        info!(
            train_rows = summary.train_rows,
            test_rows = summary.test_rows,
            "Files successfully created"
        );
        Ok(summary)
    }
}
