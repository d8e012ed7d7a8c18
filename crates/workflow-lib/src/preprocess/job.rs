//! Processing-job entry point for the data splitter

use super::{DataSplitter, SplitPaths, SplitSummary};
use crate::error::{Result, WorkflowError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Where the processing container mounts the dataset
pub const DEFAULT_INPUT_ROOT: &str = "/opt/ml/processing/input";

/// Parent of the `training` and `testing` output mounts
pub const DEFAULT_OUTPUT_ROOT: &str = "/opt/ml/processing/output";

/// Preprocessing job: one input file in, training and testing outputs out
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    input_root: PathBuf,
    output_root: PathBuf,
    splitter: DataSplitter,
    seed: Option<u64>,
}

impl ProcessingJob {
    /// Job using the container's fixed mount points
    pub fn new(target_attribute: impl Into<String>) -> Self {
        Self::with_roots(target_attribute, DEFAULT_INPUT_ROOT, DEFAULT_OUTPUT_ROOT)
    }

    pub fn with_roots(
        target_attribute: impl Into<String>,
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            splitter: DataSplitter::new(target_attribute),
            seed: None,
        }
    }

    /// Make the partition reproducible
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn output_paths(&self) -> SplitPaths {
        SplitPaths::new(
            self.output_root.join("training"),
            self.output_root.join("testing"),
        )
    }

    /// Split `input_file`, resolved against the input root
    pub fn run(&self, input_file: &str) -> Result<SplitSummary> {
        let relative = Path::new(input_file);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if input_file.is_empty() || escapes_root {
            return Err(WorkflowError::configuration(format!(
                "Input file must be a relative path under the input root, got '{}'",
                input_file
            )));
        }

        info!(
            input_file = %input_file,
            target_attribute = %self.splitter.target_attribute(),
            "Starting preprocessing"
        );
        let input = self.input_root.join(relative);
        let paths = self.output_paths();
        let summary = match self.seed {
            Some(seed) => {
                self.splitter
                    .split_file(&input, &paths, &mut StdRng::seed_from_u64(seed))?
            }
            None => self.splitter.split_file(&input, &paths, &mut rand::rng())?,
        };
        info!("Completed running the processing job");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_dataset(dir: &Path, name: &str, rows: usize) {
        let mut content = String::from("f1,target,f2\n");
        for i in 0..rows {
            content.push_str(&format!("{},{},{}\n", i, i % 3, i * 2));
        }
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_run_writes_under_output_root() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_dataset(input.path(), "features.csv", 20);

        let job = ProcessingJob::with_roots("target", input.path(), output.path());
        let summary = job.run("features.csv").unwrap();

        assert_eq!(summary.train_rows, 16);
        assert_eq!(summary.test_rows, 4);
        assert!(output.path().join("training/train_val.csv").exists());
        assert!(output.path().join("testing/x_test.csv").exists());
        assert!(output.path().join("testing/y_test.csv").exists());
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let input = TempDir::new().unwrap();
        write_dataset(input.path(), "features.csv", 30);

        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        ProcessingJob::with_roots("target", input.path(), first.path())
            .with_seed(Some(11))
            .run("features.csv")
            .unwrap();
        ProcessingJob::with_roots("target", input.path(), second.path())
            .with_seed(Some(11))
            .run("features.csv")
            .unwrap();

        let a = fs::read_to_string(first.path().join("testing/x_test.csv")).unwrap();
        let b = fs::read_to_string(second.path().join("testing/x_test.csv")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_paths_outside_input_root() {
        let job = ProcessingJob::with_roots("target", "/tmp/in", "/tmp/out");
        for bad in ["", "../features.csv", "/etc/passwd"] {
            assert!(matches!(
                job.run(bad),
                Err(WorkflowError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_missing_input_file_is_io_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let job = ProcessingJob::with_roots("target", input.path(), output.path());
        let err = job.run("absent.csv").unwrap_err();
        assert!(matches!(err, WorkflowError::Csv(_) | WorkflowError::Io(_)));
    }
}
