//! Weighted F1 score
//!
//! Per-class F1 is the harmonic mean of precision and recall, taken as 0
//! when either is undefined. Classes are the union of true and predicted
//! labels; the average is weighted by each class's support in the truth.

use crate::error::{Result, WorkflowError};
use std::collections::BTreeMap;
use std::path::Path;

/// Confusion counts and score of a single class
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassScore {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ClassScore {
    /// Number of true occurrences of the class
    pub fn support(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.support())
    }

    pub fn f1(&self) -> f64 {
        // 2tp / (2tp + fp + fn) equals the harmonic mean without the 0/0 case
        ratio(
            2 * self.true_positives,
            2 * self.true_positives + self.false_positives + self.false_negatives,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Tally confusion counts per class
fn class_scores<T: AsRef<str>>(y_true: &[T], y_pred: &[T]) -> BTreeMap<String, ClassScore> {
    let mut scores: BTreeMap<String, ClassScore> = BTreeMap::new();
    for (truth, pred) in y_true.iter().zip(y_pred) {
        let (truth, pred) = (truth.as_ref(), pred.as_ref());
        if truth == pred {
            scores.entry(truth.to_string()).or_default().true_positives += 1;
        } else {
            scores.entry(truth.to_string()).or_default().false_negatives += 1;
            scores.entry(pred.to_string()).or_default().false_positives += 1;
        }
    }
    scores
}

/// Support-weighted mean of per-class F1 scores
pub fn weighted_f1<T: AsRef<str>>(y_true: &[T], y_pred: &[T]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(WorkflowError::data_shape(format!(
            "Found {} predictions but {} labels",
            y_pred.len(),
            y_true.len()
        )));
    }
    if y_true.is_empty() {
        return Err(WorkflowError::data_shape("No rows to evaluate"));
    }

    let scores = class_scores(y_true, y_pred);
    let total = y_true.len() as f64;
    let score = scores
        .values()
        .map(|s| s.f1() * s.support() as f64)
        .sum::<f64>()
        / total;

    Ok(score.clamp(0.0, 1.0))
}

/// Canonical form of one label field
///
/// Numeric fields compare by value, so `1`, `1.0` and `1e0` are one class.
/// Anything else is kept as trimmed text.
pub fn normalize_label(field: &str) -> String {
    let field = field.trim();
    match field.parse::<f64>() {
        // -0.0 prints as "-0"
        Ok(value) if value == 0.0 => "0".to_string(),
        Ok(value) if value.is_finite() => value.to_string(),
        _ => field.to_string(),
    }
}

/// Read a headerless label file, one label per row
///
/// Rows with several fields are compared as a whole.
pub fn read_labels(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record?;
        let label = record
            .iter()
            .map(normalize_label)
            .collect::<Vec<_>>()
            .join(",");
        labels.push(label);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_predictions_score_one() {
        let y = ["a", "b", "c", "a"];
        assert!(approx(weighted_f1(&y, &y).unwrap(), 1.0));
    }

    #[test]
    fn test_all_wrong_scores_zero() {
        let y_true = ["0", "0", "1", "1"];
        let y_pred = ["1", "1", "0", "0"];
        assert!(approx(weighted_f1(&y_true, &y_pred).unwrap(), 0.0));
    }

    #[test]
    fn test_matches_known_value() {
        // class 0: tp=1 fp=1 fn=1 -> f1=0.5, support 2
        // class 1: tp=1 fp=1 fn=0 -> f1=2/3, support 1
        // class 2: tp=0 fp=0 fn=1 -> f1=0,   support 1
        let y_true = ["0", "0", "1", "2"];
        let y_pred = ["0", "1", "1", "0"];
        let expected = (0.5 * 2.0 + (2.0 / 3.0) * 1.0) / 4.0;
        assert!(approx(weighted_f1(&y_true, &y_pred).unwrap(), expected));
    }

    #[test]
    fn test_predicted_only_class_has_no_weight() {
        let y_true = ["a", "a", "a", "a"];
        let y_pred = ["a", "a", "a", "z"];
        // class a: tp=3 fn=1 -> f1 = 6/7
        assert!(approx(weighted_f1(&y_true, &y_pred).unwrap(), 6.0 / 7.0));
    }

    #[test]
    fn test_permutation_invariant() {
        let y_true = ["0", "1", "1", "2", "0", "2", "1", "0"];
        let y_pred = ["0", "1", "0", "2", "1", "2", "1", "2"];
        let base = weighted_f1(&y_true, &y_pred).unwrap();

        let perm = [7, 3, 0, 5, 1, 6, 2, 4];
        let t: Vec<&str> = perm.iter().map(|&i| y_true[i]).collect();
        let p: Vec<&str> = perm.iter().map(|&i| y_pred[i]).collect();
        assert_eq!(weighted_f1(&t, &p).unwrap(), base);
    }

    #[test]
    fn test_score_in_unit_interval() {
        let y_true = ["x", "y", "y", "z", "x", "x"];
        let y_pred = ["y", "y", "z", "z", "x", "y"];
        let score = weighted_f1(&y_true, &y_pred).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_length_mismatch_is_data_shape_error() {
        let err = weighted_f1(&["a", "b"], &["a"]).unwrap_err();
        assert!(matches!(err, WorkflowError::DataShape(_)));
    }

    #[test]
    fn test_empty_input_is_data_shape_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            weighted_f1(&empty, &empty),
            Err(WorkflowError::DataShape(_))
        ));
    }

    #[test]
    fn test_class_score_undefined_precision_is_zero() {
        let score = ClassScore {
            true_positives: 0,
            false_positives: 0,
            false_negatives: 3,
        };
        assert_eq!(score.precision(), 0.0);
        assert_eq!(score.recall(), 0.0);
        assert_eq!(score.f1(), 0.0);
        assert_eq!(score.support(), 3);
    }

    #[test]
    fn test_read_labels_trims_and_joins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.csv");
        fs::write(&path, "1\n 0 \n1\n").unwrap();
        assert_eq!(read_labels(&path).unwrap(), vec!["1", "0", "1"]);

        let multi = dir.path().join("multi.csv");
        fs::write(&multi, "a,1\nb,0\n").unwrap();
        assert_eq!(read_labels(&multi).unwrap(), vec!["a,1", "b,0"]);
    }

    #[test]
    fn test_numeric_labels_compare_by_value() {
        assert_eq!(normalize_label("1.0"), "1");
        assert_eq!(normalize_label(" 1 "), "1");
        assert_eq!(normalize_label("1e0"), "1");
        assert_eq!(normalize_label("-0.0"), "0");
        assert_eq!(normalize_label("0.25"), "0.25");
        assert_eq!(normalize_label("churn"), "churn");
        assert_eq!(normalize_label("NaN"), "NaN");

        let dir = TempDir::new().unwrap();
        let truth = dir.path().join("y_test.csv");
        let predictions = dir.path().join("x_test.csv.out");
        fs::write(&truth, "1\n0\n1\n").unwrap();
        fs::write(&predictions, "1.0\n0.0\n1.0\n").unwrap();
        let score = weighted_f1(
            &read_labels(&truth).unwrap(),
            &read_labels(&predictions).unwrap(),
        )
        .unwrap();
        assert!(approx(score, 1.0));
    }
}
