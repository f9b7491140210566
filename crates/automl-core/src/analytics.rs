//! Confusion-matrix analytics (C5).
//!
//! [`ConfusionMatrixAnalytics::evaluate`] faithfully reproduces a
//! reference-implementation defect: it computes every per-measurement
//! field but always *returns* the ROC-distance field, regardless of the
//! configured `Analytics/ConfusionMatrix/Measurement` selector. Callers
//! that want the actually-selected metric must use
//! [`ConfusionMatrixAnalytics::measurement_breakdown`] instead.

use crate::forest::RandomForest;
use automl_data::config::Measurement;
use automl_data::DataPackage;

/// An `N x N` matrix indexed `cells[predicted][actual]`.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    pub outcomes: Vec<String>,
    cells: Vec<Vec<f64>>,
}

impl ConfusionMatrix {
    pub fn new(outcomes: Vec<String>) -> Self {
        let n = outcomes.len();
        Self {
            outcomes,
            cells: vec![vec![0.0; n]; n],
        }
    }

    pub fn increment(&mut self, predicted: usize, actual: usize) {
        self.cells[predicted][actual] += 1.0;
    }

    pub fn cell(&self, predicted: usize, actual: usize) -> f64 {
        self.cells[predicted][actual]
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().flatten().sum()
    }

    pub fn diagonal_sum(&self) -> f64 {
        (0..self.outcomes.len()).map(|i| self.cells[i][i]).sum()
    }
}

/// Every per-measurement field computed from one confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementBreakdown {
    pub tp: f64,
    pub tn: f64,
    pub fp: f64,
    pub fn_: f64,
    pub roc_distance: f64,
    pub auc: f64,
    pub f_score: f64,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub npv: f64,
    pub mcc: f64,
}

impl MeasurementBreakdown {
    /// The value of the given measurement. `ROCDistance` is smaller-is-better;
    /// all others are larger-is-better (see [`Measurement::higher_is_better`]).
    pub fn value(&self, measurement: Measurement) -> f64 {
        match measurement {
            Measurement::RocDistance => self.roc_distance,
            Measurement::Auc => self.auc,
            Measurement::FScore => self.f_score,
            Measurement::Accuracy => self.accuracy,
            Measurement::Sensitivity => self.sensitivity,
            Measurement::Specificity => self.specificity,
            Measurement::Ppv => self.ppv,
            Measurement::Npv => self.npv,
            Measurement::Mcc => self.mcc,
        }
    }
}

fn binary_breakdown(cm: &ConfusionMatrix) -> MeasurementBreakdown {
    let tn = cm.cell(0, 0);
    let fn_ = cm.cell(0, 1);
    let fp = cm.cell(1, 0);
    let tp = cm.cell(1, 1);

    let tpr = safe_div(tp, tp + fn_);
    let fpr = safe_div(fp, fp + tn);
    let roc_distance = ((1.0 - tpr).powi(2) + fpr.powi(2)).sqrt();
    let auc = fpr * tpr / 2.0 + (1.0 - fpr) * tpr + (1.0 - fpr) * (1.0 - tpr) / 2.0;

    let beta2 = 1.0;
    let f_score = safe_div((1.0 + beta2) * tp, (1.0 + beta2) * tp + beta2 * fn_ + fp);

    let accuracy = safe_div(cm.diagonal_sum(), cm.total());
    let sensitivity = tpr;
    let specificity = safe_div(tn, tn + fp);
    let ppv = safe_div(tp, tp + fp);
    let npv = safe_div(tn, tn + fn_);
    let mcc_denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
    let mcc = if mcc_denom == 0.0 {
        0.0
    } else {
        (tp * tn - fp * fn_) / mcc_denom
    };

    MeasurementBreakdown {
        tp,
        tn,
        fp,
        fn_,
        roc_distance,
        auc,
        f_score,
        accuracy,
        sensitivity,
        specificity,
        ppv,
        npv,
        mcc,
    }
}

/// Non-standard multi-class aggregation: per outcome row, compute a
/// one-vs-rest ROC distance, then return the geometric-mean-like
/// `sqrt(sum of squares)` across rows. Only ROC distance is meaningfully
/// defined this way; the other fields collapse to the diagonal-based
/// accuracy so `measurement_breakdown` remains well-formed for N>2.
fn multiclass_breakdown(cm: &ConfusionMatrix) -> MeasurementBreakdown {
    let n = cm.outcomes.len();
    let total = cm.total();
    let mut sum_sq = 0.0;
    for i in 0..n {
        let tp = cm.cell(i, i);
        let fp: f64 = (0..n).filter(|&j| j != i).map(|j| cm.cell(i, j)).sum();
        let fn_: f64 = (0..n).filter(|&j| j != i).map(|j| cm.cell(j, i)).sum();
        let tn = total - tp - fp - fn_;
        let tpr = safe_div(tp, tp + fn_);
        let fpr = safe_div(fp, fp + tn);
        let row_distance = ((1.0 - tpr).powi(2) + fpr.powi(2)).sqrt();
        sum_sq += row_distance.powi(2);
    }
    let roc_distance = sum_sq.sqrt();
    let accuracy = safe_div(cm.diagonal_sum(), total);

    MeasurementBreakdown {
        tp: cm.diagonal_sum(),
        tn: 0.0,
        fp: 0.0,
        fn_: 0.0,
        roc_distance,
        auc: accuracy,
        f_score: accuracy,
        accuracy,
        sensitivity: accuracy,
        specificity: accuracy,
        ppv: accuracy,
        npv: accuracy,
        mcc: accuracy,
    }
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Scores a model against a data package by its confusion matrix.
pub struct ConfusionMatrixAnalytics {
    matrix: ConfusionMatrix,
}

impl ConfusionMatrixAnalytics {
    pub fn new(outcomes: Vec<String>) -> Self {
        Self {
            matrix: ConfusionMatrix::new(outcomes),
        }
    }

    pub fn matrix(&self) -> &ConfusionMatrix {
        &self.matrix
    }

    /// Reset the matrix, predict every common sample key through `forest`,
    /// and tally predicted-vs-actual. Returns the ROC-distance field
    /// **regardless of the configured measurement selector** — this is a
    /// faithful reproduction of the reference implementation's
    /// switch-fallthrough bug. Use [`Self::measurement_breakdown`] for the
    /// actually-selected metric.
    pub fn evaluate(&mut self, forest: &RandomForest, pkg: &DataPackage) -> f64 {
        let outcomes = self.matrix.outcomes.clone();
        self.matrix = ConfusionMatrix::new(outcomes.clone());

        let matrix = pkg.feature_matrix();
        for (i, key) in pkg.sample_keys().iter().enumerate() {
            let predicted = forest.predict(&matrix[i]);
            let actual = pkg.label_of(key).unwrap_or("");
            let Some(p_idx) = outcomes.iter().position(|o| o == &predicted) else {
                continue;
            };
            let Some(a_idx) = outcomes.iter().position(|o| o == actual) else {
                continue;
            };
            self.matrix.increment(p_idx, a_idx);
        }

        self.measurement_breakdown().roc_distance
    }

    /// Every per-measurement field computed from the current matrix,
    /// without the `evaluate`-return bug.
    pub fn measurement_breakdown(&self) -> MeasurementBreakdown {
        if self.matrix.outcomes.len() == 2 {
            binary_breakdown(&self.matrix)
        } else {
            multiclass_breakdown(&self.matrix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_classifier_has_zero_roc_distance() {
        let mut cm = ConfusionMatrix::new(vec!["no".into(), "yes".into()]);
        for _ in 0..10 {
            cm.increment(0, 0);
        }
        for _ in 0..5 {
            cm.increment(1, 1);
        }
        let breakdown = binary_breakdown(&cm);
        assert!(breakdown.roc_distance < 1e-9);
        assert_eq!(breakdown.accuracy, 1.0);
    }

    #[test]
    fn confusion_matrix_cells_sum_to_total_predictions() {
        let mut cm = ConfusionMatrix::new(vec!["no".into(), "yes".into()]);
        cm.increment(0, 0);
        cm.increment(1, 0);
        cm.increment(0, 1);
        cm.increment(1, 1);
        assert_eq!(cm.total(), 4.0);
    }

    #[test]
    fn mcc_is_zero_for_degenerate_matrix() {
        let cm = ConfusionMatrix::new(vec!["no".into(), "yes".into()]);
        let breakdown = binary_breakdown(&cm);
        assert_eq!(breakdown.mcc, 0.0);
    }
}
