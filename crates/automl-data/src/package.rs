//! [`DataPackage`]: a paired feature table (FDB) and label table (LDB)
//! plus the derived attributes every preprocessing action and learner
//! reads (label index, label outcomes, common sample keys).
//!
//! Two numeric routines here are deliberately faithful reproductions of
//! defects in the reference implementation rather than textbook formulas:
//! [`DataPackage::distance_buggy`] and [`DataPackage::population_spread`].
//! Every consumer in this crate (SMOTE, Tomek links, isolation forest,
//! z-score normalization) uses these, not a corrected version.

use crate::error::{EngineError, EngineResult};
use crate::tabular::{Header, TabularData};
use std::collections::HashSet;

const MISSING_TOKENS: [&str; 2] = ["NA", "nan"];

/// A paired feature/label table with cached derived attributes.
#[derive(Debug, Clone)]
pub struct DataPackage {
    fdb: TabularData,
    ldb: TabularData,
    label_name: String,
    label_index: usize,
    label_outcomes: Vec<String>,
    sample_keys: Vec<String>,
}

impl DataPackage {
    /// Construct a package from raw feature/label tables.
    ///
    /// Applies the erase-incomplete policy (any FDB row containing a
    /// literal `"NA"`/`"nan"` token is dropped), then intersects the
    /// surviving FDB keys with LDB keys carrying a non-missing label.
    /// Fails with [`EngineError::DataInvalid`] if fewer than two distinct
    /// label outcomes remain — this is also how the reference
    /// implementation's `std::system(EXIT_SUCCESS)` abort-on-non-binary
    /// behavior is replaced with a recoverable error.
    pub fn new(fdb: TabularData, ldb: TabularData, label_name: impl Into<String>) -> EngineResult<Self> {
        let label_name = label_name.into();
        let label_index = ldb.header().index_of(&label_name).ok_or_else(|| {
            EngineError::DataInvalid(format!("label column '{label_name}' not found"))
        })?;

        let fdb = erase_incomplete_rows(fdb);

        let mut sample_keys: Vec<String> = fdb
            .sample_keys()
            .filter(|k| {
                ldb.row(k)
                    .map(|row| !is_missing(&row[label_index]))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        sample_keys.sort();

        let mut label_outcomes: Vec<String> = sample_keys
            .iter()
            .map(|k| ldb.row(k).unwrap()[label_index].clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        label_outcomes.sort();

        if label_outcomes.len() != 2 {
            return Err(EngineError::DataInvalid(format!(
                "expected exactly 2 label outcomes for binary classification, found {}: {:?}",
                label_outcomes.len(),
                label_outcomes
            )));
        }

        Ok(Self {
            fdb,
            ldb,
            label_name,
            label_index,
            label_outcomes,
            sample_keys,
        })
    }

    pub fn fdb(&self) -> &TabularData {
        &self.fdb
    }

    pub fn ldb(&self) -> &TabularData {
        &self.ldb
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    pub fn label_index(&self) -> usize {
        self.label_index
    }

    pub fn label_outcomes(&self) -> &[String] {
        &self.label_outcomes
    }

    pub fn sample_keys(&self) -> &[String] {
        &self.sample_keys
    }

    /// Label value for `key`, looked up through LDB.
    pub fn label_of(&self, key: &str) -> Option<&str> {
        self.ldb.row(key).map(|row| row[self.label_index].as_str())
    }

    /// The outcome with the fewer sample count among `sample_keys`. Ties
    /// are resolved by label-outcome insertion (sorted) order — the first
    /// outcome wins a tie.
    pub fn minority_class(&self) -> &str {
        let (a, b) = (&self.label_outcomes[0], &self.label_outcomes[1]);
        if self.count_of(a) <= self.count_of(b) {
            a
        } else {
            b
        }
    }

    pub fn majority_class(&self) -> &str {
        let minority = self.minority_class();
        self.label_outcomes
            .iter()
            .find(|o| o.as_str() != minority)
            .unwrap()
    }

    pub fn minority_count(&self) -> usize {
        self.count_of(self.minority_class())
    }

    pub fn majority_count(&self) -> usize {
        self.count_of(self.majority_class())
    }

    fn count_of(&self, outcome: &str) -> usize {
        self.sample_keys
            .iter()
            .filter(|k| self.label_of(k) == Some(outcome))
            .count()
    }

    /// `true` iff `|maj - min| / ((maj + min) / 2) * 100 < 20`.
    pub fn is_balanced(&self) -> bool {
        let maj = self.majority_count() as f64;
        let min = self.minority_count() as f64;
        if maj + min == 0.0 {
            return true;
        }
        ((maj - min).abs() / ((maj + min) / 2.0)) * 100.0 < 20.0
    }

    /// New package keeping only the named feature columns.
    pub fn feature_subset(&self, names: &[String]) -> EngineResult<DataPackage> {
        let fdb = self.fdb.feature_subset(names)?;
        DataPackage::new(fdb, self.ldb.clone(), self.label_name.clone())
    }

    /// New package restricted to the given sample keys on both sides.
    pub fn sample_subset(&self, keys: &[String]) -> EngineResult<DataPackage> {
        let fdb = self.fdb.sample_subset(keys)?;
        let ldb = self.ldb.sample_subset(keys)?;
        DataPackage::new(fdb, ldb, self.label_name.clone())
    }

    /// A new LDB restricted to `keys`.
    pub fn label_subset(&self, keys: &[String]) -> EngineResult<TabularData> {
        self.ldb.sample_subset(keys)
    }

    /// A new LDB assigning `label` to every key in `synth_keys`, for
    /// appending synthetic oversampled rows to a training label table.
    pub fn synthetic_label_subset(&self, synth_keys: &[String], label: &str) -> EngineResult<TabularData> {
        let header = Header::new(self.ldb.header().names().to_vec())?;
        let rows = synth_keys
            .iter()
            .map(|k| {
                let mut row = vec![String::new(); header.len()];
                row[self.label_index] = label.to_string();
                (k.clone(), row)
            })
            .collect();
        TabularData::new(header, rows)
    }

    /// Read the feature matrix in `sample_keys` order, one row per sample.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        let columns = self.fdb.header().names();
        self.sample_keys
            .iter()
            .map(|k| {
                columns
                    .iter()
                    .map(|c| self.fdb.numeric_cell(k, c).unwrap_or(0.0))
                    .collect()
            })
            .collect()
    }

    /// Per-column z-score using population mean and [`DataPackage::population_spread`]
    /// (no division by N) — a non-standard normalization reproduced faithfully
    /// from the reference implementation.
    pub fn normalize(&self) -> EngineResult<DataPackage> {
        let columns = self.fdb.header().names().to_vec();
        let matrix = self.feature_matrix();
        if matrix.is_empty() {
            return Ok(self.clone());
        }
        let n = matrix.len();
        let mut new_rows: Vec<(String, Vec<String>)> =
            self.sample_keys.iter().map(|k| (k.clone(), vec![String::new(); columns.len()])).collect();

        for (col_idx, _name) in columns.iter().enumerate() {
            let column: Vec<f64> = (0..n).map(|r| matrix[r][col_idx]).collect();
            let mean = column.iter().sum::<f64>() / n as f64;
            let spread = Self::population_spread(&column, mean);
            for (row_idx, value) in column.iter().enumerate() {
                let z = if spread == 0.0 { 0.0 } else { (value - mean) / spread };
                new_rows[row_idx].1[col_idx] = z.to_string();
            }
        }

        let header = Header::new(columns)?;
        let fdb = TabularData::new(header, new_rows)?;
        DataPackage::new(fdb, self.ldb.clone(), self.label_name.clone())
    }

    /// `sqrt(sum((x - mean)^2))` — **no division by N**. The reference
    /// implementation's `standardDeviation` omits this division; every
    /// caller (notably [`DataPackage::normalize`]) depends on the
    /// resulting extra `1/sqrt(N)` scale factor, so it is reproduced here
    /// rather than corrected.
    pub fn population_spread(column: &[f64], mean: f64) -> f64 {
        column.iter().map(|x| (x - mean).powi(2)).sum::<f64>().sqrt()
    }

    /// Faithful reproduction of the reference implementation's distance
    /// defect: the running sum is overwritten with the squared difference
    /// at each coordinate and then doubled, rather than accumulated, so
    /// the result is `sqrt(2 * (a_last - b_last)^2)` — dominated entirely
    /// by the final coordinate. Used by SMOTE/BSMOTE neighbor search,
    /// Tomek-link detection, and isolation-forest-adjacent consumers.
    pub fn distance_buggy(a: &[f64], b: &[f64]) -> f64 {
        let mut sub = 0.0_f64;
        for (x, y) in a.iter().zip(b.iter()) {
            let diff = x - y;
            sub = diff * diff;
            sub += sub;
        }
        sub.sqrt()
    }

    /// Masked variant of [`DataPackage::distance_buggy`]: only coordinates
    /// where `mask[i]` is `true` contribute to the (buggy) loop.
    pub fn distance_buggy_masked(a: &[f64], b: &[f64], mask: &[bool]) -> f64 {
        let mut sub = 0.0_f64;
        for ((x, y), keep) in a.iter().zip(b.iter()).zip(mask.iter()) {
            if !keep {
                continue;
            }
            let diff = x - y;
            sub = diff * diff;
            sub += sub;
        }
        sub.sqrt()
    }
}

fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

fn erase_incomplete_rows(fdb: TabularData) -> TabularData {
    let drop: HashSet<String> = fdb
        .sample_keys()
        .filter(|k| {
            fdb.row(k)
                .map(|row| row.iter().any(|v| is_missing(v)))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    fdb.without_keys(&drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::Header;

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["f1".into(), "f2".into()]).unwrap();
        let fdb = TabularData::new(
            fheader,
            vec![
                ("a/Scan-1".into(), vec!["1.0".into(), "2.0".into()]),
                ("b/Scan-1".into(), vec!["3.0".into(), "4.0".into()]),
                ("c/Scan-1".into(), vec!["NA".into(), "4.0".into()]),
            ],
        )
        .unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(
            lheader,
            vec![
                ("a/Scan-1".into(), vec!["yes".into()]),
                ("b/Scan-1".into(), vec!["no".into()]),
                ("c/Scan-1".into(), vec!["yes".into()]),
            ],
        )
        .unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn erase_incomplete_drops_na_rows() {
        let pkg = fixture();
        assert_eq!(pkg.sample_keys(), &["a/Scan-1".to_string(), "b/Scan-1".to_string()]);
    }

    #[test]
    fn rejects_non_binary_labels() {
        let fheader = Header::new(vec!["f1".into()]).unwrap();
        let fdb = TabularData::new(
            fheader,
            vec![
                ("a".into(), vec!["1.0".into()]),
                ("b".into(), vec!["2.0".into()]),
                ("c".into(), vec!["3.0".into()]),
            ],
        )
        .unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(
            lheader,
            vec![
                ("a".into(), vec!["x".into()]),
                ("b".into(), vec!["y".into()]),
                ("c".into(), vec!["z".into()]),
            ],
        )
        .unwrap();
        let result = DataPackage::new(fdb, ldb, "label");
        assert!(matches!(result, Err(EngineError::DataInvalid(_))));
    }

    #[test]
    fn minority_majority_counts() {
        let pkg = fixture();
        assert_eq!(pkg.minority_count() + pkg.majority_count(), 2);
    }

    #[test]
    fn distance_buggy_is_dominated_by_last_coordinate() {
        let a = [1.0, 1.0, 5.0];
        let b = [0.0, 0.0, 1.0];
        let d = DataPackage::distance_buggy(&a, &b);
        assert_eq!(d, (2.0 * (5.0_f64 - 1.0).powi(2)).sqrt());
    }

    #[test]
    fn population_spread_has_no_division_by_n() {
        let column = [1.0, 2.0, 3.0];
        let mean = 2.0;
        let spread = DataPackage::population_spread(&column, mean);
        assert_eq!(spread, (1.0_f64 + 0.0 + 1.0).sqrt());
    }

    #[test]
    fn normalize_zscores_every_column() {
        let pkg = fixture();
        let normalized = pkg.normalize().unwrap();
        assert_eq!(normalized.sample_keys().len(), pkg.sample_keys().len());
    }
}
