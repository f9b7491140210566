//! Feature selection by per-feature R² against the numeric-encoded label.

use crate::config::{FeatureSelectionConfig, RankMethod};
use crate::error::EngineResult;
use crate::package::DataPackage;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FsState {
    pub selected_columns: Vec<String>,
    pub rank_method: RankMethod,
    pub feature_count: usize,
}

impl FsState {
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("featureCount".to_string(), self.feature_count.to_string());
        map.insert("rankMethod".to_string(), "RSquared".to_string());
        map.insert("selected".to_string(), self.selected_columns.join(","));
        map
    }
}

/// Fit: rank every feature column by its R² against the numeric-encoded
/// label (label outcomes enumerated in their sorted order, 0 and 1), keep
/// the top `min(k, columnCount)`.
pub fn build(train_pkg: &DataPackage, config: &FeatureSelectionConfig) -> EngineResult<FsState> {
    let columns = train_pkg.fdb().header().names().to_vec();
    let matrix = train_pkg.feature_matrix();
    let outcomes = train_pkg.label_outcomes();

    let labels: Vec<f64> = train_pkg
        .sample_keys()
        .iter()
        .map(|k| {
            let label = train_pkg.label_of(k).unwrap_or("");
            if label == outcomes[0] {
                0.0
            } else {
                1.0
            }
        })
        .collect();

    let mut scored: Vec<(String, f64)> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column: Vec<f64> = matrix.iter().map(|row| row[i]).collect();
            (name.clone(), r_squared(&column, &labels))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let keep = config.feature_count.min(columns.len());
    let selected_columns = scored.into_iter().take(keep).map(|(name, _)| name).collect();

    Ok(FsState {
        selected_columns,
        rank_method: config.rank_method,
        feature_count: config.feature_count,
    })
}

/// Keep only the fitted columns; pass through unchanged if fitting
/// selected nothing (an invalid or empty training set).
pub fn run(pkg: &DataPackage, state: &FsState) -> EngineResult<DataPackage> {
    if state.selected_columns.is_empty() {
        return Ok(pkg.clone());
    }
    pkg.feature_subset(&state.selected_columns)
}

fn r_squared(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        cov += (xi - mean_x) * (yi - mean_y);
        var_x += (xi - mean_x).powi(2);
        var_y += (yi - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r * r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Header, TabularData};

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["strong".into(), "noise".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for i in 0..20 {
            let key = format!("s{i}");
            let label = if i % 2 == 0 { "yes" } else { "no" };
            frows.push((
                key.clone(),
                vec![format!("{}", i as f64), "1.0".to_string()],
            ));
            lrows.push((key, vec![label.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn keeps_top_k_by_r_squared() {
        let pkg = fixture();
        let config = FeatureSelectionConfig {
            feature_count: 1,
            rank_method: RankMethod::RSquared,
        };
        let state = build(&pkg, &config).unwrap();
        assert_eq!(state.selected_columns.len(), 1);
        let transformed = run(&pkg, &state).unwrap();
        assert_eq!(transformed.fdb().header().len(), 1);
    }

    #[test]
    fn feature_count_clamped_to_column_count() {
        let pkg = fixture();
        let config = FeatureSelectionConfig {
            feature_count: 100,
            rank_method: RankMethod::RSquared,
        };
        let state = build(&pkg, &config).unwrap();
        assert_eq!(state.selected_columns.len(), 2);
    }
}
