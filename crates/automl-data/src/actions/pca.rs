//! PCA via QR-iteration eigendecomposition of the feature correlation matrix.

use crate::config::PcaConfig;
use crate::error::EngineResult;
use crate::linalg;
use crate::package::DataPackage;
use crate::tabular::{Header, TabularData};
use std::collections::HashMap;

const QR_SWEEPS: usize = 10;

#[derive(Debug, Clone)]
pub struct PcaState {
    pub mean: Vec<f64>,
    pub eigenvectors: Vec<Vec<f64>>,
    pub preservation_percentage: f64,
}

impl PcaState {
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "preservationPercentage".to_string(),
            self.preservation_percentage.to_string(),
        );
        map.insert("componentsKept".to_string(), self.eigenvectors.len().to_string());
        map
    }
}

/// Fit: recenter the feature matrix, build its correlation matrix as a
/// covariance proxy, run 10 sweeps of QR-iteration eigendecomposition,
/// and keep the descending-magnitude prefix whose cumulative relative
/// variance does not exceed `preservationPercentage`.
pub fn build(train_pkg: &DataPackage, config: &PcaConfig) -> EngineResult<PcaState> {
    let matrix = train_pkg.feature_matrix();
    let num_features = train_pkg.fdb().header().len();

    if matrix.is_empty() || num_features == 0 {
        return Ok(PcaState {
            mean: vec![],
            eigenvectors: vec![],
            preservation_percentage: config.preservation_percentage,
        });
    }

    let n = matrix.len() as f64;
    let mean: Vec<f64> = (0..num_features)
        .map(|j| matrix.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();

    let corr = linalg::correlation_matrix(&matrix, num_features);
    let (eigenvalues, eigenvectors) = linalg::qr_algorithm_eigen(&corr, QR_SWEEPS);

    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .abs()
            .partial_cmp(&eigenvalues[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total: f64 = eigenvalues.iter().map(|v| v.abs()).sum();
    let threshold = config.preservation_percentage / 100.0;
    let mut running = 0.0;
    let mut kept = Vec::new();
    if total > 0.0 {
        for &idx in &order {
            let rel = eigenvalues[idx].abs() / total;
            if running + rel <= threshold {
                kept.push(eigenvectors[idx].clone());
                running += rel;
            } else {
                break;
            }
        }
    }

    Ok(PcaState {
        mean,
        eigenvectors: kept,
        preservation_percentage: config.preservation_percentage,
    })
}

/// Project each sample onto the kept eigenvectors, emitting columns named
/// `A::B::Feature{i+1}`. Passes input through unchanged if build kept no
/// vectors.
pub fn run(pkg: &DataPackage, state: &PcaState) -> EngineResult<DataPackage> {
    if state.eigenvectors.is_empty() {
        return Ok(pkg.clone());
    }

    let names: Vec<String> = (0..state.eigenvectors.len())
        .map(|i| format!("A::B::Feature{}", i + 1))
        .collect();
    let header = Header::new(names)?;

    let matrix = pkg.feature_matrix();
    let rows = pkg
        .sample_keys()
        .iter()
        .zip(matrix.iter())
        .map(|(key, features)| {
            let centered: Vec<f64> = features
                .iter()
                .zip(state.mean.iter())
                .map(|(x, m)| x - m)
                .collect();
            let projected: Vec<String> = state
                .eigenvectors
                .iter()
                .map(|vec| {
                    let dot: f64 = centered
                        .iter()
                        .zip(vec.iter())
                        .map(|(a, b)| a * b)
                        .sum();
                    dot.to_string()
                })
                .collect();
            (key.clone(), projected)
        })
        .collect();

    let fdb = TabularData::new(header, rows)?;
    DataPackage::new(fdb, pkg.ldb().clone(), pkg.label_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Header as TabHeader, TabularData};

    fn fixture() -> DataPackage {
        let fheader = TabHeader::new(vec!["f1".into(), "f2".into(), "f3".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for i in 0..20 {
            let key = format!("s{i}");
            let v = i as f64;
            frows.push((key.clone(), vec![v.to_string(), (v * 2.0).to_string(), "1.0".to_string()]));
            lrows.push((key, vec![if i % 2 == 0 { "yes" } else { "no" }.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = TabHeader::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn keeps_at_least_one_component_for_high_preservation() {
        let pkg = fixture();
        let config = PcaConfig {
            preservation_percentage: 99.0,
        };
        let state = build(&pkg, &config).unwrap();
        assert!(!state.eigenvectors.is_empty());
        let transformed = run(&pkg, &state).unwrap();
        assert_eq!(transformed.fdb().header().len(), state.eigenvectors.len());
    }

    #[test]
    fn passthrough_when_no_components_kept() {
        let pkg = fixture();
        let state = PcaState {
            mean: vec![],
            eigenvectors: vec![],
            preservation_percentage: 95.0,
        };
        let transformed = run(&pkg, &state).unwrap();
        assert_eq!(transformed.fdb().header().len(), pkg.fdb().header().len());
    }
}
