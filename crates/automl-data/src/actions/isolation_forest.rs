//! Isolation-forest outlier removal.

use crate::config::IsolationForestConfig;
use crate::error::EngineResult;
use crate::package::DataPackage;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

const OUTLIER_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf,
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone)]
pub struct IfState {
    pub tree_count: usize,
    trees: Vec<TreeNode>,
    training_size: usize,
}

impl IfState {
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("treeCount".to_string(), self.tree_count.to_string());
        map
    }
}

/// Fit `treeCount` isolation trees: each recursively splits on one random
/// feature with a uniform-random threshold in `[min,max]` until every
/// remaining subset is a singleton.
pub fn build(train_pkg: &DataPackage, config: &IsolationForestConfig, rng: &mut StdRng) -> EngineResult<IfState> {
    let matrix = train_pkg.feature_matrix();
    let num_features = train_pkg.fdb().header().len();
    if matrix.is_empty() || num_features == 0 {
        return Ok(IfState {
            tree_count: config.tree_count,
            trees: vec![],
            training_size: matrix.len(),
        });
    }

    let indices: Vec<usize> = (0..matrix.len()).collect();
    let trees = (0..config.tree_count)
        .map(|_| build_tree(&matrix, &indices, num_features, rng, 0))
        .collect();

    Ok(IfState {
        tree_count: config.tree_count,
        trees,
        training_size: matrix.len(),
    })
}

fn build_tree(matrix: &[Vec<f64>], indices: &[usize], num_features: usize, rng: &mut StdRng, depth: usize) -> TreeNode {
    if indices.len() <= 1 || depth > 64 {
        return TreeNode::Leaf;
    }
    let feature = rng.gen_range(0..num_features);
    let values: Vec<f64> = indices.iter().map(|&i| matrix[i][feature]).collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    if (max - min).abs() < 1e-12 {
        return TreeNode::Leaf;
    }
    let threshold = rng.gen_range(min..max);
    let left_indices: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| matrix[i][feature] < threshold)
        .collect();
    let right_indices: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| matrix[i][feature] >= threshold)
        .collect();
    if left_indices.is_empty() || right_indices.is_empty() {
        return TreeNode::Leaf;
    }
    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(matrix, &left_indices, num_features, rng, depth + 1)),
        right: Box::new(build_tree(matrix, &right_indices, num_features, rng, depth + 1)),
    }
}

fn path_length(node: &TreeNode, sample: &[f64]) -> usize {
    match node {
        TreeNode::Leaf => 0,
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            1 + if sample[*feature] < *threshold {
                path_length(left, sample)
            } else {
                path_length(right, sample)
            }
        }
    }
}

fn harmonic(n: usize) -> f64 {
    (1..=n).map(|i| 1.0 / i as f64).sum()
}

/// The normalization constant for an isolation forest built on `n` samples.
fn path_length_normalization(n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    2.0 * harmonic(n - 1) - 2.0 * (n - 1) as f64 / n as f64
}

/// Score every sample in `pkg` and drop those whose anomaly score is at
/// least [`OUTLIER_THRESHOLD`]. Passes input through unchanged if no trees
/// were fitted.
pub fn run(pkg: &DataPackage, state: &IfState) -> EngineResult<DataPackage> {
    if state.trees.is_empty() {
        return Ok(pkg.clone());
    }
    let c = path_length_normalization(state.training_size);
    if c <= 0.0 {
        return Ok(pkg.clone());
    }

    let matrix = pkg.feature_matrix();
    let keys: Vec<String> = pkg.sample_keys().to_vec();

    let outliers: std::collections::HashSet<String> = keys
        .iter()
        .zip(matrix.iter())
        .filter(|(_, sample)| {
            let avg_path: f64 = state
                .trees
                .iter()
                .map(|tree| path_length(tree, sample) as f64)
                .sum::<f64>()
                / state.trees.len() as f64;
            let score = 2f64.powf(-avg_path / c);
            score >= OUTLIER_THRESHOLD
        })
        .map(|(k, _)| k.clone())
        .collect();

    if outliers.is_empty() {
        return Ok(pkg.clone());
    }

    let remaining: Vec<String> = keys.into_iter().filter(|k| !outliers.contains(k)).collect();
    pkg.sample_subset(&remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Header, TabularData};
    use rand::SeedableRng;

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["f1".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for i in 0..30 {
            let key = format!("s{i}");
            let value = if i == 0 { 1000.0 } else { i as f64 };
            frows.push((key.clone(), vec![value.to_string()]));
            lrows.push((key, vec![if i % 2 == 0 { "yes" } else { "no" }.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn builds_requested_tree_count() {
        let pkg = fixture();
        let config = IsolationForestConfig { tree_count: 10 };
        let mut rng = StdRng::seed_from_u64(5);
        let state = build(&pkg, &config, &mut rng).unwrap();
        assert_eq!(state.trees.len(), 10);
    }

    #[test]
    fn run_never_increases_sample_count() {
        let pkg = fixture();
        let config = IsolationForestConfig { tree_count: 20 };
        let mut rng = StdRng::seed_from_u64(6);
        let state = build(&pkg, &config, &mut rng).unwrap();
        let result = run(&pkg, &state).unwrap();
        assert!(result.sample_keys().len() <= pkg.sample_keys().len());
    }
}
