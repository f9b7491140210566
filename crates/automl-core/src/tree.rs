//! CART-style binary decision tree (C4, tree half).
//!
//! Trees are grown recursively with `Box`-linked nodes — unlike the
//! pipeline tree (C7), there is no cross-referencing between nodes here,
//! so an arena buys nothing.

use automl_data::config::{OptimizerConfig, QualityMetric, SplitFeatureSelection};
use automl_data::DataPackage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// Per-sample weight map, keyed by sample key. Used for bagging and for
/// AdaBoost-style reweighting between forest iterations.
pub type WeightMap = HashMap<String, f64>;

#[derive(Debug, Clone)]
pub enum DecisionTreeNode {
    Leaf {
        label: String,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<DecisionTreeNode>,
        right: Box<DecisionTreeNode>,
    },
}

impl DecisionTreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, DecisionTreeNode::Leaf { .. })
    }

    /// Predict a label for one sample's feature row.
    pub fn predict(&self, features: &[f64]) -> &str {
        match self {
            DecisionTreeNode::Leaf { label } => label,
            DecisionTreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if features[*feature] < *threshold {
                    left.predict(features)
                } else {
                    right.predict(features)
                }
            }
        }
    }
}

/// A fitted decision tree plus the attribute window it was trained with.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub root: DecisionTreeNode,
}

impl DecisionTree {
    pub fn predict(&self, features: &[f64]) -> &str {
        self.root.predict(features)
    }
}

struct TrainingContext<'a> {
    pkg: &'a DataPackage,
    matrix: &'a [Vec<f64>],
    keys: &'a [String],
    config: &'a OptimizerConfig,
}

/// Build a tree from `sample_indices` (indices into `pkg`'s sample-key
/// order), starting with the full attribute window and the given
/// per-sample weights.
pub fn build(
    pkg: &DataPackage,
    matrix: &[Vec<f64>],
    keys: &[String],
    sample_indices: &[usize],
    weights: &WeightMap,
    config: &OptimizerConfig,
    rng: &mut StdRng,
) -> DecisionTree {
    let num_features = pkg.fdb().header().len();
    let window: Vec<usize> = (0..num_features).collect();
    let ctx = TrainingContext {
        pkg,
        matrix,
        keys,
        config,
    };
    let root = build_node(&ctx, sample_indices, &window, weights, 0, rng);
    DecisionTree { root }
}

fn weighted_label_totals(ctx: &TrainingContext, indices: &[usize], weights: &WeightMap) -> HashMap<String, f64> {
    let mut totals = HashMap::new();
    for &i in indices {
        let label = ctx.pkg.label_of(&ctx.keys[i]).unwrap_or("").to_string();
        let w = weights.get(&ctx.keys[i]).copied().unwrap_or(1.0);
        *totals.entry(label).or_insert(0.0) += w;
    }
    totals
}

fn majority_label(totals: &HashMap<String, f64>) -> String {
    totals
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(label, _)| label.clone())
        .unwrap_or_default()
}

fn build_node(
    ctx: &TrainingContext,
    indices: &[usize],
    window: &[usize],
    weights: &WeightMap,
    depth: usize,
    rng: &mut StdRng,
) -> DecisionTreeNode {
    let totals = weighted_label_totals(ctx, indices, weights);
    let total_weight: f64 = totals.values().sum();
    let pure = totals.values().any(|&w| (w - total_weight).abs() < 1e-9);

    if total_weight < 2.0 * ctx.config.min_samples_at_leaf as f64
        || pure
        || depth >= ctx.config.max_depth
        || window.is_empty()
    {
        return DecisionTreeNode::Leaf {
            label: majority_label(&totals),
        };
    }

    let candidate = match ctx.config.feature_selection {
        SplitFeatureSelection::Random => pick_random_features(ctx, window, rng),
        SplitFeatureSelection::Kde => pick_kde_feature(ctx, indices, window, rng),
    };

    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, gain)
    for &feature in &candidate {
        if let Some((threshold, gain)) = best_split(ctx, indices, feature, &totals, total_weight, weights) {
            let better = match best {
                None => true,
                Some((best_feature, _, best_gain)) => {
                    gain > best_gain || (gain == best_gain && feature < best_feature)
                }
            };
            if better {
                best = Some((feature, threshold, gain));
            }
        }
    }

    match best {
        Some((feature, threshold, gain)) if gain > 0.0 => {
            let left: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| ctx.matrix[i][feature] < threshold)
                .collect();
            let right: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| ctx.matrix[i][feature] >= threshold)
                .collect();
            if left.is_empty() || right.is_empty() {
                return DecisionTreeNode::Leaf {
                    label: majority_label(&totals),
                };
            }
            DecisionTreeNode::Split {
                feature,
                threshold,
                left: Box::new(build_node(ctx, &left, window, weights, depth + 1, rng)),
                right: Box::new(build_node(ctx, &right, window, weights, depth + 1, rng)),
            }
        }
        _ => DecisionTreeNode::Leaf {
            label: majority_label(&totals),
        },
    }
}

fn default_random_feature_count(num_features: usize) -> usize {
    (num_features as f64).log2().ceil() as usize + 1
}

fn pick_random_features(ctx: &TrainingContext, window: &[usize], rng: &mut StdRng) -> Vec<usize> {
    let k = ctx
        .config
        .random_features
        .unwrap_or_else(|| default_random_feature_count(window.len()))
        .min(window.len());
    let mut pool = window.to_vec();
    pool.shuffle(rng);
    pool.into_iter().take(k.max(1)).collect()
}

/// Kernel-density-style feature selection: among a random subset of size
/// `KDEAttributesPerSplit`, pick the single feature with the lowest
/// histogram overlap between label groups (a coarse but cheap proxy for
/// kernel-density overlap).
fn pick_kde_feature(ctx: &TrainingContext, indices: &[usize], window: &[usize], rng: &mut StdRng) -> Vec<usize> {
    let k = ctx.config.kde_attributes_per_split.min(window.len()).max(1);
    let mut pool = window.to_vec();
    pool.shuffle(rng);
    let subset: Vec<usize> = pool.into_iter().take(k).collect();

    let best = subset
        .iter()
        .copied()
        .min_by(|&a, &b| {
            histogram_overlap(ctx, indices, a)
                .partial_cmp(&histogram_overlap(ctx, indices, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(subset[0]);
    vec![best]
}

fn histogram_overlap(ctx: &TrainingContext, indices: &[usize], feature: usize) -> f64 {
    const BINS: usize = 10;
    let values: Vec<f64> = indices.iter().map(|&i| ctx.matrix[i][feature]).collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    if (max - min).abs() < 1e-12 {
        return 1.0;
    }
    let outcomes = ctx.pkg.label_outcomes();
    let mut hist = [[0usize; BINS]; 2];
    for &i in indices {
        let v = ctx.matrix[i][feature];
        let bin = (((v - min) / (max - min)) * (BINS as f64 - 1.0)).floor() as usize;
        let label = ctx.pkg.label_of(&ctx.keys[i]).unwrap_or("");
        let class = if label == outcomes[0] { 0 } else { 1 };
        hist[class][bin.min(BINS - 1)] += 1;
    }
    let total0: usize = hist[0].iter().sum();
    let total1: usize = hist[1].iter().sum();
    if total0 == 0 || total1 == 0 {
        return 1.0;
    }
    (0..BINS)
        .map(|b| {
            let p0 = hist[0][b] as f64 / total0 as f64;
            let p1 = hist[1][b] as f64 / total1 as f64;
            p0.min(p1)
        })
        .sum()
}

/// Best binary split for `feature` over `indices`: sort by attribute
/// value, sweep midpoints between adjacent distinct values, evaluate
/// information gain or Gini reduction per the configured quality metric.
fn best_split(
    ctx: &TrainingContext,
    indices: &[usize],
    feature: usize,
    parent_totals: &HashMap<String, f64>,
    parent_weight: f64,
    weights: &WeightMap,
) -> Option<(f64, f64)> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        ctx.matrix[a][feature]
            .partial_cmp(&ctx.matrix[b][feature])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let parent_impurity = impurity(ctx.config.quality_metric, parent_totals, parent_weight);

    let mut left_totals: HashMap<String, f64> = HashMap::new();
    let mut left_weight = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for window in sorted.windows(2) {
        let (a, b) = (window[0], window[1]);
        let label_a = ctx.pkg.label_of(&ctx.keys[a]).unwrap_or("").to_string();
        let w_a = weights.get(&ctx.keys[a]).copied().unwrap_or(1.0);
        *left_totals.entry(label_a).or_insert(0.0) += w_a;
        left_weight += w_a;

        let va = ctx.matrix[a][feature];
        let vb = ctx.matrix[b][feature];
        if (va - vb).abs() < 1e-12 {
            continue;
        }
        let threshold = (va + vb) / 2.0;

        let mut right_totals = parent_totals.clone();
        for (label, w) in &left_totals {
            *right_totals.entry(label.clone()).or_insert(0.0) -= w;
        }
        let right_weight = parent_weight - left_weight;
        if left_weight <= 0.0 || right_weight <= 0.0 {
            continue;
        }

        let left_impurity = impurity(ctx.config.quality_metric, &left_totals, left_weight);
        let right_impurity = impurity(ctx.config.quality_metric, &right_totals, right_weight);
        let weighted = (left_weight / parent_weight) * left_impurity + (right_weight / parent_weight) * right_impurity;
        let gain = parent_impurity - weighted;

        if best.map(|(_, g)| gain > g).unwrap_or(true) {
            best = Some((threshold, gain));
        }
    }

    best
}

fn impurity(metric: QualityMetric, totals: &HashMap<String, f64>, total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    match metric {
        QualityMetric::InformationGain => -totals
            .values()
            .map(|&w| {
                let p = w / total_weight;
                if p > 0.0 {
                    p * p.log2()
                } else {
                    0.0
                }
            })
            .sum::<f64>(),
        QualityMetric::GiniReduction => {
            1.0 - totals
                .values()
                .map(|&w| {
                    let p = w / total_weight;
                    p * p
                })
                .sum::<f64>()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automl_data::tabular::{Header, TabularData};
    use rand::SeedableRng;

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["f1".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for i in 0..20 {
            let key = format!("s{i}");
            let label = if i < 10 { "low" } else { "high" };
            frows.push((key.clone(), vec![(i as f64).to_string()]));
            lrows.push((key, vec![label.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn separable_data_trains_perfectly() {
        let pkg = fixture();
        let matrix = pkg.feature_matrix();
        let keys: Vec<String> = pkg.sample_keys().to_vec();
        let indices: Vec<usize> = (0..matrix.len()).collect();
        let weights: WeightMap = keys.iter().map(|k| (k.clone(), 1.0)).collect();
        let config = OptimizerConfig {
            random_features: Some(1),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = build(&pkg, &matrix, &keys, &indices, &weights, &config, &mut rng);

        let mut correct = 0;
        for (i, key) in keys.iter().enumerate() {
            let predicted = tree.predict(&matrix[i]);
            if predicted == pkg.label_of(key).unwrap() {
                correct += 1;
            }
        }
        assert!(correct >= 18);
    }

    #[test]
    fn max_depth_zero_produces_single_leaf() {
        let pkg = fixture();
        let matrix = pkg.feature_matrix();
        let keys: Vec<String> = pkg.sample_keys().to_vec();
        let indices: Vec<usize> = (0..matrix.len()).collect();
        let weights: WeightMap = keys.iter().map(|k| (k.clone(), 1.0)).collect();
        let config = OptimizerConfig {
            max_depth: 0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let tree = build(&pkg, &matrix, &keys, &indices, &weights, &config, &mut rng);
        assert!(tree.root.is_leaf());
    }
}
