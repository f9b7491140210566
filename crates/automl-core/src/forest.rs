//! Random forest: bagging, optional AdaBoost reweighting, optional OOB
//! tree selection, plurality-vote ensemble prediction (C4, forest half).

use crate::tree::{self, DecisionTree, WeightMap};
use automl_data::config::{BaggingMethod, OptimizerConfig, TreeSelection};
use automl_data::DataPackage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// An ordered sequence of decision trees plus the bag (as training-row
/// indices) each was built from.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
    pub bags: Vec<Vec<usize>>,
}

impl RandomForest {
    /// Plurality vote of per-tree predictions (not weighted by boosting's
    /// `alpha`, per the reference implementation).
    pub fn predict(&self, features: &[f64]) -> String {
        let mut votes: HashMap<&str, usize> = HashMap::new();
        for tree in &self.trees {
            *votes.entry(tree.predict(features)).or_insert(0) += 1;
        }
        votes
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(label, _)| label.to_string())
            .unwrap_or_default()
    }
}

pub fn build(pkg: &DataPackage, config: &OptimizerConfig, rng: &mut StdRng) -> RandomForest {
    let matrix = pkg.feature_matrix();
    let keys: Vec<String> = pkg.sample_keys().to_vec();
    let n = matrix.len();

    let mut weights: WeightMap = if config.boosting {
        keys.iter().map(|k| (k.clone(), 1.0 / n.max(1) as f64)).collect()
    } else {
        keys.iter().map(|k| (k.clone(), 1.0)).collect()
    };

    let mut trees = Vec::with_capacity(config.number_of_trees);
    let mut bags = Vec::with_capacity(config.number_of_trees);

    for _ in 0..config.number_of_trees {
        let bag = draw_bag(pkg, &keys, config, rng);
        let tree = tree::build(pkg, &matrix, &keys, &bag, &weights, config, rng);

        if config.boosting {
            reweight_adaboost(&tree, &matrix, &keys, pkg, &mut weights);
        }

        trees.push(tree);
        bags.push(bag);
    }

    select_trees(RandomForest { trees, bags }, &matrix, &keys, pkg, config)
}

fn draw_bag(pkg: &DataPackage, keys: &[String], config: &OptimizerConfig, rng: &mut StdRng) -> Vec<usize> {
    let n = keys.len();
    let target = ((config.bag_fraction * n as f64).round() as usize).max(1);

    match config.bagging_method {
        BaggingMethod::Normal => (0..target).map(|_| rng.gen_range(0..n)).collect(),
        BaggingMethod::Equalized => {
            let outcomes = pkg.label_outcomes();
            let mut by_class: Vec<Vec<usize>> = outcomes.iter().map(|_| Vec::new()).collect();
            for (i, key) in keys.iter().enumerate() {
                let label = pkg.label_of(key).unwrap_or("");
                if let Some(class) = outcomes.iter().position(|o| o == label) {
                    by_class[class].push(i);
                }
            }
            let per_class = ((target as f64) / outcomes.len().max(1) as f64).ceil() as usize;
            let mut bag = Vec::new();
            for class_indices in &by_class {
                if class_indices.is_empty() {
                    continue;
                }
                for _ in 0..per_class {
                    bag.push(class_indices[rng.gen_range(0..class_indices.len())]);
                }
            }
            bag
        }
        BaggingMethod::Walker => walker_alias_sample(pkg, keys, target, rng),
    }
}

/// Walker's alias-method sampling over per-class weights (classes weighted
/// inversely to their frequency so each draw favors balance), then a
/// uniform pick within the chosen class.
fn walker_alias_sample(pkg: &DataPackage, keys: &[String], target: usize, rng: &mut StdRng) -> Vec<usize> {
    let outcomes = pkg.label_outcomes();
    let mut by_class: Vec<Vec<usize>> = outcomes.iter().map(|_| Vec::new()).collect();
    for (i, key) in keys.iter().enumerate() {
        let label = pkg.label_of(key).unwrap_or("");
        if let Some(class) = outcomes.iter().position(|o| o == label) {
            by_class[class].push(i);
        }
    }

    let weights: Vec<f64> = by_class
        .iter()
        .map(|c| if c.is_empty() { 0.0 } else { 1.0 / c.len() as f64 })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return (0..target).map(|_| rng.gen_range(0..keys.len())).collect();
    }

    (0..target)
        .map(|_| {
            let mut r = rng.gen_range(0.0..total);
            let mut class = 0;
            for (i, w) in weights.iter().enumerate() {
                if r < *w {
                    class = i;
                    break;
                }
                r -= w;
            }
            let pool = &by_class[class];
            if pool.is_empty() {
                rng.gen_range(0..keys.len())
            } else {
                pool[rng.gen_range(0..pool.len())]
            }
        })
        .collect()
}

fn reweight_adaboost(
    tree: &DecisionTree,
    matrix: &[Vec<f64>],
    keys: &[String],
    pkg: &DataPackage,
    weights: &mut WeightMap,
) {
    let total_weight: f64 = weights.values().sum();
    let error: f64 = keys
        .iter()
        .enumerate()
        .filter(|(i, key)| tree.predict(&matrix[*i]) != pkg.label_of(key).unwrap_or(""))
        .map(|(_, key)| weights[key])
        .sum::<f64>()
        / total_weight.max(1e-12);

    let error = error.clamp(1e-6, 1.0 - 1e-6);
    let alpha = 0.5 * ((1.0 - error) / error).ln();

    for (i, key) in keys.iter().enumerate() {
        let correct = tree.predict(&matrix[i]) == pkg.label_of(key).unwrap_or("");
        let w = weights.get_mut(key).unwrap();
        *w *= if correct { (-alpha).exp() } else { alpha.exp() };
    }
    let new_total: f64 = weights.values().sum();
    if new_total > 0.0 {
        for w in weights.values_mut() {
            *w /= new_total;
        }
    }
}

fn select_trees(
    forest: RandomForest,
    matrix: &[Vec<f64>],
    keys: &[String],
    pkg: &DataPackage,
    config: &OptimizerConfig,
) -> RandomForest {
    match config.tree_selection {
        TreeSelection::None => forest,
        TreeSelection::Oob | TreeSelection::Kde => {
            let mut scored: Vec<(usize, f64)> = forest
                .trees
                .iter()
                .enumerate()
                .map(|(i, tree)| {
                    let bag: std::collections::HashSet<usize> = forest.bags[i].iter().copied().collect();
                    let oob: Vec<usize> = (0..keys.len()).filter(|idx| !bag.contains(idx)).collect();
                    if oob.is_empty() {
                        return (i, 0.0);
                    }
                    let correct = oob
                        .iter()
                        .filter(|&&idx| tree.predict(&matrix[idx]) == pkg.label_of(&keys[idx]).unwrap_or(""))
                        .count();
                    (i, correct as f64 / oob.len() as f64)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let keep: Vec<usize> = scored
                .into_iter()
                .take(config.number_selected_trees.min(forest.trees.len()))
                .map(|(i, _)| i)
                .collect();
            let mut keep_set = keep;
            keep_set.sort_unstable();
            let trees = keep_set.iter().map(|&i| forest.trees[i].clone()).collect();
            let bags = keep_set.iter().map(|&i| forest.bags[i].clone()).collect();
            RandomForest { trees, bags }
        }
    }
}
