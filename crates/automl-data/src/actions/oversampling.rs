//! Minority oversampling: SMOTE, Borderline-SMOTE, and random oversampling.
//!
//! The synthetic-point formula here is the reference implementation's, not
//! textbook SMOTE: a single scalar `r * d(p, neighbor)` (computed from
//! [`DataPackage::distance_buggy`], itself a reproduced defect) is added
//! uniformly to *every* feature coordinate of the seed point, rather than
//! scaling the per-coordinate neighbor difference.

use crate::config::{OversamplingConfig, OversamplingKind};
use crate::error::EngineResult;
use crate::package::DataPackage;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct OsState {
    pub kind: OversamplingKind,
    pub neighbours_number: usize,
    pub m_neighbours_number: usize,
    pub n_neighbours_number: usize,
    pub oversampling_percentage: f64,
    pub auto: bool,
}

impl OsState {
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), format!("{:?}", self.kind));
        map.insert("neighboursNumber".to_string(), self.neighbours_number.to_string());
        map.insert(
            "m_neighboursNumber".to_string(),
            self.m_neighbours_number.to_string(),
        );
        map.insert(
            "n_neighboursNumber".to_string(),
            self.n_neighbours_number.to_string(),
        );
        map.insert(
            "oversamplingPercentage".to_string(),
            self.oversampling_percentage.to_string(),
        );
        map.insert("auto".to_string(), self.auto.to_string());
        map
    }
}

pub fn build(_train_pkg: &DataPackage, config: &OversamplingConfig) -> EngineResult<OsState> {
    Ok(OsState {
        kind: config.kind,
        neighbours_number: config.neighbours_number,
        m_neighbours_number: config.m_neighbours_number,
        n_neighbours_number: config.n_neighbours_number,
        oversampling_percentage: config.oversampling_percentage,
        auto: config.auto,
    })
}

pub fn run(pkg: &DataPackage, state: &OsState, rng: &mut StdRng) -> EngineResult<DataPackage> {
    let minority = pkg.minority_class().to_string();
    let matrix = pkg.feature_matrix();
    let keys: Vec<String> = pkg.sample_keys().to_vec();

    let minority_indices: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| pkg.label_of(k) == Some(minority.as_str()))
        .map(|(i, _)| i)
        .collect();

    if minority_indices.is_empty() {
        return Ok(pkg.clone());
    }

    let target = if state.auto {
        pkg.majority_count().saturating_sub(pkg.minority_count())
    } else {
        ((state.oversampling_percentage / 100.0).floor() as usize) * minority_indices.len()
    };

    if target == 0 {
        return Ok(pkg.clone());
    }

    let synthetic_rows: Vec<Vec<f64>> = match state.kind {
        OversamplingKind::RandomOversampling => (0..target)
            .map(|_| {
                let idx = minority_indices[rng.gen_range(0..minority_indices.len())];
                matrix[idx].clone()
            })
            .collect(),
        OversamplingKind::Smote | OversamplingKind::BSmote => {
            let seeds: Vec<usize> = if matches!(state.kind, OversamplingKind::BSmote) {
                let danger = danger_points(&matrix, &keys, pkg, &minority_indices, state.m_neighbours_number);
                if danger.is_empty() {
                    minority_indices.clone()
                } else {
                    danger
                }
            } else {
                minority_indices.clone()
            };

            (0..target)
                .map(|_| {
                    let seed_idx = seeds[rng.gen_range(0..seeds.len())];
                    let p = &matrix[seed_idx];
                    let neighbors = k_nearest(&matrix, seed_idx, &minority_indices, state.neighbours_number);
                    let neighbor_idx = if neighbors.is_empty() {
                        seed_idx
                    } else {
                        neighbors[rng.gen_range(0..neighbors.len())]
                    };
                    let n = &matrix[neighbor_idx];
                    let d = DataPackage::distance_buggy(p, n);
                    let r: f64 = rng.gen_range(0.0..1.0);
                    let delta = r * d;
                    p.iter().map(|x| x + delta).collect()
                })
                .collect()
        }
    };

    let mut fdb = pkg.fdb().clone();
    let mut ldb = pkg.ldb().clone();

    for (i, row) in synthetic_rows.into_iter().enumerate() {
        let key = format!("Synthetic sample {}", rng.r#gen::<u32>() as usize + i);
        let string_row: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        fdb = fdb.with_row(key.clone(), string_row)?;
        let mut label_row = vec![String::new(); pkg.ldb().header().len()];
        label_row[pkg.label_index()] = minority.clone();
        ldb = ldb.with_row(key, label_row)?;
    }

    DataPackage::new(fdb, ldb, pkg.label_name().to_string())
}

fn k_nearest(matrix: &[Vec<f64>], seed: usize, pool: &[usize], k: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f64)> = pool
        .iter()
        .filter(|&&i| i != seed)
        .map(|&i| (i, DataPackage::distance_buggy(&matrix[seed], &matrix[i])))
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    distances.into_iter().take(k).map(|(i, _)| i).collect()
}

/// Borderline points: minority points whose `k2` nearest all-class
/// neighbors include at least `k2/2` but fewer than `k2` majority samples.
fn danger_points(
    matrix: &[Vec<f64>],
    keys: &[String],
    pkg: &DataPackage,
    minority_indices: &[usize],
    k2: usize,
) -> Vec<usize> {
    let all_indices: Vec<usize> = (0..matrix.len()).collect();
    minority_indices
        .iter()
        .copied()
        .filter(|&seed| {
            let neighbors = k_nearest(matrix, seed, &all_indices, k2);
            let majority_count = neighbors
                .iter()
                .filter(|&&i| pkg.label_of(&keys[i]) != pkg.label_of(&keys[seed]))
                .count();
            majority_count >= k2 / 2 && majority_count < k2
        })
        .collect()
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
        for i in 0..20 {
            let key = format!("s{i}");
            let label = if i < 5 { "yes" } else { "no" };
            frows.push((key.clone(), vec![(i as f64).to_string()]));
            lrows.push((key, vec![label.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn auto_oversampling_balances_classes() {
        let pkg = fixture();
        let state = OsState {
            kind: OversamplingKind::Smote,
            neighbours_number: 3,
            m_neighbours_number: 5,
            n_neighbours_number: 5,
            oversampling_percentage: 100.0,
            auto: true,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let result = run(&pkg, &state, &mut rng).unwrap();
        assert!(result.minority_count() >= pkg.minority_count());
        assert_eq!(result.sample_keys().len(), pkg.sample_keys().len() + (pkg.majority_count() - pkg.minority_count()));
    }

    #[test]
    fn random_oversampling_duplicates_existing_values() {
        let pkg = fixture();
        let state = OsState {
            kind: OversamplingKind::RandomOversampling,
            neighbours_number: 3,
            m_neighbours_number: 5,
            n_neighbours_number: 5,
            oversampling_percentage: 100.0,
            auto: true,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let result = run(&pkg, &state, &mut rng).unwrap();
        assert!(result.sample_keys().len() > pkg.sample_keys().len());
    }
}
