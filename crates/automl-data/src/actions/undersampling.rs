//! Majority undersampling: random drop, or Tomek-link removal.

use crate::config::{UndersamplingConfig, UndersamplingKind};
use crate::error::EngineResult;
use crate::package::DataPackage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct UsState {
    pub kind: UndersamplingKind,
}

impl UsState {
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), format!("{:?}", self.kind));
        map
    }
}

pub fn build(_train_pkg: &DataPackage, config: &UndersamplingConfig) -> EngineResult<UsState> {
    Ok(UsState { kind: config.kind })
}

pub fn run(pkg: &DataPackage, state: &UsState, rng: &mut StdRng) -> EngineResult<DataPackage> {
    let majority = pkg.majority_class().to_string();
    let drop: HashSet<String> = match state.kind {
        UndersamplingKind::RandomUndersampling => {
            let deficit = pkg.majority_count().saturating_sub(pkg.minority_count());
            let mut majority_keys: Vec<String> = pkg
                .sample_keys()
                .iter()
                .filter(|k| pkg.label_of(k) == Some(majority.as_str()))
                .cloned()
                .collect();
            majority_keys.shuffle(rng);
            majority_keys.into_iter().take(deficit).collect()
        }
        UndersamplingKind::TomekLink => tomek_links(pkg, &majority),
    };

    if drop.is_empty() {
        return Ok(pkg.clone());
    }

    let remaining: Vec<String> = pkg
        .sample_keys()
        .iter()
        .filter(|k| !drop.contains(*k))
        .cloned()
        .collect();
    pkg.sample_subset(&remaining)
}

/// A pair `(a in minority, b in majority)` is a Tomek link iff no other
/// sample `c` is strictly closer to both `a` and `b` than they are to each
/// other. For every link found, the majority member is marked for removal.
fn tomek_links(pkg: &DataPackage, majority: &str) -> HashSet<String> {
    let keys: Vec<String> = pkg.sample_keys().to_vec();
    let matrix = pkg.feature_matrix();
    let minority = pkg.minority_class();

    let minority_idx: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| pkg.label_of(k) == Some(minority))
        .map(|(i, _)| i)
        .collect();
    let majority_idx: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| pkg.label_of(k) == Some(majority))
        .map(|(i, _)| i)
        .collect();

    let mut drop = HashSet::new();
    for &a in &minority_idx {
        for &b in &majority_idx {
            let d_ab = DataPackage::distance_buggy(&matrix[a], &matrix[b]);
            let is_link = (0..matrix.len()).filter(|&c| c != a && c != b).all(|c| {
                let d_ac = DataPackage::distance_buggy(&matrix[a], &matrix[c]);
                let d_bc = DataPackage::distance_buggy(&matrix[b], &matrix[c]);
                !(d_ac < d_ab && d_bc < d_ab)
            });
            if is_link {
                drop.insert(keys[b].clone());
            }
        }
    }
    drop
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
    fn random_undersampling_balances_classes() {
        let pkg = fixture();
        let state = UsState {
            kind: UndersamplingKind::RandomUndersampling,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let result = run(&pkg, &state, &mut rng).unwrap();
        assert_eq!(result.majority_count(), pkg.minority_count());
    }

    #[test]
    fn tomek_link_never_drops_minority_samples() {
        let pkg = fixture();
        let state = UsState {
            kind: UndersamplingKind::TomekLink,
        };
        let mut rng = StdRng::seed_from_u64(4);
        let result = run(&pkg, &state, &mut rng).unwrap();
        assert_eq!(result.minority_count(), pkg.minority_count());
    }
}
