//! Stratified Monte-Carlo fold generator, patient granularity.
//!
//! A *patient* is the prefix of a sample key before its first `"/Scan-"`.
//! Keys sharing a patient are always placed on the same side of a fold so
//! that multiple scans of one subject never leak across train/validation.

use crate::error::{EngineError, EngineResult};
use crate::package::DataPackage;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// One stratified train/validation split.
#[derive(Debug, Clone)]
pub struct Fold {
    pub train: DataPackage,
    pub validation: DataPackage,
}

/// Split a sample key into its patient prefix, on `"/Scan-"`.
pub fn patient_of(sample_key: &str) -> &str {
    sample_key.split("/Scan-").next().unwrap_or(sample_key)
}

/// Generate up to `fold_count` stratified folds from `pkg`.
///
/// The requested validation size is not used directly: per the reference
/// algorithm, `V_minor = max(1, ceil(0.2 * |minority_patients|))` and the
/// effective validation size is `V = 2 * V_minor`, overriding whatever the
/// caller asked for. Generation stops after `fold_count` unique folds are
/// accepted or after `2 * fold_count` attempts produce no new fold,
/// whichever comes first.
pub fn generate_folds(
    pkg: &DataPackage,
    fold_count: usize,
    rng: &mut impl Rng,
) -> EngineResult<Vec<Fold>> {
    let minority = pkg.minority_class().to_string();
    let majority = pkg.majority_class().to_string();

    let mut patient_keys: HashMap<&str, Vec<&String>> = HashMap::new();
    let mut patient_label: HashMap<&str, &str> = HashMap::new();
    for key in pkg.sample_keys() {
        let patient = patient_of(key);
        patient_keys.entry(patient).or_default().push(key);
        patient_label
            .entry(patient)
            .or_insert_with(|| pkg.label_of(key).unwrap_or(""));
    }

    let mut minority_patients: Vec<&str> = patient_label
        .iter()
        .filter(|(_, label)| **label == minority)
        .map(|(p, _)| *p)
        .collect();
    let mut majority_patients: Vec<&str> = patient_label
        .iter()
        .filter(|(_, label)| **label == majority)
        .map(|(p, _)| *p)
        .collect();

    if minority_patients.is_empty() || majority_patients.is_empty() {
        return Err(EngineError::DataInvalid(
            "both classes must have at least one patient to generate folds".to_string(),
        ));
    }

    let v_minor = std::cmp::max(1, (0.2 * minority_patients.len() as f64).ceil() as usize);
    let v = 2 * v_minor;

    let mut folds = Vec::new();
    let mut seen_validation_sets: HashSet<Vec<String>> = HashSet::new();
    let max_attempts = 2 * fold_count;
    let mut attempts = 0;

    while folds.len() < fold_count && attempts < max_attempts {
        attempts += 1;
        minority_patients.shuffle(rng);
        majority_patients.shuffle(rng);

        if minority_patients.len() < v_minor || majority_patients.len() < v_minor {
            continue;
        }

        let val_minor: Vec<&str> = minority_patients[..v_minor].to_vec();
        let val_major: Vec<&str> = majority_patients[..v_minor].to_vec();

        let mut validation_patients: Vec<String> = val_minor
            .iter()
            .chain(val_major.iter())
            .map(|p| p.to_string())
            .collect();
        validation_patients.sort();

        if seen_validation_sets.contains(&validation_patients) {
            continue;
        }

        let val_set: HashSet<&str> = val_minor.iter().chain(val_major.iter()).copied().collect();
        let train_minor_count: usize = minority_patients
            .iter()
            .filter(|p| !val_set.contains(*p))
            .map(|p| patient_keys[p].len())
            .sum();
        let train_major_count: usize = majority_patients
            .iter()
            .filter(|p| !val_set.contains(*p))
            .map(|p| patient_keys[p].len())
            .sum();

        if train_minor_count < v || train_major_count < v {
            continue;
        }

        let validation_keys: Vec<String> = val_set
            .iter()
            .flat_map(|p| patient_keys[p].iter().map(|k| (*k).clone()))
            .collect();
        let training_keys: Vec<String> = pkg
            .sample_keys()
            .iter()
            .filter(|k| !validation_keys.contains(*k))
            .cloned()
            .collect();

        let validation = pkg.sample_subset(&validation_keys)?;
        let train = pkg.sample_subset(&training_keys)?;

        seen_validation_sets.insert(validation_patients);
        folds.push(Fold { train, validation });
    }

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Header, TabularData};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["f1".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for p in 0..10 {
            for scan in 0..2 {
                let key = format!("patient{p}/Scan-{scan}");
                frows.push((key.clone(), vec![format!("{}", p as f64)]));
                let label = if p < 3 { "yes" } else { "no" };
                lrows.push((key, vec![label.to_string()]));
            }
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn patient_prefix_splits_on_scan_marker() {
        assert_eq!(patient_of("abc/Scan-3"), "abc");
        assert_eq!(patient_of("no-scan-marker"), "no-scan-marker");
    }

    #[test]
    fn folds_keep_patients_whole() {
        let pkg = fixture();
        let mut rng = StdRng::seed_from_u64(7);
        let folds = generate_folds(&pkg, 3, &mut rng).unwrap();
        assert!(!folds.is_empty());
        for fold in &folds {
            let train_patients: HashSet<&str> =
                fold.train.sample_keys().iter().map(|k| patient_of(k)).collect();
            let val_patients: HashSet<&str> = fold
                .validation
                .sample_keys()
                .iter()
                .map(|k| patient_of(k))
                .collect();
            assert!(train_patients.is_disjoint(&val_patients));
        }
    }

    #[test]
    fn every_fold_has_both_classes_in_validation() {
        let pkg = fixture();
        let mut rng = StdRng::seed_from_u64(11);
        let folds = generate_folds(&pkg, 3, &mut rng).unwrap();
        for fold in &folds {
            assert!(fold.validation.minority_count() > 0);
            assert!(fold.validation.majority_count() > 0);
        }
    }
}
