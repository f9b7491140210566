//! Integration tests for the tabular data layer: end-to-end behavior across
//! `DataPackage` construction, fold generation, and the preprocessing
//! action catalog, built from in-memory fixtures rather than on-disk CSVs.

use automl_data::actions::{self, ActionConfigs, ActionKind};
use automl_data::config::RunConfig;
use automl_data::tabular::Header;
use automl_data::{generate_folds, DataPackage, TabularData};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn synthetic_package(rows: usize) -> DataPackage {
    let fheader = Header::new(vec!["x1".into(), "x2".into(), "x3".into()]).unwrap();
    let lheader = Header::new(vec!["outcome".into()]).unwrap();

    let mut frows = Vec::with_capacity(rows);
    let mut lrows = Vec::with_capacity(rows);
    for i in 0..rows {
        let patient = i / 2;
        let key = format!("patient-{patient}/Scan-{}", i % 2);
        let label = if i < rows / 2 { "benign" } else { "malignant" };
        frows.push((
            key.clone(),
            vec![(i as f64).to_string(), ((rows - i) as f64).to_string(), (i % 3).to_string()],
        ));
        lrows.push((key, vec![label.to_string()]));
    }

    let fdb = TabularData::new(fheader, frows).unwrap();
    let ldb = TabularData::new(lheader, lrows).unwrap();
    DataPackage::new(fdb, ldb, "outcome").unwrap()
}

#[test]
fn fold_generation_never_splits_a_patient_across_sides() {
    let pkg = synthetic_package(40);
    let mut rng = StdRng::seed_from_u64(3);
    let folds = generate_folds(&pkg, 3, &mut rng).unwrap();

    assert!(!folds.is_empty());
    for fold in &folds {
        let train_patients: std::collections::HashSet<&str> =
            fold.train.sample_keys().iter().map(|k| automl_data::patient_of(k)).collect();
        let validation_patients: std::collections::HashSet<&str> =
            fold.validation.sample_keys().iter().map(|k| automl_data::patient_of(k)).collect();
        assert!(train_patients.is_disjoint(&validation_patients));
    }
}

#[test]
fn feature_selection_then_pca_pipeline_round_trips_sample_keys() {
    let pkg = synthetic_package(30);
    let config = RunConfig::builder().build().unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let configs = ActionConfigs {
        feature_selection: &config.feature_selection,
        pca: &config.pca,
        oversampling: &config.oversampling,
        undersampling: &config.undersampling,
        isolation_forest: &config.isolation_forest,
    };

    let fs = actions::build_action(ActionKind::FeatureSelection, &configs, &pkg, &mut rng).unwrap();
    let after_fs = actions::run_action(&fs, &pkg, &mut rng).unwrap();
    assert_eq!(after_fs.sample_keys(), pkg.sample_keys());
    assert!(after_fs.fdb().header().len() <= pkg.fdb().header().len());

    let pca = actions::build_action(ActionKind::Pca, &configs, &after_fs, &mut rng).unwrap();
    let after_pca = actions::run_action(&pca, &after_fs, &mut rng).unwrap();
    assert_eq!(after_pca.sample_keys(), pkg.sample_keys());
}

#[test]
fn oversampling_grows_the_minority_class() {
    let pkg = synthetic_package(20);
    let config = RunConfig::builder().build().unwrap();
    let mut rng = StdRng::seed_from_u64(5);

    let configs = ActionConfigs {
        feature_selection: &config.feature_selection,
        pca: &config.pca,
        oversampling: &config.oversampling,
        undersampling: &config.undersampling,
        isolation_forest: &config.isolation_forest,
    };

    let before = pkg.minority_count();
    let action = actions::build_action(ActionKind::Oversampling, &configs, &pkg, &mut rng).unwrap();
    let after = actions::run_action(&action, &pkg, &mut rng).unwrap();

    assert!(after.minority_count() >= before);
}
