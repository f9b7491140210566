//! End-to-end integration tests: build a pipeline tree, run the
//! evolutionary search over a small synthetic dataset, and write the
//! resulting report artifacts to disk, the way the CLI driver does for one
//! fold.

use automl_core::{build_tree, report, search};
use automl_data::config::{RunConfig, TreeConfig};
use automl_data::tabular::Header;
use automl_data::{CancellationToken, DataPackage, TabularData};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn fixture(rows: usize) -> DataPackage {
    let fheader = Header::new(vec!["f1".into(), "f2".into(), "f3".into()]).unwrap();
    let mut frows = Vec::with_capacity(rows);
    let mut lrows = Vec::with_capacity(rows);
    for i in 0..rows {
        let key = format!("s{i}/Scan-1");
        let label = if i < rows / 2 { "negative" } else { "positive" };
        frows.push((
            key.clone(),
            vec![(i as f64).to_string(), ((rows - i) as f64).to_string(), (i % 4).to_string()],
        ));
        lrows.push((key, vec![label.to_string()]));
    }
    let fdb = TabularData::new(fheader, frows).unwrap();
    let lheader = Header::new(vec!["label".into()]).unwrap();
    let ldb = TabularData::new(lheader, lrows).unwrap();
    DataPackage::new(fdb, ldb, "label").unwrap()
}

#[test]
fn search_then_report_round_trips_a_fold() {
    let train = fixture(50);
    let validation = fixture(20);

    let tree_config = TreeConfig {
        max_algorithm_repetability: 1,
        max_tree_depth: 2,
        pool: vec!["FeatureSelection".into(), "PCA".into()],
    };
    let tree = build_tree(&tree_config);

    let config = RunConfig::builder()
        .max_tree_depth(2)
        .pool(tree_config.pool.clone())
        .offspring_count(4)
        .iteration_count(2)
        .build()
        .unwrap();

    let mut rng = StdRng::seed_from_u64(123);
    let cancellation = CancellationToken::new();

    let outcome = search::run_search(&tree, &train, &validation, &config, &mut rng, &cancellation, None, Some(0)).unwrap();
    assert!(outcome.best_validation_fitness.is_finite());

    let dir = std::env::temp_dir().join(format!("automl-core-integration-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    report::write_pipeline_info(dir.join("pipeline_info.txt"), &outcome.best).unwrap();
    report::write_performance_info(dir.join("performance_info.csv"), &outcome.best_validation_breakdown).unwrap();
    report::write_overall_performance_info(
        dir.join("centralAI_overall_performance_info.csv"),
        &[(0, outcome.best_validation_breakdown.clone())],
    )
    .unwrap();

    assert!(dir.join("pipeline_info.txt").exists());
    let performance = std::fs::read_to_string(dir.join("performance_info.csv")).unwrap();
    assert!(performance.starts_with("metric,value\n"));
    let overall = std::fs::read_to_string(dir.join("centralAI_overall_performance_info.csv")).unwrap();
    assert_eq!(overall.lines().count(), 2);

    std::fs::remove_dir_all(&dir).ok();
}
