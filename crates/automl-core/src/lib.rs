//! Learning engine for the AutoML system: decision trees and random
//! forests, confusion-matrix analytics, the Nelder-Mead hyperparameter
//! optimizer, the pipeline-tree enumeration, the pipeline model that ties
//! a hyperparameter vector to a trained forest, the evolutionary pipeline
//! search, and the report writers for the output artifacts.
//!
//! The data layer — tabular storage, `DataPackage`, preprocessing
//! actions, fold generation, run configuration, and CSV I/O — lives in
//! `automl_data`; this crate is the learning and search layer built on
//! top of it.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use automl_core::{pipeline_tree, search};
//! use automl_data::{io, RunConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = RunConfig::from_dir("settings")?;
//! let tree = pipeline_tree::build_tree(&config.tree);
//! let fdb = io::read_tabular_data("data/FDB.csv")?;
//! let ldb = io::read_tabular_data("data/LDB.csv")?;
//! let package = automl_data::DataPackage::new(fdb, ldb, "label")?;
//!
//! let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
//! let folds = automl_data::generate_folds(&package, config.central_ai.fold_count, &mut rng)?;
//! ```

pub mod analytics;
pub mod forest;
pub mod optimizer;
pub mod pipeline_model;
pub mod pipeline_tree;
pub mod report;
pub mod search;
pub mod tree;

pub use analytics::{ConfusionMatrix, ConfusionMatrixAnalytics, MeasurementBreakdown};
pub use forest::RandomForest;
pub use optimizer::{NelderMeadConfig, OptimizeResult, Termination};
pub use pipeline_model::PipelineModel;
pub use pipeline_tree::{build_tree, NodeKind, PipelineTree};
pub use search::{run_search, CachedCandidate, Creature, SearchOutcome};
pub use tree::DecisionTree;
