//! Data layer for the AutoML engine: tabular storage, the `DataPackage`
//! abstraction, the fold generator, the preprocessing action catalog, run
//! configuration, and the CSV I/O boundary.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use automl_data::{io, folds, RunConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let fdb = io::read_tabular_data("data/FDB.csv")?;
//! let ldb = io::read_tabular_data("data/LDB.csv")?;
//! let package = automl_data::DataPackage::new(fdb, ldb, "label")?;
//!
//! let config = RunConfig::from_dir("settings")?;
//! let mut rng = StdRng::seed_from_u64(42);
//! let folds = folds::generate_folds(&package, config.central_ai.fold_count, &mut rng)?;
//! ```

pub mod actions;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod folds;
pub mod io;
pub mod linalg;
pub mod package;
pub mod progress;
pub mod tabular;

pub use cancellation::CancellationToken;
pub use config::{RunConfig, RunConfigBuilder};
pub use error::{EngineError, EngineResult, ResultExt};
pub use folds::{generate_folds, patient_of, Fold};
pub use package::DataPackage;
pub use progress::{ProgressCallback, ProgressUpdate, SearchStage};
pub use tabular::{ColumnKind, Header, TabularData};
