//! Progress reporting types for the AutoML search.
//!
//! This module defines [`SearchStage`], [`ProgressUpdate`], and the
//! [`ProgressCallback`] type alias used to report search progress to a
//! caller in real time.
//!
//! # Example
//!
//! ```
//! use automl_data::{ProgressUpdate, SearchStage};
//!
//! let update = ProgressUpdate {
//!     stage: SearchStage::SearchingPipelines,
//!     progress: 0.4,
//!     message: "iteration 4/10".to_string(),
//!     fold_index: Some(2),
//!     best_fitness: Some(0.31),
//! };
//!
//! println!("[{:?}] {:.0}% - {}", update.stage, update.progress * 100.0, update.message);
//! ```

use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a fold's AutoML search.
///
/// A fold's search progresses through these stages in order (unless
/// cancelled or failed):
///
/// 1. [`Initializing`](Self::Initializing) - building the pipeline tree and settings
/// 2. [`GeneratingFolds`](Self::GeneratingFolds) - splitting patients into train/validation
/// 3. [`SearchingPipelines`](Self::SearchingPipelines) - evolutionary loop over candidate pipelines
/// 4. [`OptimizingHyperparameters`](Self::OptimizingHyperparameters) - Nelder-Mead on a pipeline model
/// 5. [`TrainingForest`](Self::TrainingForest) - fitting a random forest on preprocessed data
/// 6. [`ValidatingCandidates`](Self::ValidatingCandidates) - re-scoring cached candidates on held-out data
/// 7. [`Complete`](Self::Complete) - the fold finished successfully
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed),
/// [`Cancelled`](Self::Cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum SearchStage {
    /// Building the pipeline tree and resolving the run configuration.
    #[default]
    Initializing,

    /// Splitting patients into stratified training/validation folds.
    GeneratingFolds,

    /// Evolutionary search is producing and scoring candidate pipelines.
    SearchingPipelines,

    /// Nelder-Mead is optimizing a pipeline model's hyperparameter vector.
    OptimizingHyperparameters,

    /// A random forest is being trained on the preprocessed training set.
    TrainingForest,

    /// Cached best candidates are being re-scored on held-out validation data.
    ValidatingCandidates,

    /// The fold finished successfully.
    Complete,

    /// The fold failed.
    Failed,

    /// The fold's search was cancelled.
    Cancelled,
}

impl SearchStage {
    /// Returns the stable string representation used in logs and reports.
    ///
    /// ```
    /// use automl_data::SearchStage;
    ///
    /// assert_eq!(SearchStage::SearchingPipelines.as_str(), "searching_pipelines");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStage::Initializing => "initializing",
            SearchStage::GeneratingFolds => "generating_folds",
            SearchStage::SearchingPipelines => "searching_pipelines",
            SearchStage::OptimizingHyperparameters => "optimizing_hyperparameters",
            SearchStage::TrainingForest => "training_forest",
            SearchStage::ValidatingCandidates => "validating_candidates",
            SearchStage::Complete => "complete",
            SearchStage::Failed => "failed",
            SearchStage::Cancelled => "cancelled",
        }
    }

    /// Returns `true` if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchStage::Complete | SearchStage::Failed | SearchStage::Cancelled
        )
    }
}

/// Error returned by [`SearchStage::from_str`] for an unrecognized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSearchStageError {
    invalid_value: String,
}

impl ParseSearchStageError {
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParseSearchStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid search stage: '{}'. Valid values are: initializing, generating_folds, \
             searching_pipelines, optimizing_hyperparameters, training_forest, \
             validating_candidates, complete, failed, cancelled",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseSearchStageError {}

impl FromStr for SearchStage {
    type Err = ParseSearchStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(SearchStage::Initializing),
            "generating_folds" => Ok(SearchStage::GeneratingFolds),
            "searching_pipelines" => Ok(SearchStage::SearchingPipelines),
            "optimizing_hyperparameters" => Ok(SearchStage::OptimizingHyperparameters),
            "training_forest" => Ok(SearchStage::TrainingForest),
            "validating_candidates" => Ok(SearchStage::ValidatingCandidates),
            "complete" => Ok(SearchStage::Complete),
            "failed" => Ok(SearchStage::Failed),
            "cancelled" => Ok(SearchStage::Cancelled),
            _ => Err(ParseSearchStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update emitted during a fold's search.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// The current stage.
    pub stage: SearchStage,

    /// Overall progress within the current fold, from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Index of the fold this update belongs to, if running under the
    /// per-fold worker pool.
    pub fold_index: Option<usize>,

    /// Best fitness seen so far in the current fold's population, if any.
    pub best_fitness: Option<f64>,
}

impl Default for ProgressUpdate {
    fn default() -> Self {
        Self {
            stage: SearchStage::default(),
            progress: 0.0,
            message: String::new(),
            fold_index: None,
            best_fitness: None,
        }
    }
}

/// Type alias for a progress callback function.
///
/// Must be `Send + Sync` since the outer fold loop calls it from `rayon`
/// worker threads.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;
