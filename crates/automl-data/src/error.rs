//! Structured error hierarchy for the AutoML engine.
//!
//! All fallible operations across `automl-data` and `automl-core` return
//! [`EngineError`]. The variants map onto the error kinds a caller needs to
//! distinguish: configuration problems fixable by the user, malformed input
//! data, optimizer non-convergence (not fatal — the result vertex is still
//! usable), and infeasible search states (a programmer error, not a
//! recoverable runtime condition).

use thiserror::Error;

/// The engine's error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// A setting was missing or out of range (e.g. a negative count, an
    /// empty action pool, a percentage outside `(0,100]`).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The input tables failed a structural or statistical precondition
    /// (missing label column, fewer than two label outcomes, empty
    /// common-key intersection).
    #[error("invalid data: {0}")]
    DataInvalid(String),

    /// Nelder-Mead exhausted its iteration budget without reaching the
    /// function-tolerance stopping criterion. The returned vertex is still
    /// the best one found and remains usable.
    #[error("optimizer did not converge within its iteration budget")]
    OptimizerNonConvergent,

    /// An evolutionary offspring failed `is_valid_path`. Indicates a bug in
    /// crossover/mutation, not a recoverable runtime condition.
    #[error("pipeline is infeasible: {0}")]
    PipelineInfeasible(String),

    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing failure.
    #[error("CSV error: {0}")]
    Csv(String),

    /// The operation was cancelled via a [`crate::cancellation::CancellationToken`].
    #[error("operation cancelled")]
    Cancelled,

    /// An error with additional context attached, preserving the source.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Add context to an error, wrapping it without discarding the source.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// A stable machine-readable code for this error variant.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
            Self::DataInvalid(_) => "DATA_INVALID",
            Self::OptimizerNonConvergent => "OPTIMIZER_NON_CONVERGENT",
            Self::PipelineInfeasible(_) => "PIPELINE_INFEASIBLE",
            Self::Io(_) => "IO_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the run can sensibly continue past this error (e.g. skip the
    /// fold) rather than abort the whole batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid(_) | Self::Cancelled | Self::OptimizerNonConvergent
        )
    }
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Extension trait for attaching context to a `Result` without losing the source.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> EngineResult<T>;
}

impl<T> ResultExt<T> for EngineResult<T> {
    fn context(self, context: impl Into<String>) -> EngineResult<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, csv::Error> {
    fn context(self, context: impl Into<String>) -> EngineResult<T> {
        self.map_err(|e| EngineError::Csv(e.to_string()).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_stable() {
        assert_eq!(EngineError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            EngineError::ConfigInvalid("x".into()).error_code(),
            "CONFIG_INVALID"
        );
    }

    #[test]
    fn recoverable_classification() {
        assert!(EngineError::Cancelled.is_recoverable());
        assert!(EngineError::ConfigInvalid("x".into()).is_recoverable());
        assert!(EngineError::OptimizerNonConvergent.is_recoverable());
        assert!(!EngineError::DataInvalid("x".into()).is_recoverable());
        assert!(!EngineError::PipelineInfeasible("x".into()).is_recoverable());
    }

    #[test]
    fn with_context_preserves_code() {
        let err = EngineError::DataInvalid("no common keys".into()).with_context("building fold");
        assert!(err.to_string().contains("building fold"));
        assert_eq!(err.error_code(), "DATA_INVALID");
    }
}
