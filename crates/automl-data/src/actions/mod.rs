//! Preprocessing action catalog (C3).
//!
//! Every action obeys the same contract: `build` fits state from a
//! training package, `run` transforms any package (training or
//! validation) using that fitted state. Rather than trait-object
//! polymorphism this crate dispatches over a tagged enum — the action set
//! is closed and small, and keeping state inline avoids a `Box<dyn Action>`
//! per pipeline step.

pub mod feature_selection;
pub mod isolation_forest;
pub mod oversampling;
pub mod pca;
pub mod undersampling;

pub use feature_selection::FsState;
pub use isolation_forest::IfState;
pub use oversampling::OsState;
pub use pca::PcaState;
pub use undersampling::UsState;

use crate::config::{
    FeatureSelectionConfig, IsolationForestConfig, OversamplingConfig, PcaConfig,
    UndersamplingConfig,
};
use crate::error::EngineResult;
use crate::package::DataPackage;
use rand::rngs::StdRng;
use std::collections::HashMap;

/// The short code used in `Tree/pool` and in `pipeline_info.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    FeatureSelection,
    Pca,
    Oversampling,
    Undersampling,
    IsolationForest,
}

impl ActionKind {
    pub fn id(&self) -> &'static str {
        match self {
            ActionKind::FeatureSelection => "FeatureSelection",
            ActionKind::Pca => "PCA",
            ActionKind::Oversampling => "Oversampling",
            ActionKind::Undersampling => "Undersampling",
            ActionKind::IsolationForest => "IsolationForest",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "FeatureSelection" => Some(Self::FeatureSelection),
            "PCA" => Some(Self::Pca),
            "Oversampling" => Some(Self::Oversampling),
            "Undersampling" => Some(Self::Undersampling),
            "IsolationForest" => Some(Self::IsolationForest),
            _ => None,
        }
    }
}

/// A fitted preprocessing action, ready to `run` on a package.
#[derive(Debug, Clone)]
pub enum PreprocessingAction {
    FeatureSelection(FsState),
    Pca(PcaState),
    Oversampling(OsState),
    Undersampling(UsState),
    IsolationForest(IfState),
}

/// Everything `build_action` needs: each action only reads the sub-config
/// relevant to its kind.
pub struct ActionConfigs<'a> {
    pub feature_selection: &'a FeatureSelectionConfig,
    pub pca: &'a PcaConfig,
    pub oversampling: &'a OversamplingConfig,
    pub undersampling: &'a UndersamplingConfig,
    pub isolation_forest: &'a IsolationForestConfig,
}

/// Fit an action of `kind` from the training package.
pub fn build_action(
    kind: ActionKind,
    configs: &ActionConfigs<'_>,
    train_pkg: &DataPackage,
    rng: &mut StdRng,
) -> EngineResult<PreprocessingAction> {
    Ok(match kind {
        ActionKind::FeatureSelection => PreprocessingAction::FeatureSelection(
            feature_selection::build(train_pkg, configs.feature_selection)?,
        ),
        ActionKind::Pca => PreprocessingAction::Pca(pca::build(train_pkg, configs.pca)?),
        ActionKind::Oversampling => PreprocessingAction::Oversampling(oversampling::build(
            train_pkg,
            configs.oversampling,
        )?),
        ActionKind::Undersampling => {
            PreprocessingAction::Undersampling(undersampling::build(train_pkg, configs.undersampling)?)
        }
        ActionKind::IsolationForest => PreprocessingAction::IsolationForest(isolation_forest::build(
            train_pkg,
            configs.isolation_forest,
            rng,
        )?),
    })
}

/// Transform `pkg` using a fitted action.
pub fn run_action(
    action: &PreprocessingAction,
    pkg: &DataPackage,
    rng: &mut StdRng,
) -> EngineResult<DataPackage> {
    match action {
        PreprocessingAction::FeatureSelection(state) => feature_selection::run(pkg, state),
        PreprocessingAction::Pca(state) => pca::run(pkg, state),
        PreprocessingAction::Oversampling(state) => oversampling::run(pkg, state, rng),
        PreprocessingAction::Undersampling(state) => undersampling::run(pkg, state, rng),
        PreprocessingAction::IsolationForest(state) => isolation_forest::run(pkg, state),
    }
}

/// `true` for actions that only touch feature columns (safe to apply to a
/// validation package); oversampling/undersampling/isolation-forest mutate
/// the sample population and must never run on validation data (§4.9).
pub fn is_feature_space_action(action: &PreprocessingAction) -> bool {
    matches!(
        action,
        PreprocessingAction::FeatureSelection(_) | PreprocessingAction::Pca(_)
    )
}

/// The effective hyperparameter map, as used, for reporting.
pub fn parameters(action: &PreprocessingAction) -> HashMap<String, String> {
    match action {
        PreprocessingAction::FeatureSelection(state) => state.parameters(),
        PreprocessingAction::Pca(state) => state.parameters(),
        PreprocessingAction::Oversampling(state) => state.parameters(),
        PreprocessingAction::Undersampling(state) => state.parameters(),
        PreprocessingAction::IsolationForest(state) => state.parameters(),
    }
}

pub fn kind_of(action: &PreprocessingAction) -> ActionKind {
    match action {
        PreprocessingAction::FeatureSelection(_) => ActionKind::FeatureSelection,
        PreprocessingAction::Pca(_) => ActionKind::Pca,
        PreprocessingAction::Oversampling(_) => ActionKind::Oversampling,
        PreprocessingAction::Undersampling(_) => ActionKind::Undersampling,
        PreprocessingAction::IsolationForest(_) => ActionKind::IsolationForest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_round_trips() {
        for kind in [
            ActionKind::FeatureSelection,
            ActionKind::Pca,
            ActionKind::Oversampling,
            ActionKind::Undersampling,
            ActionKind::IsolationForest,
        ] {
            assert_eq!(ActionKind::parse(kind.id()), Some(kind));
        }
    }
}
