//! Pipeline model (C8): a creature's action list plus its trained
//! random-forest plugin, reached by mapping a continuous hyperparameter
//! vector onto a discretized per-action parameter choice.
//!
//! [`PipelineModel::set`] never mutates the shared base [`RunConfig`] —
//! each call builds a fresh overlay config from the chosen parameter
//! strings via [`RunConfigBuilder::from_pairs`] and reads sub-configs out
//! of that, leaving the base untouched.

use crate::analytics::ConfusionMatrixAnalytics;
use crate::forest::{self, RandomForest};
use automl_data::actions::{self, ActionConfigs, ActionKind, PreprocessingAction};
use automl_data::config::{RunConfig, RunConfigBuilder};
use automl_data::{DataPackage, EngineResult};
use rand::rngs::StdRng;

/// One enumerated hyperparameter: a settings key plus its legal values,
/// in the exact string form `RunConfig::apply_pair` understands.
#[derive(Debug, Clone)]
struct ParamChoice {
    key: String,
    values: Vec<String>,
}

/// The parameter ranges an action of `kind` contributes to the continuous
/// hyperparameter vector. `num_features` scales the feature-count and
/// isolation-forest tree-count ranges to the data at hand.
fn parameter_choices(kind: ActionKind, num_features: usize) -> Vec<ParamChoice> {
    let values = |it: std::ops::RangeInclusive<i64>| it.map(|n| n.to_string()).collect::<Vec<_>>();
    match kind {
        ActionKind::FeatureSelection => vec![
            ParamChoice {
                key: "FeatureSelection/featureCount".into(),
                values: values(num_features.min(3) as i64..=num_features.max(1) as i64),
            },
            ParamChoice {
                key: "FeatureSelection/rankMethod".into(),
                values: vec!["RSquared".into()],
            },
        ],
        ActionKind::Pca => vec![ParamChoice {
            key: "PCA/preservationPercentage".into(),
            values: values(90..=99),
        }],
        ActionKind::Oversampling => vec![
            ParamChoice {
                key: "Oversampling/neighboursNumber".into(),
                values: values(1..=9),
            },
            ParamChoice {
                key: "Oversampling/m_neighboursNumber".into(),
                values: values(1..=20),
            },
            ParamChoice {
                key: "Oversampling/n_neighboursNumber".into(),
                values: values(1..=10),
            },
            ParamChoice {
                key: "Oversampling/oversamplingPercentage".into(),
                values: (1..=20).map(|n| (n * 50).to_string()).collect(),
            },
            ParamChoice {
                key: "Oversampling/auto".into(),
                values: vec!["true".into(), "false".into()],
            },
            ParamChoice {
                key: "Oversampling/type".into(),
                values: vec!["SMOTE".into(), "BSMOTE".into(), "RandomOversampling".into()],
            },
        ],
        ActionKind::Undersampling => vec![ParamChoice {
            key: "Undersampling/type".into(),
            values: vec!["RandomUndersampling".into(), "TomekLink".into()],
        }],
        ActionKind::IsolationForest => vec![ParamChoice {
            key: "IsolationForest/treeCount".into(),
            values: vec![
                (5 * num_features.max(1)).to_string(),
                (10 * num_features.max(1)).to_string(),
                (20 * num_features.max(1)).to_string(),
            ],
        }],
    }
}

/// min-max normalize `vec` against its own extremes; a degenerate
/// (constant) vector normalizes to the midpoint for every coordinate.
fn minmax_normalize(vec: &[f64]) -> Vec<f64> {
    let min = vec.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vec.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        vec.iter().map(|_| 0.5).collect()
    } else {
        vec.iter().map(|v| (v - min) / (max - min)).collect()
    }
}

fn discretize(range_len: usize, normalized: f64) -> usize {
    let idx = ((range_len - 1) as f64 * normalized.clamp(0.0, 1.0)).floor() as usize;
    idx.min(range_len - 1)
}

/// A single candidate pipeline: an ordered action list, the trained RF
/// plugin, and the in-sample fitness used to rank it during search.
pub struct PipelineModel {
    action_kinds: Vec<ActionKind>,
    choices: Vec<ParamChoice>,
    pub fitted_actions: Vec<PreprocessingAction>,
    pub forest: Option<RandomForest>,
    pub preprocessed_train: Option<DataPackage>,
    pub fitness: f64,
}

impl PipelineModel {
    pub fn new(action_kinds: Vec<ActionKind>, num_features: usize) -> Self {
        let choices = action_kinds
            .iter()
            .flat_map(|&kind| parameter_choices(kind, num_features))
            .collect();
        Self {
            action_kinds,
            choices,
            fitted_actions: Vec::new(),
            forest: None,
            preprocessed_train: None,
            fitness: f64::INFINITY,
        }
    }

    /// Total enumerated hyperparameters across this creature's actions —
    /// the dimensionality the C6 optimizer must search.
    pub fn input_count(&self) -> usize {
        self.choices.len()
    }

    /// Map a continuous hyperparameter vector to a discretized parameter
    /// choice per action, rebuild the action pipeline, train a fresh
    /// random forest on the transformed training package, and record its
    /// ROC-distance fitness against that same package (in-sample; C9's
    /// final validation pass is where generalization is actually checked).
    pub fn set(
        &mut self,
        vec: &[f64],
        base: &RunConfig,
        train_pkg: &DataPackage,
        rng: &mut StdRng,
    ) -> EngineResult<()> {
        assert_eq!(vec.len(), self.choices.len(), "hyperparameter vector arity mismatch");
        let normalized = minmax_normalize(vec);

        let mut pairs = Vec::with_capacity(self.choices.len());
        for (choice, &norm) in self.choices.iter().zip(normalized.iter()) {
            let idx = discretize(choice.values.len(), norm);
            pairs.push((choice.key.clone(), choice.values[idx].clone()));
        }
        let overlay = RunConfigBuilder::from_pairs(&pairs).build()?;

        let configs = ActionConfigs {
            feature_selection: &overlay.feature_selection,
            pca: &overlay.pca,
            oversampling: &overlay.oversampling,
            undersampling: &overlay.undersampling,
            isolation_forest: &overlay.isolation_forest,
        };

        let mut fitted = Vec::with_capacity(self.action_kinds.len());
        let mut pkg = train_pkg.clone();
        for &kind in &self.action_kinds {
            let action = actions::build_action(kind, &configs, &pkg, rng)?;
            pkg = actions::run_action(&action, &pkg, rng)?;
            fitted.push(action);
        }

        let forest = forest::build(&pkg, &base.optimizer, rng);
        let mut analytics = ConfusionMatrixAnalytics::new(pkg.label_outcomes().to_vec());
        let fitness = analytics.evaluate(&forest, &pkg);

        self.fitted_actions = fitted;
        self.forest = Some(forest);
        self.preprocessed_train = Some(pkg);
        self.fitness = fitness;
        Ok(())
    }

    /// Predict through the trained forest. Panics (debug-assert style) if
    /// called before [`Self::set`] — callers in this crate always score a
    /// creature before evaluating it.
    pub fn evaluate(&self, features: &[f64]) -> String {
        self.forest
            .as_ref()
            .expect("PipelineModel::set must run before evaluate")
            .predict(features)
    }
}
