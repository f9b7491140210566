//! Run configuration for the AutoML engine.
//!
//! [`RunConfig`] is an immutable record parsed from the flat
//! `section/key = value` settings store (or the equivalent bracketed
//! `[Section]` / `key = value` form). It replaces the shared mutable
//! settings sink of the reference implementation: nothing in this crate
//! mutates a `RunConfig` in place, and [`crate::pipeline_action`] readers
//! clone the fields they need out of it.
//!
//! Use [`RunConfig::builder()`] to construct one programmatically, or
//! [`RunConfig::from_dir`] / [`RunConfig::parse`] to load one from disk.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Feature-ranking method for [`FeatureSelectionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RankMethod {
    /// Rank features by their R² against the numeric-encoded label.
    #[default]
    RSquared,
}

/// Oversampling strategy for [`OversamplingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OversamplingKind {
    #[default]
    Smote,
    BSmote,
    RandomOversampling,
}

/// Undersampling strategy for [`UndersamplingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UndersamplingKind {
    RandomUndersampling,
    #[default]
    TomekLink,
}

/// Split-quality metric used when growing a decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityMetric {
    #[default]
    InformationGain,
    GiniReduction,
}

/// Attribute-selection strategy evaluated at each tree split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SplitFeatureSelection {
    #[default]
    Random,
    Kde,
}

/// Tree-retention policy applied after a forest is grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TreeSelection {
    #[default]
    None,
    Oob,
    Kde,
}

/// Bag-construction method used per forest iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BaggingMethod {
    #[default]
    Normal,
    Equalized,
    Walker,
}

/// The scalar measurement selected for pipeline-model fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Measurement {
    #[default]
    RocDistance,
    Auc,
    FScore,
    Accuracy,
    Sensitivity,
    Specificity,
    Ppv,
    Npv,
    Mcc,
}

impl Measurement {
    /// `true` for every measurement except ROC distance, where smaller is
    /// better. Per §4.5, the Nelder-Mead optimizer always treats "lower is
    /// better"; a caller selecting a higher-is-better measurement must
    /// invert the sign before handing it to the optimizer.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Measurement::RocDistance)
    }
}

/// `CentralAi/*` settings driving the evolutionary search (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralAiConfig {
    pub offspring_count: usize,
    pub mutation_rate: f64,
    pub iteration_count: usize,
    pub split_percentage: f64,
    pub fold_count: usize,
}

impl Default for CentralAiConfig {
    fn default() -> Self {
        Self {
            offspring_count: 20,
            mutation_rate: 0.1,
            iteration_count: 10,
            split_percentage: 0.2,
            fold_count: 5,
        }
    }
}

/// `Tree/*` settings constraining the pipeline-tree enumeration (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_algorithm_repetability: usize,
    pub max_tree_depth: usize,
    pub pool: Vec<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_algorithm_repetability: 2,
            max_tree_depth: 4,
            pool: vec![
                "FeatureSelection".to_string(),
                "PCA".to_string(),
                "Oversampling".to_string(),
                "Undersampling".to_string(),
                "IsolationForest".to_string(),
            ],
        }
    }
}

/// `FeatureSelection/*` settings (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelectionConfig {
    pub feature_count: usize,
    pub rank_method: RankMethod,
}

impl Default for FeatureSelectionConfig {
    fn default() -> Self {
        Self {
            feature_count: 3,
            rank_method: RankMethod::default(),
        }
    }
}

/// `IsolationForest/*` settings (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestConfig {
    pub tree_count: usize,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self { tree_count: 100 }
    }
}

/// `Oversampling/*` settings (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OversamplingConfig {
    pub neighbours_number: usize,
    pub m_neighbours_number: usize,
    pub n_neighbours_number: usize,
    pub oversampling_percentage: f64,
    pub auto: bool,
    pub kind: OversamplingKind,
}

impl Default for OversamplingConfig {
    fn default() -> Self {
        Self {
            neighbours_number: 5,
            m_neighbours_number: 10,
            n_neighbours_number: 5,
            oversampling_percentage: 100.0,
            auto: true,
            kind: OversamplingKind::default(),
        }
    }
}

/// `Undersampling/*` settings (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndersamplingConfig {
    pub kind: UndersamplingKind,
}

impl Default for UndersamplingConfig {
    fn default() -> Self {
        Self {
            kind: UndersamplingKind::default(),
        }
    }
}

/// `PCA/*` settings (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    pub preservation_percentage: f64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            preservation_percentage: 95.0,
        }
    }
}

/// `Optimizer/*` settings driving the decision-tree/random-forest learner (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub quality_metric: QualityMetric,
    pub max_depth: usize,
    pub min_samples_at_leaf: usize,
    pub kde_attributes_per_split: usize,
    pub random_features: Option<usize>,
    pub feature_selection: SplitFeatureSelection,
    pub boosting: bool,
    pub number_of_trees: usize,
    pub tree_selection: TreeSelection,
    pub number_selected_trees: usize,
    pub bagging_method: BaggingMethod,
    pub bag_fraction: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            quality_metric: QualityMetric::default(),
            max_depth: 8,
            min_samples_at_leaf: 2,
            kde_attributes_per_split: 3,
            random_features: None,
            feature_selection: SplitFeatureSelection::default(),
            boosting: false,
            number_of_trees: 50,
            tree_selection: TreeSelection::default(),
            number_selected_trees: 25,
            bagging_method: BaggingMethod::default(),
            bag_fraction: 1.0,
        }
    }
}

/// `Analytics/ConfusionMatrix/*` settings (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub measurement: Measurement,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            measurement: Measurement::default(),
        }
    }
}

/// The fully resolved, immutable run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    pub central_ai: CentralAiConfig,
    pub tree: TreeConfig,
    pub feature_selection: FeatureSelectionConfig,
    pub isolation_forest: IsolationForestConfig,
    pub oversampling: OversamplingConfig,
    pub undersampling: UndersamplingConfig,
    pub pca: PcaConfig,
    pub optimizer: OptimizerConfig,
    pub analytics: AnalyticsConfig,
    /// Optional master seed (`CentralAi/seed`); absent means every PRNG in
    /// the run is seeded from entropy.
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    fn validate(&self) -> EngineResult<()> {
        if self.tree.pool.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "Tree/pool must not be empty".to_string(),
            ));
        }
        if self.tree.max_tree_depth == 0 {
            return Err(EngineError::ConfigInvalid(
                "Tree/maxTreeDepth must be at least 1".to_string(),
            ));
        }
        if self.pca.preservation_percentage <= 0.0 || self.pca.preservation_percentage > 100.0 {
            return Err(EngineError::ConfigInvalid(format!(
                "PCA/preservationPercentage out of range (0,100]: {}",
                self.pca.preservation_percentage
            )));
        }
        if !(0.0..=1.0).contains(&self.central_ai.mutation_rate) {
            return Err(EngineError::ConfigInvalid(format!(
                "CentralAi/mutationRate out of range [0,1]: {}",
                self.central_ai.mutation_rate
            )));
        }
        if self.central_ai.offspring_count == 0 {
            return Err(EngineError::ConfigInvalid(
                "CentralAi/offspringCount must be at least 1".to_string(),
            ));
        }
        if self.central_ai.fold_count == 0 {
            return Err(EngineError::ConfigInvalid(
                "CentralAi/foldCount must be at least 1".to_string(),
            ));
        }
        if self.feature_selection.feature_count < 2 {
            return Err(EngineError::ConfigInvalid(
                "FeatureSelection/featureCount must be at least 2".to_string(),
            ));
        }
        if self.optimizer.number_of_trees == 0 {
            return Err(EngineError::ConfigInvalid(
                "Optimizer/NumberOfTrees must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse the `section/key = value` or bracketed `[Section]` text of a
    /// single settings source.
    pub fn parse(text: &str) -> EngineResult<RunConfig> {
        let pairs = parse_settings_text(text);
        RunConfigBuilder::from_pairs(&pairs).build()
    }

    /// Read every settings file in `dir` (any extension) and merge them
    /// into one `RunConfig`. Later files override earlier ones on key
    /// collision, in directory-listing order.
    pub fn from_dir(dir: impl AsRef<Path>) -> EngineResult<RunConfig> {
        let dir = dir.as_ref();
        let mut merged: HashMap<String, String> = HashMap::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|e| e.path().is_file())
            .collect();
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            let text = std::fs::read_to_string(entry.path())?;
            merged.extend(parse_settings_text(&text));
        }
        let pairs: Vec<(String, String)> = merged.into_iter().collect();
        RunConfigBuilder::from_pairs(&pairs).build()
    }
}

/// Parse `section/key = value` lines, or bracketed `[Section]` groups
/// followed by `key = value` lines, into a flat `section/key -> value` map.
fn parse_settings_text(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut current_section = String::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            current_section = line[1..line.len() - 1].trim().to_string();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().to_string();
        let full_key = if key.contains('/') || current_section.is_empty() {
            key.to_string()
        } else {
            format!("{current_section}/{key}")
        };
        out.push((full_key, value));
    }
    out
}

/// Fluent, validating builder for [`RunConfig`].
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

macro_rules! setter {
    ($field:ident, $sub:ident, $ty:ty) => {
        #[must_use]
        pub fn $field(mut self, value: $ty) -> Self {
            self.config.$sub.$field = value;
            self
        }
    };
}

impl RunConfigBuilder {
    setter!(offspring_count, central_ai, usize);
    setter!(mutation_rate, central_ai, f64);
    setter!(iteration_count, central_ai, usize);
    setter!(fold_count, central_ai, usize);

    setter!(max_algorithm_repetability, tree, usize);
    setter!(max_tree_depth, tree, usize);

    #[must_use]
    pub fn pool(mut self, pool: Vec<String>) -> Self {
        self.config.tree.pool = pool;
        self
    }

    setter!(feature_count, feature_selection, usize);

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Apply a flat `section/key -> value` map on top of the defaults,
    /// ignoring (with a warning) any key this engine does not recognize.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut builder = Self::default();
        for (key, value) in pairs {
            builder.config.apply_pair(key, value);
        }
        builder
    }

    pub fn build(self) -> EngineResult<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl RunConfig {
    fn apply_pair(&mut self, key: &str, value: &str) {
        match key {
            "CentralAi/offspringCount" => parse_into(value, &mut self.central_ai.offspring_count),
            "CentralAi/mutationRate" => parse_into(value, &mut self.central_ai.mutation_rate),
            "CentralAi/iterationCount" => parse_into(value, &mut self.central_ai.iteration_count),
            "CentralAi/splitPercentage" => parse_into(value, &mut self.central_ai.split_percentage),
            "CentralAi/foldCount" => parse_into(value, &mut self.central_ai.fold_count),
            "CentralAi/seed" => self.seed = value.parse().ok(),
            "Tree/maxAlgorithmRepetability" => {
                parse_into(value, &mut self.tree.max_algorithm_repetability)
            }
            "Tree/maxTreeDepth" => parse_into(value, &mut self.tree.max_tree_depth),
            "Tree/pool" => {
                self.tree.pool = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "FeatureSelection/featureCount" => {
                parse_into(value, &mut self.feature_selection.feature_count)
            }
            "FeatureSelection/rankMethod" => {
                if value == "RSquared" {
                    self.feature_selection.rank_method = RankMethod::RSquared;
                } else {
                    tracing::warn!(value, "unrecognized FeatureSelection/rankMethod");
                }
            }
            "IsolationForest/treeCount" => parse_into(value, &mut self.isolation_forest.tree_count),
            "Oversampling/neighboursNumber" => {
                parse_into(value, &mut self.oversampling.neighbours_number)
            }
            "Oversampling/m_neighboursNumber" => {
                parse_into(value, &mut self.oversampling.m_neighbours_number)
            }
            "Oversampling/n_neighboursNumber" => {
                parse_into(value, &mut self.oversampling.n_neighbours_number)
            }
            "Oversampling/oversamplingPercentage" => {
                parse_into(value, &mut self.oversampling.oversampling_percentage)
            }
            "Oversampling/auto" => parse_into(value, &mut self.oversampling.auto),
            "Oversampling/type" => {
                self.oversampling.kind = match value {
                    "SMOTE" => OversamplingKind::Smote,
                    "BSMOTE" => OversamplingKind::BSmote,
                    "RandomOversampling" => OversamplingKind::RandomOversampling,
                    other => {
                        tracing::warn!(value = other, "unrecognized Oversampling/type");
                        self.oversampling.kind
                    }
                };
            }
            "Undersampling/type" => {
                self.undersampling.kind = match value {
                    "RandomUndersampling" => UndersamplingKind::RandomUndersampling,
                    "TomekLink" => UndersamplingKind::TomekLink,
                    other => {
                        tracing::warn!(value = other, "unrecognized Undersampling/type");
                        self.undersampling.kind
                    }
                };
            }
            "PCA/preservationPercentage" => {
                parse_into(value, &mut self.pca.preservation_percentage)
            }
            "Optimizer/QualityMetric" => {
                self.optimizer.quality_metric = match value {
                    "InformationGain" => QualityMetric::InformationGain,
                    "GiniReduction" => QualityMetric::GiniReduction,
                    other => {
                        tracing::warn!(value = other, "unrecognized Optimizer/QualityMetric");
                        self.optimizer.quality_metric
                    }
                };
            }
            "Optimizer/MaxDepth" => parse_into(value, &mut self.optimizer.max_depth),
            "Optimizer/MinSamplesAtLeaf" => {
                parse_into(value, &mut self.optimizer.min_samples_at_leaf)
            }
            "Optimizer/KDEAttributesPerSplit" => {
                parse_into(value, &mut self.optimizer.kde_attributes_per_split)
            }
            "Optimizer/RandomFeatures" => {
                self.optimizer.random_features = value.parse().ok();
            }
            "Optimizer/FeatureSelection" => {
                self.optimizer.feature_selection = match value {
                    "kde" => SplitFeatureSelection::Kde,
                    "random" => SplitFeatureSelection::Random,
                    other => {
                        tracing::warn!(value = other, "unrecognized Optimizer/FeatureSelection");
                        self.optimizer.feature_selection
                    }
                };
            }
            "Optimizer/Boosting" => parse_into(value, &mut self.optimizer.boosting),
            "Optimizer/NumberOfTrees" => parse_into(value, &mut self.optimizer.number_of_trees),
            "Optimizer/TreeSelection" => {
                self.optimizer.tree_selection = match value {
                    "none" | "None" => TreeSelection::None,
                    "oob" | "OOB" => TreeSelection::Oob,
                    "kde" | "KDE" => TreeSelection::Kde,
                    other => {
                        tracing::warn!(value = other, "unrecognized Optimizer/TreeSelection");
                        self.optimizer.tree_selection
                    }
                };
            }
            "Optimizer/NumberSelectedTrees" => {
                parse_into(value, &mut self.optimizer.number_selected_trees)
            }
            "Optimizer/BaggingMethod" => {
                self.optimizer.bagging_method = match value {
                    "normal" => BaggingMethod::Normal,
                    "equalized" => BaggingMethod::Equalized,
                    "walker" => BaggingMethod::Walker,
                    other => {
                        tracing::warn!(value = other, "unrecognized Optimizer/BaggingMethod");
                        self.optimizer.bagging_method
                    }
                };
            }
            "Optimizer/BagFraction" => parse_into(value, &mut self.optimizer.bag_fraction),
            "Analytics/ConfusionMatrix/Measurement" => {
                self.analytics.measurement = match value {
                    "ROCDistance" => Measurement::RocDistance,
                    "AUC" => Measurement::Auc,
                    "FScore" => Measurement::FScore,
                    "ACC" => Measurement::Accuracy,
                    "SNS" => Measurement::Sensitivity,
                    "SPC" => Measurement::Specificity,
                    "PPV" => Measurement::Ppv,
                    "NPV" => Measurement::Npv,
                    "MCC" => Measurement::Mcc,
                    other => {
                        tracing::warn!(
                            value = other,
                            "unrecognized Analytics/ConfusionMatrix/Measurement"
                        );
                        self.analytics.measurement
                    }
                };
            }
            other => tracing::warn!(key = other, "unrecognized settings key, ignoring"),
        }
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut T) {
    if let Ok(parsed) = value.parse() {
        *slot = parsed;
    } else {
        tracing::warn!(value, "failed to parse settings value, keeping default");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::builder().build().unwrap();
        assert_eq!(config.tree.max_tree_depth, 4);
        assert!(!config.tree.pool.is_empty());
    }

    #[test]
    fn rejects_empty_pool() {
        let result = RunConfig::builder().pool(vec![]).build();
        assert!(matches!(result, Err(EngineError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_zero_tree_depth() {
        let result = RunConfig::builder().max_tree_depth(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mutation_rate_out_of_range() {
        let result = RunConfig::builder().mutation_rate(1.5).build();
        assert!(result.is_err());
    }

    #[test]
    fn parses_flat_settings_text() {
        let text = "CentralAi/offspringCount = 30\nPCA/preservationPercentage = 97\n";
        let config = RunConfig::parse(text).unwrap();
        assert_eq!(config.central_ai.offspring_count, 30);
        assert_eq!(config.pca.preservation_percentage, 97.0);
    }

    #[test]
    fn parses_bracketed_settings_text() {
        let text = "[CentralAi]\noffspringCount = 15\nfoldCount = 3\n\n[PCA]\npreservationPercentage = 92\n";
        let config = RunConfig::parse(text).unwrap();
        assert_eq!(config.central_ai.offspring_count, 15);
        assert_eq!(config.central_ai.fold_count, 3);
        assert_eq!(config.pca.preservation_percentage, 92.0);
    }

    #[test]
    fn rejects_preservation_percentage_above_100() {
        let text = "PCA/preservationPercentage = 150\n";
        let result = RunConfig::parse(text);
        assert!(result.is_err());
    }

    #[test]
    fn measurement_direction() {
        assert!(!Measurement::RocDistance.higher_is_better());
        assert!(Measurement::Auc.higher_is_better());
    }
}
