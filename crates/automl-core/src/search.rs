//! Evolutionary pipeline search (C9): grows a population of candidate
//! preprocessing pipelines, scores each with a Nelder-Mead-tuned
//! [`PipelineModel`], and evolves the population by crossover/mutation
//! over several generations before a final validation pass.

use crate::optimizer::{self, NelderMeadConfig};
use crate::pipeline_model::PipelineModel;
use crate::pipeline_tree::{NodeKind, PipelineTree};
use automl_data::actions::{self, PreprocessingAction};
use automl_data::config::RunConfig;
use automl_data::{CancellationToken, DataPackage, EngineError, EngineResult, ProgressCallback, ProgressUpdate, SearchStage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// A pipeline candidate ready to be scored: a path through the pipeline
/// tree, plus the fitness and hyperparameters found for it so far.
#[derive(Debug, Clone)]
pub struct Creature {
    pub path: Vec<usize>,
    pub fitness: f64,
    pub hyperparams: Vec<f64>,
}

/// A cached candidate good enough to be re-evaluated on held-out data at
/// the end of the search.
#[derive(Debug, Clone)]
pub struct CachedCandidate {
    pub path: Vec<usize>,
    pub actions: Vec<PreprocessingAction>,
    pub preprocessed_train: DataPackage,
    pub forest: crate::forest::RandomForest,
    pub train_fitness: f64,
}

/// Caching threshold: a creature this good (ROC distance) or better during
/// the search is kept as a final-evaluation candidate.
const CACHE_THRESHOLD: f64 = 0.1;
/// After this many consecutive duplicate offspring, escalate the mutation
/// rate for the rest of the current generation.
const DUPLICATE_MUTATION_RATE: f64 = 0.6;

pub struct SearchOutcome {
    pub best: CachedCandidate,
    pub best_validation_fitness: f64,
    pub best_validation_breakdown: crate::analytics::MeasurementBreakdown,
    pub cached_candidates: Vec<CachedCandidate>,
}

#[allow(clippy::too_many_arguments)]
pub fn run_search(
    tree: &PipelineTree,
    train_pkg: &DataPackage,
    validation_pkg: &DataPackage,
    base_config: &RunConfig,
    rng: &mut StdRng,
    cancellation: &CancellationToken,
    progress: Option<&ProgressCallback>,
    fold_index: Option<usize>,
) -> EngineResult<SearchOutcome> {
    let num_features = train_pkg.fdb().header().len();
    let offspring_count = base_config.central_ai.offspring_count;
    let mutation_rate = base_config.central_ai.mutation_rate;
    let iteration_count = base_config.central_ai.iteration_count;

    let mut population: Vec<Creature> = Vec::with_capacity(offspring_count);
    let mut cached: Vec<CachedCandidate> = Vec::new();

    for _ in 0..offspring_count {
        let path = tree.random_path(rng);
        let creature = score_creature(&path, tree, train_pkg, base_config, rng)?;
        maybe_cache(&mut cached, &creature, tree, train_pkg, base_config, rng)?;
        population.push(creature);
    }
    population.sort_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal));

    emit(progress, fold_index, SearchStage::SearchingPipelines, 0.0, "initial population scored", &population);

    for iteration in 0..iteration_count {
        if cancellation.is_cancelled() {
            break;
        }

        let offspring_paths = produce_offspring(&population, tree, mutation_rate, offspring_count, rng)?;
        let mut offspring = Vec::with_capacity(offspring_paths.len());
        for path in offspring_paths {
            let creature = score_creature(&path, tree, train_pkg, base_config, rng)?;
            maybe_cache(&mut cached, &creature, tree, train_pkg, base_config, rng)?;
            offspring.push(creature);
        }

        population.extend(offspring);
        population.sort_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal));
        population.truncate(offspring_count);

        emit(
            progress,
            fold_index,
            SearchStage::SearchingPipelines,
            (iteration + 1) as f64 / iteration_count as f64,
            &format!("generation {}/{iteration_count}", iteration + 1),
            &population,
        );
    }

    if cached.is_empty() {
        // Nothing crossed the cache threshold; fall back to the single
        // best population member so a final candidate always exists.
        if let Some(best) = population.first() {
            let candidate = materialize_candidate(best, tree, train_pkg, base_config, rng)?;
            cached.push(candidate);
        }
    }

    emit(progress, fold_index, SearchStage::ValidatingCandidates, 0.0, "scoring cached candidates on validation data", &population);

    let mut best: Option<(CachedCandidate, f64, crate::analytics::MeasurementBreakdown)> = None;
    for candidate in &cached {
        let validation_view = apply_feature_space_actions(&candidate.actions, validation_pkg, rng)?;
        let mut analytics = crate::analytics::ConfusionMatrixAnalytics::new(validation_view.label_outcomes().to_vec());
        let score = analytics.evaluate(&candidate.forest, &validation_view);
        let breakdown = analytics.measurement_breakdown();
        if best.as_ref().map(|(_, s, _)| score < *s).unwrap_or(true) {
            best = Some((candidate.clone(), score, breakdown));
        }
    }

    let (best_candidate, best_validation_fitness, best_validation_breakdown) = best.ok_or_else(|| {
        EngineError::PipelineInfeasible("no candidate pipeline survived scoring".to_string())
    })?;

    emit(progress, fold_index, SearchStage::Complete, 1.0, "search complete", &population);

    Ok(SearchOutcome {
        best: best_candidate,
        best_validation_fitness,
        best_validation_breakdown,
        cached_candidates: cached,
    })
}

fn score_creature(
    path: &[usize],
    tree: &PipelineTree,
    train_pkg: &DataPackage,
    base_config: &RunConfig,
    rng: &mut StdRng,
) -> EngineResult<Creature> {
    let kinds = tree.actions_along(path);
    let input_count = PipelineModel::new(kinds.clone(), train_pkg.fdb().header().len()).input_count();

    let x0 = vec![0.5; input_count];
    let nm_config = NelderMeadConfig {
        negative_not_allowed: true,
        ..Default::default()
    };
    let cancellation = CancellationToken::new();

    let result = optimizer::minimize(&x0, &nm_config, &cancellation, |candidate_x| {
        let mut model = PipelineModel::new(kinds.clone(), train_pkg.fdb().header().len());
        match model.set(candidate_x, base_config, train_pkg, rng) {
            Ok(()) => model.fitness,
            Err(_) => f64::INFINITY,
        }
    });

    Ok(Creature {
        path: path.to_vec(),
        fitness: result.fitness,
        hyperparams: result.x,
    })
}

fn materialize_candidate(
    creature: &Creature,
    tree: &PipelineTree,
    train_pkg: &DataPackage,
    base_config: &RunConfig,
    rng: &mut StdRng,
) -> EngineResult<CachedCandidate> {
    let kinds = tree.actions_along(&creature.path);
    let mut model = PipelineModel::new(kinds, train_pkg.fdb().header().len());
    let input_count = model.input_count();
    let hyperparams = if creature.hyperparams.len() == input_count {
        creature.hyperparams.clone()
    } else {
        vec![0.5; input_count]
    };
    model.set(&hyperparams, base_config, train_pkg, rng)?;

    Ok(CachedCandidate {
        path: creature.path.clone(),
        actions: model.fitted_actions,
        preprocessed_train: model.preprocessed_train.expect("set() always populates this"),
        forest: model.forest.expect("set() always populates this"),
        train_fitness: model.fitness,
    })
}

fn maybe_cache(
    cached: &mut Vec<CachedCandidate>,
    creature: &Creature,
    tree: &PipelineTree,
    train_pkg: &DataPackage,
    base_config: &RunConfig,
    rng: &mut StdRng,
) -> EngineResult<()> {
    let improves_best = cached
        .iter()
        .map(|c| c.train_fitness)
        .fold(f64::INFINITY, f64::min)
        > creature.fitness;
    if creature.fitness <= CACHE_THRESHOLD || improves_best {
        cached.push(materialize_candidate(creature, tree, train_pkg, base_config, rng)?);
    }
    Ok(())
}

/// Walk `population[position]` for both halves of a shuffled split,
/// cross with single-point-per-position inheritance, mutate, and retry on
/// duplicates (escalating the mutation rate after too many in a row).
fn produce_offspring(
    population: &[Creature],
    tree: &PipelineTree,
    base_mutation_rate: f64,
    target_count: usize,
    rng: &mut StdRng,
) -> EngineResult<Vec<Vec<usize>>> {
    let mut shuffled: Vec<&Creature> = population.iter().collect();
    shuffled.shuffle(rng);
    let half = (shuffled.len() / 2).max(1);
    let (first_half, second_half) = shuffled.split_at(half.min(shuffled.len()));
    let parent_a = best_of(first_half);
    let parent_b = best_of(second_half).or(parent_a);

    let (Some(parent_a), Some(parent_b)) = (parent_a, parent_b) else {
        return Ok(Vec::new());
    };

    let mut offspring = Vec::with_capacity(target_count);
    let mut consecutive_duplicates = 0usize;
    let mut mutation_rate = base_mutation_rate;

    while offspring.len() < target_count {
        let child = crossover(&parent_a.path, &parent_b.path, tree, mutation_rate, rng);

        if !tree.is_valid_path(&child) {
            return Err(EngineError::PipelineInfeasible(
                "crossover produced a path not present in the pipeline tree".to_string(),
            ));
        }

        if population.iter().any(|c| c.path == child) || offspring.contains(&child) {
            consecutive_duplicates += 1;
            if consecutive_duplicates >= target_count {
                mutation_rate = DUPLICATE_MUTATION_RATE;
            }
            continue;
        }

        consecutive_duplicates = 0;
        offspring.push(child);
    }

    Ok(offspring)
}

fn best_of<'a>(group: &[&'a Creature]) -> Option<&'a Creature> {
    group
        .iter()
        .min_by(|a, b| a.fitness.partial_cmp(&b.fitness).unwrap_or(std::cmp::Ordering::Equal))
        .copied()
}

fn crossover(parent_a: &[usize], parent_b: &[usize], tree: &PipelineTree, mutation_rate: f64, rng: &mut StdRng) -> Vec<usize> {
    let max_len = parent_a.len().max(parent_b.len());
    let mut child = Vec::new();
    let mut current = PipelineTree::ROOT;

    for i in 0..max_len {
        let gene = match (parent_a.get(i), parent_b.get(i)) {
            (Some(&a), Some(&b)) => {
                if rng.gen_bool(0.5) {
                    a
                } else {
                    b
                }
            }
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };

        let gene = if rng.gen_bool(mutation_rate.clamp(0.0, 1.0)) {
            let siblings = &tree.node(current).children;
            if siblings.is_empty() {
                gene
            } else {
                siblings[rng.gen_range(0..siblings.len())]
            }
        } else {
            gene
        };

        if !tree.node(current).children.contains(&gene) || tree.node(gene).kind == NodeKind::AddedLeaf {
            break;
        }

        child.push(gene);
        current = gene;
    }

    child
}

/// Run only the feature-space actions (FeatureSelection, PCA) of `actions`
/// against `pkg`, in order — oversampling/undersampling/isolation-forest
/// must never touch validation data.
fn apply_feature_space_actions(actions_list: &[PreprocessingAction], pkg: &DataPackage, rng: &mut StdRng) -> EngineResult<DataPackage> {
    let mut current = pkg.clone();
    for action in actions_list {
        if actions::is_feature_space_action(action) {
            current = actions::run_action(action, &current, rng)?;
        }
    }
    Ok(current)
}

fn emit(
    progress: Option<&ProgressCallback>,
    fold_index: Option<usize>,
    stage: SearchStage,
    fraction: f64,
    message: &str,
    population: &[Creature],
) {
    let Some(callback) = progress else { return };
    let best_fitness = population
        .iter()
        .map(|c| c.fitness)
        .fold(f64::INFINITY, f64::min);
    callback(ProgressUpdate {
        stage,
        progress: fraction.clamp(0.0, 1.0),
        message: message.to_string(),
        fold_index,
        best_fitness: if best_fitness.is_finite() { Some(best_fitness) } else { None },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use automl_data::config::TreeConfig;
    use automl_data::tabular::Header;
    use automl_data::TabularData;
    use rand::SeedableRng;

    fn fixture() -> DataPackage {
        let fheader = Header::new(vec!["f1".into(), "f2".into()]).unwrap();
        let mut frows = Vec::new();
        let mut lrows = Vec::new();
        for i in 0..60 {
            let key = format!("s{i}/Scan-1");
            let label = if i < 30 { "low" } else { "high" };
            frows.push((key.clone(), vec![(i as f64).to_string(), (60 - i).to_string()]));
            lrows.push((key, vec![label.to_string()]));
        }
        let fdb = TabularData::new(fheader, frows).unwrap();
        let lheader = Header::new(vec!["label".into()]).unwrap();
        let ldb = TabularData::new(lheader, lrows).unwrap();
        DataPackage::new(fdb, ldb, "label").unwrap()
    }

    #[test]
    fn search_produces_a_validated_best_candidate() {
        let pkg = fixture();
        let tree_config = TreeConfig {
            max_algorithm_repetability: 1,
            max_tree_depth: 2,
            pool: vec!["FeatureSelection".into(), "PCA".into()],
        };
        let tree = crate::pipeline_tree::build_tree(&tree_config);
        let base_config = RunConfig::builder()
            .max_tree_depth(2)
            .pool(tree_config.pool.clone())
            .offspring_count(4)
            .iteration_count(2)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let cancellation = CancellationToken::new();

        let outcome = run_search(&tree, &pkg, &pkg, &base_config, &mut rng, &cancellation, None, Some(0)).unwrap();
        assert!(outcome.best_validation_fitness.is_finite());
        assert!(!outcome.cached_candidates.is_empty());
    }

    #[test]
    fn crossover_always_yields_a_valid_tree_path() {
        let tree_config = TreeConfig {
            max_algorithm_repetability: 2,
            max_tree_depth: 3,
            pool: vec!["FeatureSelection".into(), "Oversampling".into()],
        };
        let tree = crate::pipeline_tree::build_tree(&tree_config);
        let mut rng = StdRng::seed_from_u64(9);
        let a = tree.random_path(&mut rng);
        let b = tree.random_path(&mut rng);
        for _ in 0..20 {
            let child = crossover(&a, &b, &tree, 0.3, &mut rng);
            assert!(tree.is_valid_path(&child));
        }
    }
}
