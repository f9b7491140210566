//! CLI entry point for the AutoML pipeline search engine.

use anyhow::{anyhow, Context, Result};
use automl_core::report;
use automl_core::search;
use automl_core::{build_tree, MeasurementBreakdown, PipelineTree};
use automl_data::{io, CancellationToken, DataPackage, Fold, ProgressUpdate, RunConfig, TabularData};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Which input layout to read from `dataDir`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    /// Load `FDB.csv`/`LDB.csv` and split into folds internally.
    Single,
    /// Load a pre-split `TDS`/`TLD`/`VDS`/`VLD` pair and run a single search.
    Multi,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Evolutionary AutoML pipeline search over binary-classification tabular data"
)]
struct Args {
    /// Directory of `section/key = value` (or bracketed `[Section]`) settings files.
    settings_dir: PathBuf,

    /// Directory holding the input CSVs.
    data_dir: PathBuf,

    /// SINGLE splits FDB/LDB into folds internally; MULTI uses a pre-split TDS/TLD/VDS/VLD pair.
    #[arg(value_enum)]
    mode: RunMode,

    /// Directory to write per-fold and aggregate output artifacts into.
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = RunConfig::from_dir(&args.settings_dir)
        .with_context(|| format!("loading run configuration from {}", args.settings_dir.display()))?;
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output directory {}", args.output_dir.display()))?;

    let tree = build_tree(&config.tree);
    let cancellation = CancellationToken::new();

    let folds = match args.mode {
        RunMode::Single => load_single(&args.data_dir, &config)?,
        RunMode::Multi => vec![load_multi(&args.data_dir)?],
    };

    info!("running {} fold(s)", folds.len());

    // One worker per fold; the search itself stays single-threaded per §5 so
    // nested rayon scopes are never spawned inside this closure.
    let breakdowns: Vec<(usize, MeasurementBreakdown)> = folds
        .par_iter()
        .enumerate()
        .map(|(index, fold)| run_fold(index, fold, &tree, &config, &args.output_dir, &cancellation))
        .collect::<Result<Vec<_>>>()?;

    let overall_path = args.output_dir.join("centralAI_overall_performance_info.csv");
    report::write_overall_performance_info(&overall_path, &breakdowns)
        .with_context(|| format!("writing {}", overall_path.display()))?;

    info!("wrote aggregate performance report to {}", overall_path.display());
    Ok(())
}

fn load_single(data_dir: &Path, config: &RunConfig) -> Result<Vec<Fold>> {
    let fdb = io::read_tabular_data(data_dir.join("FDB.csv"))
        .with_context(|| format!("reading {}", data_dir.join("FDB.csv").display()))?;
    let ldb = io::read_tabular_data(data_dir.join("LDB.csv"))
        .with_context(|| format!("reading {}", data_dir.join("LDB.csv").display()))?;

    let label_name = label_name_of(&ldb)?;
    let package = DataPackage::new(fdb, ldb, label_name).context("building data package")?;

    let mut rng = seed_rng(config.seed, 0);
    automl_data::generate_folds(&package, config.central_ai.fold_count, &mut rng).context("generating folds")
}

fn load_multi(data_dir: &Path) -> Result<Fold> {
    let tds = io::read_tabular_data(data_dir.join("TDS.csv"))
        .with_context(|| format!("reading {}", data_dir.join("TDS.csv").display()))?;
    let tld = io::read_tabular_data(data_dir.join("TLD.csv"))
        .with_context(|| format!("reading {}", data_dir.join("TLD.csv").display()))?;
    let vds = io::read_tabular_data(data_dir.join("VDS.csv"))
        .with_context(|| format!("reading {}", data_dir.join("VDS.csv").display()))?;
    let vld = io::read_tabular_data(data_dir.join("VLD.csv"))
        .with_context(|| format!("reading {}", data_dir.join("VLD.csv").display()))?;

    let label_name = label_name_of(&tld)?;
    let train = DataPackage::new(tds, tld, label_name.clone()).context("building training package")?;
    let validation = DataPackage::new(vds, vld, label_name).context("building validation package")?;

    Ok(Fold { train, validation })
}

/// The label table is always single-column; its one header name is the
/// label column `DataPackage::new` expects.
fn label_name_of(ldb: &TabularData) -> Result<String> {
    ldb.header()
        .names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("label table has no columns"))
}

fn seed_rng(seed: Option<u64>, fold_index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(fold_index as u64)),
        None => StdRng::from_entropy(),
    }
}

fn run_fold(
    index: usize,
    fold: &Fold,
    tree: &PipelineTree,
    config: &RunConfig,
    output_dir: &Path,
    cancellation: &CancellationToken,
) -> Result<(usize, MeasurementBreakdown)> {
    let fold_dir = output_dir.join(format!("fold-{index}"));
    std::fs::create_dir_all(&fold_dir).with_context(|| format!("creating {}", fold_dir.display()))?;

    let mut rng = seed_rng(config.seed, index);
    let progress: automl_data::ProgressCallback = Arc::new(move |update: ProgressUpdate| {
        info!(
            fold = update.fold_index,
            stage = update.stage.as_str(),
            progress = update.progress,
            "{}", update.message
        );
    });

    let outcome = search::run_search(tree, &fold.train, &fold.validation, config, &mut rng, cancellation, Some(&progress), Some(index))
        .with_context(|| format!("fold {index} search failed"))?;

    io::write_tabular_data(fold_dir.join("TDS.csv"), fold.train.fdb())?;
    io::write_tabular_data(fold_dir.join("TLD.csv"), fold.train.ldb())?;
    io::write_tabular_data(fold_dir.join("VDS.csv"), fold.validation.fdb())?;
    io::write_tabular_data(fold_dir.join("VLD.csv"), fold.validation.ldb())?;

    report::write_pipeline_info(fold_dir.join("pipeline_info.txt"), &outcome.best)?;
    report::write_performance_info(fold_dir.join("performance_info.csv"), &outcome.best_validation_breakdown)?;

    info!(fold = index, roc_distance = outcome.best_validation_fitness, "fold complete");
    Ok((index, outcome.best_validation_breakdown))
}
