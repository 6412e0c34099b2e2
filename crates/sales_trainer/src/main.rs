//! salescast CLI
//!
//! `train` fits and persists every model family, `predict` scores one title
//! with persisted artifacts, `report` prints the last training report.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use salescast_core::{load_csv, predict_record, ArtifactStore, LeakagePolicy, ModelFamily, SalesRecord};
use salescast_trainer::config::ConfigManager;
use salescast_trainer::report::{TrainingReport, REPORT_NAME};
use salescast_trainer::TrainingPipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "salescast")]
#[command(author = "salescast Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Game sales regression: training, selection and prediction", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train every model family and persist artifacts
    Train(TrainArgs),
    /// Predict global sales for one title
    Predict(PredictArgs),
    /// Print the persisted training report
    Report {
        /// Artifact directory written by `train`
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Input sales CSV
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed for the split, folds, search and forests
    #[arg(long)]
    seed: Option<u64>,

    /// Number of sampled boosting combinations
    #[arg(long)]
    iterations: Option<usize>,

    /// Cross-validation folds
    #[arg(long)]
    folds: Option<usize>,

    /// Rows the derived group statistics are fitted on
    #[arg(long, value_enum)]
    leakage: Option<Leakage>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Leakage {
    TrainOnly,
    WholeTable,
}

impl From<Leakage> for LeakagePolicy {
    fn from(value: Leakage) -> Self {
        match value {
            Leakage::TrainOnly => LeakagePolicy::TrainOnly,
            Leakage::WholeTable => LeakagePolicy::WholeTable,
        }
    }
}

#[derive(clap::Args, Debug)]
struct PredictArgs {
    /// Artifact directory written by `train`
    #[arg(short, long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// `best` or a family name (gbdt, random_forest, extra_trees)
    #[arg(short, long, default_value = "best")]
    model: String,

    #[arg(long, default_value = "")]
    name: String,
    #[arg(long)]
    platform: String,
    #[arg(long)]
    genre: String,
    #[arg(long)]
    publisher: String,
    #[arg(long)]
    year: i32,
    #[arg(long, default_value = "0")]
    na_sales: f64,
    #[arg(long, default_value = "0")]
    eu_sales: f64,
    #[arg(long, default_value = "0")]
    jp_sales: f64,
    #[arg(long, default_value = "0")]
    other_sales: f64,
}

fn init_logging(level: &str, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {level}"))?
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => train(args, cli.verbose),
        Command::Predict(args) => {
            init_logging("info", cli.verbose)?;
            predict(args)
        }
        Command::Report { artifacts } => {
            init_logging("info", cli.verbose)?;
            report(artifacts)
        }
    }
}

fn train(args: TrainArgs, verbose: bool) -> Result<()> {
    let mut manager = ConfigManager::new();
    if let Some(path) = &args.config {
        manager.load_from_file(path)?;
    }
    manager.load_from_env()?;

    if let Some(seed) = args.seed {
        manager.config_mut().seed = seed;
        manager.set_override("seed", seed);
    }
    if let Some(output) = &args.output {
        manager.config_mut().artifacts.directory = output.clone();
        manager.set_override("artifacts.directory", output.display());
    }
    if let Some(iterations) = args.iterations {
        manager.config_mut().search.iterations = iterations;
        manager.set_override("search.iterations", iterations);
    }
    if let Some(folds) = args.folds {
        manager.config_mut().search.folds = folds;
        manager.set_override("search.folds", folds);
    }
    if let Some(leakage) = args.leakage {
        manager.config_mut().features.leakage_policy = leakage.into();
        manager.set_override("features.leakage_policy", format!("{leakage:?}"));
    }
    manager.validate().context("Invalid configuration")?;

    init_logging(&manager.config().logging.level, verbose)?;
    info!("salescast trainer v{}", salescast_trainer::VERSION);
    info!("═══════════════════════════════════════════");
    for (key, value) in manager.overrides() {
        info!("  override {} = {}", key, value);
    }
    let config = manager.into_config();
    info!("Loading dataset from: {}", args.input.display());
    let ingest = load_csv(&args.input).context("Failed to load dataset")?;

    let store = ArtifactStore::open(config.artifacts.directory.clone())
        .context("Failed to create artifact directory")?;
    let saved = TrainingPipeline::new(config)
        .run_and_save(&ingest, &store)
        .context("Training failed")?;

    info!("═══════════════════════════════════════════");
    for artifact in &saved.artifacts {
        info!(
            "  {} → {} ({} bytes)",
            artifact.name,
            artifact.path.display(),
            artifact.size_bytes
        );
    }
    info!("Report: {}", saved.report_path.display());
    Ok(())
}

fn predict(args: PredictArgs) -> Result<()> {
    let store = ArtifactStore::open(args.artifacts.clone())?;
    let family = if args.model.eq_ignore_ascii_case("best") {
        let report: TrainingReport = store
            .load_json(REPORT_NAME)
            .context("Failed to load training report")?;
        match report.best {
            Some(family) => family,
            None => bail!("training report names no best model"),
        }
    } else {
        args.model.parse::<ModelFamily>()?
    };

    let preprocessor = store
        .load_preprocessor()
        .context("Failed to load preprocessor")?;
    let derived = store
        .load_derived_features()
        .context("Failed to load derived-feature statistics")?;
    let model = store
        .load_model(family)
        .with_context(|| format!("Failed to load {family} model"))?;

    let record = SalesRecord {
        name: args.name,
        platform: args.platform,
        genre: args.genre,
        publisher: args.publisher,
        year: args.year,
        na_sales: args.na_sales,
        eu_sales: args.eu_sales,
        jp_sales: args.jp_sales,
        other_sales: args.other_sales,
        global_sales: 0.0,
    };
    let prediction = predict_record(&preprocessor, &derived, &model, &record)?;

    info!("Model: {}", family.display_name());
    println!("{prediction:.4}");
    Ok(())
}

fn report(artifacts: PathBuf) -> Result<()> {
    let store = ArtifactStore::open(artifacts)?;
    let report: TrainingReport = store
        .load_json(REPORT_NAME)
        .context("Failed to load training report")?;

    println!(
        "Trained {} (seed {}, {:?} features)",
        report.created_at.to_rfc3339(),
        report.seed,
        report.leakage_policy
    );
    println!(
        "Rows: {} accepted, {} skipped, {} train / {} eval",
        report.ingest.accepted,
        report.ingest.skipped,
        report.split.train_rows,
        report.split.eval_rows
    );
    for model in &report.models {
        let marker = if report.best == Some(model.family) { "*" } else { " " };
        println!(
            "{} {:<24} RMSE {:>10.4}  R² {:>8.4}",
            marker,
            model.family.display_name(),
            model.rmse,
            model.r2
        );
    }
    for failure in &report.failures {
        println!("! {:<24} {}", failure.family.display_name(), failure.error);
    }
    Ok(())
}
