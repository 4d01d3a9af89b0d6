use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use credeval_core::{
    find_misclassifications, sweep_thresholds, validate_records, DataSource, ErrorCategory,
    EvalConfig, EvalError, Evaluation, EvaluationRun, GroundTruthScorer, HttpScorer,
    JsonDataSource, Scorer,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "credeval", about = "Evaluate credibility scoring against labeled datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a dataset file without scoring anything
    Validate(ValidateArgs),
    /// Score a dataset and compute evaluation metrics
    Run(RunArgs),
    /// Recompute classification metrics across candidate thresholds
    Sweep(SweepArgs),
}

#[derive(Debug, Clone, Parser)]
struct ValidateArgs {
    /// JSON file containing an array of labeled source records
    #[arg(long)]
    data: PathBuf,
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
    /// JSON file containing an array of labeled source records
    #[arg(long)]
    data: PathBuf,

    /// YAML settings file; explicit flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Score at or above which a source is classified manipulative
    #[arg(long)]
    threshold: Option<u8>,

    /// Reliability-diagram bin count
    #[arg(long)]
    bins: Option<usize>,

    /// Scoring calls in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Scorer endpoint (POST {text,url,title}); defaults to the ground-truth stub
    #[arg(long)]
    http_url: Option<String>,

    /// Write the evaluation result JSON to a file
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Record the run in a SQLite history database
    #[arg(long)]
    db: Option<PathBuf>,

    /// Show the N most confident false positives
    #[arg(long)]
    false_positives: Option<usize>,

    /// Show the N most confident false negatives
    #[arg(long)]
    false_negatives: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
struct SweepArgs {
    /// JSON file containing an array of labeled source records
    #[arg(long)]
    data: PathBuf,

    /// Comma-separated candidate thresholds, e.g. 3,6,10
    #[arg(long)]
    thresholds: String,

    /// Scorer endpoint (POST {text,url,title}); defaults to the ground-truth stub
    #[arg(long)]
    http_url: Option<String>,

    /// Scoring calls in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the sweep result JSON to a file
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => validate(args).await,
        Commands::Run(args) => run(args).await,
        Commands::Sweep(args) => sweep(args).await,
    }
}

async fn validate(args: ValidateArgs) -> Result<()> {
    let records = JsonDataSource::new(&args.data).load().await?;
    let report = validate_records(&records);
    println!("{report}");
    if !report.valid {
        anyhow::bail!("dataset failed validation with {} error(s)", report.errors.len());
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EvalConfig::from_yaml(path).await?,
        None => EvalConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(bins) = args.bins {
        config.calibration_bins = bins;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    let threshold = config.threshold;

    let evaluation_run = evaluate(&args.data, args.http_url.clone(), config).await?;
    println!("{}", evaluation_run.result.summary_table());

    if let Some(limit) = args.false_positives {
        print_misclassifications(&evaluation_run, threshold, ErrorCategory::FalsePositive, limit);
    }
    if let Some(limit) = args.false_negatives {
        print_misclassifications(&evaluation_run, threshold, ErrorCategory::FalseNegative, limit);
    }

    if let Some(path) = args.json_out {
        let json = serde_json::to_string_pretty(&evaluation_run.result)?;
        tokio::fs::write(&path, json).await?;
        println!("Wrote result to {}", path.display());
    }

    if let Some(path) = args.db {
        let store = credeval_store::Store::open(&path)?;
        let id = store.record_run(&evaluation_run.result)?;
        println!("Recorded run {} in {}", id, path.display());
    }

    Ok(())
}

async fn sweep(args: SweepArgs) -> Result<()> {
    let thresholds = parse_thresholds(&args.thresholds)?;

    let mut config = EvalConfig::default();
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let evaluation_run = evaluate(&args.data, args.http_url.clone(), config).await?;
    let result = sweep_thresholds(&evaluation_run.scored, &thresholds);
    println!("{}", result.sweep_table());

    if let Some(path) = args.json_out {
        let json = serde_json::to_string_pretty(&result)?;
        tokio::fs::write(&path, json).await?;
        println!("Wrote sweep to {}", path.display());
    }

    Ok(())
}

async fn evaluate(
    data: &PathBuf,
    http_url: Option<String>,
    config: EvalConfig,
) -> Result<EvaluationRun> {
    let eval = Evaluation::builder()
        .data_source(Arc::new(JsonDataSource::new(data)))
        .scorer(build_scorer(http_url))
        .config(config)
        .build()?;

    match eval.run().await {
        Ok(run) => Ok(run),
        Err(EvalError::DatasetValidation(report)) => {
            eprintln!("{report}");
            anyhow::bail!("dataset failed validation with {} error(s)", report.errors.len())
        }
        Err(err) => Err(err.into()),
    }
}

fn build_scorer(http_url: Option<String>) -> Arc<dyn Scorer> {
    match http_url {
        Some(url) => Arc::new(HttpScorer::new(url)),
        None => {
            info!("No --http-url given; falling back to the ground-truth stub scorer");
            Arc::new(GroundTruthScorer)
        }
    }
}

fn parse_thresholds(list: &str) -> Result<Vec<u8>> {
    list.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<u8>()
                .map_err(|_| anyhow::anyhow!("invalid threshold '{part}' (expected 0-255)"))
        })
        .collect()
}

fn print_misclassifications(
    run: &EvaluationRun,
    threshold: u8,
    category: ErrorCategory,
    limit: usize,
) {
    let heading = match category {
        ErrorCategory::FalsePositive => "False positives (credible scored as manipulative)",
        ErrorCategory::FalseNegative => "False negatives (manipulative scored as credible)",
    };
    println!("{heading}:");

    let found = find_misclassifications(&run.scored, threshold, category, limit);
    if found.is_empty() {
        println!("  none");
        return;
    }
    for m in found {
        let truth_score = m
            .ground_truth_score
            .map(|s| format!(" (expert score {s})"))
            .unwrap_or_default();
        println!(
            "  [{}] {}: predicted {} ({}), ground truth {}{}",
            m.index, m.url, m.predicted_score, m.predicted_label, m.ground_truth_label, truth_score
        );
    }
    println!();
}
