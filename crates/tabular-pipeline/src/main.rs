//! CLI entry point for the tabular pipeline client.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabular_pipeline::job::{JobStatus, ProcessingService};
use tabular_pipeline::pipeline::{
    CastType, CleanerPatch, CleanerStrategy, ColumnSelection, EncoderPatch, EncoderStrategy,
    ScalerPatch, ScalerStrategy, StepKind,
};
use tabular_pipeline::{
    ClientConfig, Dataset, DatasetPreview, HttpProcessingService, JobController, JobId, JobResult,
    PipelineModel,
};
use tracing::{debug, error, info, warn};

/// CLI-compatible cleaner strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCleanerStrategy {
    /// Fill missing values with the column mean
    Mean,
    /// Fill missing values with the column median
    Median,
    /// Fill missing values with the most frequent value
    Mode,
    /// Fill missing values with --fill-value
    Constant,
}

impl From<CliCleanerStrategy> for CleanerStrategy {
    fn from(cli: CliCleanerStrategy) -> Self {
        match cli {
            CliCleanerStrategy::Mean => CleanerStrategy::Mean,
            CliCleanerStrategy::Median => CleanerStrategy::Median,
            CliCleanerStrategy::Mode => CleanerStrategy::Mode,
            CliCleanerStrategy::Constant => CleanerStrategy::Constant,
        }
    }
}

/// CLI-compatible encoder strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncoderStrategy {
    /// One binary column per category
    Onehot,
    /// Integer label per category
    Label,
    /// Ranks from --ordinal-mapping
    Ordinal,
}

impl From<CliEncoderStrategy> for EncoderStrategy {
    fn from(cli: CliEncoderStrategy) -> Self {
        match cli {
            CliEncoderStrategy::Onehot => EncoderStrategy::OneHot,
            CliEncoderStrategy::Label => EncoderStrategy::Label,
            CliEncoderStrategy::Ordinal => EncoderStrategy::Ordinal,
        }
    }
}

/// CLI-compatible scaler strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScalerStrategy {
    /// Zero mean, unit variance
    Standard,
    /// Rescale into [0, 1]
    Minmax,
    /// Median and IQR based scaling
    Robust,
}

impl From<CliScalerStrategy> for ScalerStrategy {
    fn from(cli: CliScalerStrategy) -> Self {
        match cli {
            CliScalerStrategy::Standard => ScalerStrategy::Standard,
            CliScalerStrategy::Minmax => ScalerStrategy::MinMax,
            CliScalerStrategy::Robust => ScalerStrategy::Robust,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Compose CSV preprocessing pipelines and run them on a processing service",
    long_about = "Compose CSV preprocessing pipelines and run them on a processing service.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  BACKEND_URL         Processing service base URL (default http://localhost:8000)\n  \
                  POLL_INTERVAL_MS    Interval between job status checks (default 2000)\n\n\
                  EXAMPLES:\n  \
                  # Inspect a dataset\n  \
                  tabular-pipeline preview data.csv\n\n  \
                  # Show the configuration that would be submitted\n  \
                  tabular-pipeline config data.csv --cleaner median --scaler minmax\n\n  \
                  # Run with a custom order and casts\n  \
                  tabular-pipeline run data.csv --order scaler,cleaner,typecaster,encoder --cast age=int"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Processing service base URL (overrides BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Interval between job status checks in milliseconds (overrides POLL_INTERVAL_MS)
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable text
    ///
    /// Disables all logs so stdout carries only JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show headers, sample rows and the total row count of a CSV file
    Preview {
        /// Path to the CSV file
        file: PathBuf,

        /// Number of sample rows to show
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Print the pipeline configuration that would be submitted
    Config {
        /// Path to the CSV file
        file: PathBuf,

        #[command(flatten)]
        steps: StepArgs,
    },

    /// Submit a CSV file and track the job until it finishes
    Run {
        /// Path to the CSV file
        file: PathBuf,

        #[command(flatten)]
        steps: StepArgs,

        /// Directory the transformed dataset is saved to
        #[arg(short, long, default_value = "./outputs")]
        output: PathBuf,

        /// Do not download the transformed dataset
        #[arg(long)]
        no_download: bool,
    },

    /// Show the status of a submitted job
    Status {
        /// Job identifier returned on submission
        job_id: String,
    },

    /// Download the transformed dataset of a finished job
    Download {
        /// Job identifier returned on submission
        job_id: String,

        /// Directory the transformed dataset is saved to
        #[arg(short, long, default_value = "./outputs")]
        output: PathBuf,
    },
}

/// Step configuration options shared by `config` and `run`.
#[derive(Args, Debug, Default)]
struct StepArgs {
    /// Step execution order, e.g. "scaler,cleaner,typecaster,encoder"
    #[arg(long, value_delimiter = ',')]
    order: Vec<String>,

    /// Strategy for imputing missing values
    #[arg(long, value_enum)]
    cleaner: Option<CliCleanerStrategy>,

    /// Fill value for the constant cleaner
    #[arg(long)]
    fill_value: Option<String>,

    /// Remove duplicate rows before cleaning
    #[arg(long)]
    remove_duplicates: bool,

    /// Columns the cleaner applies to (default: all)
    #[arg(long, value_delimiter = ',')]
    cleaner_columns: Vec<String>,

    /// Cast a column, e.g. "age=int" (int, float, bool, str). Repeatable.
    #[arg(long = "cast", value_name = "COLUMN=TYPE")]
    casts: Vec<String>,

    /// Strategy for encoding categorical columns
    #[arg(long, value_enum)]
    encoder: Option<CliEncoderStrategy>,

    /// Ordinal mapping as JSON text, or @path to read it from a file
    #[arg(long)]
    ordinal_mapping: Option<String>,

    /// Columns the encoder applies to (default: all)
    #[arg(long, value_delimiter = ',')]
    encoder_columns: Vec<String>,

    /// Strategy for scaling numeric columns
    #[arg(long, value_enum)]
    scaler: Option<CliScalerStrategy>,

    /// Columns the scaler applies to (default: all)
    #[arg(long, value_delimiter = ',')]
    scaler_columns: Vec<String>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = client_config(&cli)?;
    debug!("Using processing service at {}", config.base_url);

    match &cli.command {
        Command::Preview { file, rows } => {
            run_preview(&cli, file, rows.unwrap_or(config.preview_rows))
        }
        Command::Config { file, steps } => run_config(file, steps),
        Command::Run {
            file,
            steps,
            output,
            no_download,
        } => run_job(&cli, &config, file, steps, output, *no_download).await,
        Command::Status { job_id } => run_status(&cli, &config, job_id).await,
        Command::Download { job_id, output } => run_download(&config, job_id, output).await,
    }
}

/// Environment configuration with command-line overrides applied.
fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let env = ClientConfig::from_env().context("Invalid environment configuration")?;

    let config = ClientConfig::builder()
        .base_url(cli.backend_url.clone().unwrap_or(env.base_url))
        .poll_interval_ms(cli.poll_interval_ms.unwrap_or(env.poll_interval_ms))
        .request_timeout_secs(env.request_timeout_secs)
        .preview_rows(env.preview_rows)
        .build()?;

    Ok(config)
}

/// Print a dataset preview.
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_preview(cli: &Cli, file: &Path, rows: usize) -> Result<()> {
    let dataset = Dataset::from_path(file)?;
    let preview = DatasetPreview::parse_with_limit(&dataset.contents, rows)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DATASET PREVIEW: {}", dataset.file_name);
    println!("{}\n", "=".repeat(80));

    println!("  Columns: {}", preview.column_count());
    println!("  Rows: {}", preview.total_rows);
    println!();

    let widths: Vec<usize> = (0..preview.column_count())
        .map(|c| {
            (0..preview.rows.len())
                .map(|r| preview.cell(r, c).chars().count())
                .chain(std::iter::once(preview.headers[c].chars().count()))
                .max()
                .unwrap_or(0)
                .min(24)
        })
        .collect();

    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", truncate_str(cell, *width), width = width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!(
        "{}",
        format_row(preview.headers.iter().map(String::as_str).collect())
    );
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for r in 0..preview.rows.len() {
        println!(
            "{}",
            format_row((0..preview.column_count()).map(|c| preview.cell(r, c)).collect())
        );
    }

    if preview.total_rows > preview.rows.len() {
        println!(
            "\n  ... {} more rows",
            preview.total_rows - preview.rows.len()
        );
    }
    println!();

    Ok(())
}

/// Print the wire configuration for a dataset.
fn run_config(file: &Path, steps: &StepArgs) -> Result<()> {
    let (_, model) = load_model(file, steps)?;
    let wire = model.to_wire_config()?;
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}

/// Submit a dataset and follow the job until it reaches a terminal status.
async fn run_job(
    cli: &Cli,
    config: &ClientConfig,
    file: &Path,
    steps: &StepArgs,
    output: &Path,
    no_download: bool,
) -> Result<()> {
    let (dataset, model) = load_model(file, steps)?;
    let wire = model.to_wire_config()?;

    for step in model.steps() {
        info!("{}: {}", step.kind().display_name(), step.summary());
    }

    let service: Arc<dyn ProcessingService> = Arc::new(HttpProcessingService::new(config)?);
    let controller = JobController::builder()
        .service(service)
        .poll_interval(config.poll_interval())
        .on_progress(|update| match update.status {
            JobStatus::Failed => error!("{}", update.message),
            _ => info!("{}", update.message),
        })
        .build()?;

    let mut updates = controller.subscribe();
    let snapshot = controller.submit(&dataset, &wire).await;
    if let Some(job_id) = &snapshot.job_id {
        info!("Job id: {}", job_id);
    }

    let snapshot = loop {
        let current = updates.borrow_and_update().clone();
        if current.is_terminal() {
            break current;
        }

        tokio::select! {
            changed = updates.changed() => changed?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping status checks");
                controller.teardown();
                bail!("Interrupted while job was {}", current.status);
            }
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    if snapshot.status == JobStatus::Failed {
        bail!(
            "Job failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        );
    }

    if no_download {
        return Ok(());
    }

    let result = controller.download_result().await?;
    let path = result.save(output)?;
    report_result(cli, &result, &path)
}

/// Print the status of a job.
async fn run_status(cli: &Cli, config: &ClientConfig, job_id: &str) -> Result<()> {
    let service = HttpProcessingService::new(config)?;
    let remote = service.status(&JobId::from(job_id)).await?;

    if cli.json {
        let value = serde_json::json!({
            "job_id": job_id,
            "status": remote.status,
            "error": remote.error,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Job {}: {}", job_id, remote.status);
    println!("  {}", remote.status.display_message());
    if let Some(error) = &remote.error {
        println!("  Error: {}", error);
    }
    Ok(())
}

/// Download a job result into `output`.
async fn run_download(config: &ClientConfig, job_id: &str, output: &Path) -> Result<()> {
    let service = HttpProcessingService::new(config)?;
    let job_id = JobId::from(job_id);
    let csv = service.download(&job_id).await?;

    let result = JobResult::new(job_id, csv);
    let path = result.save(output)?;
    println!("Saved {}", path.display());
    Ok(())
}

fn report_result(cli: &Cli, result: &JobResult, path: &Path) -> Result<()> {
    if cli.json {
        return Ok(());
    }

    match result.to_dataframe() {
        Ok(df) => {
            println!("\n{}", "=".repeat(80));
            println!("RESULT: {} rows x {} columns", df.height(), df.width());
            println!("{}\n", "=".repeat(80));
            println!("{}", df.head(Some(10)));
        }
        Err(e) => warn!("Could not load result for display: {}", e),
    }

    println!("\nSaved {}", path.display());
    Ok(())
}

/// Read a dataset and build the pipeline model from the step options.
fn load_model(file: &Path, steps: &StepArgs) -> Result<(Dataset, PipelineModel)> {
    let dataset = Dataset::from_path(file)?;
    let preview = dataset.preview()?;
    info!(
        "Loaded {}: {} columns, {} rows",
        dataset.file_name,
        preview.column_count(),
        preview.total_rows
    );

    let mut model = PipelineModel::new();
    model.load_preview(&preview);
    apply_step_args(&mut model, steps)?;

    Ok((dataset, model))
}

fn apply_step_args(model: &mut PipelineModel, steps: &StepArgs) -> Result<()> {
    if !steps.order.is_empty() {
        apply_order(model, &steps.order)?;
    }

    let mut cleaner = CleanerPatch::default().remove_duplicate_rows(steps.remove_duplicates);
    if let Some(strategy) = steps.cleaner {
        cleaner = cleaner.strategy(strategy.into());
    }
    if let Some(value) = &steps.fill_value {
        cleaner = cleaner.fill_value(value.clone());
    }
    model.set_step_config(cleaner);

    for cast in &steps.casts {
        let (column, type_name) = cast
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --cast '{}': expected COLUMN=TYPE", cast))?;
        let column = column.trim();
        let cast_type = CastType::parse(type_name)
            .ok_or_else(|| anyhow!("Invalid cast type '{}' for column '{}'", type_name, column))?;
        if !model.set_column_type(column, cast_type) {
            warn!("Ignoring cast for unknown column '{}'", column);
        }
    }

    let mut encoder = EncoderPatch::default();
    if let Some(strategy) = steps.encoder {
        encoder = encoder.strategy(strategy.into());
    }
    if let Some(mapping) = &steps.ordinal_mapping {
        encoder = encoder.ordinal_mapping(read_mapping(mapping)?);
    }
    model.set_step_config(encoder);

    if let Some(strategy) = steps.scaler {
        model.set_step_config(ScalerPatch::default().strategy(strategy.into()));
    }

    for (kind, columns) in [
        (StepKind::Cleaner, &steps.cleaner_columns),
        (StepKind::Encoder, &steps.encoder_columns),
        (StepKind::Scaler, &steps.scaler_columns),
    ] {
        if columns.is_empty() {
            continue;
        }
        for column in columns
            .iter()
            .filter(|c| !model.headers().iter().any(|h| h == c.trim()))
        {
            warn!("Ignoring unknown {} column '{}'", kind, column);
        }
        model.set_columns(kind, ColumnSelection::new(columns.iter().map(|c| c.trim())));
    }

    Ok(())
}

/// Reorder the model's steps to match `names` using single moves.
fn apply_order(model: &mut PipelineModel, names: &[String]) -> Result<()> {
    let kinds = names
        .iter()
        .map(|name| StepKind::parse(name).ok_or_else(|| anyhow!("Unknown step '{}'", name)))
        .collect::<Result<Vec<_>>>()?;

    let mut sorted = kinds.clone();
    sorted.sort_by_key(|k| k.as_str());
    sorted.dedup();
    if kinds.len() != StepKind::ALL.len() || sorted.len() != kinds.len() {
        bail!(
            "--order must list each of cleaner, typecaster, encoder, scaler exactly once"
        );
    }

    for (position, kind) in kinds.into_iter().enumerate() {
        let occupant = model.order()[position];
        model.move_step(kind, occupant);
    }
    Ok(())
}

/// Mapping text, or the contents of the file named after `@`.
fn read_mapping(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ordinal mapping from {}", path)),
        None => Ok(value.to_string()),
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        format!("{}...", s.chars().take(max_len - 3).collect::<String>())
    }
}
