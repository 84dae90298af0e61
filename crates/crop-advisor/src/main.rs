//! CLI entry point for the crop advisor.

use anyhow::{Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand};
use crop_advisor::{Advisor, ConfigOverrides, CropRecommendationForm, Messages};
use crop_learning::{ProgressCallback, ProgressUpdate};
use dotenv::dotenv;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Crop recommendation from soil type, season and rainfall",
    long_about = "Train a decision tree on a crop dataset and recommend a crop for field conditions.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  CROP_ADVISOR_HOME    Base directory holding data/crop_dataset.csv and the model files\n  \
                  RUST_LOG             Overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  # Install a dataset and train\n  \
                  crop-advisor import-dataset crops.csv\n  \
                  crop-advisor train\n\n  \
                  # Ask for a recommendation\n  \
                  crop-advisor predict --soil clay --season winter --rainfall low\n  \
                  crop-advisor predict --queries fields.csv\n\n  \
                  # Machine-readable status\n  \
                  crop-advisor --json status"
)]
struct Cli {
    /// Base directory for the dataset and model artifacts
    #[arg(long, global = true, env = "CROP_ADVISOR_HOME")]
    base_dir: Option<PathBuf>,

    /// JSON configuration file (paths and tree parameters)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the result as JSON on stdout; disables logging
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the model on the dataset and replace both artifacts
    Train(TrainArgs),

    /// Recommend a crop for the given conditions
    Predict(PredictArgs),

    /// Show whether a model and dataset are present
    Status,

    /// Copy a CSV into place as the training dataset
    ImportDataset {
        /// CSV with soil_type, season, rainfall_level and crop columns
        csv: PathBuf,
    },

    /// List the accepted values for each field
    Choices,

    /// Crop frequency in the current dataset
    Insights {
        /// Print the table as CSV
        #[arg(long)]
        csv: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct TrainArgs {
    /// Train on this CSV instead of the dataset in the base directory
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Random seed for the decision tree
    #[arg(long)]
    seed: Option<u64>,

    /// Limit tree depth (unbounded by default)
    #[arg(long)]
    max_depth: Option<u16>,
}

#[derive(ClapArgs, Debug)]
struct PredictArgs {
    #[arg(long, required_unless_present = "queries")]
    soil: Option<String>,

    #[arg(long, required_unless_present = "queries")]
    season: Option<String>,

    #[arg(long, required_unless_present = "queries")]
    rainfall: Option<String>,

    /// CSV with soil_type, season and rainfall_level columns; one crop per row
    #[arg(long, conflicts_with_all = ["soil", "season", "rainfall"])]
    queries: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout holds only JSON.
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
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    // .env first so CROP_ADVISOR_HOME can come from it
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    let mut overrides = ConfigOverrides {
        base_dir: cli.base_dir.clone(),
        config_file: cli.config.clone(),
        ..Default::default()
    };
    if let Command::Train(ref args) = cli.command {
        overrides.dataset_path = args.dataset.clone();
        overrides.random_seed = args.seed;
        overrides.max_depth = args.max_depth;
    }
    let config = overrides.resolve()?;
    debug!("Using configuration: {config:?}");

    let mut advisor = Advisor::new(config);
    if !cli.quiet && !cli.json {
        let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage,
                update.message
            );
        });
        advisor = advisor.with_progress(callback);
    }

    match cli.command {
        Command::Train(_) => run_train(&advisor, cli.json),
        Command::Predict(ref args) => run_predict(&advisor, args, cli.json),
        Command::Status => run_status(&advisor, cli.json),
        Command::ImportDataset { ref csv } => run_import(&advisor, csv, cli.json),
        Command::Choices => run_choices(&advisor, cli.json),
        Command::Insights { csv } => run_insights(&advisor, csv, cli.json),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_messages(messages: &Messages) {
    for message in messages {
        println!("{message}");
    }
}

fn run_train(advisor: &Advisor, json: bool) -> Result<()> {
    let outcome = advisor.retrain_model();
    if json {
        print_json(&outcome)?;
    } else {
        print_messages(&outcome.messages);
        if let Some(ref result) = outcome.value {
            println!();
            println!("Training id:  {}", result.training_id);
            println!("Rows:         {}", result.rows);
            println!("Crops:        {}", result.classes.join(", "));
            println!("Random seed:  {}", result.random_seed);
            println!("Model:        {}", result.model_path.display());
            println!("Labels:       {}", result.label_path.display());
            println!("Duration:     {}ms", result.duration_ms);
        }
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("Training failed"))
    }
}

/// A failed prediction still exits zero; the message is the answer.
fn run_predict(advisor: &Advisor, args: &PredictArgs, json: bool) -> Result<()> {
    if let Some(ref queries) = args.queries {
        return run_predict_batch(advisor, queries, json);
    }

    let form = CropRecommendationForm::new(
        args.soil.as_deref().unwrap_or_default(),
        args.season.as_deref().unwrap_or_default(),
        args.rainfall.as_deref().unwrap_or_default(),
    );
    let page = advisor.crop_suggestion(&form);

    if json {
        return print_json(&page);
    }

    for (field, errors) in page.form_errors.iter() {
        for error in errors {
            println!("{field}: {error}");
        }
    }
    print_messages(&page.messages);
    match page.prediction {
        Some(ref crop) => println!("Recommended crop: {crop}"),
        None => println!("No prediction available."),
    }
    Ok(())
}

fn run_predict_batch(advisor: &Advisor, queries: &std::path::Path, json: bool) -> Result<()> {
    let outcome = advisor.crop_suggestions(queries);
    if json {
        return print_json(&outcome);
    }

    print_messages(&outcome.messages);
    for suggestion in outcome.value.iter().flatten() {
        println!("{} -> {}", suggestion.query, suggestion.crop);
    }
    Ok(())
}

fn run_status(advisor: &Advisor, json: bool) -> Result<()> {
    let status = advisor.model_status();
    if json {
        return print_json(&status);
    }

    println!(
        "Dataset: {} ({})",
        status.dataset_path.display(),
        if status.dataset_present { "present" } else { "missing" }
    );
    println!(
        "Model:   {} ({})",
        status.artifacts.model_path.display(),
        if status.model_loaded { "present" } else { "missing" }
    );
    println!("Labels:  {}", status.artifacts.label_path.display());
    if let Some((ref model, ref labels)) = status.artifacts.headers {
        println!("Training id: {}", model.training_id);
        println!("Trained at:  {}", model.trained_at.to_rfc3339());
        if labels.training_id != model.training_id {
            println!("Warning: label encoder is from training run {}", labels.training_id);
        }
    }
    if let Some(ref problem) = status.artifacts.problem {
        println!("Problem: {problem}");
    }
    Ok(())
}

/// Like a failed prediction, a failed import is reported and exits zero.
fn run_import(advisor: &Advisor, csv: &std::path::Path, json: bool) -> Result<()> {
    let outcome = advisor.import_dataset(csv);
    if json {
        return print_json(&outcome);
    }
    print_messages(&outcome.messages);
    Ok(())
}

fn run_choices(advisor: &Advisor, json: bool) -> Result<()> {
    let fields = advisor.choices();
    if json {
        return print_json(&fields);
    }
    for field in &fields {
        let values: Vec<&str> = field.choices.iter().map(|c| c.value).collect();
        println!("{:<16} {}", field.label, values.join(", "));
    }
    Ok(())
}

fn run_insights(advisor: &Advisor, csv: bool, json: bool) -> Result<()> {
    let insights = advisor.crop_insights();
    if json {
        return print_json(&insights);
    }
    if csv {
        print!("{}", insights.to_csv());
        return Ok(());
    }
    print_messages(&insights.messages);
    println!("{:<20} {:>6}", "Crop", "Count");
    println!("{}", "-".repeat(27));
    for row in &insights.rows {
        println!("{:<20} {:>6}", row.crop, row.count);
    }
    Ok(())
}
