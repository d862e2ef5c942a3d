mod types;
mod indicators;
mod config;
mod history;
mod ml;
mod bots;
mod engine;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bots::BotKind;
use config::{AppConfig, TickerUniverse};
use engine::TrainingPipeline;
use history::{JsonDirectorySource, SupabaseHistory};
use ml::{FeatureEngine, ModelVariant};

#[derive(Parser)]
#[command(name = "ml-trading-bots")]
#[command(version = "0.1.0")]
#[command(about = "Trains mean-reversion and trend models and runs buy/sell/hold decision bots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Supabase,
    File,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both model families across the ticker universe and write artifacts
    Train {
        /// Where price history comes from
        #[arg(long, value_enum, default_value = "supabase")]
        source: SourceKind,
        /// Directory of {TICKER}.json files (file source)
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Comma-separated tickers replacing the configured universe
        #[arg(long, value_delimiter = ',')]
        tickers: Option<Vec<String>>,
        /// Output directory for the model artifacts
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
    /// Read one market context from stdin and print a decision
    Decide {
        #[arg(value_enum)]
        bot: BotKind,
    },
    /// Score one feature vector with the serialized tree ensemble
    Predict,
    /// Up-move probability from the classifier artifact
    Score {
        /// Classifier artifact path (defaults to the configured one)
        #[arg(long)]
        artifact: Option<PathBuf>,
    },
    /// Latest feature row for a window of closes
    Features {
        #[arg(value_enum)]
        variant: ModelVariant,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries command results, logs go to stderr
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if cli.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let mut config = AppConfig::load(Some(Path::new(&cli.config)))?;

    match cli.command {
        Commands::Train {
            source,
            data_dir,
            tickers,
            artifacts_dir,
        } => {
            if let Some(tickers) = tickers {
                config.universe = TickerUniverse::explicit(&tickers);
            }
            if let Some(dir) = artifacts_dir {
                config.artifacts.dir = dir;
            }
            if let Err(errors) = config.validate() {
                return Err(anyhow!("Invalid configuration: {}", errors.join(", ")));
            }

            let summary = match source {
                SourceKind::Supabase => {
                    let source = SupabaseHistory::new(&config.history)?;
                    TrainingPipeline::new(source, &config).run().await?
                }
                SourceKind::File => {
                    info!("Reading price history from {}", data_dir.display());
                    let source = JsonDirectorySource::new(data_dir);
                    TrainingPipeline::new(source, &config).run().await?
                }
            };
            info!(
                "Training complete: {}/{} classifiers, {}/{} regressors viable",
                summary.viable_classifiers,
                config.universe.len(),
                summary.viable_regressors,
                config.universe.len()
            );
            info!(
                "Published {} (accuracy {:.4}) to {}",
                summary.classifier_ticker,
                summary.classifier_accuracy,
                summary.paths.classifier.display()
            );
            info!(
                "Published {} (directional accuracy {:.4}) to {} and {}",
                summary.regressor_ticker,
                summary.directional_accuracy,
                summary.paths.regressor.display(),
                summary.paths.blob.display()
            );
        }
        Commands::Decide { bot } => {
            let input = read_stdin().await?;
            let decision = bots::runner::decide(bot, &input, &config.decisions)?;
            emit(&decision)?;
        }
        Commands::Predict => {
            let input = read_stdin().await?;
            let request: ml::bridge::PredictRequest = serde_json::from_str(&input)
                .map_err(|e| anyhow!("malformed predict request: {}", e))?;
            let response = ml::bridge::run_prediction(&request)?;
            emit(&response)?;
        }
        Commands::Score { artifact } => {
            let input = read_stdin().await?;
            let default_path = artifact.unwrap_or_else(|| config.artifacts.classifier_path());
            let response = bots::runner::score(&input, &default_path)?;
            emit(&response)?;
        }
        Commands::Features { variant } => {
            let input = read_stdin().await?;
            let engine = FeatureEngine::new(config.features.clone());
            let response = bots::runner::features(variant, &input, &engine)?;
            emit(&response)?;
        }
        Commands::ShowConfig => {
            if config.history.supabase_anon_key.is_some() {
                config.history.supabase_anon_key = Some("<redacted>".to_string());
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(input)
}

/// One JSON line on stdout
fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
