//! Pantry Ingest - USDA FoodData Central ingestion tool

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pantry_common::checkpoint::CheckpointStore;
use pantry_common::logging::{init_logging, LogConfig, LogLevel};
use pantry_ingest::config::{parse_data_types, IngestConfig};
use pantry_ingest::orchestrator::{IngestionOrchestrator, RunOutcome, RunSummary};
use pantry_ingest::storage::PgIngredientStore;
use pantry_ingest::usda::RateLimitedClient;
use pantry_ingest::writer::MemoryIngredientStore;
use pantry_ingest::{monitor, shutdown, status};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pantry-ingest")]
#[command(author, version, about = "Ingest USDA FoodData Central into the Pantry ingredient store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Checkpoint file shared by run, monitor and status
    #[arg(long, global = true, env = "INGEST_CHECKPOINT_PATH")]
    checkpoint: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new ingestion run or resume the last one
    Run {
        /// Discard the existing checkpoint and start over
        #[arg(long)]
        fresh: bool,

        /// Write into an in-memory store instead of Postgres
        #[arg(long)]
        dry_run: bool,

        /// Data types to ingest, in order (repeatable or comma-separated)
        #[arg(long = "data-type", value_name = "TYPE")]
        data_types: Vec<String>,

        /// Do not apply database migrations before ingesting
        #[arg(long)]
        skip_migrations: bool,

        /// Stop each data type after this many pages
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,

        /// Records requested per page
        #[arg(long, value_name = "N")]
        page_size: Option<u32>,

        /// Records written per batch
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Watch the progress of a running ingestion
    Monitor {
        /// Seconds between checkpoint reads
        #[arg(short, long, default_value_t = 10)]
        interval: u64,

        /// Render a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Print the current checkpoint
    Status {
        /// Print the raw checkpoint JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pantry-ingest")
        .filter_directives("sqlx=warn,hyper=warn,reqwest=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = IngestConfig::from_env()?;
    if let Some(path) = cli.checkpoint {
        config = config.with_checkpoint_path(path);
    }

    match cli.command {
        Command::Run {
            fresh,
            dry_run,
            data_types,
            skip_migrations,
            max_pages,
            page_size,
            batch_size,
        } => {
            if !data_types.is_empty() {
                config = config.with_data_types(data_types.iter().flat_map(|t| parse_data_types(t)));
            }
            if let Some(max_pages) = max_pages {
                config = config.with_max_pages_per_data_type(max_pages);
            }
            if let Some(page_size) = page_size {
                config = config.with_page_size(page_size);
            }
            if let Some(batch_size) = batch_size {
                config = config.with_batch_size(batch_size);
            }
            run(config, fresh, dry_run, skip_migrations).await
        },
        Command::Monitor { interval, once } => {
            let store = CheckpointStore::new(&config.checkpoint_path);
            let cancel = shutdown::cancel_on_signal();
            monitor::run(store, Duration::from_secs(interval.max(1)), once, cancel).await;
            Ok(())
        },
        Command::Status { json } => {
            let store = CheckpointStore::new(&config.checkpoint_path);
            status::run(&store, json)?;
            Ok(())
        },
    }
}

async fn run(mut config: IngestConfig, fresh: bool, dry_run: bool, skip_migrations: bool) -> Result<()> {
    if dry_run {
        // Keep dry runs from resuming or completing the real checkpoint
        config.checkpoint_path = config.checkpoint_path.with_extension("dry-run.json");
    }
    config.validate()?;

    if config.uses_demo_key() {
        warn!(
            requests_per_hour = config.effective_requests_per_hour(),
            "FDC_API_KEY is not set, using the shared DEMO_KEY"
        );
    }

    let client = RateLimitedClient::new(&config)?;
    let cancel = shutdown::cancel_on_signal();

    info!(
        data_types = ?config.data_types,
        page_size = config.page_size,
        batch_size = config.batch_size,
        min_interval_ms = client.min_interval().as_millis() as u64,
        checkpoint = %config.checkpoint_path.display(),
        dry_run = dry_run,
        "Ingestion configured"
    );

    let summary = if dry_run {
        IngestionOrchestrator::new(config, client, MemoryIngredientStore::new(), cancel)
            .run(fresh)
            .await?
    } else {
        let database_url = config
            .database_url
            .clone()
            .ok_or_else(|| anyhow!("DATABASE_URL is required unless --dry-run is set"))?;
        let store = PgIngredientStore::connect(&database_url, config.database_max_connections).await?;
        if !skip_migrations {
            store.migrate().await?;
        }
        IngestionOrchestrator::new(config, client, store, cancel)
            .run(fresh)
            .await?
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let cp = &summary.checkpoint;
    match summary.outcome {
        RunOutcome::Completed => {
            println!("{} Ingestion complete", "✓".green().bold());
        },
        RunOutcome::Interrupted => {
            println!(
                "{} Ingestion interrupted after {} page {}; run again to resume",
                "!".yellow().bold(),
                cp.current_data_type,
                cp.current_page
            );
        },
    }
    println!(
        "  Processed: {}  Inserted: {}  Duplicates: {}  Failed: {}",
        cp.processed_items, cp.successful_inserts, cp.skipped_duplicates, cp.failed_records
    );
}
