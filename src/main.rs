use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use catalog_sync_lib::application::{AssetIngestionPipeline, CatalogSynchronizer};
use catalog_sync_lib::commands::{self, BulkSyncCommands, FailureKind};
use catalog_sync_lib::domain::product::ProductRecord;
use catalog_sync_lib::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, HttpObjectStore, SqliteDocumentStore, logging,
};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version)]
#[command(about = "Product catalog image ingestion and bulk synchronization", long_about = None)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overrides `database.url`
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replace the whole collection with the records in a JSON file
    ReplaceAll {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Delete every record in the collection
    DeleteAll {
        /// Confirm the deletion
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Add records without touching existing ones; fails if any id exists
    UploadOnly {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the record count and ids, newest first
    Inspect,
    /// Upload image files and print the resulting assets in input order
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Append the assets to this product record (JSON) and print the result
        #[arg(long)]
        attach_to: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = ConfigManager::new(cli.config)
        .load_config()
        .context("Failed to load configuration")?;
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    logging::init_logging_with_config(&config.logging)?;

    match cli.command {
        Commands::ReplaceAll { input } => {
            let records = match load_input(&input).await {
                Ok(records) => records,
                Err(code) => return Ok(code),
            };
            let commands = sync_commands(&config).await?;
            Ok(emit(commands.full_replace(records).await, |f| f.exit_code()))
        }
        Commands::DeleteAll { yes } => {
            if !yes {
                eprintln!("error: delete-all removes every record; pass --yes to confirm");
                return Ok(FailureKind::Validation.exit_code());
            }
            let commands = sync_commands(&config).await?;
            Ok(emit(commands.delete_all().await, |f| f.exit_code()))
        }
        Commands::UploadOnly { input } => {
            let records = match load_input(&input).await {
                Ok(records) => records,
                Err(code) => return Ok(code),
            };
            let commands = sync_commands(&config).await?;
            Ok(emit(commands.upload_only(records).await, |f| f.exit_code()))
        }
        Commands::Inspect => {
            let commands = sync_commands(&config).await?;
            Ok(emit(commands.inspect().await, |f| f.exit_code()))
        }
        Commands::Ingest { files, attach_to } => ingest(&config, &files, attach_to).await,
    }
}

async fn sync_commands(config: &AppConfig) -> Result<BulkSyncCommands> {
    let db = DatabaseConnection::with_max_connections(
        &config.database.url,
        config.database.max_connections,
    )
    .await?;
    db.migrate().await.context("Failed to migrate database")?;
    info!("Using database {}", config.database.url);

    let store = Arc::new(SqliteDocumentStore::new(
        db.pool().clone(),
        config.sync.max_batch_operations,
    ));
    let synchronizer = CatalogSynchronizer::new(store, config.sync.max_batch_operations);
    Ok(BulkSyncCommands::new(synchronizer))
}

async fn ingest(config: &AppConfig, paths: &[PathBuf], attach_to: Option<PathBuf>) -> Result<u8> {
    // Read the target record before uploading anything.
    let record = match attach_to {
        Some(path) => Some(load_record(&path).await?),
        None => None,
    };
    let files = match commands::load_files(paths).await {
        Ok(files) => files,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(FailureKind::Validation.exit_code());
        }
    };

    let object_store = Arc::new(HttpObjectStore::new(config.object_store.clone())?);
    let pipeline = AssetIngestionPipeline::new(object_store, config.ingestion.to_constraints());

    let report = match commands::ingest_files(&pipeline, files).await {
        Ok(report) => report,
        Err(failure) => return Ok(emit::<(), _>(Err(failure), |f| f.exit_code())),
    };

    match record {
        Some(record) => {
            let updated = commands::attach_to_record(record, report.assets, chrono::Utc::now());
            match updated {
                Ok(updated) => Ok(emit::<_, String>(Ok(updated), |_| 0)),
                Err(e) => {
                    eprintln!("error: {e}");
                    Ok(FailureKind::Validation.exit_code())
                }
            }
        }
        None => Ok(emit::<_, String>(Ok(report), |_| 0)),
    }
}

async fn load_input(path: &Path) -> std::result::Result<Vec<ProductRecord>, u8> {
    commands::load_records(path).await.map_err(|e| {
        eprintln!("error: {e:#}");
        FailureKind::Validation.exit_code()
    })
}

async fn load_record(path: &Path) -> Result<ProductRecord> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a product record", path.display()))
}

/// Print the report on stdout or the failure on stderr, as JSON.
fn emit<T: Serialize, F: Serialize>(
    outcome: std::result::Result<T, F>,
    exit_code: impl FnOnce(&F) -> u8,
) -> u8 {
    match outcome {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(e) => {
                eprintln!("error: cannot encode report: {e}");
                1
            }
        },
        Err(failure) => {
            match serde_json::to_string_pretty(&failure) {
                Ok(json) => eprintln!("{json}"),
                Err(e) => eprintln!("error: cannot encode failure report: {e}"),
            }
            exit_code(&failure).max(1)
        }
    }
}
