/*!
SpaceVault CLI - runs one backup of a content space per invocation.

Intended to be started by a scheduler or queue consumer with the trigger
event on stdin or in a file.
*/

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use spacevault_core::aws::load_sdk_config;
use spacevault_core::config::DEFAULT_WORK_DIR;
use spacevault_core::observability::{init_observability, LogFormat, DEFAULT_LOG_DIRECTIVE};
use spacevault_core::{
    parse_storage_key, BackupConfig, BackupJob, BackupPaths, ContentfulCliExporter, QueueEvent,
    S3ObjectStore, SqsMessageQueue, ZipArchiver,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "spacevault")]
#[command(about = "Back up a content space to S3")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "SPACEVAULT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backup for a trigger event
    Run {
        /// Trigger event JSON file ("-" reads stdin)
        #[arg(short, long, default_value = "-", conflicts_with = "receipt_handle")]
        event: String,

        /// Acknowledge this receipt handle instead of reading an event
        #[arg(short, long)]
        receipt_handle: Option<String>,

        /// Directory for the export and archive files
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Export executable
        #[arg(long)]
        export_bin: Option<PathBuf>,

        /// Print collected metrics after the run
        #[arg(long)]
        print_metrics: bool,
    },
    /// Show the paths and storage key a backup would use
    Paths {
        /// Timestamp (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Directory for the export and archive files
        #[arg(long, env = "BACKUP_WORK_DIR", default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,
    },
    /// Show the timestamp a storage key was derived from
    ParseKey {
        /// Storage key, e.g. 2024/01/05/13-02-09.zip
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            event,
            receipt_handle,
            work_dir,
            export_bin,
            print_metrics,
        } => {
            let succeeded =
                run_backup(&event, receipt_handle, work_dir, export_bin, print_metrics).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Paths { at, work_dir } => show_paths(at, work_dir),
        Commands::ParseKey { key } => show_key(&key)?,
    }

    Ok(())
}

fn init_logging(verbose: bool, json_logs: bool) -> Result<(), anyhow::Error> {
    let directive = if verbose {
        "spacevault=debug"
    } else {
        DEFAULT_LOG_DIRECTIVE
    };
    let format = if json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_observability(format, directive)?;
    Ok(())
}

fn read_event(source: &str, receipt_handle: Option<String>) -> Result<QueueEvent, anyhow::Error> {
    if let Some(handle) = receipt_handle {
        return Ok(QueueEvent::single(handle));
    }
    let event = if source == "-" {
        QueueEvent::from_reader(io::stdin().lock())?
    } else {
        QueueEvent::from_reader(BufReader::new(File::open(source)?))?
    };
    Ok(event)
}

async fn run_backup(
    event_source: &str,
    receipt_handle: Option<String>,
    work_dir: Option<PathBuf>,
    export_bin: Option<PathBuf>,
    print_metrics: bool,
) -> Result<bool, anyhow::Error> {
    let mut config = BackupConfig::from_env()?;
    if let Some(work_dir) = work_dir {
        config = config.with_work_dir(work_dir);
    }
    if let Some(export_bin) = export_bin {
        config = config.with_export_bin(export_bin);
    }
    config.validate()?;

    let event = read_event(event_source, receipt_handle)?;
    info!(
        space_id = %config.space.space_id,
        bucket = %config.bucket,
        records = event.records.len(),
        "Starting backup"
    );

    let sdk_config = load_sdk_config().await?;
    let job = BackupJob::new(
        &config,
        ContentfulCliExporter::new(&config.export_bin),
        ZipArchiver::new(),
        S3ObjectStore::new(&sdk_config, &config.bucket, &config.storage_class),
        SqsMessageQueue::new(&sdk_config, &config.queue_url),
    );

    let response = job.run(&event).await;
    if !response.is_success() {
        error!(status = response.status_code, body = %response.body, "Backup did not complete");
    }
    println!("{}", serde_json::to_string(&response)?);

    if print_metrics {
        print_collected_metrics()?;
    }

    Ok(response.is_success())
}

#[cfg(feature = "metrics")]
fn print_collected_metrics() -> Result<(), anyhow::Error> {
    use spacevault_core::observability::BackupMetrics;
    print!("{}", BackupMetrics::global().gather_metrics()?);
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn print_collected_metrics() -> Result<(), anyhow::Error> {
    Err(anyhow::anyhow!("metrics support not enabled"))
}

fn show_paths(at: Option<DateTime<Utc>>, work_dir: PathBuf) {
    let paths = BackupPaths::at(work_dir, at.unwrap_or_else(Utc::now));
    println!("Backup Paths:");
    println!("  Timestamp: {}", paths.timestamp.to_rfc3339());
    println!("  Export file: {}", paths.export_path.display());
    println!("  Archive file: {}", paths.archive_path.display());
    println!("  Storage key: {}", paths.storage_key);
}

fn show_key(key: &str) -> Result<(), anyhow::Error> {
    let timestamp = parse_storage_key(key)?;
    println!("{}", timestamp.and_utc().to_rfc3339());
    Ok(())
}
