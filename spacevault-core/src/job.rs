/*!
The backup job that orchestrates export, compression, upload and queue
acknowledgement.

One call to [`BackupJob::run`] handles one trigger event. Steps run strictly
one after another and the first failure ends the run; nothing is retried.
The trigger message is only deleted after the archive has been stored, so
a failed run leaves it on the queue for redelivery.
*/

use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::archive::{Archiver, ScopedFile};
use crate::config::{BackupConfig, SpaceConfig};
use crate::event::{BackupResponse, QueueEvent};
use crate::export::{ExportRequest, Exporter};
#[cfg(feature = "metrics")]
use crate::observability::{BackupMetrics, MetricsTimer};
use crate::paths::BackupPaths;
use crate::queue::MessageQueue;
use crate::storage::{ObjectStore, UploadReceipt};
use crate::{BackupError, Result};

/// Response body when object storage rejects the archive
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload backup to S3";

/// Response body when the trigger message cannot be deleted
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete message from the backup queue";

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub run_id: Uuid,
    pub paths: BackupPaths,
    pub upload: UploadReceipt,
    pub elapsed: Duration,
}

/// Backup orchestrator
///
/// Generic over its four collaborators so each can be replaced in tests.
/// Archiving and reading the archive back are synchronous file work and run
/// on the runtime's blocking pool.
///
/// # Example
/// ```rust,no_run
/// use spacevault_core::aws::load_sdk_config;
/// use spacevault_core::{
///     BackupConfig, BackupJob, ContentfulCliExporter, QueueEvent, S3ObjectStore,
///     SqsMessageQueue, ZipArchiver,
/// };
///
/// # async fn run() -> spacevault_core::Result<()> {
/// let config = BackupConfig::from_env()?;
/// let sdk_config = load_sdk_config().await?;
/// let job = BackupJob::new(
///     &config,
///     ContentfulCliExporter::new(&config.export_bin),
///     ZipArchiver::new(),
///     S3ObjectStore::new(&sdk_config, &config.bucket, &config.storage_class),
///     SqsMessageQueue::new(&sdk_config, &config.queue_url),
/// );
///
/// let response = job.run(&QueueEvent::single("receipt-handle")).await;
/// println!("{} {}", response.status_code, response.body);
/// # Ok(())
/// # }
/// ```
pub struct BackupJob<E, A, S, Q>
where
    E: Exporter,
    A: Archiver + 'static,
    S: ObjectStore,
    Q: MessageQueue,
{
    space: SpaceConfig,
    work_dir: PathBuf,
    exporter: E,
    archiver: Arc<A>,
    store: S,
    queue: Q,
}

impl<E, A, S, Q> BackupJob<E, A, S, Q>
where
    E: Exporter,
    A: Archiver + 'static,
    S: ObjectStore,
    Q: MessageQueue,
{
    pub fn new(config: &BackupConfig, exporter: E, archiver: A, store: S, queue: Q) -> Self {
        Self {
            space: config.space.clone(),
            work_dir: config.work_dir.clone(),
            exporter,
            archiver: Arc::new(archiver),
            store,
            queue,
        }
    }

    /// Handle one trigger event, timestamped now
    pub async fn run(&self, event: &QueueEvent) -> BackupResponse {
        self.run_at(event, Utc::now()).await
    }

    /// Handle one trigger event with an explicit timestamp
    ///
    /// Never fails: every error is folded into a 500 response.
    pub async fn run_at(&self, event: &QueueEvent, timestamp: DateTime<Utc>) -> BackupResponse {
        let run_id = Uuid::new_v4();
        let span = info_span!("backup", run_id = %run_id);

        async move {
            #[cfg(feature = "metrics")]
            BackupMetrics::global().record_run();

            match self.execute(run_id, event, timestamp).await {
                Ok(report) => {
                    info!(
                        key = %report.upload.key,
                        size = report.upload.size,
                        sha256 = %report.upload.sha256,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "Backup successful"
                    );
                    BackupResponse::ok(format!(
                        "Backup successful: {}",
                        report.paths.archive_path.display()
                    ))
                }
                Err(e) => {
                    error!(step = e.step(), error = %e, "Backup failed");
                    #[cfg(feature = "metrics")]
                    BackupMetrics::global().record_failure(e.step());
                    response_for_error(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run every step, stopping at the first failure
    pub async fn execute(
        &self,
        run_id: Uuid,
        event: &QueueEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<BackupReport> {
        let start = Instant::now();

        // Resolved before any side effect so a malformed event cannot
        // leave an orphaned upload behind.
        let receipt_handle = event.receipt_handle()?;

        let paths = BackupPaths::at(&self.work_dir, timestamp);
        debug!(
            export_path = %paths.export_path.display(),
            archive_path = %paths.archive_path.display(),
            key = %paths.storage_key,
            "Derived backup paths"
        );

        let request = ExportRequest::new(&self.space, &paths);
        timed("export", self.exporter.export(&request)).await?;
        info!(
            space_id = %self.space.space_id,
            environment_id = %self.space.environment_id,
            "Data downloaded successfully"
        );

        info!("Compressing backup");
        let archive = ScopedFile::new(&paths.archive_path);
        let archiver = Arc::clone(&self.archiver);
        let (input, output) = (paths.export_path.clone(), paths.archive_path.clone());
        timed("compress", run_blocking(move || archiver.archive(&input, &output))).await?;

        info!("Preparing archive for upload");
        let body = run_blocking(move || archive.read_and_release()).await?;
        #[cfg(feature = "metrics")]
        BackupMetrics::global().record_archive_size(body.len());

        let upload = timed("upload", self.store.put_object(&paths.storage_key, body)).await?;

        timed("acknowledge", self.queue.delete_message(receipt_handle)).await?;

        Ok(BackupReport {
            run_id,
            paths,
            upload,
            elapsed: start.elapsed(),
        })
    }
}

/// Fold a step error into the job's response
pub fn response_for_error(error: &BackupError) -> BackupResponse {
    match error {
        BackupError::Upload(_) => BackupResponse::failed(UPLOAD_FAILED_MESSAGE),
        BackupError::Acknowledge(_) => BackupResponse::failed(DELETE_FAILED_MESSAGE),
        other => BackupResponse::failed(other.to_string()),
    }
}

/// Run synchronous file work on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            BackupError::Io(std::io::Error::other(format!("blocking task failed: {e}")))
        })?
}

/// Await one step, recording how long it took
async fn timed<T, F>(step: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    #[cfg(feature = "metrics")]
    let timer = MetricsTimer::start(step);
    let start = Instant::now();

    let result = fut.await;

    #[cfg(feature = "metrics")]
    timer.finish();
    debug!(
        step = step,
        ok = result.is_ok(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Step finished"
    );
    result
}
