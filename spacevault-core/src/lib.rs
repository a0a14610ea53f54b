/*!
# SpaceVault Core

Scheduled backups of a content space to object storage.

One backup run, triggered by a queue message:

1. derives the export path, archive path and storage key from one timestamp
2. exports the space (drafts included) to a local JSON file
3. packs the export into a single-entry zip
4. reads the zip into memory and removes it from disk
5. uploads it as `<YYYY>/<MM>/<DD>/<HH>-<MM>-<SS>.zip`
6. deletes the trigger message from the queue

## Architecture

The job follows the ports-and-adapters layout: [`BackupJob`] depends only on
the [`Exporter`], [`Archiver`], [`ObjectStore`] and [`MessageQueue`] traits.
The production adapters shell out to `contentful-export`, write zip files and
talk to S3 and SQS through the AWS SDK (feature `aws`).

## Usage

```rust,no_run
use spacevault_core::aws::load_sdk_config;
use spacevault_core::{
    BackupConfig, BackupJob, ContentfulCliExporter, QueueEvent, S3ObjectStore,
    SqsMessageQueue, ZipArchiver,
};

# async fn run() -> spacevault_core::Result<()> {
let config = BackupConfig::from_env()?;
let sdk_config = load_sdk_config().await?;

let job = BackupJob::new(
    &config,
    ContentfulCliExporter::new(&config.export_bin),
    ZipArchiver::new(),
    S3ObjectStore::new(&sdk_config, &config.bucket, &config.storage_class),
    SqsMessageQueue::new(&sdk_config, &config.queue_url),
);

let event = QueueEvent::from_json(r#"{"Records":[{"receiptHandle":"AQEB..."}]}"#)?;
let response = job.run(&event).await;
assert!(response.is_success());
# Ok(())
# }
```
*/

pub mod archive;
#[cfg(feature = "aws")]
pub mod aws;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod job;
pub mod observability;
pub mod paths;
pub mod queue;
pub mod storage;

#[cfg(test)]
mod job_tests;

pub use archive::{Archiver, ScopedFile, ZipArchiver};
pub use config::{BackupConfig, Secret, SpaceConfig};
pub use error::{BackupError, Result};
pub use event::{BackupResponse, QueueEvent, QueueRecord};
pub use export::{ContentfulCliExporter, ExportRequest, Exporter};
pub use job::{BackupJob, BackupReport};
pub use paths::{parse_storage_key, BackupPaths};
pub use queue::MessageQueue;
#[cfg(feature = "aws")]
pub use queue::SqsMessageQueue;
pub use storage::{ObjectStore, UploadReceipt};
#[cfg(feature = "aws")]
pub use storage::S3ObjectStore;
