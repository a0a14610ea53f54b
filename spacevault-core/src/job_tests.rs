/*!
Tests for the backup job's step ordering, failure handling and local file
lifecycle.
*/

#[cfg(test)]
mod tests {
    use crate::archive::{Archiver, MockArchiver, ZipArchiver};
    use crate::config::{BackupConfig, Secret, SpaceConfig};
    use crate::event::{QueueEvent, STATUS_FAILED, STATUS_OK};
    use crate::export::{ExportRequest, MockExporter};
    use crate::job::{BackupJob, DELETE_FAILED_MESSAGE, UPLOAD_FAILED_MESSAGE};
    use crate::queue::MockMessageQueue;
    use crate::storage::{MemoryObjectStore, MockObjectStore, UploadReceipt};
    use crate::BackupError;
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::Sequence;
    use std::io::Read;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const RECEIPT: &str = "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a";
    const KEY: &str = "2024/01/05/13-02-09.zip";

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 13, 2, 9).unwrap()
    }

    fn config(work_dir: &Path) -> BackupConfig {
        BackupConfig {
            space: SpaceConfig {
                space_id: "space123".to_string(),
                environment_id: "master".to_string(),
                management_token: Secret::new("cma-token"),
                delivery_token: Secret::new("cda-token"),
            },
            bucket: "backups".to_string(),
            storage_class: "STANDARD_IA".to_string(),
            queue_url: "https://sqs.eu-west-1.amazonaws.com/123456789012/backup-queue".to_string(),
            work_dir: work_dir.to_path_buf(),
            export_bin: PathBuf::from("contentful-export"),
        }
    }

    fn write_export(request: &ExportRequest) -> crate::Result<()> {
        std::fs::write(
            request.output_path(),
            br#"{"contentTypes": [], "entries": [], "assets": []}"#,
        )?;
        Ok(())
    }

    fn exporter_writing_file() -> MockExporter {
        let mut exporter = MockExporter::new();
        exporter
            .expect_export()
            .times(1)
            .returning(|request| write_export(request));
        exporter
    }

    fn receipt(key: &str, body: &[u8]) -> UploadReceipt {
        UploadReceipt {
            key: key.to_string(),
            size: body.len(),
            e_tag: Some("\"etag\"".to_string()),
            sha256: crate::archive::sha256_hex(body),
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let dir = TempDir::new().unwrap();
        let mut seq = Sequence::new();

        let mut exporter = MockExporter::new();
        exporter
            .expect_export()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| write_export(request));

        let mut archiver = MockArchiver::new();
        archiver
            .expect_archive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|input, output| ZipArchiver::new().archive(input, output));

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|key, body| Ok(receipt(key, &body)));

        let mut queue = MockMessageQueue::new();
        queue
            .expect_delete_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let job = BackupJob::new(&config(dir.path()), exporter, archiver, store, queue);
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_OK);
    }

    #[tokio::test]
    async fn test_success_reports_archive_path() {
        let dir = TempDir::new().unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|key, body| key == KEY && !body.is_empty())
            .times(1)
            .returning(|key, body| Ok(receipt(key, &body)));

        let mut queue = MockMessageQueue::new();
        queue
            .expect_delete_message()
            .withf(|handle| handle == RECEIPT)
            .times(1)
            .returning(|_| Ok(()));

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            ZipArchiver::new(),
            store,
            queue,
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        let archive_path = dir.path().join("13-02-09.zip");
        assert_eq!(response.status_code, STATUS_OK);
        assert!(response.body.starts_with("Backup successful: "));
        assert!(response.body.contains(&archive_path.display().to_string()));
        assert!(!archive_path.exists());
    }

    #[tokio::test]
    async fn test_uploaded_archive_contains_export() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let uploads = store.clone();

        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().times(1).returning(|_| Ok(()));

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            ZipArchiver::new(),
            store,
            queue,
        );
        let report = job
            .execute(uuid::Uuid::new_v4(), &QueueEvent::single(RECEIPT), instant())
            .await
            .unwrap();

        assert_eq!(report.upload.key, KEY);
        assert_eq!(report.paths.storage_key, KEY);

        let stored = uploads.get(KEY).unwrap();
        assert_eq!(stored.len(), report.upload.size);
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(stored)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "13-02-09.json");
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert!(contents.contains("entries"));
    }

    #[tokio::test]
    async fn test_export_failure_stops_the_run() {
        let dir = TempDir::new().unwrap();

        let mut exporter = MockExporter::new();
        exporter
            .expect_export()
            .times(1)
            .returning(|_| Err(BackupError::export("rate limit exceeded")));

        let mut archiver = MockArchiver::new();
        archiver.expect_archive().never();
        let mut store = MockObjectStore::new();
        store.expect_put_object().never();
        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().never();

        let job = BackupJob::new(&config(dir.path()), exporter, archiver, store, queue);
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert!(response.body.contains("rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_compress_failure_stops_the_run() {
        let dir = TempDir::new().unwrap();

        let mut exporter = MockExporter::new();
        // Export "succeeds" without writing a file, so compression fails.
        exporter.expect_export().times(1).returning(|_| Ok(()));

        let mut store = MockObjectStore::new();
        store.expect_put_object().never();
        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().never();

        let job = BackupJob::new(&config(dir.path()), exporter, ZipArchiver::new(), store, queue);
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert!(response.body.starts_with("Archive error"));
    }

    #[tokio::test]
    async fn test_partial_archive_removed_when_compression_fails() {
        let dir = TempDir::new().unwrap();

        let mut archiver = MockArchiver::new();
        archiver.expect_archive().times(1).returning(|_, output| {
            std::fs::write(output, b"half a zip")?;
            Err(BackupError::archive("disk full"))
        });
        let mut store = MockObjectStore::new();
        store.expect_put_object().never();
        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().never();

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            archiver,
            store,
            queue,
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert!(!dir.path().join("13-02-09.zip").exists());
    }

    #[tokio::test]
    async fn test_compression_runs_off_the_runtime_thread() {
        let dir = TempDir::new().unwrap();
        let runtime_thread = std::thread::current().id();

        let mut archiver = MockArchiver::new();
        archiver
            .expect_archive()
            .times(1)
            .returning(move |input, output| {
                assert_ne!(std::thread::current().id(), runtime_thread);
                ZipArchiver::new().archive(input, output)
            });
        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|key, body| Ok(receipt(key, &body)));
        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().times(1).returning(|_| Ok(()));

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            archiver,
            store,
            queue,
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_OK);
        assert!(!dir.path().join("13-02-09.zip").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_message() {
        let dir = TempDir::new().unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|_, _| Err(BackupError::upload("S3 bucket 'backups' not found")));

        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().never();

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            ZipArchiver::new(),
            store,
            queue,
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert_eq!(response.body, UPLOAD_FAILED_MESSAGE);
        assert!(!dir.path().join("13-02-09.zip").exists());
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported() {
        let dir = TempDir::new().unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .times(1)
            .returning(|key, body| Ok(receipt(key, &body)));

        let mut queue = MockMessageQueue::new();
        queue
            .expect_delete_message()
            .times(1)
            .returning(|_| Err(BackupError::acknowledge("SQS rejected the receipt handle")));

        let job = BackupJob::new(
            &config(dir.path()),
            exporter_writing_file(),
            ZipArchiver::new(),
            store,
            queue,
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert_eq!(response.body, DELETE_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_event_without_records_exports_nothing() {
        let dir = TempDir::new().unwrap();

        let mut exporter = MockExporter::new();
        exporter.expect_export().never();
        let mut archiver = MockArchiver::new();
        archiver.expect_archive().never();
        let mut store = MockObjectStore::new();
        store.expect_put_object().never();
        let mut queue = MockMessageQueue::new();
        queue.expect_delete_message().never();

        let job = BackupJob::new(&config(dir.path()), exporter, archiver, store, queue);
        let response = job.run_at(&QueueEvent::default(), instant()).await;

        assert_eq!(response.status_code, STATUS_FAILED);
        assert!(response.body.contains("no records"));
    }

    #[tokio::test]
    async fn test_export_request_uses_run_paths() {
        let dir = TempDir::new().unwrap();
        let work_dir = dir.path().to_path_buf();

        let mut exporter = MockExporter::new();
        exporter
            .expect_export()
            .withf(move |request| {
                request.export_dir == work_dir
                    && request.content_file == "13-02-09.json"
                    && request.include_drafts
                    && request.max_allowed_limit == 200
            })
            .times(1)
            .returning(|_| Err(BackupError::export("stop here")));

        let job = BackupJob::new(
            &config(dir.path()),
            exporter,
            MockArchiver::new(),
            MockObjectStore::new(),
            MockMessageQueue::new(),
        );
        let response = job.run_at(&QueueEvent::single(RECEIPT), instant()).await;

        assert!(response.body.contains("stop here"));
    }
}
