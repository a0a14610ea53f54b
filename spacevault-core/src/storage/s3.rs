/*!
Amazon S3 object store.

Uploads archives with the official AWS SDK, applying the configured storage
class and recording the archive digest as object metadata.
*/

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::StorageClass;
use aws_sdk_s3::Client as S3Client;
use aws_smithy_runtime_api::client::result::SdkError;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::{ObjectStore, UploadReceipt, ARCHIVE_CONTENT_TYPE};
use crate::archive::sha256_hex;
use crate::aws::{describe_sdk_error, service_error_code};
use crate::{BackupError, Result};

/// User metadata key holding the archive's SHA-256 digest
pub const DIGEST_METADATA_KEY: &str = "sha256";

/// Amazon S3 object store
///
/// # Authentication
/// Credentials come from the standard AWS provider chain; see
/// [`crate::aws::load_sdk_config`].
///
/// # Example
/// ```rust,no_run
/// use spacevault_core::{aws::load_sdk_config, ObjectStore, S3ObjectStore};
///
/// # async fn run() -> spacevault_core::Result<()> {
/// let sdk_config = load_sdk_config().await?;
/// let store = S3ObjectStore::new(&sdk_config, "my-backups", "STANDARD_IA");
/// store.put_object("2024/01/05/13-02-09.zip", b"zip bytes".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    storage_class: StorageClass,
}

impl S3ObjectStore {
    /// Create a store for `bucket`, uploading with `storage_class`
    pub fn new<B: Into<String>>(sdk_config: &SdkConfig, bucket: B, storage_class: &str) -> Self {
        Self::with_client(S3Client::new(sdk_config), bucket, storage_class)
    }

    /// Create a store around an existing client
    pub fn with_client<B: Into<String>>(client: S3Client, bucket: B, storage_class: &str) -> Self {
        let bucket = bucket.into();
        let storage_class = parse_storage_class(storage_class);

        info!(
            bucket = %bucket,
            storage_class = %storage_class.as_str(),
            "Initialized S3 object store"
        );

        Self {
            client,
            bucket,
            storage_class,
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn storage_class(&self) -> &StorageClass {
        &self.storage_class
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<UploadReceipt> {
        let size = body.len();
        let digest = sha256_hex(&body);

        info!(
            bucket = %self.bucket,
            key = %key,
            size = size,
            storage_class = %self.storage_class.as_str(),
            "Uploading archive to S3"
        );

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .storage_class(self.storage_class.clone())
            .content_type(ARCHIVE_CONTENT_TYPE)
            .content_length(size as i64)
            .metadata(DIGEST_METADATA_KEY, &digest)
            .body(ByteStream::from(Bytes::from(body)))
            .send()
            .await;

        match result {
            Ok(output) => {
                debug!(
                    bucket = %self.bucket,
                    key = %key,
                    e_tag = ?output.e_tag(),
                    "Archive uploaded"
                );
                Ok(UploadReceipt {
                    key: key.to_string(),
                    size,
                    e_tag: output.e_tag().map(str::to_string),
                    sha256: digest,
                })
            }
            Err(e) => {
                let mapped_error = map_s3_error("put_object", &e, &self.bucket, key);
                error!(
                    bucket = %self.bucket,
                    key = %key,
                    error = %mapped_error,
                    "Failed to upload archive to S3"
                );
                Err(mapped_error)
            }
        }
    }
}

/// Map a storage class name, warning when the SDK does not know it
///
/// Unknown names are still sent; S3 is the authority on what it accepts.
fn parse_storage_class(name: &str) -> StorageClass {
    let storage_class = StorageClass::from(name);
    if !StorageClass::values().contains(&storage_class.as_str()) {
        warn!(storage_class = %name, "Storage class is not recognised by the S3 SDK");
    }
    storage_class
}

/// Map AWS SDK errors to BackupError with appropriate context
fn map_s3_error<E, R>(op: &str, error: &SdkError<E, R>, bucket: &str, key: &str) -> BackupError
where
    E: ProvideErrorMetadata + std::error::Error,
    R: std::fmt::Debug,
{
    match service_error_code(error) {
        Some("NoSuchBucket") => BackupError::upload(format!("S3 bucket '{bucket}' not found")),
        Some("AccessDenied") | Some("Forbidden") => BackupError::upload(format!(
            "Access denied writing '{key}' to S3 bucket '{bucket}' (check IAM permissions)"
        )),
        Some("InvalidStorageClass") => {
            BackupError::upload("S3 rejected the configured storage class".to_string())
        }
        Some("InvalidBucketName") => {
            BackupError::upload(format!("Invalid S3 bucket name '{bucket}'"))
        }
        _ => BackupError::upload(describe_sdk_error("S3", op, error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::put_object::PutObjectError;

    fn service_error(code: &str) -> SdkError<PutObjectError, ()> {
        let err = PutObjectError::generic(
            ErrorMetadata::builder()
                .code(code)
                .message("rejected by test")
                .build(),
        );
        SdkError::service_error(err, ())
    }

    #[test]
    fn test_error_mapping_no_such_bucket() {
        let mapped = map_s3_error("put_object", &service_error("NoSuchBucket"), "backups", "k");
        assert!(matches!(mapped, BackupError::Upload(_)));
        assert!(mapped.to_string().contains("'backups' not found"));
    }

    #[test]
    fn test_error_mapping_access_denied() {
        let mapped = map_s3_error(
            "put_object",
            &service_error("AccessDenied"),
            "backups",
            "2024/01/05/13-02-09.zip",
        );
        assert!(mapped.to_string().contains("Access denied"));
        assert!(mapped.to_string().contains("2024/01/05/13-02-09.zip"));
    }

    #[test]
    fn test_error_mapping_unknown_code() {
        let mapped = map_s3_error("put_object", &service_error("SlowDown"), "backups", "k");
        let msg = mapped.to_string();
        assert!(msg.contains("SlowDown"));
        assert!(msg.contains("rejected by test"));
    }

    #[test]
    fn test_error_mapping_timeout() {
        let timeout: SdkError<PutObjectError, ()> = SdkError::timeout_error("deadline elapsed");
        let mapped = map_s3_error("put_object", &timeout, "backups", "k");
        assert!(matches!(mapped, BackupError::Upload(_)));
        assert!(mapped.to_string().contains("timed out"));
    }

    #[test]
    fn test_parse_storage_class() {
        assert_eq!(parse_storage_class("STANDARD_IA"), StorageClass::StandardIa);
        assert_eq!(parse_storage_class("GLACIER_IR"), StorageClass::GlacierIr);
        assert_eq!(parse_storage_class("NOT_A_CLASS").as_str(), "NOT_A_CLASS");
    }
}
