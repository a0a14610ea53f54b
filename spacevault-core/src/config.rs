//! Configuration for the backup job
//!
//! The job is configured once at process start. [`BackupConfig::from_env`]
//! reads the process environment; [`BackupConfig::from_lookup`] accepts any
//! key lookup so tests never touch process-wide state.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::{BackupError, Result};

pub const ENV_SPACE_ID: &str = "SPACE_ID";
pub const ENV_SPACE_ENV: &str = "SPACE_ENV";
pub const ENV_MANAGEMENT_TOKEN: &str = "MANAGEMENT_TOKEN";
pub const ENV_DELIVERY_TOKEN: &str = "DELIVERY_TOKEN";
pub const ENV_S3_BUCKET_NAME: &str = "S3_BUCKET_NAME";
pub const ENV_S3_STORAGE_CLASS: &str = "S3_STORAGE_CLASS";
pub const ENV_SQS_QUEUE_URL: &str = "SQS_QUEUE_URL";
pub const ENV_WORK_DIR: &str = "BACKUP_WORK_DIR";
pub const ENV_EXPORT_BIN: &str = "CONTENTFUL_EXPORT_BIN";

/// Default directory for the export and archive artifacts
pub const DEFAULT_WORK_DIR: &str = "/tmp";

/// Default executable used to run the space export
pub const DEFAULT_EXPORT_BIN: &str = "contentful-export";

/// Placeholder written wherever a credential would be rendered
pub const REDACTED: &str = "***";

/// A credential that never shows up in `Debug` output, logs or serialized
/// configuration
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Access the raw credential
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Identifiers and credentials for the content space being exported
#[derive(Debug, Clone, Serialize)]
pub struct SpaceConfig {
    /// Space identifier
    pub space_id: String,
    /// Environment within the space (e.g. `master`)
    pub environment_id: String,
    /// Write-scope token
    pub management_token: Secret,
    /// Read-scope token
    pub delivery_token: Secret,
}

/// Complete configuration for one backup job
#[derive(Debug, Clone, Serialize)]
pub struct BackupConfig {
    pub space: SpaceConfig,
    /// Destination bucket
    pub bucket: String,
    /// Storage class applied to uploaded archives (e.g. `STANDARD_IA`)
    pub storage_class: String,
    /// Queue whose messages trigger backups
    pub queue_url: String,
    /// Directory for the export file and the intermediate archive
    pub work_dir: PathBuf,
    /// Executable that performs the space export
    pub export_bin: PathBuf,
}

impl BackupConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Every missing required key is reported in a single error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |key: &'static str| match lookup(key) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(key);
                String::new()
            }
        };

        let space_id = required(ENV_SPACE_ID);
        let environment_id = required(ENV_SPACE_ENV);
        let management_token = required(ENV_MANAGEMENT_TOKEN);
        let delivery_token = required(ENV_DELIVERY_TOKEN);
        let bucket = required(ENV_S3_BUCKET_NAME);
        let storage_class = required(ENV_S3_STORAGE_CLASS);
        let queue_url = required(ENV_SQS_QUEUE_URL);

        if !missing.is_empty() {
            return Err(BackupError::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let work_dir = lookup(ENV_WORK_DIR)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_WORK_DIR.to_string());
        let export_bin = lookup(ENV_EXPORT_BIN)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPORT_BIN.to_string());

        let config = BackupConfig {
            space: SpaceConfig {
                space_id,
                environment_id,
                management_token: Secret::new(management_token),
                delivery_token: Secret::new(delivery_token),
            },
            bucket,
            storage_class,
            queue_url,
            work_dir: PathBuf::from(work_dir),
            export_bin: PathBuf::from(export_bin),
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the working directory
    pub fn with_work_dir<P: Into<PathBuf>>(mut self, work_dir: P) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Override the export executable
    pub fn with_export_bin<P: Into<PathBuf>>(mut self, export_bin: P) -> Self {
        self.export_bin = export_bin.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.space.space_id.is_empty() || self.space.environment_id.is_empty() {
            return Err(BackupError::config(
                "space id and environment id must not be empty",
            ));
        }
        if self.space.management_token.is_empty() || self.space.delivery_token.is_empty() {
            return Err(BackupError::config("export tokens must not be empty"));
        }
        if self.bucket.is_empty() {
            return Err(BackupError::config("S3 bucket name must not be empty"));
        }
        if self.bucket.contains('/') {
            return Err(BackupError::config(format!(
                "invalid S3 bucket name '{}': bucket names cannot contain '/'",
                self.bucket
            )));
        }
        if self.storage_class.is_empty() {
            return Err(BackupError::config("S3 storage class must not be empty"));
        }
        if !self.queue_url.starts_with("https://") && !self.queue_url.starts_with("http://") {
            return Err(BackupError::config(format!(
                "invalid SQS queue URL '{}'",
                self.queue_url
            )));
        }
        if self.work_dir.as_os_str().is_empty() {
            return Err(BackupError::config("work directory must not be empty"));
        }
        Ok(())
    }
}
