/*!
Error types for the SpaceVault backup job.
*/

use thiserror::Error;

/// Result type used throughout SpaceVault.
pub type Result<T> = std::result::Result<T, BackupError>;

/// Errors that can occur while running a backup.
///
/// Each pipeline step owns one variant so a failed run can be attributed to
/// the step that caused it.
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trigger event without a usable queue record
    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),

    /// The export collaborator failed
    #[error("Export failed: {0}")]
    Export(String),

    /// Building the archive failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// Reading or removing a local artifact failed
    #[error("Local file error: {0}")]
    LocalFile(String),

    /// Object storage rejected the upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The queue rejected the message deletion
    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    /// A string that is not a backup storage key
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl BackupError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid event error
    pub fn invalid_event<S: Into<String>>(msg: S) -> Self {
        Self::InvalidEvent(msg.into())
    }

    /// Create a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Create a new archive error
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new local file error
    pub fn local_file<S: Into<String>>(msg: S) -> Self {
        Self::LocalFile(msg.into())
    }

    /// Create a new upload error
    pub fn upload<S: Into<String>>(msg: S) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new acknowledge error
    pub fn acknowledge<S: Into<String>>(msg: S) -> Self {
        Self::Acknowledge(msg.into())
    }

    /// Create a new invalid storage key error
    pub fn invalid_key<S: Into<String>>(msg: S) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Name of the pipeline step this error belongs to, for structured logs.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::LocalFile(_) => "stage",
            Self::Json(_) | Self::InvalidEvent(_) => "event",
            Self::Config(_) => "config",
            Self::InvalidKey(_) => "key",
            Self::Export(_) => "export",
            Self::Archive(_) => "compress",
            Self::Upload(_) => "upload",
            Self::Acknowledge(_) => "acknowledge",
        }
    }
}
