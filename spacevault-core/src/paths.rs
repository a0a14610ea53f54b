/*!
Names derived from the invocation timestamp.

One timestamp sample yields the export file, the archive file and the
storage key, so all three always agree within a run.
*/

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

use crate::{BackupError, Result};

/// Format of the date segment of a storage key
const DATE_SEGMENT_FORMAT: &str = "%Y/%m/%d";

/// Format of the time segment; hyphens replace the colons of an ISO time
const TIME_SEGMENT_FORMAT: &str = "%H-%M-%S";

/// Full storage key format
const KEY_FORMAT: &str = "%Y/%m/%d/%H-%M-%S.zip";

pub const EXPORT_EXTENSION: &str = "json";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// All local paths and the storage key for one backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPaths {
    /// Instant every name below was derived from
    pub timestamp: DateTime<Utc>,
    /// Directory holding the export and archive files
    pub work_dir: PathBuf,
    /// File name the exporter writes, e.g. `13-02-09.json`
    pub export_file_name: String,
    /// `<work_dir>/<export_file_name>`
    pub export_path: PathBuf,
    /// `<work_dir>/13-02-09.zip`
    pub archive_path: PathBuf,
    /// `2024/01/05/13-02-09.zip`
    pub storage_key: String,
}

impl BackupPaths {
    /// Derive every name for a run from a single timestamp
    pub fn at<P: AsRef<Path>>(work_dir: P, timestamp: DateTime<Utc>) -> Self {
        let work_dir = work_dir.as_ref().to_path_buf();
        let base = timestamp.format(TIME_SEGMENT_FORMAT).to_string();
        let date = timestamp.format(DATE_SEGMENT_FORMAT).to_string();

        let export_file_name = format!("{base}.{EXPORT_EXTENSION}");
        let archive_file_name = format!("{base}.{ARCHIVE_EXTENSION}");

        Self {
            timestamp,
            export_path: work_dir.join(&export_file_name),
            archive_path: work_dir.join(&archive_file_name),
            storage_key: format!("{date}/{archive_file_name}"),
            export_file_name,
            work_dir,
        }
    }

    /// Derive names for the current instant
    pub fn now<P: AsRef<Path>>(work_dir: P) -> Self {
        Self::at(work_dir, Utc::now())
    }
}

/// Recover the date and time a storage key was derived from
///
/// Sub-second precision is not encoded in keys, so the result is truncated
/// to whole seconds.
pub fn parse_storage_key(key: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(key, KEY_FORMAT)
        .map_err(|e| BackupError::invalid_key(format!("'{key}': {e}")))
}
