/*!
Archive adapters for export files.

The export is packed into a single-entry zip before upload. The archive
only lives on local disk long enough to be read back into memory;
[`ScopedFile`] guarantees it is removed on every exit path.
*/

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{BackupError, Result};

/// Archive abstraction for export files
///
/// Implementations build a brand new archive at `output` holding exactly one
/// entry: the file at `input`, stored under its base name.
#[cfg_attr(test, mockall::automock)]
pub trait Archiver: Send + Sync {
    /// Create the archive, replacing any file already at `output`
    fn archive(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Zip archiver using DEFLATE
///
/// # Example
/// ```rust,no_run
/// use spacevault_core::{Archiver, ZipArchiver};
/// use std::path::Path;
///
/// let archiver = ZipArchiver::new();
/// archiver.archive(Path::new("/tmp/13-02-09.json"), Path::new("/tmp/13-02-09.zip"))?;
/// # Ok::<(), spacevault_core::BackupError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    compression_level: u32,
}

impl ZipArchiver {
    /// Create a new zip archiver with the default compression level (6)
    pub fn new() -> Self {
        Self::with_level(6)
    }

    /// Create a new zip archiver with the specified DEFLATE level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression_level: level.min(9),
        }
    }

    /// Create an archiver for fast compression (level 1)
    pub fn fast() -> Self {
        Self::with_level(1)
    }

    /// Create an archiver for maximum compression (level 9)
    pub fn max() -> Self {
        Self::with_level(9)
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, input: &Path, output: &Path) -> Result<()> {
        let entry_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BackupError::archive(format!("{} has no file name", input.display()))
            })?;

        debug!(input = %input.display(), output = %output.display(), "Compressing export");

        let source = File::open(input).map_err(|e| {
            BackupError::archive(format!("Failed to open {}: {}", input.display(), e))
        })?;
        let target = File::create(output).map_err(|e| {
            BackupError::archive(format!("Failed to create {}: {}", output.display(), e))
        })?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(self.compression_level)))
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(target);
        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| BackupError::archive(format!("Failed to start zip entry: {e}")))?;
        io::copy(&mut BufReader::new(source), &mut writer)
            .map_err(|e| BackupError::archive(format!("Failed to write zip entry: {e}")))?;
        writer
            .finish()
            .map_err(|e| BackupError::archive(format!("Failed to finish zip archive: {e}")))?;

        debug!(output = %output.display(), entry = %entry_name, "Created archive");
        Ok(())
    }
}

/// A local file that is deleted when the guard goes out of scope
///
/// Create the guard before the file is written so a half-written file is
/// cleaned up too.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
    armed: bool,
}

impl ScopedFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file into memory, then delete it
    ///
    /// The file is gone when this returns, whether the read succeeded or not.
    pub fn read_and_release(mut self) -> Result<Vec<u8>> {
        let data = fs::read(&self.path).map_err(|e| {
            BackupError::local_file(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        self.release()?;
        Ok(data)
    }

    /// Delete the file now, reporting failure instead of logging it
    pub fn release(&mut self) -> Result<()> {
        self.armed = false;
        remove_if_present(&self.path).map_err(|e| {
            BackupError::local_file(format!("Failed to remove {}: {}", self.path.display(), e))
        })
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = remove_if_present(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove local artifact");
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Hex-encoded SHA-256 digest of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
