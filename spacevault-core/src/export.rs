/*!
Export collaborator.

The space export itself is performed by an external bulk-export tool. This
module describes what is asked of it ([`ExportRequest`]) and provides an
adapter that runs the tool as a child process.

Credentials never reach the child's command line. The request is written to
a JSON config file readable only by the current user, and the tool is
pointed at it with `--config`.
*/

use async_trait::async_trait;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::{Secret, SpaceConfig};
use crate::paths::BackupPaths;
use crate::{BackupError, Result};

/// Page size ceiling used by the exporter's internal pagination
pub const MAX_ALLOWED_LIMIT: u32 = 200;

/// Bytes of stderr kept in an export error message
const STDERR_TAIL_BYTES: usize = 2048;

/// Name prefix of the per-run export config file
const CONFIG_FILE_PREFIX: &str = ".export-config-";

/// Everything the export collaborator needs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub space_id: String,
    pub environment_id: String,
    pub management_token: Secret,
    pub delivery_token: Secret,
    /// Directory the export file is written into
    pub export_dir: PathBuf,
    /// Name of the export file inside `export_dir`
    pub content_file: String,
    pub use_verbose_renderer: bool,
    pub save_file: bool,
    pub include_drafts: bool,
    pub max_allowed_limit: u32,
}

impl ExportRequest {
    /// Request a full export (drafts included) into the run's export path
    pub fn new(space: &SpaceConfig, paths: &BackupPaths) -> Self {
        Self {
            space_id: space.space_id.clone(),
            environment_id: space.environment_id.clone(),
            management_token: space.management_token.clone(),
            delivery_token: space.delivery_token.clone(),
            export_dir: paths.work_dir.clone(),
            content_file: paths.export_file_name.clone(),
            use_verbose_renderer: false,
            save_file: true,
            include_drafts: true,
            max_allowed_limit: MAX_ALLOWED_LIMIT,
        }
    }

    /// Path the export file is expected at once the export completes
    pub fn output_path(&self) -> PathBuf {
        self.export_dir.join(&self.content_file)
    }

    /// Options in the config-file form understood by `contentful-export`
    ///
    /// Contains the raw tokens; only ever written to a private file.
    pub fn to_config_json(&self) -> serde_json::Value {
        json!({
            "spaceId": self.space_id,
            "environmentId": self.environment_id,
            "managementToken": self.management_token.expose(),
            "deliveryToken": self.delivery_token.expose(),
            "exportDir": self.export_dir.to_string_lossy(),
            "contentFile": self.content_file,
            "useVerboseRenderer": self.use_verbose_renderer,
            "saveFile": self.save_file,
            "includeDrafts": self.include_drafts,
            "maxAllowedLimit": self.max_allowed_limit,
        })
    }

    /// Write the options to a fresh config file in the export directory
    ///
    /// The file is created with owner-only permissions and is removed when
    /// the returned handle is dropped.
    pub fn write_config_file(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(CONFIG_FILE_PREFIX)
            .suffix(".json")
            .tempfile_in(&self.export_dir)
            .map_err(|e| {
                BackupError::export(format!(
                    "Failed to create export config in {}: {}",
                    self.export_dir.display(),
                    e
                ))
            })?;
        serde_json::to_writer(&mut file, &self.to_config_json())?;
        file.flush()?;
        Ok(file)
    }

    /// Command-line arguments for `contentful-export`, given its config file
    pub fn to_cli_args(config_path: &Path) -> Vec<String> {
        vec![
            "--config".to_string(),
            config_path.to_string_lossy().into_owned(),
        ]
    }
}

/// Export abstraction
///
/// Returns once the export file has been written, or fails.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, request: &ExportRequest) -> Result<()>;
}

/// Runs the `contentful-export` executable as a child process
#[derive(Debug, Clone)]
pub struct ContentfulCliExporter {
    program: PathBuf,
}

impl ContentfulCliExporter {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl Exporter for ContentfulCliExporter {
    async fn export(&self, request: &ExportRequest) -> Result<()> {
        info!(
            space_id = %request.space_id,
            environment_id = %request.environment_id,
            content_file = %request.content_file,
            "Starting space export"
        );
        let start = Instant::now();

        // Held until the child exits; dropping it removes the file.
        let config_file = request.write_config_file()?;
        debug!(config = %config_file.path().display(), "Wrote export config");

        let output = Command::new(&self.program)
            .args(ExportRequest::to_cli_args(config_file.path()))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BackupError::export(format!(
                    "Failed to launch {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            error!(
                status = %output.status,
                stderr = %stderr,
                "Space export exited with failure"
            );
            return Err(BackupError::export(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr
            )));
        }

        let expected = request.output_path();
        if !expected.is_file() {
            return Err(BackupError::export(format!(
                "export finished but {} was not written",
                expected.display()
            )));
        }

        debug!(
            path = %expected.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Space export completed"
        );
        Ok(())
    }
}

/// Last few KiB of the child's stderr, trimmed
fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
