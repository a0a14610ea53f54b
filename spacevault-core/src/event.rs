/*!
Trigger events and the job's terminal response.

A backup is triggered by a queue delivery shaped like an SQS batch event.
Only the first record's receipt handle matters to the job; the remaining
fields are kept for logging.
*/

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::{BackupError, Result};

/// HTTP-style status for a completed backup
pub const STATUS_OK: u16 = 200;

/// HTTP-style status for any failed step
pub const STATUS_FAILED: u16 = 500;

/// A single delivered queue message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    /// Opaque token needed to delete the message
    #[serde(default)]
    pub receipt_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl QueueRecord {
    pub fn new<S: Into<String>>(receipt_handle: S) -> Self {
        Self {
            receipt_handle: receipt_handle.into(),
            message_id: None,
            event_source: None,
            body: None,
        }
    }
}

/// The event that triggers one backup run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueRecord>,
}

impl QueueEvent {
    /// Build an event carrying a single receipt handle
    pub fn single<S: Into<String>>(receipt_handle: S) -> Self {
        Self {
            records: vec![QueueRecord::new(receipt_handle)],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// The record whose message is acknowledged after a successful upload
    pub fn first_record(&self) -> Result<&QueueRecord> {
        self.records
            .first()
            .ok_or_else(|| BackupError::invalid_event("event contains no records"))
    }

    /// Receipt handle of the first record
    pub fn receipt_handle(&self) -> Result<&str> {
        let record = self.first_record()?;
        if record.receipt_handle.is_empty() {
            return Err(BackupError::invalid_event(
                "first record has no receipt handle",
            ));
        }
        Ok(&record.receipt_handle)
    }
}

/// Terminal output of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    pub status_code: u16,
    pub body: String,
}

impl BackupResponse {
    pub fn ok<S: Into<String>>(body: S) -> Self {
        Self {
            status_code: STATUS_OK,
            body: body.into(),
        }
    }

    pub fn failed<S: Into<String>>(body: S) -> Self {
        Self {
            status_code: STATUS_FAILED,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
