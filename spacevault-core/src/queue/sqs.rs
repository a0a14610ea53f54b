/*!
Amazon SQS message queue.
*/

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::ProvideErrorMetadata;
use aws_sdk_sqs::Client as SqsClient;
use aws_smithy_runtime_api::client::result::SdkError;
use tracing::{debug, error, info};

use super::MessageQueue;
use crate::aws::{describe_sdk_error, service_error_code};
use crate::{BackupError, Result};

/// Deletes trigger messages from an SQS queue
#[derive(Debug, Clone)]
pub struct SqsMessageQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsMessageQueue {
    pub fn new<U: Into<String>>(sdk_config: &SdkConfig, queue_url: U) -> Self {
        Self::with_client(SqsClient::new(sdk_config), queue_url)
    }

    pub fn with_client<U: Into<String>>(client: SqsClient, queue_url: U) -> Self {
        let queue_url = queue_url.into();
        info!(queue_url = %queue_url, "Initialized SQS message queue");
        Self { client, queue_url }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn delete_message(&self, receipt_handle: &str) -> Result<()> {
        debug!(queue_url = %self.queue_url, "Deleting message from queue");

        let result = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(queue_url = %self.queue_url, "Message deleted");
                Ok(())
            }
            Err(e) => {
                let mapped_error = map_sqs_error("delete_message", &e, &self.queue_url);
                error!(
                    queue_url = %self.queue_url,
                    error = %mapped_error,
                    "Failed to delete message"
                );
                Err(mapped_error)
            }
        }
    }
}

/// Map AWS SDK errors to BackupError with appropriate context
fn map_sqs_error<E, R>(op: &str, error: &SdkError<E, R>, queue_url: &str) -> BackupError
where
    E: ProvideErrorMetadata + std::error::Error,
    R: std::fmt::Debug,
{
    match service_error_code(error) {
        Some("ReceiptHandleIsInvalid") | Some("InvalidIdFormat") => {
            BackupError::acknowledge("SQS rejected the receipt handle".to_string())
        }
        Some("AWS.SimpleQueueService.NonExistentQueue") | Some("QueueDoesNotExist") => {
            BackupError::acknowledge(format!("SQS queue '{queue_url}' does not exist"))
        }
        Some("AccessDenied") | Some("AccessDeniedException") => BackupError::acknowledge(format!(
            "Access denied deleting from SQS queue '{queue_url}' (check IAM permissions)"
        )),
        _ => BackupError::acknowledge(describe_sdk_error("SQS", op, error)),
    }
}
