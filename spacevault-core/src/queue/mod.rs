/*!
Queue acknowledgement.

After a successful upload the triggering message is deleted so the queue
does not redeliver it.
*/

#[cfg(feature = "aws")]
pub mod sqs;

use crate::Result;
use async_trait::async_trait;

/// Queue abstraction for acknowledging trigger messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Delete the message identified by `receipt_handle`
    async fn delete_message(&self, receipt_handle: &str) -> Result<()>;
}

#[cfg(feature = "aws")]
pub use sqs::SqsMessageQueue;
