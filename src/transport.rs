use async_trait::async_trait;

use crate::errors::TransportError;
use crate::message::Message;

mod sqs;

pub use sqs::SqsTransport;

/// Parameters of a single receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: String,
    /// System attribute names to return with each message.
    pub attribute_names: Vec<String>,
    /// User-defined message attribute names to return with each message.
    pub message_attribute_names: Vec<String>,
    pub max_number_of_messages: i32,
    /// Long-poll duration, in seconds.
    pub wait_time_seconds: i32,
    /// Visibility timeout applied to the received messages, in seconds.
    pub visibility_timeout: Option<i32>,
}

/// An entry of a batch delete or batch visibility change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Identifier of the entry within the batch call.
    pub id: String,
    pub receipt_handle: String,
}

impl From<&Message> for BatchEntry {
    fn from(message: &Message) -> Self {
        BatchEntry {
            id: message.message_id().to_string(),
            receipt_handle: message.receipt_handle().to_string(),
        }
    }
}

/// The queue operations the consumer relies on.
///
/// [`SqsTransport`] implements this over the AWS SDK. Custom implementations
/// may be used for other SQS-compatible services or in tests.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Receives up to `max_number_of_messages` messages.
    ///
    /// Returns `Ok(None)` when the service produced no response at all and
    /// `Ok(Some(vec![]))` when the long poll ended without messages.
    async fn receive(&self, request: &ReceiveRequest)
    -> Result<Option<Vec<Message>>, TransportError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError>;

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[BatchEntry],
    ) -> Result<(), TransportError>;

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: i32,
    ) -> Result<(), TransportError>;

    async fn change_visibility_batch(
        &self,
        queue_url: &str,
        entries: &[BatchEntry],
        visibility_timeout: i32,
    ) -> Result<(), TransportError>;
}
