use async_trait::async_trait;
use aws_sdk_sqs::config::http::HttpResponse;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::{
    ChangeMessageVisibilityBatchRequestEntry, DeleteMessageBatchRequestEntry,
    MessageSystemAttributeName,
};
use tracing::{debug, instrument, warn};

use super::{BatchEntry, QueueTransport, ReceiveRequest};
use crate::client::create_sqs_client_from_env;
use crate::errors::TransportError;
use crate::message::Message;

/// Error codes SQS returns when the caller is being rate limited.
const THROTTLING_ERROR_CODES: &[&str] = &[
    "AWS.SimpleQueueService.RequestThrottled",
    "RequestThrottled",
    "ThrottlingException",
];

/// [`QueueTransport`] backed by the AWS SDK SQS client.
#[derive(Debug, Clone)]
pub struct SqsTransport {
    sqs_client: aws_sdk_sqs::Client,
}

impl SqsTransport {
    pub fn new(sqs_client: aws_sdk_sqs::Client) -> Self {
        SqsTransport { sqs_client }
    }

    /// Creates a transport whose client is configured from the environment.
    pub async fn from_env() -> Self {
        SqsTransport::new(create_sqs_client_from_env().await)
    }

    pub fn client(&self) -> &aws_sdk_sqs::Client {
        &self.sqs_client
    }

    fn transport_error<E>(
        &self,
        operation: &'static str,
        queue_url: &str,
        error: SdkError<E, HttpResponse>,
    ) -> TransportError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let status_code = error.raw_response().map(|response| response.status().as_u16());
        let code = error.code().map(str::to_string);
        let message = error
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

        let retryable = match &error {
            SdkError::TimeoutError(_)
            | SdkError::DispatchFailure(_)
            | SdkError::ResponseError(_) => true,
            _ => {
                status_code.is_some_and(|status| status >= 500 || status == 429)
                    || code
                        .as_deref()
                        .is_some_and(|code| THROTTLING_ERROR_CODES.contains(&code))
            }
        };

        let mut transport_error =
            TransportError::new(operation, message).with_retryable(retryable);
        if let Some(status_code) = status_code {
            transport_error = transport_error.with_status_code(status_code);
        }
        if let Some(code) = code {
            transport_error = transport_error.with_code(code);
        }
        if let Some(region) = self.sqs_client.config().region() {
            transport_error = transport_error.with_region(region.to_string());
        }
        if let Some(hostname) = hostname(queue_url) {
            transport_error = transport_error.with_hostname(hostname);
        }
        transport_error
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    #[instrument(skip(self, request), fields(queue_url = %request.queue_url))]
    async fn receive(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Option<Vec<Message>>, TransportError> {
        let attribute_names = (!request.attribute_names.is_empty()).then(|| {
            request
                .attribute_names
                .iter()
                .map(|name| MessageSystemAttributeName::from(name.as_str()))
                .collect()
        });
        let message_attribute_names = (!request.message_attribute_names.is_empty())
            .then(|| request.message_attribute_names.clone());

        let output = self
            .sqs_client
            .receive_message()
            .queue_url(&request.queue_url)
            .set_message_system_attribute_names(attribute_names)
            .set_message_attribute_names(message_attribute_names)
            .max_number_of_messages(request.max_number_of_messages)
            .wait_time_seconds(request.wait_time_seconds)
            .set_visibility_timeout(request.visibility_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error("receive_message", &request.queue_url, e))?;

        let messages: Vec<Message> = output.messages().iter().map(Message::from).collect();
        debug!(message_count = messages.len(), "Received messages");
        Ok(Some(messages))
    }

    #[instrument(skip(self, receipt_handle))]
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        self.sqs_client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| self.transport_error("delete_message", queue_url, e))?;
        Ok(())
    }

    #[instrument(skip(self, entries), fields(entry_count = entries.len()))]
    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: &[BatchEntry],
    ) -> Result<(), TransportError> {
        let request_entries = entries
            .iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(&entry.id)
                    .receipt_handle(&entry.receipt_handle)
                    .build()
                    .map_err(|e| TransportError::new("delete_message_batch", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .sqs_client
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(request_entries))
            .send()
            .await
            .map_err(|e| self.transport_error("delete_message_batch", queue_url, e))?;

        partial_failure("delete_message_batch", output.failed())
    }

    #[instrument(skip(self, receipt_handle))]
    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: i32,
    ) -> Result<(), TransportError> {
        self.sqs_client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(visibility_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error("change_message_visibility", queue_url, e))?;
        Ok(())
    }

    #[instrument(skip(self, entries), fields(entry_count = entries.len()))]
    async fn change_visibility_batch(
        &self,
        queue_url: &str,
        entries: &[BatchEntry],
        visibility_timeout: i32,
    ) -> Result<(), TransportError> {
        let request_entries = entries
            .iter()
            .map(|entry| {
                ChangeMessageVisibilityBatchRequestEntry::builder()
                    .id(&entry.id)
                    .receipt_handle(&entry.receipt_handle)
                    .visibility_timeout(visibility_timeout)
                    .build()
                    .map_err(|e| {
                        TransportError::new("change_message_visibility_batch", e.to_string())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .sqs_client
            .change_message_visibility_batch()
            .queue_url(queue_url)
            .set_entries(Some(request_entries))
            .send()
            .await
            .map_err(|e| self.transport_error("change_message_visibility_batch", queue_url, e))?;

        partial_failure("change_message_visibility_batch", output.failed())
    }
}

/// Turns the failed entries of a batch call into an error.
fn partial_failure(
    operation: &'static str,
    failed: &[aws_sdk_sqs::types::BatchResultErrorEntry],
) -> Result<(), TransportError> {
    let Some(first) = failed.first() else {
        return Ok(());
    };

    let ids: Vec<&str> = failed.iter().map(|entry| entry.id()).collect();
    warn!(operation, failed_ids = ?ids, "Batch entries failed");

    Err(TransportError::new(
        operation,
        format!(
            "{} of the batch entries failed ({})",
            failed.len(),
            ids.join(", ")
        ),
    )
    .with_code(first.code())
    .with_retryable(!first.sender_fault()))
}

/// Extracts the host portion of a queue URL.
fn hostname(queue_url: &str) -> Option<&str> {
    let rest = queue_url
        .split_once("://")
        .map_or(queue_url, |(_, rest)| rest);
    rest.split(['/', ':']).next().filter(|host| !host.is_empty())
}
