use std::time::Duration;

use crate::errors::SqsConsumerError;
use crate::transport::ReceiveRequest;

/// Upper bound of `MaxNumberOfMessages` accepted by `ReceiveMessage`.
pub const MAX_BATCH_SIZE: i32 = 10;
/// Upper bound of `WaitTimeSeconds` accepted by `ReceiveMessage`.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;
/// Upper bound of a visibility timeout (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 43_200;

/// Configuration for the SQS consumer.
///
/// The handler is configured separately on the
/// [`ConsumerBuilder`](super::ConsumerBuilder); everything else lives here so a
/// configuration can be built once and shared between consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// URL of the queue to consume.
    pub queue_url: String,

    /// The maximum number of messages to receive in a single request, 1 to 10.
    pub batch_size: i32,

    /// The wait time for long polling, in seconds.
    pub wait_time_seconds: i32,

    /// Visibility timeout requested on receive, in seconds.
    pub visibility_timeout: Option<i32>,

    /// Deadline for a single-message handler invocation.
    pub handle_message_timeout: Option<Duration>,

    /// Make a message visible again as soon as its handler fails.
    pub release_visibility_on_failure: bool,

    /// Delay before the next receive after an authentication failure.
    pub authentication_error_timeout: Duration,

    /// Delay between two poll cycles.
    pub polling_wait_time: Duration,

    /// System attribute names forwarded to the receive call.
    pub attribute_names: Vec<String>,

    /// Message attribute names forwarded to the receive call.
    pub message_attribute_names: Vec<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            queue_url: String::new(),
            batch_size: 1,
            wait_time_seconds: 20,
            visibility_timeout: None,
            handle_message_timeout: None,
            release_visibility_on_failure: false,
            authentication_error_timeout: Duration::from_millis(10_000),
            polling_wait_time: Duration::ZERO,
            attribute_names: Vec::new(),
            message_attribute_names: Vec::new(),
        }
    }
}

impl ConsumerConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        ConsumerConfig {
            queue_url: queue_url.into(),
            ..Default::default()
        }
    }

    /// Checks every option against the limits of the SQS API.
    pub fn validate(&self) -> Result<(), SqsConsumerError> {
        if self.queue_url.trim().is_empty() {
            return Err(SqsConsumerError::MissingOption("queue_url"));
        }

        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(SqsConsumerError::invalid_option(
                "batch_size",
                format!(
                    "must be between 1 and {MAX_BATCH_SIZE}, got {}",
                    self.batch_size
                ),
            ));
        }

        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(SqsConsumerError::invalid_option(
                "wait_time_seconds",
                format!(
                    "must be between 0 and {MAX_WAIT_TIME_SECONDS}, got {}",
                    self.wait_time_seconds
                ),
            ));
        }

        if let Some(visibility_timeout) = self.visibility_timeout {
            if !(0..=MAX_VISIBILITY_TIMEOUT_SECONDS).contains(&visibility_timeout) {
                return Err(SqsConsumerError::invalid_option(
                    "visibility_timeout",
                    format!(
                        "must be between 0 and {MAX_VISIBILITY_TIMEOUT_SECONDS}, got {visibility_timeout}"
                    ),
                ));
            }
        }

        if self.handle_message_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SqsConsumerError::invalid_option(
                "handle_message_timeout",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    pub(crate) fn receive_request(&self) -> ReceiveRequest {
        ReceiveRequest {
            queue_url: self.queue_url.clone(),
            attribute_names: self.attribute_names.clone(),
            message_attribute_names: self.message_attribute_names.clone(),
            max_number_of_messages: self.batch_size,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout: self.visibility_timeout,
        }
    }
}
