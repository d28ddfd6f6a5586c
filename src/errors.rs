use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type returned by user message handlers.
///
/// Handlers may return any error. A [`TransportError`] or
/// [`SqsConsumerError`] returned from a handler keeps its own classification;
/// everything else is reported as a processing failure.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the SQS consumer.
///
/// Construction errors are returned synchronously by
/// [`ConsumerBuilder::build`](crate::consumer::ConsumerBuilder::build) and never
/// reach the poll loop. The remaining variants are produced while polling and
/// are published through [`ConsumerEvent`](crate::events::ConsumerEvent)s.
#[derive(Debug, Error)]
pub enum SqsConsumerError {
    /// Error that occurs during AWS SQS client initialization.
    ///
    /// This error typically happens when there are issues with AWS credentials,
    /// region configuration, or network connectivity during client setup.
    #[error("failed to initialize AWS SQS client: {0}")]
    InitializationError(String),

    /// A required consumer option was not supplied.
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),

    /// A consumer option was supplied with an out-of-range value.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    /// Both a single-message handler and a batch handler were supplied.
    #[error("`handler` and `batch_handler` are mutually exclusive")]
    ConflictingHandlers,

    /// A queue operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The message handler did not finish before the configured deadline.
    #[error("message handler timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// The message handler failed with an error of its own.
    #[error("unexpected message handler failure: {0}")]
    Processing(#[source] HandlerError),

    #[error("{0}")]
    GenericError(#[from] GenericError),
}

impl SqsConsumerError {
    /// Converts an error returned by a handler into a consumer error.
    ///
    /// Errors that already belong to this crate are unwrapped so that a
    /// handler forwarding a queue failure is still classified as transport.
    pub fn from_handler_error(error: HandlerError) -> Self {
        let error = match error.downcast::<SqsConsumerError>() {
            Ok(error) => return *error,
            Err(error) => error,
        };

        match error.downcast::<TransportError>() {
            Ok(error) => SqsConsumerError::Transport(*error),
            Err(error) => SqsConsumerError::Processing(error),
        }
    }

    pub(crate) fn invalid_option(option: &'static str, reason: impl Into<String>) -> Self {
        SqsConsumerError::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}

/// Failure surfaced by a queue operation (receive, delete or visibility change),
/// decorated with whatever metadata the transport could extract.
#[derive(Debug, Clone, Error)]
#[error("SQS {operation} failed: {message}")]
pub struct TransportError {
    /// The queue operation that failed, e.g. `receive_message`.
    pub operation: &'static str,
    pub message: String,
    /// HTTP status code of the raw response, when one was received.
    pub status_code: Option<u16>,
    /// Service error code, e.g. `AWS.SimpleQueueService.NonExistentQueue`.
    pub code: Option<String>,
    pub retryable: bool,
    pub region: Option<String>,
    pub hostname: Option<String>,
    pub time: DateTime<Utc>,
}

impl TransportError {
    /// Creates a transport error with no metadata beyond the operation and message.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        TransportError {
            operation,
            message: message.into(),
            status_code: None,
            code: None,
            retryable: false,
            region: None,
            hostname: None,
            time: Utc::now(),
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

/// Generic error type for handlers that just want to fail with a message.
#[derive(Debug, Error)]
pub struct GenericError(String);

impl GenericError {
    /// Creates a new `GenericError` with the provided message.
    pub fn new(message: impl Into<String>) -> Self {
        GenericError(message.into())
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GenericError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(GenericError::new(s))
    }
}

impl From<String> for GenericError {
    fn from(s: String) -> Self {
        GenericError::new(s)
    }
}

impl From<&str> for GenericError {
    fn from(s: &str) -> Self {
        GenericError::new(s)
    }
}
