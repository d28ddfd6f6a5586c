//! # Consumer lifecycle events
//!
//! The consumer publishes a [`ConsumerEvent`] at every lifecycle point of the
//! poll cycle. Observers register through
//! [`ConsumerBuilder::observer`](crate::consumer::ConsumerBuilder::observer) and
//! match on the variants they care about.
//!
//! ```rust
//! use rs_sqs_consumer::events::ConsumerEvent;
//!
//! let observer = |event: &ConsumerEvent<'_>| match event {
//!     ConsumerEvent::MessageProcessed(message) => {
//!         println!("processed {}", message.message_id());
//!     }
//!     ConsumerEvent::ProcessingError { error, .. } => eprintln!("{error}"),
//!     _ => {}
//! };
//! observer(&ConsumerEvent::Empty);
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::SqsConsumerError;
use crate::message::Message;

/// Union of all events published by the consumer.
///
/// Events borrow the messages and errors of the cycle that produced them and
/// are only valid for the duration of the observer call.
#[derive(Debug, Clone, Copy)]
pub enum ConsumerEvent<'a> {
    /// The consumer was stopped.
    Stopped,
    /// A message is about to be handed to the handler.
    MessageReceived(&'a Message),
    /// A message was handled and deleted.
    MessageProcessed(&'a Message),
    /// A batch is about to be handed to the batch handler.
    BatchMessageReceived(&'a [Message]),
    /// A batch was handled and deleted.
    BatchMessageProcessed(&'a [Message]),
    /// Every message of a receive response has been dealt with.
    ResponseProcessed,
    /// The long poll ended without messages.
    Empty,
    /// The transport produced no response at all.
    NullResponse,
    /// A queue operation failed, or a batch handler failed.
    Error {
        error: &'a SqsConsumerError,
        subject: EventSubject<'a>,
    },
    /// A message handler exceeded its deadline.
    TimeoutError {
        error: &'a SqsConsumerError,
        message: &'a Message,
    },
    /// A message handler failed.
    ProcessingError {
        error: &'a SqsConsumerError,
        message: &'a Message,
    },
}

/// What an [`ConsumerEvent::Error`] refers to.
#[derive(Debug, Clone, Copy)]
pub enum EventSubject<'a> {
    /// The error is not tied to any message, e.g. a failed receive.
    None,
    Message(&'a Message),
    Batch(&'a [Message]),
}

impl ConsumerEvent<'_> {
    /// The event's wire name, as used by observability integrations.
    pub fn name(&self) -> &'static str {
        match self {
            ConsumerEvent::Stopped => "stopped",
            ConsumerEvent::MessageReceived(_) => "message_received",
            ConsumerEvent::MessageProcessed(_) => "message_processed",
            ConsumerEvent::BatchMessageReceived(_) => "batch_message_received",
            ConsumerEvent::BatchMessageProcessed(_) => "batch_message_processed",
            ConsumerEvent::ResponseProcessed => "response_processed",
            ConsumerEvent::Empty => "empty",
            ConsumerEvent::NullResponse => "null_response",
            ConsumerEvent::Error { .. } => "error",
            ConsumerEvent::TimeoutError { .. } => "timeout_error",
            ConsumerEvent::ProcessingError { .. } => "processing_error",
        }
    }

    /// The error carried by the event, if any.
    pub fn error(&self) -> Option<&SqsConsumerError> {
        match self {
            ConsumerEvent::Error { error, .. }
            | ConsumerEvent::TimeoutError { error, .. }
            | ConsumerEvent::ProcessingError { error, .. } => Some(*error),
            _ => None,
        }
    }
}

/// Receives consumer events.
///
/// Observers are called synchronously from the poll loop and must not block.
pub trait ConsumerObserver: Send + Sync {
    fn on_event(&self, event: &ConsumerEvent<'_>);
}

impl<F> ConsumerObserver for F
where
    F: Fn(&ConsumerEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ConsumerEvent<'_>) {
        self(event)
    }
}

/// Observer that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ConsumerObserver for TracingObserver {
    fn on_event(&self, event: &ConsumerEvent<'_>) {
        let event_name = event.name();
        match event {
            ConsumerEvent::MessageReceived(message) | ConsumerEvent::MessageProcessed(message) => {
                debug!(event = event_name, message_id = message.message_id());
            }
            ConsumerEvent::BatchMessageReceived(batch)
            | ConsumerEvent::BatchMessageProcessed(batch) => {
                debug!(event = event_name, batch_size = batch.len());
            }
            ConsumerEvent::Error { error, subject } => match subject {
                EventSubject::None => warn!(event = event_name, error = %error),
                EventSubject::Message(message) => {
                    warn!(event = event_name, message_id = message.message_id(), error = %error)
                }
                EventSubject::Batch(batch) => {
                    warn!(event = event_name, batch_size = batch.len(), error = %error)
                }
            },
            ConsumerEvent::TimeoutError { error, message }
            | ConsumerEvent::ProcessingError { error, message } => {
                warn!(event = event_name, message_id = message.message_id(), error = %error);
            }
            _ => debug!(event = event_name),
        }
    }
}

/// Fans events out to every registered observer.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    observers: Vec<Arc<dyn ConsumerObserver>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, observer: Arc<dyn ConsumerObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn publish(&self, event: ConsumerEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}
