use std::sync::Arc;

use tracing::{debug, warn};

use super::ConsumerInner;
use super::handler::{BatchMessageHandler, MessageHandler};
use super::timeout::{catch_panic, run_with_timeout};
use crate::classify::{ErrorKind, classify};
use crate::errors::SqsConsumerError;
use crate::events::{ConsumerEvent, EventSubject};
use crate::message::Message;
use crate::transport::BatchEntry;

impl ConsumerInner {
    /// Handles one message and deletes it on success.
    ///
    /// `message_received` has already been published by the dispatcher.
    pub(super) async fn process_message(
        &self,
        handler: &Arc<dyn MessageHandler>,
        message: &Message,
    ) {
        let invocation = {
            let handler = Arc::clone(handler);
            let message = message.clone();
            async move { handler.handle_message(message).await }
        };

        let result = match run_with_timeout(invocation, self.config.handle_message_timeout).await {
            Ok(()) => self
                .transport
                .delete(&self.config.queue_url, message.receipt_handle())
                .await
                .map_err(SqsConsumerError::from),
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                debug!(message_id = message.message_id(), "Message processed");
                self.events.publish(ConsumerEvent::MessageProcessed(message));
            }
            Err(error) => {
                self.publish_message_failure(&error, message);
                if self.config.release_visibility_on_failure {
                    self.release_message(message).await;
                }
            }
        }
    }

    /// Handles a whole response with one batch handler call.
    pub(super) async fn process_message_batch(
        &self,
        handler: &Arc<dyn BatchMessageHandler>,
        messages: &[Message],
    ) {
        self.events.publish(ConsumerEvent::BatchMessageReceived(messages));
        for message in messages {
            self.events.publish(ConsumerEvent::MessageReceived(message));
        }

        let result = match catch_panic(handler.handle_message_batch(messages)).await {
            Ok(()) => {
                let entries: Vec<BatchEntry> = messages.iter().map(BatchEntry::from).collect();
                self.transport
                    .delete_batch(&self.config.queue_url, &entries)
                    .await
                    .map_err(SqsConsumerError::from)
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                debug!(batch_size = messages.len(), "Batch processed");
                self.events.publish(ConsumerEvent::BatchMessageProcessed(messages));
                for message in messages {
                    self.events.publish(ConsumerEvent::MessageProcessed(message));
                }
            }
            Err(error) => {
                warn!(batch_size = messages.len(), error = %error, "Batch failed");
                self.events.publish(ConsumerEvent::Error {
                    error: &error,
                    subject: EventSubject::Batch(messages),
                });
                if self.config.release_visibility_on_failure {
                    self.release_batch(messages).await;
                }
            }
        }
    }

    fn publish_message_failure(&self, error: &SqsConsumerError, message: &Message) {
        warn!(message_id = message.message_id(), error = %error, "Message failed");
        let event = match classify(error) {
            ErrorKind::Authentication | ErrorKind::Transport => ConsumerEvent::Error {
                error,
                subject: EventSubject::Message(message),
            },
            ErrorKind::Timeout => ConsumerEvent::TimeoutError { error, message },
            ErrorKind::Processing => ConsumerEvent::ProcessingError { error, message },
        };
        self.events.publish(event);
    }

    /// Makes a failed message visible again right away.
    async fn release_message(&self, message: &Message) {
        if let Err(error) = self
            .transport
            .change_visibility(&self.config.queue_url, message.receipt_handle(), 0)
            .await
        {
            let error = SqsConsumerError::from(error);
            warn!(message_id = message.message_id(), error = %error, "Visibility release failed");
            self.events.publish(ConsumerEvent::Error {
                error: &error,
                subject: EventSubject::Message(message),
            });
        }
    }

    async fn release_batch(&self, messages: &[Message]) {
        let entries: Vec<BatchEntry> = messages.iter().map(BatchEntry::from).collect();
        if let Err(error) = self
            .transport
            .change_visibility_batch(&self.config.queue_url, &entries, 0)
            .await
        {
            let error = SqsConsumerError::from(error);
            warn!(batch_size = messages.len(), error = %error, "Visibility release failed");
            self.events.publish(ConsumerEvent::Error {
                error: &error,
                subject: EventSubject::Batch(messages),
            });
        }
    }
}
