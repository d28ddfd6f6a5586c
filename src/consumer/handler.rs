use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::HandlerError;
use crate::message::Message;

/// Trait for handling SQS messages one at a time.
///
/// Returning `Ok(())` deletes the message from the queue. Returning an error
/// leaves it on the queue, to be redelivered once its visibility timeout
/// expires (or immediately, with `release_visibility_on_failure`).
///
/// When a handler deadline is configured the handler runs as its own task and
/// keeps running after the deadline passes; its result is then ignored.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: Message) -> Result<(), HandlerError>;
}

/// Trait for handling every message of a receive response in one call.
///
/// The whole batch succeeds or fails together.
#[async_trait]
pub trait BatchMessageHandler: Send + Sync {
    async fn handle_message_batch(&self, messages: &[Message]) -> Result<(), HandlerError>;
}

/// The handler a consumer dispatches to, fixed at construction.
#[derive(Clone)]
pub enum HandlerMode {
    Single(Arc<dyn MessageHandler>),
    Batch(Arc<dyn BatchMessageHandler>),
}

impl HandlerMode {
    pub fn is_batch(&self) -> bool {
        matches!(self, HandlerMode::Batch(_))
    }
}

impl std::fmt::Debug for HandlerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerMode::Single(_) => f.write_str("Single"),
            HandlerMode::Batch(_) => f.write_str("Batch"),
        }
    }
}

/// Implementation of [`MessageHandler`] that wraps a function and shared resources.
///
/// Every invocation receives its own clone of the shared resources.
///
/// # Type Parameters
///
/// * `F` - The message handler function type
/// * `Fut` - The future returned by the handler function
/// * `TShared` - The type of shared resources passed to the handler
pub struct MessageHandlerFn<F, Fut, TShared> {
    handler_fn: F,
    shared_resources: TShared,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut, TShared> MessageHandlerFn<F, Fut, TShared>
where
    F: Fn(Message, TShared) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
    TShared: Clone + Send + Sync,
{
    pub fn new(handler_fn: F, shared_resources: TShared) -> Self {
        MessageHandlerFn {
            handler_fn,
            shared_resources,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, TShared> MessageHandler for MessageHandlerFn<F, Fut, TShared>
where
    F: Fn(Message, TShared) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
    TShared: Clone + Send + Sync,
{
    async fn handle_message(&self, message: Message) -> Result<(), HandlerError> {
        (self.handler_fn)(message, self.shared_resources.clone()).await
    }
}

/// Implementation of [`BatchMessageHandler`] that wraps a function and shared resources.
///
/// The function receives an owned copy of the batch.
pub struct BatchMessageHandlerFn<F, Fut, TShared> {
    handler_fn: F,
    shared_resources: TShared,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut, TShared> BatchMessageHandlerFn<F, Fut, TShared>
where
    F: Fn(Vec<Message>, TShared) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
    TShared: Clone + Send + Sync,
{
    pub fn new(handler_fn: F, shared_resources: TShared) -> Self {
        BatchMessageHandlerFn {
            handler_fn,
            shared_resources,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, TShared> BatchMessageHandler for BatchMessageHandlerFn<F, Fut, TShared>
where
    F: Fn(Vec<Message>, TShared) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
    TShared: Clone + Send + Sync,
{
    async fn handle_message_batch(&self, messages: &[Message]) -> Result<(), HandlerError> {
        (self.handler_fn)(messages.to_vec(), self.shared_resources.clone()).await
    }
}
