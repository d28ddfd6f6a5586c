use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::classify::{ErrorKind, classify};
use crate::errors::{HandlerError, SqsConsumerError};
use crate::events::{ConsumerEvent, ConsumerObserver, EventBus, EventSubject};
use crate::message::Message;
use crate::transport::{QueueTransport, SqsTransport};

mod config;
mod handler;
mod processor;
mod timeout;

pub use config::{
    ConsumerConfig, MAX_BATCH_SIZE, MAX_VISIBILITY_TIMEOUT_SECONDS, MAX_WAIT_TIME_SECONDS,
};
pub use handler::{
    BatchMessageHandler, BatchMessageHandlerFn, HandlerMode, MessageHandler, MessageHandlerFn,
};

/// A long-polling SQS consumer.
///
/// The consumer repeatedly receives messages, hands them to the configured
/// handler and deletes those that were handled successfully. Each cycle waits
/// for all of its messages before the next receive is issued.
///
/// # Example
///
/// ```rust,no_run
/// use rs_sqs_consumer::consumer::Consumer;
/// use rs_sqs_consumer::events::TracingObserver;
/// use rs_sqs_consumer::message::Message;
///
/// use rs_sqs_consumer::errors::SqsConsumerError;
/// use rs_sqs_consumer::transport::SqsTransport;
///
/// # async fn run(client: aws_sdk_sqs::Client) -> Result<(), SqsConsumerError> {
/// let consumer = Consumer::builder(SqsTransport::new(client))
///     .queue_url("https://sqs.us-east-1.amazonaws.com/123456789012/orders")
///     .batch_size(10)
///     .handler_fn(
///         |message: Message, prefix: String| async move {
///             println!("{prefix}: {:?}", message.body());
///             Ok(())
///         },
///         "orders".to_string(),
///     )
///     .observer(TracingObserver)
///     .build()?;
///
/// consumer.start();
/// // ...
/// consumer.stop();
/// consumer.join().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

pub(crate) struct ConsumerInner {
    config: ConsumerConfig,
    handler: HandlerMode,
    transport: Arc<dyn QueueTransport>,
    events: EventBus,
    state: Mutex<LoopState>,
    stop_signal: Notify,
}

#[derive(Debug, Default)]
struct LoopState {
    running: bool,
    /// A loop task exists and has not yet observed a stop.
    loop_active: bool,
    task: Option<JoinHandle<()>>,
}

/// What the loop should do after a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Polled,
    AuthenticationBackoff,
}

impl Consumer {
    /// Starts building a consumer on top of the given transport.
    pub fn builder<T>(transport: T) -> ConsumerBuilder
    where
        T: QueueTransport + 'static,
    {
        ConsumerBuilder::new(Arc::new(transport))
    }

    pub fn builder_with_transport(transport: Arc<dyn QueueTransport>) -> ConsumerBuilder {
        ConsumerBuilder::new(transport)
    }

    /// Starts building a consumer that talks to SQS through `sqs_client`.
    pub fn sqs_builder(sqs_client: aws_sdk_sqs::Client) -> ConsumerBuilder {
        Consumer::builder(SqsTransport::new(sqs_client))
    }

    /// Starts polling on the current tokio runtime.
    ///
    /// Calling `start` on a running consumer does nothing. Calling it after
    /// `stop` but before the previous loop has exited resumes that loop
    /// instead of spawning a second one.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if state.running {
            debug!(queue_url = %self.inner.config.queue_url, "Consumer already running");
            return;
        }
        state.running = true;

        if state.loop_active {
            debug!(queue_url = %self.inner.config.queue_url, "Resuming poll loop");
            return;
        }
        state.loop_active = true;

        info!(queue_url = %self.inner.config.queue_url, "Starting consumer");
        let inner = Arc::clone(&self.inner);
        state.task = Some(tokio::spawn(async move { inner.run().await }));
    }

    /// Stops polling and publishes `stopped`.
    ///
    /// A receive or handler already in flight is not interrupted; the loop
    /// exits before issuing its next receive. A pending backoff wait is cut
    /// short.
    pub fn stop(&self) {
        self.inner.lock_state().running = false;
        self.inner.stop_signal.notify_one();

        info!(queue_url = %self.inner.config.queue_url, "Stopping consumer");
        self.inner.events.publish(ConsumerEvent::Stopped);
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().running
    }

    /// Waits for the poll loop task to exit.
    ///
    /// Returns immediately when no loop was started.
    pub async fn join(&self) {
        let task = self.inner.lock_state().task.take();
        if let Some(task) = task {
            if let Err(join_error) = task.await {
                error!(error = %join_error, "Poll loop task failed");
            }
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.inner.config
    }
}

/// Dropping the consumer stops its loop the same way [`Consumer::stop`] does,
/// without publishing `stopped`.
impl Drop for Consumer {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if !state.running {
            return;
        }
        state.running = false;
        drop(state);

        self.inner.stop_signal.notify_one();
        info!(queue_url = %self.inner.config.queue_url, "Consumer dropped, stopping poll loop");
    }
}

/// Resets the loop state when the poll loop ends without reaching its normal
/// exit (a panic or a dropped task), so that `is_running` reports the truth
/// and a later `start` spawns a fresh loop.
struct LoopExitGuard<'a> {
    inner: &'a ConsumerInner,
    finished: bool,
}

impl Drop for LoopExitGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.inner.lock_state();
        state.running = false;
        state.loop_active = false;
        error!(queue_url = %self.inner.config.queue_url, "Poll loop ended abnormally");
    }
}

impl ConsumerInner {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checked at the top of every cycle. Marks the loop inactive when it
    /// is about to exit, so that a later `start` spawns a fresh one.
    fn should_continue(&self) -> bool {
        let mut state = self.lock_state();
        if !state.running {
            state.loop_active = false;
        }
        state.running
    }

    async fn run(&self) {
        let mut guard = LoopExitGuard {
            inner: self,
            finished: false,
        };
        while self.should_continue() {
            let delay = match self.poll_once().await {
                PollOutcome::Polled => self.config.polling_wait_time,
                PollOutcome::AuthenticationBackoff => self.config.authentication_error_timeout,
            };
            if !delay.is_zero() {
                self.wait(delay).await;
            }
        }
        guard.finished = true;
        info!(queue_url = %self.config.queue_url, "Poll loop exited");
    }

    /// Sleeps for `delay`, returning early if the consumer is stopped.
    async fn wait(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return,
                _ = self.stop_signal.notified() => {
                    if !self.lock_state().running {
                        debug!("Wait interrupted by stop");
                        return;
                    }
                }
            }
        }
    }

    /// Runs one receive → dispatch cycle.
    pub(crate) async fn poll_once(&self) -> PollOutcome {
        let request = self.config.receive_request();
        match self.transport.receive(&request).await {
            Ok(Some(messages)) if !messages.is_empty() => {
                debug!(message_count = messages.len(), "Dispatching messages");
                self.dispatch(&messages).await;
                self.events.publish(ConsumerEvent::ResponseProcessed);
                PollOutcome::Polled
            }
            Ok(Some(_)) => {
                debug!(queue_url = %self.config.queue_url, "Empty receive");
                self.events.publish(ConsumerEvent::Empty);
                PollOutcome::Polled
            }
            Ok(None) => {
                warn!(queue_url = %self.config.queue_url, "Receive returned no response");
                self.events.publish(ConsumerEvent::NullResponse);
                PollOutcome::Polled
            }
            Err(error) => {
                let error = SqsConsumerError::from(error);
                self.events.publish(ConsumerEvent::Error {
                    error: &error,
                    subject: EventSubject::None,
                });

                if classify(&error) == ErrorKind::Authentication {
                    warn!(
                        error = %error,
                        backoff_ms = self.config.authentication_error_timeout.as_millis() as u64,
                        "Authentication failure, backing off"
                    );
                    PollOutcome::AuthenticationBackoff
                } else {
                    error!(error = %error, "Receive failed");
                    PollOutcome::Polled
                }
            }
        }
    }

    async fn dispatch(&self, messages: &[Message]) {
        match &self.handler {
            HandlerMode::Batch(handler) => self.process_message_batch(handler, messages).await,
            HandlerMode::Single(handler) => {
                for message in messages {
                    self.events.publish(ConsumerEvent::MessageReceived(message));
                }
                join_all(
                    messages
                        .iter()
                        .map(|message| self.process_message(handler, message)),
                )
                .await;
            }
        }
    }
}

impl std::fmt::Debug for ConsumerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerInner")
            .field("config", &self.config)
            .field("handler", &self.handler)
            .field("events", &self.events)
            .finish()
    }
}

/// Builder for [`Consumer`].
///
/// Exactly one of [`handler`](Self::handler) / [`batch_handler`](Self::batch_handler)
/// (or their `_fn` variants) must be supplied.
pub struct ConsumerBuilder {
    transport: Arc<dyn QueueTransport>,
    config: ConsumerConfig,
    handler: Option<Arc<dyn MessageHandler>>,
    batch_handler: Option<Arc<dyn BatchMessageHandler>>,
    events: EventBus,
}

impl ConsumerBuilder {
    fn new(transport: Arc<dyn QueueTransport>) -> Self {
        ConsumerBuilder {
            transport,
            config: ConsumerConfig::default(),
            handler: None,
            batch_handler: None,
            events: EventBus::default(),
        }
    }

    /// Replaces every option with those of `config`.
    pub fn config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.config.queue_url = queue_url.into();
        self
    }

    pub fn handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Uses a function with shared resources as the single-message handler.
    pub fn handler_fn<F, Fut, TShared>(self, handler_fn: F, shared_resources: TShared) -> Self
    where
        F: Fn(Message, TShared) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
        TShared: Clone + Send + Sync + 'static,
    {
        self.handler(MessageHandlerFn::new(handler_fn, shared_resources))
    }

    pub fn batch_handler(mut self, handler: impl BatchMessageHandler + 'static) -> Self {
        self.batch_handler = Some(Arc::new(handler));
        self
    }

    /// Uses a function with shared resources as the batch handler.
    pub fn batch_handler_fn<F, Fut, TShared>(self, handler_fn: F, shared_resources: TShared) -> Self
    where
        F: Fn(Vec<Message>, TShared) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
        TShared: Clone + Send + Sync + 'static,
    {
        self.batch_handler(BatchMessageHandlerFn::new(handler_fn, shared_resources))
    }

    pub fn batch_size(mut self, batch_size: i32) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn wait_time_seconds(mut self, wait_time_seconds: i32) -> Self {
        self.config.wait_time_seconds = wait_time_seconds;
        self
    }

    pub fn visibility_timeout(mut self, visibility_timeout: i32) -> Self {
        self.config.visibility_timeout = Some(visibility_timeout);
        self
    }

    pub fn handle_message_timeout(mut self, timeout: Duration) -> Self {
        self.config.handle_message_timeout = Some(timeout);
        self
    }

    pub fn release_visibility_on_failure(mut self, release: bool) -> Self {
        self.config.release_visibility_on_failure = release;
        self
    }

    pub fn authentication_error_timeout(mut self, timeout: Duration) -> Self {
        self.config.authentication_error_timeout = timeout;
        self
    }

    pub fn polling_wait_time(mut self, wait: Duration) -> Self {
        self.config.polling_wait_time = wait;
        self
    }

    pub fn attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.attribute_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn message_attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.message_attribute_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Registers an observer for consumer events.
    pub fn observer(mut self, observer: impl ConsumerObserver + 'static) -> Self {
        self.events.subscribe(Arc::new(observer));
        self
    }

    /// Validates the options and creates a stopped consumer.
    pub fn build(self) -> Result<Consumer, SqsConsumerError> {
        let handler = match (self.handler, self.batch_handler) {
            (Some(handler), None) => HandlerMode::Single(handler),
            (None, Some(batch_handler)) => HandlerMode::Batch(batch_handler),
            (Some(_), Some(_)) => return Err(SqsConsumerError::ConflictingHandlers),
            (None, None) => return Err(SqsConsumerError::MissingOption("handler")),
        };
        self.config.validate()?;

        Ok(Consumer {
            inner: Arc::new(ConsumerInner {
                config: self.config,
                handler,
                transport: self.transport,
                events: self.events,
                state: Mutex::new(LoopState::default()),
                stop_signal: Notify::new(),
            }),
        })
    }
}
