//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::events::{ConsumerEvent, ConsumerObserver, EventSubject};
use crate::message::Message;
use crate::transport::{BatchEntry, QueueTransport, ReceiveRequest};

/// A queue operation recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Receive(ReceiveRequest),
    Delete(String),
    /// Entry ids of a batch delete.
    DeleteBatch(Vec<String>),
    ChangeVisibility(String, i32),
    /// Entry ids and timeout of a batch visibility change.
    ChangeVisibilityBatch(Vec<String>, i32),
}

type ReceiveResult = Result<Option<Vec<Message>>, TransportError>;

/// Transport that serves scripted receive results and records every call.
///
/// Once the script is exhausted a receive behaves like an empty long poll and
/// sleeps for the requested wait time.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<ReceiveResult>>,
    calls: Mutex<Vec<Call>>,
    delete_error: Mutex<Option<TransportError>>,
    visibility_error: Mutex<Option<TransportError>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(MockTransport::default())
    }

    pub(crate) fn push_response(&self, response: ReceiveResult) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn push_messages(&self, messages: Vec<Message>) {
        self.push_response(Ok(Some(messages)));
    }

    pub(crate) fn fail_deletes(&self, error: TransportError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_visibility_changes(&self, error: TransportError) {
        *self.visibility_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn receive_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Receive(_)))
            .count()
    }

    /// Receipt handles passed to single deletes.
    pub(crate) fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete(receipt_handle) => Some(receipt_handle),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn batch_deletes(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteBatch(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn visibility_changes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::ChangeVisibility(..) | Call::ChangeVisibilityBatch(..)
                )
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueTransport for MockTransport {
    async fn receive(&self, request: &ReceiveRequest) -> ReceiveResult {
        self.record(Call::Receive(request.clone()));
        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => {
                tokio::time::sleep(Duration::from_secs(request.wait_time_seconds.max(1) as u64))
                    .await;
                Ok(Some(Vec::new()))
            }
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), TransportError> {
        self.record(Call::Delete(receipt_handle.to_string()));
        match self.delete_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn delete_batch(
        &self,
        _queue_url: &str,
        entries: &[BatchEntry],
    ) -> Result<(), TransportError> {
        self.record(Call::DeleteBatch(entry_ids(entries)));
        match self.delete_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn change_visibility(
        &self,
        _queue_url: &str,
        receipt_handle: &str,
        visibility_timeout: i32,
    ) -> Result<(), TransportError> {
        self.record(Call::ChangeVisibility(
            receipt_handle.to_string(),
            visibility_timeout,
        ));
        match self.visibility_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn change_visibility_batch(
        &self,
        _queue_url: &str,
        entries: &[BatchEntry],
        visibility_timeout: i32,
    ) -> Result<(), TransportError> {
        self.record(Call::ChangeVisibilityBatch(
            entry_ids(entries),
            visibility_timeout,
        ));
        match self.visibility_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn entry_ids(entries: &[BatchEntry]) -> Vec<String> {
    entries.iter().map(|entry| entry.id.clone()).collect()
}

/// `count` messages with ids `m-1..` and receipt handles `rh-1..`.
pub(crate) fn messages(count: usize) -> Vec<Message> {
    (1..=count)
        .map(|i| Message::new(format!("m-{i}"), format!("rh-{i}"), Some(format!("body {i}"))))
        .collect()
}

/// Records the name and message ids of every event.
#[derive(Clone, Default)]
pub(crate) struct RecordingObserver {
    events: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingObserver {
    pub(crate) fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|event| *event == name).count()
    }

    /// Names of the events that refer to `message_id`, in publication order.
    pub(crate) fn events_for(&self, message_id: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == message_id))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl ConsumerObserver for RecordingObserver {
    fn on_event(&self, event: &ConsumerEvent<'_>) {
        let ids = match event {
            ConsumerEvent::MessageReceived(message)
            | ConsumerEvent::MessageProcessed(message)
            | ConsumerEvent::TimeoutError { message, .. }
            | ConsumerEvent::ProcessingError { message, .. }
            | ConsumerEvent::Error {
                subject: EventSubject::Message(message),
                ..
            } => vec![message.message_id().to_string()],
            ConsumerEvent::BatchMessageReceived(batch)
            | ConsumerEvent::BatchMessageProcessed(batch)
            | ConsumerEvent::Error {
                subject: EventSubject::Batch(batch),
                ..
            } => batch.iter().map(|m| m.message_id().to_string()).collect(),
            _ => Vec::new(),
        };
        self.events
            .lock()
            .unwrap()
            .push((event.name().to_string(), ids));
    }
}
