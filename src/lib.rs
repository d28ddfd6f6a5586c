//! # AWS SQS Consumer
//!
//! A long-polling AWS SQS consumer: it repeatedly receives batches of
//! messages, dispatches them to a user-supplied handler and deletes the
//! messages that were handled successfully.
//!
//! ## Features
//!
//! - Single-message handlers, processed concurrently within a batch, or
//!   whole-batch handlers with one delete call per batch
//! - Optional per-message handler deadline
//! - Optional immediate visibility release when a handler fails
//! - Backoff after authentication failures, so credential refreshes recover
//! - Typed lifecycle events for observability
//! - Trait-based transport, with an implementation over the AWS SDK
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rs_sqs_consumer::{client::create_sqs_client_from_env, consumer::Consumer, message::Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = create_sqs_client_from_env().await;
//!     let queue_url = "https://sqs.region.amazonaws.com/account/queue-name";
//!     let shared_data = "shared state".to_string();
//!
//!     let consumer = Consumer::sqs_builder(client)
//!         .queue_url(queue_url)
//!         .handler_fn(
//!             |message: Message, shared: String| async move {
//!                 println!("Processing message: {:?} with shared: {}", message.body(), shared);
//!                 Ok(())
//!             },
//!             shared_data,
//!         )
//!         .build()?;
//!
//!     consumer.start();
//!     tokio::signal::ctrl_c().await?;
//!     consumer.stop();
//!     consumer.join().await;
//!
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod client;
pub mod consumer;
pub mod errors;
pub mod events;
pub mod message;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use consumer::{Consumer, ConsumerBuilder, ConsumerConfig};
pub use errors::{HandlerError, SqsConsumerError, TransportError};
pub use events::{ConsumerEvent, ConsumerObserver};
pub use message::Message;
