use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, warn};

use crate::errors::{GenericError, HandlerError, SqsConsumerError};

/// Runs a handler invocation, racing it against `timeout` when one is set.
///
/// Without a deadline the invocation is awaited in place. With a deadline it
/// runs as a separate task; if the timer fires first the task is detached,
/// not aborted, and whatever it returns later is discarded. The timer is
/// dropped on every exit path. A panic is a processing failure either way.
pub(crate) async fn run_with_timeout<F>(
    invocation: F,
    timeout: Option<Duration>,
) -> Result<(), SqsConsumerError>
where
    F: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return catch_panic(invocation).await;
    };

    let task = tokio::spawn(invocation);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(SqsConsumerError::from_handler_error),
        Ok(Err(join_error)) => Err(SqsConsumerError::Processing(Box::new(join_error))),
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Handler deadline elapsed");
            Err(SqsConsumerError::Timeout { timeout })
        }
    }
}

/// Awaits a handler invocation in place, turning a panic into a
/// processing failure instead of unwinding the poll loop.
pub(crate) async fn catch_panic<F>(invocation: F) -> Result<(), SqsConsumerError>
where
    F: Future<Output = Result<(), HandlerError>>,
{
    match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(result) => result.map_err(SqsConsumerError::from_handler_error),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "Handler panicked");
            let error = GenericError::new(format!("handler panicked: {message}"));
            Err(SqsConsumerError::Processing(Box::new(error)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::classify::{ErrorKind, classify};

    #[tokio::test]
    async fn no_deadline_runs_to_completion() {
        let result = run_with_timeout(
            async {
                tokio::task::yield_now().await;
                Ok::<(), HandlerError>(())
            },
            None,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let error = run_with_timeout(
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Err::<(), HandlerError>(GenericError::new("too late").into())
            },
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

        assert_eq!(classify(&error), ErrorKind::Timeout);
        assert_eq!(error.to_string(), "message handler timed out after 1000ms");

        // The losing handler keeps running in the background.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_failure_is_processing() {
        let error = run_with_timeout(
            async { Err::<(), HandlerError>(GenericError::new("bad body").into()) },
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

        assert_eq!(classify(&error), ErrorKind::Processing);
    }

    #[tokio::test]
    async fn panicking_handler_is_processing() {
        let error = run_with_timeout(
            async {
                if true {
                    panic!("handler bug");
                }
                Ok::<(), HandlerError>(())
            },
            Some(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, SqsConsumerError::Processing(_)));
    }

    #[tokio::test]
    async fn panic_without_deadline_is_processing() {
        let error = run_with_timeout(
            async {
                if true {
                    panic!("handler bug");
                }
                Ok::<(), HandlerError>(())
            },
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(classify(&error), ErrorKind::Processing);
        assert_eq!(
            error.to_string(),
            "unexpected message handler failure: handler panicked: handler bug"
        );
    }

    #[tokio::test]
    async fn panic_with_formatted_message_is_caught() {
        let id = 7;
        let error = catch_panic(async move {
            if id > 0 {
                panic!("bad message {id}");
            }
            Ok::<(), HandlerError>(())
        })
        .await
        .unwrap_err();

        assert!(error.to_string().ends_with("handler panicked: bad message 7"));
    }
}
