//! Failure classification used to route events and decide on backoff.

use crate::errors::{SqsConsumerError, TransportError};

/// Error codes that mean the request was rejected because of the caller's
/// credentials rather than the request itself.
const AUTHENTICATION_ERROR_CODES: &[&str] = &[
    "CredentialsError",
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "InvalidSecurity",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// The failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A transport failure caused by missing, invalid or expired credentials.
    Authentication,
    /// The handler did not finish before its deadline.
    Timeout,
    /// Any other queue operation failure.
    Transport,
    /// Any other handler failure.
    Processing,
}

/// Assigns a consumer error to the failure taxonomy.
pub fn classify(error: &SqsConsumerError) -> ErrorKind {
    match error {
        SqsConsumerError::Transport(transport) if is_authentication_error(transport) => {
            ErrorKind::Authentication
        }
        SqsConsumerError::Transport(_) => ErrorKind::Transport,
        SqsConsumerError::Timeout { .. } => ErrorKind::Timeout,
        _ => ErrorKind::Processing,
    }
}

/// Whether a transport failure was caused by the caller's credentials.
pub fn is_authentication_error(error: &TransportError) -> bool {
    error.status_code == Some(403)
        || error
            .code
            .as_deref()
            .is_some_and(|code| AUTHENTICATION_ERROR_CODES.contains(&code))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::errors::GenericError;

    #[test]
    fn forbidden_status_is_authentication() {
        let error = TransportError::new("receive_message", "forbidden").with_status_code(403);
        assert_eq!(
            classify(&SqsConsumerError::Transport(error)),
            ErrorKind::Authentication
        );
    }

    #[test]
    fn credential_codes_are_authentication() {
        for code in ["ExpiredToken", "InvalidClientTokenId", "CredentialsError"] {
            let error = TransportError::new("receive_message", "denied")
                .with_status_code(400)
                .with_code(code);
            assert!(is_authentication_error(&error), "{code}");
        }
    }

    #[test]
    fn other_transport_failures_are_transport() {
        let error = TransportError::new("receive_message", "throttled")
            .with_status_code(400)
            .with_code("AWS.SimpleQueueService.RequestThrottled")
            .with_retryable(true);
        assert_eq!(
            classify(&SqsConsumerError::Transport(error)),
            ErrorKind::Transport
        );
    }

    #[test]
    fn timeouts_and_handler_failures() {
        let timeout = SqsConsumerError::Timeout {
            timeout: Duration::from_secs(1),
        };
        assert_eq!(classify(&timeout), ErrorKind::Timeout);

        let processing = SqsConsumerError::Processing(Box::new(GenericError::new("bad body")));
        assert_eq!(classify(&processing), ErrorKind::Processing);
    }
}
