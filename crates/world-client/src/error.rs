//! Failure taxonomy for calls to the simulation service.

use thiserror::Error;

/// Errors that can occur while talking to the simulation service.
///
/// Every variant names the operation that failed so callers can log a single
/// line without extra context.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent, timed out, or the body could not be read.
    #[error("{operation}: request failed: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// A response arrived but was not in the expected shape.
    #[error("{operation}: malformed response: {detail}")]
    Protocol {
        operation: &'static str,
        detail: String,
    },
    /// The service answered with an error status or an explicit error payload.
    #[error("{operation}: server error ({status}): {message}")]
    Server {
        operation: &'static str,
        status: u16,
        message: String,
    },
}

impl ClientError {
    /// Name of the endpoint the failing call targeted.
    pub fn operation(&self) -> &'static str {
        match self {
            ClientError::Network { operation, .. }
            | ClientError::Protocol { operation, .. }
            | ClientError::Server { operation, .. } => operation,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol { .. })
    }

    pub fn is_server(&self) -> bool {
        matches!(self, ClientError::Server { .. })
    }
}
