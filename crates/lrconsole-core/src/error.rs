//! Error types shared by the transport, dispatcher and transcript.
//!
//! The `Display` output of these types is what ends up in the transcript, so
//! messages are written for the operator rather than for a log file.

use thiserror::Error;

use crate::transcript::MessageId;

/// Failure of a single call against the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Agent is unreachable: {0}")]
    NetworkUnavailable(String),

    #[error("Request to the agent timed out")]
    Timeout,

    #[error("Agent rejected the request ({code}): {message}")]
    ServerRejected { code: u16, message: String },

    #[error("Agent sent a response that could not be read: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::ServerRejected {
                code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            TransportError::NetworkUnavailable(err.to_string())
        }
    }
}

/// Why a dispatched command ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The agent was reachable but refused the command.
    #[error("{0}")]
    ApplicationFailure(String),

    #[error("Command was interrupted before the agent answered")]
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("message id {attempted} does not follow last id {last}")]
    NonMonotonicId { last: MessageId, attempted: MessageId },
}
