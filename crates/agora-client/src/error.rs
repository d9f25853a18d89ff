//! Client error types.

use agora_core::ConnectionError;
use agora_proto::ProtocolError;
use thiserror::Error;

/// Errors from session operations.
///
/// Publishing while disconnected is reported as [`SessionError::NotConnected`]
/// only by `send_message`, whose caller needs to know to fall back. Typing and
/// read publishes are silently dropped instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The live channel is not connected
    #[error("not connected")]
    NotConnected,

    /// The session has been torn down
    #[error("session torn down")]
    TornDown,

    /// Frame or payload could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection state machine rejected the event
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Errors from the request/response fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FallbackError {
    /// No credential available for the request
    #[error("not signed in")]
    MissingCredential,

    /// Server answered with a non-success status
    #[error("http {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server message, or the status reason if none
        message: String,
    },

    /// Server answered `success: false`
    #[error("rejected: {message}")]
    Rejected {
        /// Server message
        message: String,
    },

    /// Request never completed
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}
