//! Error types for the connection state machine.
//!
//! Connection errors never tear a session down. The session reflects them as
//! a disconnected state and lets the reconnect schedule recover.

use std::time::Duration;

use agora_proto::{Command, ProtocolError};
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Received a frame the current state does not accept
    #[error("unexpected {command} frame in state {state:?}")]
    UnexpectedFrame {
        /// Current state when frame was received
        state: ConnectionState,
        /// Command of the unexpected frame
        command: Command,
    },

    /// Server answered with an ERROR frame
    #[error("rejected by server: {message}")]
    Rejected {
        /// Server's `message` header, or the body if absent
        message: String,
    },

    /// Handshake did not complete within timeout
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Server went silent for longer than the negotiated heart-beat allows
    #[error("heart-beat timeout after {elapsed:?}")]
    HeartbeatTimeout {
        /// Time since the last inbound traffic
        elapsed: Duration,
    },

    /// Protocol error from frame parsing/validation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Timeouts and socket failures are transient. A server rejection is not,
    /// although the reconnect schedule still retries it since the credential
    /// may have been refreshed in the meantime.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. } | Self::HeartbeatTimeout { .. } | Self::Transport(_)
        )
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
