//! Protocol error types.
//!
//! Errors raised while decoding STOMP frames or their JSON bodies. Decoding is
//! strict: a malformed frame is rejected as a whole rather than partially
//! applied.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from frame decoding and payload parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before the named part of the frame was complete.
    #[error("frame truncated while reading {0}")]
    FrameTruncated(&'static str),

    /// Command line is not a STOMP 1.2 command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header contains an escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    /// Command or header bytes are not UTF-8.
    #[error("frame head is not valid UTF-8")]
    InvalidUtf8,

    /// `content-length` header is not a non-negative integer.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// Body was not followed by the NUL terminator.
    #[error("missing NUL frame terminator")]
    MissingTerminator,

    /// Body exceeds [`crate::Frame::MAX_BODY_SIZE`].
    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge {
        /// Actual body size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// `heart-beat` header is not `cx,cy` in milliseconds.
    #[error("invalid heart-beat header: {0:?}")]
    InvalidHeartBeat(String),

    /// A frame required for the operation lacks a header.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// JSON body could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(err.to_string())
    }
}
