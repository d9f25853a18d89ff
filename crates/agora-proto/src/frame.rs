//! STOMP 1.2 frames.
//!
//! A frame on the wire is:
//!
//! ```text
//! COMMAND EOL
//! *( header EOL )
//! EOL
//! *OCTET
//! NULL
//! *( EOL )
//! ```
//!
//! Bare EOLs between frames are heart-beats. A single WebSocket text message
//! may carry several frames and heart-beats, so [`decode_stream`] splits a
//! buffer into a sequence of [`Wire`] units.

use std::fmt;

use bytes::{BufMut, Bytes};

use crate::errors::{ProtocolError, Result};

/// STOMP 1.2 commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (1.2 alias of CONNECT).
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Publish to a destination.
    Send,
    /// Start receiving from a destination.
    Subscribe,
    /// Stop receiving from a subscription.
    Unsubscribe,
    /// Acknowledge a message.
    Ack,
    /// Reject a message.
    Nack,
    /// Start a transaction.
    Begin,
    /// Commit a transaction.
    Commit,
    /// Abort a transaction.
    Abort,
    /// Graceful client disconnect.
    Disconnect,
    /// Server delivery to a subscription.
    Message,
    /// Server receipt for a client frame.
    Receipt,
    /// Server error; the server closes the connection after sending it.
    Error,
}

impl Command {
    /// Wire representation of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parse a command line.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownCommand` for anything outside STOMP 1.2
    pub fn parse(line: &str) -> Result<Self> {
        let command = match line {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }

    /// CONNECT and CONNECTED headers are never escaped (STOMP 1.2 §Value
    /// Encoding).
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wire {
    /// Bare EOL sent to keep the connection alive.
    Heartbeat,
    /// A complete frame.
    Frame(Frame),
}

/// A STOMP frame.
///
/// # Invariants
///
/// - Header order is preserved. When a header name repeats, the first
///   occurrence is the effective value (STOMP 1.2 §Repeated Header Entries).
/// - `body.len()` never exceeds [`Frame::MAX_BODY_SIZE`] after
///   [`Frame::decode`]. Encoding rejects oversized bodies as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    headers: Vec<(String, String)>,
    /// Raw body bytes (JSON for every chat payload).
    pub body: Bytes,
}

impl Frame {
    /// Largest body accepted in either direction (1 MiB).
    pub const MAX_BODY_SIZE: usize = 1024 * 1024;

    /// Create a frame with no headers and an empty body.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Effective value of a header. `None` if absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// All headers in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Body as UTF-8 text (lossy conversion).
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Encode the frame into `dst`.
    ///
    /// A `content-length` header is added for non-empty bodies unless one is
    /// already present.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLarge` if the body exceeds
    ///   [`Frame::MAX_BODY_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.body.len() > Self::MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge {
                size: self.body.len(),
                max: Self::MAX_BODY_SIZE,
            });
        }

        let escape = self.command.escapes_headers();

        dst.put_slice(self.command.as_str().as_bytes());
        dst.put_u8(b'\n');

        for (name, value) in &self.headers {
            put_header_part(dst, name, escape);
            dst.put_u8(b':');
            put_header_part(dst, value, escape);
            dst.put_u8(b'\n');
        }

        if !self.body.is_empty() && self.header("content-length").is_none() {
            dst.put_slice(b"content-length:");
            dst.put_slice(self.body.len().to_string().as_bytes());
            dst.put_u8(b'\n');
        }

        dst.put_u8(b'\n');
        dst.put_slice(&self.body);
        dst.put_u8(0);

        Ok(())
    }

    /// Encode into a fresh `String`, as sent in a WebSocket text message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::BodyTooLarge` as for [`Frame::encode`]
    /// - `ProtocolError::InvalidUtf8` if the body is not UTF-8
    pub fn to_text(&self) -> Result<String> {
        let mut buf = Vec::with_capacity(64 + self.body.len());
        self.encode(&mut buf)?;
        String::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes consumed (through the NUL
    /// terminator). Trailing EOLs are left for the caller, which treats them
    /// as heart-beats.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if the input ends mid-frame
    /// - `ProtocolError::UnknownCommand` / `MalformedHeader` / `InvalidEscape`
    ///   / `InvalidUtf8` for a malformed head
    /// - `ProtocolError::InvalidContentLength` / `BodyTooLarge` /
    ///   `MissingTerminator` for a malformed body
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = 0;

        let command_line = read_line(bytes, &mut cursor).ok_or(ProtocolError::FrameTruncated("command"))?;
        let command = Command::parse(command_line)?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            let line = read_line(bytes, &mut cursor).ok_or(ProtocolError::FrameTruncated("headers"))?;
            if line.is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;

            if escape {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let rest = bytes.get(cursor..).unwrap_or_default();

        let body_len = match content_length {
            Some(len) => {
                if len > Self::MAX_BODY_SIZE {
                    return Err(ProtocolError::BodyTooLarge { size: len, max: Self::MAX_BODY_SIZE });
                }
                if rest.len() <= len {
                    return Err(ProtocolError::FrameTruncated("body"));
                }
                if rest.get(len) != Some(&0) {
                    return Err(ProtocolError::MissingTerminator);
                }
                len
            },
            None => {
                let len = rest.iter().position(|&b| b == 0).ok_or(ProtocolError::MissingTerminator)?;
                if len > Self::MAX_BODY_SIZE {
                    return Err(ProtocolError::BodyTooLarge { size: len, max: Self::MAX_BODY_SIZE });
                }
                len
            },
        };

        let body = Bytes::copy_from_slice(rest.get(..body_len).unwrap_or_default());
        let consumed = cursor + body_len + 1;

        debug_assert!(consumed <= bytes.len());

        Ok((Self { command, headers, body }, consumed))
    }
}

/// Split a socket message into frames and heart-beats.
///
/// Each bare EOL (`\n` or `\r\n`) outside a frame is one
/// [`Wire::Heartbeat`].
///
/// # Errors
///
/// Propagates the first [`Frame::decode`] error. Frames decoded before the
/// error are discarded with it, since the stream position is no longer
/// trustworthy.
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<Wire>> {
    let mut units = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = bytes.get(offset..).unwrap_or_default();

        if rest.starts_with(b"\r\n") {
            units.push(Wire::Heartbeat);
            offset += 2;
            continue;
        }
        if rest.starts_with(b"\n") {
            units.push(Wire::Heartbeat);
            offset += 1;
            continue;
        }

        let (frame, consumed) = Frame::decode(rest)?;
        units.push(Wire::Frame(frame));
        offset += consumed;
    }

    Ok(units)
}

/// Read one EOL-terminated line starting at `cursor`, stripping an optional
/// trailing CR. `None` if no EOL remains.
fn read_line<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a str> {
    let rest = bytes.get(*cursor..)?;
    let end = rest.iter().position(|&b| b == b'\n')?;
    let mut line = rest.get(..end)?;
    if let Some(stripped) = line.strip_suffix(b"\r") {
        line = stripped;
    }
    *cursor += end + 1;
    std::str::from_utf8(line).ok()
}

fn put_header_part(dst: &mut impl BufMut, text: &str, escape: bool) {
    if !escape {
        dst.put_slice(text.as_bytes());
        return;
    }

    for c in text.chars() {
        match c {
            '\\' => dst.put_slice(b"\\\\"),
            '\r' => dst.put_slice(b"\\r"),
            '\n' => dst.put_slice(b"\\n"),
            ':' => dst.put_slice(b"\\c"),
            other => {
                let mut buf = [0u8; 4];
                dst.put_slice(other.encode_utf8(&mut buf).as_bytes());
            },
        }
    }
}

fn unescape(text: &str) -> Result<String> {
    if !text.contains('\\') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(ProtocolError::InvalidEscape(text.to_string())),
        }
    }
    Ok(out)
}
