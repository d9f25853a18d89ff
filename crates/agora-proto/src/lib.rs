//! Protocol
//!
//! Wire types for Agora group chat: STOMP 1.2 frames carried over a WebSocket,
//! the per-room destinations the chat server exposes, and the JSON payloads
//! exchanged on them.
//!
//! # Components
//!
//! - [`Frame`]: a single STOMP frame (command, headers, body)
//! - [`Wire`]: one unit read off the socket, either a frame or a heart-beat
//! - [`HeartBeat`]: the `heart-beat` header and its negotiation rules
//! - [`RoomId`], [`Feed`], [`Publish`]: room-scoped topic and destination names
//! - [`payloads`]: JSON bodies (chat messages, typing, read receipts)
//!
//! Everything here is pure data and codec logic. Nothing in this crate
//! performs I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod destination;
pub mod errors;
pub mod frame;
pub mod heartbeat;
pub mod payloads;

pub use destination::{ERROR_QUEUE, Feed, Publish, RoomId};
pub use errors::{ProtocolError, Result};
pub use frame::{Command, Frame, Wire, decode_stream};
pub use heartbeat::{HeartBeat, Negotiated};
