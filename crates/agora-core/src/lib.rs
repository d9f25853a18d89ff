//! Core
//!
//! Pure state machines underneath an Agora chat session.
//!
//! # Components
//!
//! - [`connection::Connection`]: STOMP session lifecycle (handshake,
//!   heart-beats, reconnect schedule)
//! - [`typing::TypingTracker`]: set of users currently typing, each with an
//!   expiry deadline
//! - [`env::Environment`]: time source for the I/O shells
//!
//! Nothing here reads a clock or touches a socket. Every method that depends
//! on time takes `now` as a parameter and returns actions for the caller to
//! execute, so the same code runs against real and simulated time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod typing;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState};
pub use env::{Environment, Moment};
pub use error::ConnectionError;
pub use typing::{TYPING_EXPIRY, TypingTracker};
