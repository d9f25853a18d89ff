//! Client
//!
//! The chat session manager for one Agora chat room view.
//!
//! # Architecture
//!
//! [`Session`] follows the same Sans-IO pattern as [`agora_core`]. It receives
//! socket lifecycle events and frames ([`SessionEvent`]), updates the
//! connection, subscription and typing state, and returns [`SessionAction`]s
//! for the caller to execute. Inbound feed content leaves the session as
//! [`Notice`]s, one per event.
//!
//! # Components
//!
//! - [`Session`]: per-room state machine (subscriptions, publishes, typing set)
//! - [`CredentialSource`]: injected bearer credential resolver
//! - [`ChatApi`]: request/response fallback used when the live channel is down
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::ChatSession`], which runs a [`Session`] over a WebSocket in a
//! tokio task. The `rest` feature provides [`rest::RestChatApi`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod credential;
mod error;
mod event;
mod fallback;
mod session;

#[cfg(feature = "rest")]
pub mod rest;
#[cfg(feature = "transport")]
pub mod system_env;
#[cfg(feature = "transport")]
pub mod transport;

#[cfg(feature = "transport")]
pub use transport::ChatSession;

pub use agora_core::env::Environment;
pub use agora_proto::RoomId;
pub use credential::{Credential, CredentialFn, CredentialSource};
pub use error::{FallbackError, SessionError};
pub use event::{Notice, SessionAction, SessionEvent};
pub use fallback::{ApiResponse, ChatApi, MessagePage};
pub use session::{Activation, InactiveReason, Session, SessionOptions};
