//! Application layer for Agora chat
//!
//! Pure state machines and a generic runtime for one chat room view,
//! enabling deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: room view state machine (draft, send flow, polling, typing)
//! - [`MessageStore`]: the view's message list, deduplicated by id
//! - [`Bridge`]: executes app actions against the live channel and the REST
//!   fallback
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod error;
mod event;
mod input;
mod runtime;
mod store;

#[cfg(feature = "transport")]
mod live;

pub use action::AppAction;
pub use app::{App, AppConfig};
pub use bridge::{Bridge, LiveChannel};
pub use driver::Driver;
pub use error::RuntimeError;
pub use event::AppEvent;
pub use input::UserInput;
pub use runtime::Runtime;
pub use store::{Merged, MessageStore};
