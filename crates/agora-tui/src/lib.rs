//! Terminal UI for Agora chat
//!
//! A thin shell over [`agora_app::Driver`] that provides terminal-specific
//! I/O. All orchestration logic lives in the generic [`agora_app::Runtime`].
//!
//! This crate only handles key input and terminal rendering.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod editor;
pub mod terminal;
pub mod ui;

pub use editor::{Key, LineEditor};
pub use terminal::{TerminalDriver, TerminalError};
