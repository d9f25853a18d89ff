//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the view.
    Render,

    /// Show a blocking alert to the user.
    Alert {
        /// Text of the alert.
        message: String,
    },

    /// Try the live channel first.
    TrySend {
        /// Message body.
        body: String,
    },

    /// Persist through the REST fallback.
    SendViaFallback {
        /// Message body.
        body: String,
    },

    /// Re-read the most recent messages.
    FetchMessages,

    /// Publish typing start.
    StartTyping,

    /// Publish typing stop.
    StopTyping,

    /// Publish a read mark.
    MarkRead {
        /// Message that was read.
        message_id: u64,
    },
}
