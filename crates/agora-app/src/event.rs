//! Application input events.
//!
//! Events originate from two distinct sources:
//! - The session manager, as [`Notice`]s.
//! - Results of actions executed by the bridge (send outcome, fetches).
//!
//! User input enters through [`crate::App::submit`] and
//! [`crate::App::edit_draft`] instead.

use agora_client::Notice;
use agora_proto::payloads::ChatMessage;

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent<I> {
    /// Periodic tick.
    Tick {
        /// Current time.
        now: I,
    },

    /// Something arrived from the session manager.
    Notice(Notice),

    /// The live channel accepted the message.
    LiveSent,

    /// The live channel is down; the message was not sent.
    LiveSendRejected {
        /// Message body to send through the fallback.
        body: String,
    },

    /// The fallback persisted the message.
    FallbackSent {
        /// Server-assigned id.
        id: u64,
    },

    /// The fallback failed.
    FallbackFailed {
        /// Reason, shown to the user.
        message: String,
    },

    /// A listing arrived, newest first.
    MessagesFetched {
        /// Messages as returned by the server.
        messages: Vec<ChatMessage>,
    },

    /// A listing failed.
    FetchFailed {
        /// Reason.
        message: String,
    },
}
