//! Session events and actions.

use agora_core::ConnectionAction;
use agora_proto::{
    Frame,
    payloads::{ChatMessage, ReadEvent, TypingEvent},
};

/// Events the caller feeds into the session.
///
/// The caller is responsible for:
/// - Reporting socket lifecycle (opened, closed without being asked)
/// - Decoding socket input into frames and heart-beats
/// - Driving time forward via ticks
#[derive(Debug, Clone)]
pub enum SessionEvent<I> {
    /// The socket requested by [`SessionAction::OpenSocket`] is open.
    SocketOpened {
        /// Current time.
        now: I,
    },

    /// The socket closed or failed on its own.
    SocketClosed {
        /// Current time.
        now: I,
        /// Why the socket closed.
        reason: String,
    },

    /// A frame arrived from the broker.
    FrameReceived {
        /// The frame.
        frame: Frame,
        /// Current time.
        now: I,
    },

    /// A heart-beat arrived from the broker.
    HeartbeatReceived {
        /// Current time.
        now: I,
    },

    /// Time tick for reconnects, heart-beats and typing expiry.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Something the session reports to its owner. One notice per inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A message arrived on the message feed.
    Message(ChatMessage),

    /// A typing event arrived on the typing feed.
    Typing(TypingEvent),

    /// The typing set changed. Carries the full set in start order; empty
    /// when the socket drops.
    TypingUsers(Vec<String>),

    /// A read receipt arrived on the read feed.
    Read(ReadEvent),

    /// The live channel went up or down.
    ConnectionChanged(bool),

    /// The server reported an error on the personal error queue, or
    /// rejected the connection outright.
    ServerError(String),
}

/// Actions the session produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a socket to the broker and report [`SessionEvent::SocketOpened`].
    OpenSocket,

    /// Write a frame to the socket.
    SendFrame(Frame),

    /// Write a heart-beat to the socket.
    SendHeartbeat,

    /// Close the socket. Do not report it back as [`SessionEvent::SocketClosed`].
    CloseSocket {
        /// Reason for closing.
        reason: String,
    },

    /// Deliver a notice to the owner.
    Notify(Notice),
}

impl From<ConnectionAction> for SessionAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::OpenSocket => Self::OpenSocket,
            ConnectionAction::SendFrame(frame) => Self::SendFrame(frame),
            ConnectionAction::SendHeartbeat => Self::SendHeartbeat,
            ConnectionAction::CloseSocket { reason } => Self::CloseSocket { reason },
        }
    }
}
