//! Room identity and the destinations scoped to it.
//!
//! Every chat room lives inside a group, so a room is addressed by the pair
//! (group, room). Subscriptions go to `/topic/...` and publishes to
//! `/app/...`; both are derived from the [`RoomId`] so a session can never
//! address a room other than its own.

use std::fmt;

/// Personal queue the server uses to report failed publishes.
pub const ERROR_QUEUE: &str = "/user/queue/errors";

/// Composite identity of a chat room.
///
/// # Invariants
///
/// - Both ids are non-zero. Zero is how an unset route parameter shows up,
///   so [`RoomId::new`] treats it as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    group: u64,
    room: u64,
}

impl RoomId {
    /// Room identity from its parts. `None` if either id is zero.
    pub fn new(group: u64, room: u64) -> Option<Self> {
        (group != 0 && room != 0).then_some(Self { group, room })
    }

    /// Group the room belongs to.
    pub fn group(&self) -> u64 {
        self.group
    }

    /// Room id within the group.
    pub fn room(&self) -> u64 {
        self.room
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.room)
    }
}

/// Logical feeds a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// New chat messages for the room.
    Messages,
    /// Typing start/stop notifications for the room.
    Typing,
    /// Read-count updates for the room.
    Read,
    /// Errors addressed to the current user (not room scoped).
    Errors,
}

impl Feed {
    /// Feeds subscribed on every successful handshake, in subscription order.
    pub const ALL: [Self; 4] = [Self::Messages, Self::Typing, Self::Read, Self::Errors];

    /// Subscription destination of this feed for `room`.
    pub fn topic(self, room: RoomId) -> String {
        match self {
            Self::Messages => format!("/topic/chat/{room}"),
            Self::Typing => format!("/topic/chat/{room}/typing"),
            Self::Read => format!("/topic/chat/{room}/read"),
            Self::Errors => ERROR_QUEUE.to_string(),
        }
    }

    /// Which feed of `room` a destination names. `None` if it names none.
    pub fn from_topic(destination: &str, room: RoomId) -> Option<Self> {
        Self::ALL.into_iter().find(|feed| feed.topic(room) == destination)
    }
}

/// Publish destinations of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Publish {
    /// Post a chat message (`{message}`).
    Send,
    /// Announce that the user started typing (`{}`).
    TypingStart,
    /// Announce that the user stopped typing (`{}`).
    TypingStop,
    /// Mark a message as read (`{messageId}`).
    MarkRead,
}

impl Publish {
    /// Destination of this publish for `room`.
    pub fn destination(self, room: RoomId) -> String {
        match self {
            Self::Send => format!("/app/chat/{room}/send"),
            Self::TypingStart => format!("/app/chat/{room}/typing/start"),
            Self::TypingStop => format!("/app/chat/{room}/typing/stop"),
            Self::MarkRead => format!("/app/chat/{room}/read"),
        }
    }

    /// Parse a publish destination into its room and kind. `None` if the
    /// destination is not a chat publish.
    pub fn parse(destination: &str) -> Option<(RoomId, Self)> {
        let rest = destination.strip_prefix("/app/chat/")?;
        let mut parts = rest.split('/');

        let group = parts.next()?.parse().ok()?;
        let room = parts.next()?.parse().ok()?;
        let room_id = RoomId::new(group, room)?;

        let kind = match (parts.next()?, parts.next(), parts.next()) {
            ("send", None, None) => Self::Send,
            ("typing", Some("start"), None) => Self::TypingStart,
            ("typing", Some("stop"), None) => Self::TypingStop,
            ("read", None, None) => Self::MarkRead,
            _ => return None,
        };

        Some((room_id, kind))
    }
}
