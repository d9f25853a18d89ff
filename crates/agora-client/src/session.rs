//! Session manager for one chat room.
//!
//! A [`Session`] is created when a room view mounts and torn down when it
//! unmounts or switches rooms. It never outlives its room: a different room
//! means a different session with its own connection and subscriptions.
//!
//! # Lifecycle
//!
//! ```text
//! activate ──> OpenSocket ──> SocketOpened ──> CONNECT
//!                                               │
//!           SUBSCRIBE x4 <── CONNECTED <────────┘
//!                │
//!                ├── MESSAGE (routed by subscription id) ──> Notify
//!                ├── send_message / start_typing / mark_read ──> SEND
//!                └── teardown ──> UNSUBSCRIBE x4, DISCONNECT, CloseSocket
//! ```

use agora_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, Moment, TypingTracker,
};
use agora_proto::{
    Command, Feed, Frame, Publish, RoomId,
    payloads::{self, ChatMessage, EmptyBody, ErrorNotice, MarkReadBody, ReadEvent, SendBody, TypingEvent},
};
use serde::Serialize;

use crate::{
    credential::CredentialSource,
    error::SessionError,
    event::{Notice, SessionAction, SessionEvent},
};

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Group id. Zero means absent.
    pub group: u64,
    /// Room id. Zero means absent.
    pub room: u64,
    /// Set to false to keep the session from connecting at all.
    pub enabled: bool,
    /// Connection tuning.
    pub connection: ConnectionConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { group: 0, room: 0, enabled: true, connection: ConnectionConfig::default() }
    }
}

impl SessionOptions {
    /// Options for a room with default connection settings.
    pub fn for_room(group: u64, room: u64) -> Self {
        Self { group, room, ..Self::default() }
    }
}

/// Why [`Session::activate`] did not start a session.
///
/// None of these are errors: the view simply has no live channel yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    /// The caller disabled the session.
    Disabled,
    /// Group or room id is absent.
    MissingRoom,
    /// No credential is available yet.
    MissingCredential,
}

/// Result of [`Session::activate`].
#[derive(Debug)]
pub enum Activation<I: Moment> {
    /// The session started and wants these actions executed.
    Started {
        /// The new session.
        session: Session<I>,
        /// Initial actions (opens the socket).
        actions: Vec<SessionAction>,
    },
    /// Nothing was started.
    Inactive(InactiveReason),
}

#[derive(Debug, Clone)]
struct Subscription {
    id: String,
    feed: Feed,
}

/// Session manager state machine.
///
/// Owns the connection, the live subscriptions and the typing set of one
/// room. Message history is never kept here; messages are handed to the owner
/// as they arrive.
#[derive(Debug)]
pub struct Session<I: Moment> {
    room: RoomId,
    connection: Connection<I>,
    typing: TypingTracker<I>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
    torn_down: bool,
}

impl<I: Moment> Session<I> {
    /// Start a session for the room in `options`.
    ///
    /// Does nothing unless the session is enabled, both ids are present and
    /// `credentials` resolves a token. The token is read once, here.
    pub fn activate(
        options: SessionOptions,
        credentials: &impl CredentialSource,
        now: I,
    ) -> Activation<I> {
        if !options.enabled {
            return Activation::Inactive(InactiveReason::Disabled);
        }

        let Some(room) = RoomId::new(options.group, options.room) else {
            return Activation::Inactive(InactiveReason::MissingRoom);
        };

        let Some(credential) = credentials.credential() else {
            tracing::warn!(%room, "no credential available, chat stays offline");
            return Activation::Inactive(InactiveReason::MissingCredential);
        };

        let headers = vec![("Authorization".to_string(), credential.bearer())];
        let mut connection = Connection::new(now, options.connection, headers);
        let actions = connection.begin_connect(now).into_iter().map(SessionAction::from).collect();

        tracing::debug!(%room, "session activated");

        let session = Self {
            room,
            connection,
            typing: TypingTracker::new(),
            subscriptions: Vec::new(),
            next_subscription: 0,
            torn_down: false,
        };

        Activation::Started { session, actions }
    }

    /// Room this session belongs to.
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// True while the live channel is connected.
    pub fn is_connected(&self) -> bool {
        !self.torn_down && self.connection.is_connected()
    }

    /// Connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Users currently typing, in start order.
    pub fn typing_users(&self) -> Vec<String> {
        self.typing.users()
    }

    /// Number of live feed subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of outstanding typing expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.typing.pending_timers()
    }

    /// Earliest instant at which a tick will shrink the typing set.
    ///
    /// Drivers that sleep between ticks must wake by then.
    pub fn next_deadline(&self) -> Option<I> {
        self.typing.next_deadline()
    }

    /// True after [`Self::teardown`].
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Process an event.
    ///
    /// Events after teardown are ignored. Malformed feed payloads are logged
    /// and dropped without affecting later events.
    ///
    /// # Errors
    ///
    /// - `SessionError::Connection` if the connection rejects the event (a
    ///   frame out of sequence, for example). The session stays usable.
    pub fn handle(&mut self, event: SessionEvent<I>) -> Result<Vec<SessionAction>, SessionError> {
        if self.torn_down {
            return Ok(vec![]);
        }

        match event {
            SessionEvent::SocketOpened { now } => {
                let actions = self.connection.socket_opened(now)?;
                Ok(self.outbound(actions, now))
            },

            SessionEvent::SocketClosed { now, reason } => {
                let was_connected = self.connection.is_connected();
                self.connection.socket_closed(now, &reason);
                Ok(self.after_drop(was_connected, Vec::new()))
            },

            SessionEvent::FrameReceived { frame, now } => self.handle_frame(&frame, now),

            SessionEvent::HeartbeatReceived { now } => {
                self.connection.record_inbound(now);
                Ok(vec![])
            },

            SessionEvent::Tick { now } => Ok(self.tick(now)),
        }
    }

    /// Publish a chat message.
    ///
    /// # Errors
    ///
    /// - `SessionError::TornDown` after teardown
    /// - `SessionError::NotConnected` if the live channel is down; the caller
    ///   should fall back to the REST path
    /// - `SessionError::Protocol` if the body cannot be encoded
    pub fn send_message(&mut self, body: &str, now: I) -> Result<Vec<SessionAction>, SessionError> {
        if self.torn_down {
            return Err(SessionError::TornDown);
        }
        if !self.connection.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let frame = self.publish(Publish::Send, &SendBody { message: body.to_string() })?;
        self.connection.record_outbound(now);
        Ok(vec![SessionAction::SendFrame(frame)])
    }

    /// Announce that the user started typing. No-op while disconnected.
    pub fn start_typing(&mut self, now: I) -> Vec<SessionAction> {
        self.best_effort(Publish::TypingStart, &EmptyBody {}, now)
    }

    /// Announce that the user stopped typing. No-op while disconnected.
    pub fn stop_typing(&mut self, now: I) -> Vec<SessionAction> {
        self.best_effort(Publish::TypingStop, &EmptyBody {}, now)
    }

    /// Mark a message as read. No-op while disconnected.
    pub fn mark_read(&mut self, message_id: u64, now: I) -> Vec<SessionAction> {
        self.best_effort(Publish::MarkRead, &MarkReadBody { message_id }, now)
    }

    /// Tear the session down.
    ///
    /// Cancels every typing timer, unsubscribes every feed and deactivates
    /// the connection. Idempotent: later calls return no actions.
    pub fn teardown(&mut self) -> Vec<SessionAction> {
        if self.torn_down {
            return vec![];
        }
        self.torn_down = true;

        let timers = self.typing.clear();
        let mut actions = Vec::new();

        if self.connection.is_connected() {
            for sub in &self.subscriptions {
                actions.push(SessionAction::SendFrame(unsubscribe(&sub.id)));
            }
        }
        let feeds = self.subscriptions.len();
        self.subscriptions.clear();

        actions.extend(self.connection.deactivate().into_iter().map(SessionAction::from));

        tracing::debug!(room = %self.room, feeds, timers, "session torn down");

        actions
    }

    fn handle_frame(&mut self, frame: &Frame, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let was_connected = self.connection.is_connected();
        let actions = self.connection.handle_frame(frame, now)?;
        let mut actions = self.outbound(actions, now);

        match frame.command {
            Command::Connected if self.connection.is_connected() && !was_connected => {
                actions.extend(self.subscribe_all(now));
                actions.push(SessionAction::Notify(Notice::ConnectionChanged(true)));
                Ok(actions)
            },
            Command::Message => {
                actions.extend(self.route(frame, now));
                Ok(actions)
            },
            Command::Error => {
                let mut actions = self.after_drop(was_connected, actions);
                // Retrying will not fix a rejection; the user has to know.
                if let Some(error) = self.connection.last_error().filter(|error| !error.is_transient()) {
                    actions.push(SessionAction::Notify(Notice::ServerError(error.to_string())));
                }
                Ok(actions)
            },
            _ => Ok(actions),
        }
    }

    fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let was_connected = self.connection.is_connected();
        let actions = self.connection.tick(now);
        let actions = self.outbound(actions, now);
        let mut actions = self.after_drop(was_connected, actions);

        if !self.typing.expire(now).is_empty() {
            actions.push(SessionAction::Notify(Notice::TypingUsers(self.typing.users())));
        }

        actions
    }

    /// Subscriptions die with their socket, and so does the typing set: no
    /// stop events can arrive until the next CONNECTED. Report the transition
    /// once.
    fn after_drop(&mut self, was_connected: bool, mut actions: Vec<SessionAction>) -> Vec<SessionAction> {
        if was_connected && !self.connection.is_connected() {
            self.subscriptions.clear();
            if self.typing.clear() > 0 {
                actions.push(SessionAction::Notify(Notice::TypingUsers(Vec::new())));
            }
            actions.push(SessionAction::Notify(Notice::ConnectionChanged(false)));
        }
        actions
    }

    fn subscribe_all(&mut self, now: I) -> Vec<SessionAction> {
        let mut actions: Vec<SessionAction> = self
            .subscriptions
            .drain(..)
            .map(|stale| SessionAction::SendFrame(unsubscribe(&stale.id)))
            .collect();

        for feed in Feed::ALL {
            let id = format!("sub-{}", self.next_subscription);
            self.next_subscription += 1;

            let frame = Frame::new(Command::Subscribe)
                .with_header("id", id.clone())
                .with_header("destination", feed.topic(self.room))
                .with_header("ack", "auto");

            actions.push(SessionAction::SendFrame(frame));
            self.subscriptions.push(Subscription { id, feed });
        }

        self.connection.record_outbound(now);
        actions
    }

    /// Which live feed a MESSAGE frame belongs to.
    fn feed_of(&self, frame: &Frame) -> Option<Feed> {
        let Some(id) = frame.header("subscription") else {
            tracing::warn!(room = %self.room, "MESSAGE without subscription header");
            return None;
        };

        let Some(feed) = self.subscriptions.iter().find(|sub| sub.id == id).map(|sub| sub.feed)
        else {
            tracing::debug!(room = %self.room, subscription = id, "dropping message for stale subscription");
            return None;
        };

        let destination = frame.header("destination").unwrap_or_default();
        if Feed::from_topic(destination, self.room) != Some(feed) {
            tracing::debug!(room = %self.room, destination, "dropping message for another room");
            return None;
        }

        Some(feed)
    }

    fn route(&mut self, frame: &Frame, now: I) -> Vec<SessionAction> {
        let Some(feed) = self.feed_of(frame) else {
            return vec![];
        };

        let notices = match feed {
            Feed::Messages => match frame.json::<ChatMessage>() {
                Ok(message) => vec![Notice::Message(message)],
                Err(err) => {
                    tracing::warn!(room = %self.room, %err, "dropping malformed chat message");
                    vec![]
                },
            },

            Feed::Typing => match frame.json::<TypingEvent>() {
                Ok(event) => {
                    let changed = if event.is_typing {
                        self.typing.start(&event.username, now)
                    } else {
                        self.typing.stop(&event.username)
                    };

                    let mut notices = vec![Notice::Typing(event)];
                    if changed {
                        notices.push(Notice::TypingUsers(self.typing.users()));
                    }
                    notices
                },
                Err(err) => {
                    tracing::warn!(room = %self.room, %err, "dropping malformed typing event");
                    vec![]
                },
            },

            Feed::Read => match frame.json::<ReadEvent>() {
                Ok(event) => vec![Notice::Read(event)],
                Err(err) => {
                    tracing::warn!(room = %self.room, %err, "dropping malformed read receipt");
                    vec![]
                },
            },

            Feed::Errors => {
                let message = match frame.json::<ErrorNotice>() {
                    Ok(notice) => notice.message,
                    Err(_) => frame.body_str().into_owned(),
                };
                tracing::warn!(room = %self.room, %message, "server reported error");
                vec![Notice::ServerError(message)]
            },
        };

        notices.into_iter().map(SessionAction::Notify).collect()
    }

    fn best_effort<T: Serialize>(&mut self, kind: Publish, body: &T, now: I) -> Vec<SessionAction> {
        if !self.is_connected() {
            return vec![];
        }

        match self.publish(kind, body) {
            Ok(frame) => {
                self.connection.record_outbound(now);
                vec![SessionAction::SendFrame(frame)]
            },
            Err(err) => {
                tracing::warn!(?kind, %err, "dropping publish");
                vec![]
            },
        }
    }

    fn publish<T: Serialize>(&self, kind: Publish, body: &T) -> Result<Frame, SessionError> {
        Ok(Frame::new(Command::Send)
            .with_header("destination", kind.destination(self.room))
            .with_header("content-type", "application/json")
            .with_body(payloads::encode(body)?))
    }

    fn outbound(&mut self, actions: Vec<ConnectionAction>, now: I) -> Vec<SessionAction> {
        if actions.iter().any(|a| matches!(a, ConnectionAction::SendFrame(_))) {
            self.connection.record_outbound(now);
        }
        actions.into_iter().map(SessionAction::from).collect()
    }
}

fn unsubscribe(id: &str) -> Frame {
    Frame::new(Command::Unsubscribe).with_header("id", id)
}
