//! In-memory chat server for simulation.
//!
//! [`SimBroker`] plays both halves of the chat backend: a STOMP broker that
//! answers CONNECT, tracks subscriptions and fans published events out to the
//! matching topics, and the message log behind the REST endpoints. Both
//! halves share one id counter so a message is the same whichever path
//! created it.
//!
//! Connections do not carry bytes. A simulated client hands frames to
//! [`SimBroker::receive`] and collects what the broker queued for it with
//! [`SimBroker::take_outbox`].

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use agora_client::MessagePage;
use agora_proto::{
    Command, ERROR_QUEUE, Feed, Frame, Publish, RoomId,
    payloads::{self, ChatMessage, ErrorNotice, MarkReadBody, ReadEvent, SendBody, TypingEvent},
};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

/// Id of a simulated socket.
pub type ConnectionId = u64;

/// Id the first created message gets unless configured otherwise.
pub const DEFAULT_FIRST_ID: u64 = 1;

/// Epoch seconds of the first message timestamp (2024-05-01T12:00:00).
const BASE_TIMESTAMP: i64 = 1_714_564_800;

#[derive(Debug)]
struct Connection {
    /// Set by CONNECT.
    user: Option<String>,
    /// Subscription id to destination.
    subscriptions: HashMap<String, String>,
    outbox: VecDeque<Frame>,
}

#[derive(Debug)]
struct BrokerState {
    online: bool,
    echo_fallback: bool,
    next_message_id: u64,
    next_connection: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    /// Per room, oldest first.
    log: BTreeMap<RoomId, Vec<ChatMessage>>,
    /// Readers per message, for read counts.
    readers: HashMap<u64, Vec<String>>,
}

/// Shared handle to the simulated chat server.
#[derive(Debug, Clone)]
pub struct SimBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBroker {
    /// Empty server, online, ids starting at [`DEFAULT_FIRST_ID`].
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_FIRST_ID)
    }

    /// Empty server whose first message gets `first_id`.
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                online: true,
                echo_fallback: false,
                next_message_id: first_id,
                next_connection: 1,
                connections: HashMap::new(),
                log: BTreeMap::new(),
                readers: HashMap::new(),
            })),
        }
    }

    /// Also push messages created over REST to the room's message feed.
    ///
    /// Off by default: the live path then gives no delivery guarantee for
    /// fallback-created messages and clients must re-fetch.
    #[must_use]
    pub fn with_fallback_echo(self) -> Self {
        self.lock().echo_fallback = true;
        self
    }

    /// Bring the broker up or down. Going down drops every connection.
    pub fn set_online(&self, online: bool) {
        let mut state = self.lock();
        state.online = online;
        if !online {
            let dropped = state.connections.len();
            state.connections.clear();
            tracing::debug!(dropped, "broker offline");
        }
    }

    /// True while sockets can be opened.
    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Open a socket. `None` while offline.
    pub fn open(&self) -> Option<ConnectionId> {
        let mut state = self.lock();
        if !state.online {
            return None;
        }

        let id = state.next_connection;
        state.next_connection += 1;
        state.connections.insert(id, Connection {
            user: None,
            subscriptions: HashMap::new(),
            outbox: VecDeque::new(),
        });
        Some(id)
    }

    /// Close a socket. Unknown connections are ignored.
    pub fn close(&self, connection: ConnectionId) {
        self.lock().connections.remove(&connection);
    }

    /// Drop one socket as if the network failed.
    pub fn drop_connection(&self, connection: ConnectionId) {
        self.close(connection);
    }

    /// True if the connection is still open.
    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.lock().connections.contains_key(&connection)
    }

    /// Frames queued for a connection. `None` once the connection is gone.
    pub fn take_outbox(&self, connection: ConnectionId) -> Option<Vec<Frame>> {
        let mut state = self.lock();
        let conn = state.connections.get_mut(&connection)?;
        Some(conn.outbox.drain(..).collect())
    }

    /// Process a frame sent by a client.
    pub fn receive(&self, connection: ConnectionId, frame: &Frame) {
        let mut state = self.lock();
        if !state.connections.contains_key(&connection) {
            tracing::trace!(connection, "frame for closed connection");
            return;
        }
        state.receive(connection, frame);
    }

    /// Persist a message through the request/response path.
    pub fn create_message(&self, room: RoomId, username: &str, body: &str) -> u64 {
        let mut state = self.lock();
        let message = state.append(room, username, body);
        let id = message.id;
        if state.echo_fallback {
            state.publish(room, Feed::Messages, &message);
        }
        id
    }

    /// One page of a room's messages, newest first.
    pub fn list_messages(&self, room: RoomId, page: MessagePage) -> Vec<ChatMessage> {
        let state = self.lock();
        let Some(log) = state.log.get(&room) else {
            return Vec::new();
        };

        let size = page.size as usize;
        log.iter().rev().skip(page.page as usize * size).take(size).cloned().collect()
    }

    /// Push a raw frame body to every subscriber of a room feed.
    pub fn inject(&self, room: RoomId, feed: Feed, body: &str) {
        let mut state = self.lock();
        state.fan_out(&feed.topic(room), body.as_bytes().to_vec());
    }

    /// Number of messages stored for a room.
    pub fn message_count(&self, room: RoomId) -> usize {
        self.lock().log.get(&room).map_or(0, Vec::len)
    }

    /// Subscriptions held on any of a room's topics, across connections.
    pub fn subscriptions_for(&self, room: RoomId) -> usize {
        let topics: Vec<String> = Feed::ALL
            .iter()
            .filter(|feed| **feed != Feed::Errors)
            .map(|feed| feed.topic(room))
            .collect();

        self.lock()
            .connections
            .values()
            .flat_map(|conn| conn.subscriptions.values())
            .filter(|destination| topics.contains(destination))
            .count()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BrokerState {
    fn receive(&mut self, connection: ConnectionId, frame: &Frame) {
        match frame.command {
            Command::Connect | Command::Stomp => self.connect(connection, frame),
            Command::Subscribe => {
                if let (Some(id), Some(destination)) = (frame.header("id"), frame.header("destination"))
                    && let Some(conn) = self.connections.get_mut(&connection)
                {
                    conn.subscriptions.insert(id.to_string(), destination.to_string());
                }
            },
            Command::Unsubscribe => {
                if let Some(id) = frame.header("id")
                    && let Some(conn) = self.connections.get_mut(&connection)
                {
                    conn.subscriptions.remove(id);
                }
            },
            Command::Send => self.publish_from(connection, frame),
            Command::Disconnect => {
                self.connections.remove(&connection);
            },
            other => tracing::debug!(command = %other, "broker ignoring frame"),
        }
    }

    fn connect(&mut self, connection: ConnectionId, frame: &Frame) {
        let user = frame
            .header("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.trim().is_empty())
            .map(str::to_string);

        let Some(conn) = self.connections.get_mut(&connection) else {
            return;
        };

        match user {
            Some(user) => {
                tracing::debug!(connection, %user, "broker accepted CONNECT");
                conn.user = Some(user);
                conn.outbox.push_back(
                    Frame::new(Command::Connected)
                        .with_header("version", "1.2")
                        .with_header("heart-beat", "0,0"),
                );
            },
            None => {
                conn.outbox.push_back(
                    Frame::new(Command::Error)
                        .with_header("message", "unauthorized")
                        .with_body("missing bearer credential"),
                );
            },
        }
    }

    fn publish_from(&mut self, connection: ConnectionId, frame: &Frame) {
        let Some(user) = self.connections.get(&connection).and_then(|conn| conn.user.clone()) else {
            return;
        };
        let Some((room, kind)) = frame.header("destination").and_then(Publish::parse) else {
            self.report(connection, "unknown destination");
            return;
        };

        match kind {
            Publish::Send => match frame.json::<SendBody>() {
                Ok(body) if !body.message.trim().is_empty() => {
                    let message = self.append(room, &user, &body.message);
                    self.publish(room, Feed::Messages, &message);
                },
                Ok(_) => self.report(connection, "message must not be blank"),
                Err(err) => self.report(connection, &err.to_string()),
            },
            Publish::TypingStart | Publish::TypingStop => {
                let event = TypingEvent { username: user, is_typing: kind == Publish::TypingStart };
                self.publish(room, Feed::Typing, &event);
            },
            Publish::MarkRead => match frame.json::<MarkReadBody>() {
                Ok(body) => self.mark_read(room, &user, body.message_id),
                Err(err) => self.report(connection, &err.to_string()),
            },
        }
    }

    fn mark_read(&mut self, room: RoomId, user: &str, message_id: u64) {
        let readers = self.readers.entry(message_id).or_default();
        if !readers.iter().any(|reader| reader == user) {
            readers.push(user.to_string());
        }
        let read_count = u32::try_from(readers.len()).unwrap_or(u32::MAX);

        if let Some(message) =
            self.log.get_mut(&room).and_then(|log| log.iter_mut().find(|m| m.id == message_id))
        {
            message.read_count = Some(read_count);
        }

        let event = ReadEvent { message_id, username: user.to_string(), read_count };
        self.publish(room, Feed::Read, &event);
    }

    fn append(&mut self, room: RoomId, username: &str, body: &str) -> ChatMessage {
        let id = self.next_message_id;
        self.next_message_id += 1;

        let offset = i64::try_from(id).unwrap_or(i64::MAX).saturating_add(BASE_TIMESTAMP);
        let created_time = DateTime::from_timestamp(offset, 0)
            .map(|at| at.naive_utc())
            .unwrap_or(NaiveDateTime::MIN);

        let message = ChatMessage {
            id,
            message: body.to_string(),
            username: username.to_string(),
            nickname: username.to_string(),
            display_name: None,
            profile_image_url: None,
            is_admin: false,
            created_time,
            read_count: None,
        };
        self.log.entry(room).or_default().push(message.clone());
        message
    }

    fn publish<T: Serialize>(&mut self, room: RoomId, feed: Feed, payload: &T) {
        match payloads::encode(payload) {
            Ok(body) => self.fan_out(&feed.topic(room), body.to_vec()),
            Err(err) => tracing::warn!(%err, "broker could not encode payload"),
        }
    }

    fn report(&mut self, connection: ConnectionId, reason: &str) {
        let notice = ErrorNotice { error: true, message: reason.to_string() };
        let Ok(body) = payloads::encode(&notice) else {
            return;
        };
        if let Some(conn) = self.connections.get_mut(&connection) {
            deliver(conn, ERROR_QUEUE, &body);
        }
    }

    fn fan_out(&mut self, destination: &str, body: Vec<u8>) {
        for conn in self.connections.values_mut() {
            deliver(conn, destination, &body);
        }
    }
}

fn deliver(conn: &mut Connection, destination: &str, body: &[u8]) {
    let ids: Vec<String> = conn
        .subscriptions
        .iter()
        .filter(|(_, subscribed)| *subscribed == destination)
        .map(|(id, _)| id.clone())
        .collect();

    for id in ids {
        conn.outbox.push_back(
            Frame::new(Command::Message)
                .with_header("subscription", id)
                .with_header("destination", destination)
                .with_header("content-type", "application/json")
                .with_body(body.to_vec()),
        );
    }
}
