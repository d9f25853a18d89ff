//! WebSocket transport for the session manager.
//!
//! Provides [`ChatSession`], which runs a Sans-IO [`Session`] inside a tokio
//! task: it opens the socket when asked, turns socket input into session
//! events, ticks the session for heart-beats, reconnects and typing expiry,
//! and executes the actions the session returns. Protocol logic stays in
//! [`Session`]; this module only moves bytes and time.

use std::{collections::VecDeque, time::Duration};

use agora_core::env::{Environment, Moment};
use agora_proto::{RoomId, Wire, decode_stream};
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{
    credential::CredentialSource,
    event::{Notice, SessionAction, SessionEvent},
    session::{Activation, Session, SessionOptions},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often the session is ticked, however busy the socket is.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on opening the WebSocket itself. The STOMP handshake has its
/// own timeout in the connection state machine.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket endpoint for a chat server base URL.
///
/// `http`/`https` schemes are mapped to `ws`/`wss`; the raw WebSocket path of
/// the server's SockJS endpoint is appended.
pub fn websocket_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    let server = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        server.to_string()
    };
    format!("{server}/ws/websocket")
}

enum Command {
    Send { body: String, reply: oneshot::Sender<bool> },
    StartTyping,
    StopTyping,
    MarkRead(u64),
    Teardown,
}

/// Handle to a live chat session running in a background task.
///
/// Dropping the handle aborts the task without a graceful DISCONNECT; call
/// [`ChatSession::teardown`] to leave cleanly.
pub struct ChatSession {
    room: Option<RoomId>,
    commands: mpsc::UnboundedSender<Command>,
    connected: watch::Receiver<bool>,
    typing: watch::Receiver<Vec<String>>,
    notices: mpsc::UnboundedReceiver<Notice>,
    task: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// Start a session for the room in `options` against `url`.
    ///
    /// Must be called from within a tokio runtime. If the session cannot be
    /// activated (disabled, missing room or credential) the returned handle
    /// is inert: it never connects, `send` returns false and the other
    /// publishes do nothing.
    pub fn spawn<E: Environment>(
        url: impl Into<String>,
        options: SessionOptions,
        credentials: &impl CredentialSource,
        env: E,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let (typing_tx, typing_rx) = watch::channel(Vec::new());
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let (room, task) = match Session::activate(options, credentials, env.now()) {
            Activation::Started { session, actions } => {
                let room = session.room();
                let worker = Worker {
                    url: url.into(),
                    env,
                    session,
                    socket: None,
                    connected: connected_tx,
                    typing: typing_tx,
                    notices: notices_tx,
                };
                (Some(room), Some(tokio::spawn(worker.run(actions, commands_rx))))
            },
            Activation::Inactive(reason) => {
                tracing::debug!(?reason, "chat session inactive");
                (None, None)
            },
        };

        Self {
            room,
            commands: commands_tx,
            connected: connected_rx,
            typing: typing_rx,
            notices: notices_rx,
            task,
        }
    }

    /// Room of this session. `None` for an inert handle.
    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    /// True while the live channel is connected.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch connection changes.
    pub fn connection_changes(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Users currently typing, in start order.
    pub fn typing_users(&self) -> Vec<String> {
        self.typing.borrow().clone()
    }

    /// Publish a chat message over the live channel.
    ///
    /// Returns false if the channel is down or the write failed. The message
    /// was not sent in that case and the caller should use the fallback.
    ///
    /// The command is queued before this returns; the future only waits for
    /// the outcome and does not borrow the handle.
    pub fn send(&self, body: &str) -> impl Future<Output = bool> + Send + 'static {
        let (reply, response) = oneshot::channel();
        let queued = self.is_connected()
            && self.commands.send(Command::Send { body: body.to_string(), reply }).is_ok();

        async move { queued && response.await.unwrap_or(false) }
    }

    /// Announce that the user started typing. Best effort.
    pub fn start_typing(&self) {
        self.command(Command::StartTyping);
    }

    /// Announce that the user stopped typing. Best effort.
    pub fn stop_typing(&self) {
        self.command(Command::StopTyping);
    }

    /// Mark a message as read. Best effort.
    pub fn mark_read(&self, message_id: u64) {
        self.command(Command::MarkRead(message_id));
    }

    /// Wait for the next notice. `None` once the session has ended.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        self.notices.recv().await
    }

    /// Next notice if one is already queued.
    pub fn try_notice(&mut self) -> Option<Notice> {
        self.notices.try_recv().ok()
    }

    /// Tear the session down and wait for the task to finish.
    ///
    /// Unsubscribes, sends DISCONNECT and closes the socket. Idempotent.
    pub async fn teardown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        self.command(Command::Teardown);
        if let Err(err) = task.await {
            tracing::debug!(%err, "session task ended abnormally");
        }
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::trace!("session task not running, command dropped");
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

struct Worker<E: Environment> {
    url: String,
    env: E,
    session: Session<E::Instant>,
    socket: Option<WsStream>,
    connected: watch::Sender<bool>,
    typing: watch::Sender<Vec<String>>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<E: Environment> Worker<E> {
    async fn run(mut self, initial: Vec<SessionAction>, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.execute(initial).await;

        // The tick is due on the clock, not after a quiet period: a broker
        // that keeps the socket busy must not postpone it.
        let mut next_tick = self.env.now() + TICK_INTERVAL;

        while !self.session.is_torn_down() {
            let idle = until(self.wake_at(next_tick), self.env.now());

            tokio::select! {
                command = commands.recv() => {
                    let command = command.unwrap_or(Command::Teardown);
                    self.command(command).await;
                },
                incoming = next_message(&mut self.socket) => self.incoming(incoming).await,
                () = self.env.sleep(idle) => {},
            }

            let now = self.env.now();
            if now >= self.wake_at(next_tick) {
                self.feed(SessionEvent::Tick { now }).await;
                next_tick = now + TICK_INTERVAL;
            }
        }

        self.connected.send_replace(false);
        self.typing.send_replace(Vec::new());
    }

    /// Next regular tick, or an earlier typing expiry.
    fn wake_at(&self, next_tick: E::Instant) -> E::Instant {
        self.session.next_deadline().map_or(next_tick, |deadline| deadline.min(next_tick))
    }

    async fn command(&mut self, command: Command) {
        let now = self.env.now();
        match command {
            Command::Send { body, reply } => match self.session.send_message(&body, now) {
                Ok(actions) => {
                    self.execute(actions).await;
                    let sent = self.socket.is_some() && self.session.is_connected();
                    if reply.send(sent).is_err() {
                        tracing::trace!("send caller went away");
                    }
                },
                Err(err) => {
                    tracing::debug!(%err, "live send unavailable");
                    if reply.send(false).is_err() {
                        tracing::trace!("send caller went away");
                    }
                },
            },
            Command::StartTyping => {
                let actions = self.session.start_typing(now);
                self.execute(actions).await;
            },
            Command::StopTyping => {
                let actions = self.session.stop_typing(now);
                self.execute(actions).await;
            },
            Command::MarkRead(message_id) => {
                let actions = self.session.mark_read(message_id, now);
                self.execute(actions).await;
            },
            Command::Teardown => {
                let actions = self.session.teardown();
                self.execute(actions).await;
            },
        }
    }

    async fn incoming(&mut self, incoming: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>) {
        let now = self.env.now();
        let bytes = match incoming {
            Some(Ok(Message::Text(text))) => text.as_str().as_bytes().to_vec(),
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Close(_))) | None => {
                self.socket = None;
                self.feed(SessionEvent::SocketClosed { now, reason: "closed by server".into() }).await;
                return;
            },
            Some(Ok(_)) => return,
            Some(Err(err)) => {
                tracing::warn!(%err, "socket error");
                self.socket = None;
                self.feed(SessionEvent::SocketClosed { now, reason: err.to_string() }).await;
                return;
            },
        };

        let wires = match decode_stream(&bytes) {
            Ok(wires) => wires,
            Err(err) => {
                tracing::warn!(%err, "dropping undecodable socket message");
                return;
            },
        };

        for wire in wires {
            let event = match wire {
                Wire::Heartbeat => SessionEvent::HeartbeatReceived { now },
                Wire::Frame(frame) => SessionEvent::FrameReceived { frame, now },
            };
            self.feed(event).await;
        }
    }

    async fn feed(&mut self, event: SessionEvent<E::Instant>) {
        match self.session.handle(event) {
            Ok(actions) => self.execute(actions).await,
            Err(err) => tracing::warn!(%err, "session rejected event"),
        }
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut queue: VecDeque<SessionAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            let follow_up = match action {
                SessionAction::OpenSocket => Some(self.open().await),
                SessionAction::SendFrame(frame) => match frame.to_text() {
                    Ok(text) => self.write(Message::Text(text.into())).await,
                    Err(err) => {
                        tracing::warn!(%err, command = %frame.command, "dropping unencodable frame");
                        None
                    },
                },
                SessionAction::SendHeartbeat => self.write(Message::Text("\n".into())).await,
                SessionAction::CloseSocket { reason } => {
                    self.close(&reason).await;
                    None
                },
                SessionAction::Notify(notice) => {
                    self.notify(notice);
                    None
                },
            };

            if let Some(event) = follow_up {
                match self.session.handle(event) {
                    Ok(more) => queue.extend(more),
                    Err(err) => tracing::warn!(%err, "session rejected event"),
                }
            }
        }
    }

    async fn open(&mut self) -> SessionEvent<E::Instant> {
        tracing::debug!(url = %self.url, "opening socket");

        let result = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str())).await;
        let now = self.env.now();

        match result {
            Ok(Ok((socket, _response))) => {
                self.socket = Some(socket);
                SessionEvent::SocketOpened { now }
            },
            Ok(Err(err)) => {
                tracing::warn!(%err, "socket connect failed");
                SessionEvent::SocketClosed { now, reason: err.to_string() }
            },
            Err(_) => {
                tracing::warn!("socket connect timed out");
                SessionEvent::SocketClosed { now, reason: "connect timed out".into() }
            },
        }
    }

    async fn write(&mut self, message: Message) -> Option<SessionEvent<E::Instant>> {
        let Some(socket) = self.socket.as_mut() else {
            tracing::debug!("no socket, dropping outbound message");
            return None;
        };

        match socket.send(message).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(%err, "socket write failed");
                self.socket = None;
                Some(SessionEvent::SocketClosed { now: self.env.now(), reason: err.to_string() })
            },
        }
    }

    async fn close(&mut self, reason: &str) {
        if let Some(mut socket) = self.socket.take() {
            tracing::debug!(%reason, "closing socket");
            if let Err(err) = socket.close(None).await {
                tracing::debug!(%err, "close handshake failed");
            }
        }
    }

    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::ConnectionChanged(up) => {
                self.connected.send_replace(*up);
            },
            Notice::TypingUsers(users) => {
                self.typing.send_replace(users.clone());
            },
            _ => {},
        }

        if self.notices.send(notice).is_err() {
            tracing::trace!("notice receiver dropped");
        }
    }
}

fn until<I: Moment>(deadline: I, now: I) -> Duration {
    if deadline > now { deadline - now } else { Duration::ZERO }
}

async fn next_message(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_maps_scheme_and_path() {
        assert_eq!(websocket_url("https://forum.example.com/"), "wss://forum.example.com/ws/websocket");
        assert_eq!(websocket_url("http://localhost:8080"), "ws://localhost:8080/ws/websocket");
        assert_eq!(websocket_url("ws://127.0.0.1:9000"), "ws://127.0.0.1:9000/ws/websocket");
    }

    #[test]
    fn until_never_goes_negative() {
        let t0 = std::time::Instant::now();
        let later = t0 + Duration::from_millis(40);

        assert_eq!(until(later, t0), Duration::from_millis(40));
        assert_eq!(until(t0, later), Duration::ZERO);
        assert_eq!(until(t0, t0), Duration::ZERO);
    }
}
