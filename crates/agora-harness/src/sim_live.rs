//! Live channel over the simulated broker.
//!
//! `SimLive` does for simulation what [`agora_client::ChatSession`] does for
//! production: it executes the actions of a Sans-IO [`Session`] and feeds
//! socket events back into it. Instead of a task and a WebSocket it moves
//! frames to and from a [`SimBroker`] whenever it is pumped, so a test
//! decides exactly when traffic flows and how much virtual time passes.

use std::collections::VecDeque;

use agora_app::LiveChannel;
use agora_client::{
    Activation, CredentialSource, Notice, Session, SessionAction, SessionEvent, SessionOptions,
};
use agora_core::Environment;
use agora_proto::RoomId;

use crate::{
    sim_broker::{ConnectionId, SimBroker},
    sim_env::{SimEnv, SimInstant},
};

/// Chat session driven by hand against a [`SimBroker`].
pub struct SimLive {
    broker: SimBroker,
    env: SimEnv,
    session: Option<Session<SimInstant>>,
    socket: Option<ConnectionId>,
    notices: VecDeque<Notice>,
}

impl SimLive {
    /// Activate a session and run its first actions.
    ///
    /// If the session cannot be activated the channel is inert: sends return
    /// false and everything else does nothing.
    pub fn start(
        broker: &SimBroker,
        env: SimEnv,
        options: SessionOptions,
        credentials: &impl CredentialSource,
    ) -> Self {
        let mut live = Self {
            broker: broker.clone(),
            env,
            session: None,
            socket: None,
            notices: VecDeque::new(),
        };

        match Session::activate(options, credentials, live.env.now()) {
            Activation::Started { session, actions } => {
                live.session = Some(session);
                live.execute(actions);
            },
            Activation::Inactive(reason) => {
                tracing::debug!(?reason, "simulated session inactive");
            },
        }

        live
    }

    /// The session state machine. `None` if inert.
    pub fn session(&self) -> Option<&Session<SimInstant>> {
        self.session.as_ref()
    }

    /// Room of the session. `None` if inert.
    pub fn room(&self) -> Option<RoomId> {
        self.session.as_ref().map(Session::room)
    }

    /// Broker connection currently held.
    pub fn socket(&self) -> Option<ConnectionId> {
        self.socket
    }

    /// True while the session is connected.
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_connected)
    }

    /// Users currently typing, in start order.
    pub fn typing_users(&self) -> Vec<String> {
        self.session.as_ref().map(Session::typing_users).unwrap_or_default()
    }

    /// Deliver what the broker queued, notice a dropped socket, then tick.
    pub fn pump(&mut self) {
        let now = self.env.now();

        if let Some(socket) = self.socket {
            match self.broker.take_outbox(socket) {
                Some(frames) => {
                    for frame in frames {
                        if self.socket != Some(socket) {
                            break;
                        }
                        self.feed(SessionEvent::FrameReceived { frame, now });
                    }
                },
                None => {
                    self.socket = None;
                    self.feed(SessionEvent::SocketClosed { now, reason: "connection lost".into() });
                },
            }
        }

        self.feed(SessionEvent::Tick { now });
    }

    /// Pump, then take every queued notice.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.pump();
        self.notices.drain(..).collect()
    }

    fn feed(&mut self, event: SessionEvent<SimInstant>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.handle(event) {
            Ok(actions) => self.execute(actions),
            Err(err) => tracing::warn!(%err, "session rejected event"),
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut queue: VecDeque<SessionAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            let now = self.env.now();
            let follow_up = match action {
                SessionAction::OpenSocket => match self.broker.open() {
                    Some(socket) => {
                        self.socket = Some(socket);
                        Some(SessionEvent::SocketOpened { now })
                    },
                    None => Some(SessionEvent::SocketClosed { now, reason: "broker offline".into() }),
                },
                SessionAction::SendFrame(frame) => match self.socket {
                    Some(socket) if self.broker.is_open(socket) => {
                        self.broker.receive(socket, &frame);
                        None
                    },
                    Some(_) => {
                        self.socket = None;
                        Some(SessionEvent::SocketClosed { now, reason: "connection lost".into() })
                    },
                    None => None,
                },
                SessionAction::SendHeartbeat => None,
                SessionAction::CloseSocket { reason } => {
                    if let Some(socket) = self.socket.take() {
                        tracing::debug!(socket, %reason, "closing simulated socket");
                        self.broker.close(socket);
                    }
                    None
                },
                SessionAction::Notify(notice) => {
                    self.notices.push_back(notice);
                    None
                },
            };

            if let Some(event) = follow_up
                && let Some(session) = self.session.as_mut()
            {
                match session.handle(event) {
                    Ok(more) => queue.extend(more),
                    Err(err) => tracing::warn!(%err, "session rejected event"),
                }
            }
        }
    }
}

impl LiveChannel for SimLive {
    async fn try_send(&mut self, body: &str) -> bool {
        let now = self.env.now();
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match session.send_message(body, now) {
            Ok(actions) => {
                self.execute(actions);
                self.socket.is_some() && self.is_connected()
            },
            Err(err) => {
                tracing::debug!(%err, "live send unavailable");
                false
            },
        }
    }

    fn start_typing(&mut self) {
        let now = self.env.now();
        if let Some(session) = self.session.as_mut() {
            let actions = session.start_typing(now);
            self.execute(actions);
        }
    }

    fn stop_typing(&mut self) {
        let now = self.env.now();
        if let Some(session) = self.session.as_mut() {
            let actions = session.stop_typing(now);
            self.execute(actions);
        }
    }

    fn mark_read(&mut self, message_id: u64) {
        let now = self.env.now();
        if let Some(session) = self.session.as_mut() {
            let actions = session.mark_read(message_id, now);
            self.execute(actions);
        }
    }

    fn poll_notice(&mut self) -> Option<Notice> {
        if self.notices.is_empty() {
            self.pump();
        }
        self.notices.pop_front()
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.as_mut() {
            let actions = session.teardown();
            self.execute(actions);
        }
    }
}
