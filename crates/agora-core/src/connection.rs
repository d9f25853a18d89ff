//! STOMP connection state machine.
//!
//! Owns the lifecycle of one logical connection to the chat broker: opening
//! the socket, the CONNECT/CONNECTED handshake, heart-beats in both
//! directions and the reconnect schedule after the socket drops. Uses the
//! action pattern: methods take time as input and return actions for the
//! driver to execute.
//!
//! # State Machine
//!
//! ```text
//!                 activate / reconnect due
//! ┌──────────────┐ ─────────────────────> ┌────────────┐  CONNECTED  ┌───────────┐
//! │ Disconnected │                        │ Connecting │ ──────────> │ Connected │
//! └──────────────┘ <───────────────────── └────────────┘             └───────────┘
//!        ^          ERROR / timeout / close                                │
//!        └─────────────────────────────────────────────────────────────────┘
//!                        ERROR / heart-beat timeout / socket closed
//! ```
//!
//! While active, every drop into `Disconnected` schedules a new attempt after
//! the reconnect delay. [`Connection::deactivate`] stops the schedule for good.

use std::time::Duration;

use agora_proto::{Command, Frame, HeartBeat, Negotiated};

use crate::{env::Moment, error::ConnectionError};

/// Delay between a drop and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Heart-beat interval advertised in both directions.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

/// Time allowed between opening the socket and receiving CONNECTED.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Multiplier applied to the negotiated incoming interval before the server
/// is considered gone.
const SILENCE_TOLERANCE: u32 = 2;

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new socket to the broker
    OpenSocket,

    /// Send this frame to the broker
    SendFrame(Frame),

    /// Send a bare end-of-line heart-beat
    SendHeartbeat,

    /// Close the socket. Closes requested here are not reported back through
    /// [`Connection::socket_closed`].
    CloseSocket {
        /// Reason for closing the socket
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, possibly waiting for the reconnect delay
    Disconnected,
    /// Socket requested or open, CONNECTED not yet received
    Connecting,
    /// Handshake complete
    Connected,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Virtual host sent in the CONNECT `host` header
    pub host: String,
    /// Delay between a drop and the next attempt
    pub reconnect_delay: Duration,
    /// Heart-beat capabilities advertised to the broker
    pub heartbeat: HeartBeat,
    /// Timeout for completing the handshake
    pub handshake_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "/".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat: HeartBeat::new(DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Connection state machine
///
/// Pure state machine: no I/O, no clock. Generic over the instant type so the
/// same logic runs against real and virtual time.
#[derive(Debug, Clone)]
pub struct Connection<I: Moment> {
    state: ConnectionState,
    config: ConnectionConfig,
    /// Extra CONNECT headers (the bearer credential)
    connect_headers: Vec<(String, String)>,
    /// False once deactivated; no further attempts are made
    active: bool,
    /// When the current attempt started
    attempt_started: Option<I>,
    /// When the next attempt is due
    reconnect_at: Option<I>,
    last_sent: I,
    last_received: I,
    negotiated: Negotiated,
    /// Why the last socket was lost
    last_error: Option<ConnectionError>,
}

impl<I: Moment> Connection<I> {
    /// Create an idle connection in [`ConnectionState::Disconnected`].
    ///
    /// `connect_headers` are appended to every CONNECT frame.
    pub fn new(now: I, config: ConnectionConfig, connect_headers: Vec<(String, String)>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            connect_headers,
            active: false,
            attempt_started: None,
            reconnect_at: None,
            last_sent: now,
            last_received: now,
            negotiated: Negotiated::default(),
            last_error: None,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once CONNECTED has been received on the current socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True between [`Self::begin_connect`] and [`Self::deactivate`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When the next attempt is scheduled, if one is pending.
    #[must_use]
    pub fn reconnect_at(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Heart-beat intervals agreed with the broker on the current socket.
    #[must_use]
    pub fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    /// Why the most recent socket was lost. Cleared on the next CONNECTED.
    #[must_use]
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// Start connecting.
    ///
    /// Returns `OpenSocket` the first time. Calling it again while active is
    /// a no-op. An inactive connection is always disconnected, so this also
    /// restarts a connection after [`Self::deactivate`].
    pub fn begin_connect(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.active {
            return vec![];
        }

        self.active = true;
        self.open(now)
    }

    /// The socket requested by `OpenSocket` is open; send CONNECT.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no attempt is in progress
    pub fn socket_opened(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.active || self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "socket_opened",
            });
        }

        let mut connect = Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", self.config.host.clone())
            .with_header("heart-beat", self.config.heartbeat.to_header_value());
        for (name, value) in &self.connect_headers {
            connect = connect.with_header(name.clone(), value.clone());
        }

        self.last_sent = now;
        self.last_received = now;

        Ok(vec![ConnectionAction::SendFrame(connect)])
    }

    /// Process an incoming frame and update state.
    ///
    /// Counts as inbound activity. MESSAGE and RECEIPT frames produce no
    /// actions here; the caller routes their content.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnexpectedFrame` if the command is not valid in the
    ///   current state
    /// - `ConnectionError::Protocol` if CONNECTED carries a malformed
    ///   `heart-beat` header
    pub fn handle_frame(
        &mut self,
        frame: &Frame,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.last_received = now;

        match (self.state, frame.command) {
            (ConnectionState::Connecting, Command::Connected) => {
                let server = match frame.header("heart-beat") {
                    Some(value) => HeartBeat::parse(value)?,
                    None => HeartBeat::DISABLED,
                };

                self.negotiated = HeartBeat::negotiate(self.config.heartbeat, server);
                self.state = ConnectionState::Connected;
                self.attempt_started = None;
                self.last_error = None;

                tracing::debug!(
                    version = frame.header("version"),
                    send_every = ?self.negotiated.send_every,
                    expect_every = ?self.negotiated.expect_every,
                    "connected"
                );

                Ok(vec![])
            },

            (ConnectionState::Connecting | ConnectionState::Connected, Command::Error) => {
                let message = frame
                    .header("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body_str().into_owned());

                Ok(self.drop_socket(now, ConnectionError::Rejected { message }))
            },

            (ConnectionState::Connected, Command::Message | Command::Receipt) => Ok(vec![]),

            (state, command) => Err(ConnectionError::UnexpectedFrame { state, command }),
        }
    }

    /// Record a heart-beat (or any other traffic) from the broker.
    pub fn record_inbound(&mut self, now: I) {
        self.last_received = now;
    }

    /// Record that a frame was written to the socket.
    ///
    /// Any outbound frame resets the heart-beat timer.
    pub fn record_outbound(&mut self, now: I) {
        self.last_sent = now;
    }

    /// The socket closed or failed without being asked to.
    ///
    /// Schedules a reconnect if the connection is still active.
    pub fn socket_closed(&mut self, now: I, reason: &str) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        self.lose_socket(now, ConnectionError::Transport(reason.to_string()));
    }

    /// Process periodic maintenance.
    ///
    /// Fires the reconnect when due, enforces the handshake timeout, detects
    /// a silent broker and emits outbound heart-beats.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Disconnected => match self.reconnect_at {
                Some(due) if self.active && now >= due => {
                    tracing::debug!("reconnecting");
                    self.open(now)
                },
                _ => vec![],
            },

            ConnectionState::Connecting => match self.attempt_started {
                Some(started) if now - started > self.config.handshake_timeout => {
                    self.drop_socket(now, ConnectionError::HandshakeTimeout { elapsed: now - started })
                },
                _ => vec![],
            },

            ConnectionState::Connected => {
                if let Some(expect) = self.negotiated.expect_every {
                    let silent = now - self.last_received;
                    if silent > expect * SILENCE_TOLERANCE {
                        return self.drop_socket(now, ConnectionError::HeartbeatTimeout { elapsed: silent });
                    }
                }

                match self.negotiated.send_every {
                    Some(every) if now - self.last_sent >= every => {
                        self.last_sent = now;
                        vec![ConnectionAction::SendHeartbeat]
                    },
                    _ => vec![],
                }
            },
        }
    }

    /// Stop the connection for good.
    ///
    /// Sends DISCONNECT if the handshake completed, closes the socket if one
    /// is in use and cancels any scheduled reconnect. Idempotent.
    pub fn deactivate(&mut self) -> Vec<ConnectionAction> {
        if !self.active {
            return vec![];
        }

        self.active = false;
        self.reconnect_at = None;
        self.attempt_started = None;

        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        let reason = "deactivated".to_string();
        match previous {
            ConnectionState::Connected => vec![
                ConnectionAction::SendFrame(Frame::new(Command::Disconnect)),
                ConnectionAction::CloseSocket { reason },
            ],
            ConnectionState::Connecting => vec![ConnectionAction::CloseSocket { reason }],
            ConnectionState::Disconnected => vec![],
        }
    }

    fn open(&mut self, now: I) -> Vec<ConnectionAction> {
        self.state = ConnectionState::Connecting;
        self.attempt_started = Some(now);
        self.reconnect_at = None;
        vec![ConnectionAction::OpenSocket]
    }

    /// Close the socket ourselves after `error`.
    fn drop_socket(&mut self, now: I, error: ConnectionError) -> Vec<ConnectionAction> {
        let reason = error.to_string();
        self.lose_socket(now, error);
        vec![ConnectionAction::CloseSocket { reason }]
    }

    /// Every path into `Disconnected` while a socket was in use ends here.
    /// A rejection still reconnects: the credential may have been refreshed.
    fn lose_socket(&mut self, now: I, error: ConnectionError) {
        if error.is_transient() {
            tracing::info!(%error, state = ?self.state, "socket lost");
        } else {
            tracing::warn!(%error, state = ?self.state, "socket lost");
        }

        self.state = ConnectionState::Disconnected;
        self.attempt_started = None;
        self.negotiated = Negotiated::default();
        self.last_error = Some(error);
        if self.active {
            self.reconnect_at = Some(now + self.config.reconnect_delay);
        }
    }
}
