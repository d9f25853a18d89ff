//! Room view state machine.
//!
//! Pure state machine: it consumes [`crate::AppEvent`] inputs and user input
//! and produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Owns the [`MessageStore`] and merges messages from the live feed and
//!   from listings into it.
//! - Runs the send flow: live channel first, REST fallback when the live
//!   channel is down, then exactly one re-fetch after a fallback send.
//! - Polls the listing while the live channel is down.
//! - Debounces outbound typing notifications.
//! - Marks other users' messages as read while live.

use std::time::Duration;

use agora_client::Notice;
use agora_core::Moment;
use agora_proto::RoomId;

use crate::{AppAction, AppEvent, MessageStore};

/// Listing refresh interval while the live channel is down.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Draft inactivity after which typing stop is published.
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_secs(2);

/// Room view configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Group id. Zero means absent.
    pub group: u64,
    /// Room id. Zero means absent.
    pub room: u64,
    /// Signed-in user, if known. Own messages are never marked read.
    pub username: Option<String>,
    /// Listing refresh interval while disconnected.
    pub poll_interval: Duration,
    /// Draft inactivity before typing stop.
    pub typing_idle: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            group: 0,
            room: 0,
            username: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            typing_idle: DEFAULT_TYPING_IDLE,
        }
    }
}

impl AppConfig {
    /// Room identity, if both ids are present.
    pub fn room_id(&self) -> Option<RoomId> {
        RoomId::new(self.group, self.room)
    }
}

/// Room view state machine.
#[derive(Debug, Clone)]
pub struct App<I: Moment> {
    config: AppConfig,
    store: MessageStore,
    draft: String,
    /// A send is in flight; further submits are ignored until it settles.
    sending: bool,
    connected: bool,
    /// Set once the live channel has been up; later reconnects catch up.
    was_connected: bool,
    typing_users: Vec<String>,
    /// Typing start published and not yet stopped.
    typing_sent: bool,
    last_edit: Option<I>,
    next_poll: Option<I>,
    status: Option<String>,
}

impl<I: Moment> App<I> {
    /// Create a room view.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: MessageStore::new(),
            draft: String::new(),
            sending: false,
            connected: false,
            was_connected: false,
            typing_users: Vec::new(),
            typing_sent: false,
            last_edit: None,
            next_poll: None,
            status: None,
        }
    }

    /// Messages in display order.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Current draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// True while the live channel is connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True while a send is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Other users currently typing.
    pub fn typing_users(&self) -> &[String] {
        &self.typing_users
    }

    /// Status line. `None` if nothing to report.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Configuration of this view.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The view appeared: load the most recent messages.
    pub fn mount(&mut self, now: I) -> Vec<AppAction> {
        self.next_poll = Some(now + self.config.poll_interval);
        vec![AppAction::FetchMessages, AppAction::Render]
    }

    /// The draft changed.
    ///
    /// Publishes typing start on the first non-empty change and typing stop
    /// when the draft is cleared.
    pub fn edit_draft(&mut self, text: impl Into<String>, now: I) -> Vec<AppAction> {
        self.draft = text.into();
        let mut actions = Vec::new();

        if self.draft.trim().is_empty() {
            self.last_edit = None;
            if self.typing_sent {
                self.typing_sent = false;
                actions.push(AppAction::StopTyping);
            }
        } else {
            self.last_edit = Some(now);
            if !self.typing_sent && self.connected {
                self.typing_sent = true;
                actions.push(AppAction::StartTyping);
            }
        }

        actions.push(AppAction::Render);
        actions
    }

    /// Send the draft.
    ///
    /// Blank drafts and submits while a send is in flight are ignored.
    pub fn submit(&mut self) -> Vec<AppAction> {
        if self.sending || self.draft.trim().is_empty() {
            return vec![];
        }

        self.sending = true;
        let mut actions = Vec::new();
        if self.typing_sent {
            self.typing_sent = false;
            actions.push(AppAction::StopTyping);
        }
        actions.push(AppAction::TrySend { body: self.draft.clone() });
        actions.push(AppAction::Render);
        actions
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent<I>) -> Vec<AppAction> {
        match event {
            AppEvent::Tick { now } => self.tick(now),

            AppEvent::Notice(notice) => self.notice(notice),

            AppEvent::LiveSent => {
                self.sending = false;
                self.draft.clear();
                vec![AppAction::Render]
            },

            AppEvent::LiveSendRejected { body } => {
                tracing::debug!("live channel down, using fallback");
                vec![AppAction::SendViaFallback { body }]
            },

            AppEvent::FallbackSent { id } => {
                tracing::debug!(id, "fallback send succeeded");
                self.sending = false;
                self.draft.clear();
                vec![AppAction::FetchMessages, AppAction::Render]
            },

            AppEvent::FallbackFailed { message } => {
                tracing::warn!(%message, "fallback send failed");
                self.sending = false;
                self.status = Some(format!("Send failed: {message}"));
                vec![AppAction::Alert { message }, AppAction::Render]
            },

            AppEvent::MessagesFetched { messages } => {
                if !self.store.merge(messages.into_iter().rev()).changed() {
                    return vec![];
                }
                vec![AppAction::Render]
            },

            AppEvent::FetchFailed { message } => {
                tracing::warn!(%message, "message listing failed");
                self.status = Some(format!("Could not load messages: {message}"));
                vec![AppAction::Render]
            },
        }
    }

    fn notice(&mut self, notice: Notice) -> Vec<AppAction> {
        match notice {
            Notice::Message(message) => {
                let mut actions = Vec::new();
                let from_other = self.config.username.as_deref() != Some(message.username.as_str());
                if self.connected && from_other {
                    actions.push(AppAction::MarkRead { message_id: message.id });
                }
                if self.store.insert(message) {
                    actions.push(AppAction::Render);
                }
                actions
            },

            Notice::Typing(_) => vec![],

            Notice::TypingUsers(users) => {
                self.typing_users = users;
                vec![AppAction::Render]
            },

            Notice::Read(event) => {
                if self.store.apply_read(event.receipt()) {
                    vec![AppAction::Render]
                } else {
                    vec![]
                }
            },

            Notice::ConnectionChanged(up) => {
                self.connected = up;
                let mut actions = Vec::new();

                if up {
                    self.next_poll = None;
                    self.status = None;
                    if self.was_connected {
                        actions.push(AppAction::FetchMessages);
                    }
                    self.was_connected = true;
                } else {
                    self.typing_users.clear();
                    self.typing_sent = false;
                    self.status = Some("Live chat disconnected, reconnecting".to_string());
                }

                actions.push(AppAction::Render);
                actions
            },

            Notice::ServerError(message) => {
                self.status = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn tick(&mut self, now: I) -> Vec<AppAction> {
        let mut actions = Vec::new();

        if let Some(edited) = self.last_edit
            && self.typing_sent
            && now - edited >= self.config.typing_idle
        {
            self.typing_sent = false;
            self.last_edit = None;
            actions.push(AppAction::StopTyping);
        }

        if !self.connected {
            match self.next_poll {
                Some(due) if now < due => {},
                _ => {
                    self.next_poll = Some(now + self.config.poll_interval);
                    actions.push(AppAction::FetchMessages);
                },
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use agora_proto::payloads::{ChatMessage, ReadEvent};

    use super::*;

    fn config() -> AppConfig {
        AppConfig { group: 7, room: 3, username: Some("me".to_string()), ..AppConfig::default() }
    }

    fn chat(id: u64, username: &str) -> ChatMessage {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "message": format!("m{id}"),
            "username": username,
            "createdTime": "2024-05-01T12:00:00",
        }))
        .unwrap()
    }

    fn live_app(t0: Instant) -> App<Instant> {
        let mut app = App::new(config());
        app.mount(t0);
        app.handle(AppEvent::Notice(Notice::ConnectionChanged(true)));
        app
    }

    #[test]
    fn mount_fetches_recent_messages() {
        let mut app: App<Instant> = App::new(config());
        assert_eq!(app.mount(Instant::now()), vec![AppAction::FetchMessages, AppAction::Render]);
    }

    #[test]
    fn blank_draft_is_never_sent() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        app.edit_draft("   ", t0);
        assert!(app.submit().is_empty());
    }

    #[test]
    fn live_send_clears_draft() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        app.edit_draft("hello", t0);
        let actions = app.submit();
        assert!(actions.contains(&AppAction::TrySend { body: "hello".to_string() }));
        assert!(actions.contains(&AppAction::StopTyping));
        assert!(app.submit().is_empty());

        app.handle(AppEvent::LiveSent);
        assert_eq!(app.draft(), "");
        assert!(!app.is_sending());
    }

    #[test]
    fn rejected_live_send_falls_back_then_fetches_once() {
        let t0 = Instant::now();
        let mut app: App<Instant> = App::new(config());
        app.mount(t0);

        app.edit_draft("again", t0);
        app.submit();

        let actions = app.handle(AppEvent::LiveSendRejected { body: "again".to_string() });
        assert_eq!(actions, vec![AppAction::SendViaFallback { body: "again".to_string() }]);

        let actions = app.handle(AppEvent::FallbackSent { id: 102 });
        let fetches = actions.iter().filter(|a| **a == AppAction::FetchMessages).count();
        assert_eq!(fetches, 1);
        assert_eq!(app.draft(), "");
    }

    #[test]
    fn fallback_failure_alerts_and_keeps_draft() {
        let t0 = Instant::now();
        let mut app: App<Instant> = App::new(config());
        app.edit_draft("again", t0);
        app.submit();

        let actions = app.handle(AppEvent::FallbackFailed { message: "forbidden".to_string() });
        assert!(actions.contains(&AppAction::Alert { message: "forbidden".to_string() }));
        assert_eq!(app.draft(), "again");
        assert!(!app.is_sending());
    }

    #[test]
    fn fetched_listing_is_reversed_and_deduplicated() {
        let t0 = Instant::now();
        let mut app = live_app(t0);
        app.handle(AppEvent::Notice(Notice::Message(chat(101, "alice"))));

        app.handle(AppEvent::MessagesFetched { messages: vec![chat(102, "me"), chat(101, "alice")] });

        assert_eq!(app.store().ids(), vec![101, 102]);
    }

    #[test]
    fn listing_with_only_new_read_counts_renders() {
        let t0 = Instant::now();
        let mut app: App<Instant> = App::new(config());
        app.mount(t0);
        app.handle(AppEvent::MessagesFetched { messages: vec![chat(101, "alice")] });

        let unchanged = app.handle(AppEvent::MessagesFetched { messages: vec![chat(101, "alice")] });
        assert!(unchanged.is_empty());

        let mut read = chat(101, "alice");
        read.read_count = Some(2);
        let actions = app.handle(AppEvent::MessagesFetched { messages: vec![read] });

        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.store().get(101).and_then(|m| m.read_count), Some(2));
    }

    #[test]
    fn other_users_messages_are_marked_read_while_live() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        let actions = app.handle(AppEvent::Notice(Notice::Message(chat(101, "alice"))));
        assert!(actions.contains(&AppAction::MarkRead { message_id: 101 }));

        let actions = app.handle(AppEvent::Notice(Notice::Message(chat(102, "me"))));
        assert!(!actions.iter().any(|a| matches!(a, AppAction::MarkRead { .. })));
    }

    #[test]
    fn read_receipt_updates_store() {
        let t0 = Instant::now();
        let mut app = live_app(t0);
        app.handle(AppEvent::Notice(Notice::Message(chat(101, "alice"))));

        app.handle(AppEvent::Notice(Notice::Read(ReadEvent {
            message_id: 101,
            username: "bob".to_string(),
            read_count: 2,
        })));

        assert_eq!(app.store().get(101).and_then(|m| m.read_count), Some(2));
    }

    #[test]
    fn polls_only_while_disconnected() {
        let t0 = Instant::now();
        let mut app: App<Instant> = App::new(config());
        app.mount(t0);

        assert!(app.handle(AppEvent::Tick { now: t0 + Duration::from_secs(4) }).is_empty());
        assert_eq!(app.handle(AppEvent::Tick { now: t0 + Duration::from_secs(5) }), vec![
            AppAction::FetchMessages
        ]);

        app.handle(AppEvent::Notice(Notice::ConnectionChanged(true)));
        assert!(app.handle(AppEvent::Tick { now: t0 + Duration::from_secs(30) }).is_empty());
    }

    #[test]
    fn reconnect_catches_up_once() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        app.handle(AppEvent::Notice(Notice::ConnectionChanged(false)));
        let actions = app.handle(AppEvent::Notice(Notice::ConnectionChanged(true)));

        assert_eq!(actions, vec![AppAction::FetchMessages, AppAction::Render]);
    }

    #[test]
    fn typing_start_once_then_stop_after_idle() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        assert!(app.edit_draft("h", t0).contains(&AppAction::StartTyping));
        assert!(!app.edit_draft("he", t0 + Duration::from_millis(500)).contains(&AppAction::StartTyping));

        assert!(app.handle(AppEvent::Tick { now: t0 + Duration::from_millis(2400) }).is_empty());
        assert_eq!(app.handle(AppEvent::Tick { now: t0 + Duration::from_millis(2500) }), vec![
            AppAction::StopTyping
        ]);
    }

    #[test]
    fn clearing_draft_stops_typing() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        app.edit_draft("h", t0);
        assert!(app.edit_draft("", t0).contains(&AppAction::StopTyping));
    }

    #[test]
    fn server_error_becomes_status() {
        let t0 = Instant::now();
        let mut app = live_app(t0);

        app.handle(AppEvent::Notice(Notice::ServerError("not a member".to_string())));
        assert_eq!(app.status(), Some("not a member"));
    }
}
