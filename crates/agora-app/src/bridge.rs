//! Session-to-Application translation layer.
//!
//! The [`Bridge`] executes [`crate::AppAction`]s against the live channel and
//! the REST fallback and reports each outcome back as [`crate::AppEvent`]s.
//!
//! # Responsibilities
//!
//! - Tries the live channel first for sends and reports whether it took the
//!   message, so the app can decide on the fallback.
//! - Runs fallback sends and listings and converts their errors into events
//!   carrying user-facing reasons.
//! - Forwards typing and read publishes, which are best effort.
//! - Surfaces session notices to the runtime.

use std::future::Future;

use agora_client::{ChatApi, MessagePage, Notice};
use agora_proto::RoomId;

use crate::{AppAction, AppEvent};

/// Live side of a chat session, as seen by the room view.
///
/// Production wraps [`agora_client::ChatSession`]; simulation provides an
/// in-memory broker.
pub trait LiveChannel: Send {
    /// Publish a chat message. Returns false if the channel is down, in which
    /// case nothing was sent.
    fn try_send(&mut self, body: &str) -> impl Future<Output = bool> + Send;

    /// Announce typing start. Best effort.
    fn start_typing(&mut self);

    /// Announce typing stop. Best effort.
    fn stop_typing(&mut self);

    /// Mark a message as read. Best effort.
    fn mark_read(&mut self, message_id: u64);

    /// Next queued notice, without waiting.
    fn poll_notice(&mut self) -> Option<Notice>;

    /// Unsubscribe and disconnect. Idempotent.
    fn teardown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Bridge between App and the session manager.
pub struct Bridge<L, A> {
    room: RoomId,
    live: L,
    api: A,
}

impl<L: LiveChannel, A: ChatApi> Bridge<L, A> {
    /// Create a bridge for `room`.
    pub fn new(room: RoomId, live: L, api: A) -> Self {
        Self { room, live, api }
    }

    /// Room this bridge serves.
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Live channel.
    pub fn live(&self) -> &L {
        &self.live
    }

    /// Fallback API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Process an App action and return resulting App events.
    pub async fn process_app_action<I>(&mut self, action: AppAction) -> Vec<AppEvent<I>> {
        match action {
            AppAction::TrySend { body } => {
                if self.live.try_send(&body).await {
                    vec![AppEvent::LiveSent]
                } else {
                    vec![AppEvent::LiveSendRejected { body }]
                }
            },
            AppAction::SendViaFallback { body } => {
                match self.api.create_message(self.room, &body).await {
                    Ok(id) => vec![AppEvent::FallbackSent { id }],
                    Err(err) => vec![AppEvent::FallbackFailed { message: err.to_string() }],
                }
            },
            AppAction::FetchMessages => {
                match self.api.list_messages(self.room, MessagePage::RECENT).await {
                    Ok(messages) => vec![AppEvent::MessagesFetched { messages }],
                    Err(err) => vec![AppEvent::FetchFailed { message: err.to_string() }],
                }
            },
            AppAction::StartTyping => {
                self.live.start_typing();
                vec![]
            },
            AppAction::StopTyping => {
                self.live.stop_typing();
                vec![]
            },
            AppAction::MarkRead { message_id } => {
                self.live.mark_read(message_id);
                vec![]
            },
            AppAction::Render | AppAction::Alert { .. } => vec![],
        }
    }

    /// Drain notices queued by the session.
    pub fn poll_notices<I>(&mut self) -> Vec<AppEvent<I>> {
        std::iter::from_fn(|| self.live.poll_notice()).map(AppEvent::Notice).collect()
    }

    /// Tear the live session down.
    pub async fn teardown(&mut self) {
        self.live.teardown().await;
    }
}
