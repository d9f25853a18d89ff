//! Request/response fallback over the simulated broker.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use agora_client::{ChatApi, FallbackError, MessagePage};
use agora_proto::{RoomId, payloads::ChatMessage};

use crate::sim_broker::SimBroker;

#[derive(Debug, Default)]
struct Counters {
    creates: AtomicUsize,
    lists: AtomicUsize,
    unavailable: AtomicBool,
}

/// [`ChatApi`] backed by a [`SimBroker`]'s message log.
///
/// Clones share call counters and availability, so a test can keep one
/// clone while the runtime owns another.
#[derive(Debug, Clone)]
pub struct SimApi {
    broker: SimBroker,
    username: String,
    counters: Arc<Counters>,
}

impl SimApi {
    /// API acting as `username`.
    pub fn new(broker: &SimBroker, username: impl Into<String>) -> Self {
        Self { broker: broker.clone(), username: username.into(), counters: Arc::default() }
    }

    /// Make every call fail with a transport error, or recover.
    pub fn set_available(&self, available: bool) {
        self.counters.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of create calls so far, including failed ones.
    pub fn create_calls(&self) -> usize {
        self.counters.creates.load(Ordering::SeqCst)
    }

    /// Number of list calls so far, including failed ones.
    pub fn list_calls(&self) -> usize {
        self.counters.lists.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), FallbackError> {
        if self.counters.unavailable.load(Ordering::SeqCst) {
            return Err(FallbackError::Transport("api unreachable".to_string()));
        }
        Ok(())
    }
}

impl ChatApi for SimApi {
    async fn create_message(&self, room: RoomId, body: &str) -> Result<u64, FallbackError> {
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if body.trim().is_empty() {
            return Err(FallbackError::Rejected { message: "message must not be blank".to_string() });
        }
        Ok(self.broker.create_message(room, &self.username, body))
    }

    async fn list_messages(
        &self,
        room: RoomId,
        page: MessagePage,
    ) -> Result<Vec<ChatMessage>, FallbackError> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self.broker.list_messages(room, page))
    }
}
