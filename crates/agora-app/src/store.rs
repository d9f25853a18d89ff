//! Message list of a room view.
//!
//! Messages can reach the view twice: once on the live feed and again in a
//! listing fetched after a fallback send, or in any order when polling
//! overlaps the feed. The store keys messages by their server id so each one
//! is shown exactly once, in id order.

use std::collections::BTreeMap;

use agora_proto::payloads::{ChatMessage, ReadReceipt};

/// What a [`MessageStore::merge`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Merged {
    /// Messages not seen before
    pub added: usize,
    /// Messages already present whose read count moved
    pub refreshed: usize,
}

impl Merged {
    /// True if the view needs redrawing.
    pub fn changed(self) -> bool {
        self.added > 0 || self.refreshed > 0
    }
}

/// Messages of one room, unique by id, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: BTreeMap<u64, ChatMessage>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message. Returns false if a message with the same id is
    /// already present, in which case the store is left untouched.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }
        self.messages.insert(message.id, message);
        true
    }

    /// Insert every message not yet present.
    ///
    /// Read counts of messages already present are refreshed from the
    /// incoming copies, since a listing is newer than what the feed delivered.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Merged {
        let mut merged = Merged::default();
        for message in messages {
            match self.messages.get_mut(&message.id) {
                Some(existing) => {
                    if message.read_count.is_some() && existing.read_count != message.read_count {
                        existing.read_count = message.read_count;
                        merged.refreshed += 1;
                    }
                },
                None => {
                    self.messages.insert(message.id, message);
                    merged.added += 1;
                },
            }
        }
        merged
    }

    /// Apply a read receipt. Returns false for unknown messages.
    pub fn apply_read(&mut self, receipt: ReadReceipt) -> bool {
        match self.messages.get_mut(&receipt.message_id) {
            Some(message) => {
                message.read_count = Some(receipt.read_count);
                true
            },
            None => false,
        }
    }

    /// Message ids in display order.
    pub fn ids(&self) -> Vec<u64> {
        self.messages.keys().copied().collect()
    }

    /// Message with `id`.
    pub fn get(&self, id: u64) -> Option<&ChatMessage> {
        self.messages.get(&id)
    }

    /// Messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.values()
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.values().next_back()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the store holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn message(id: u64, body: &str) -> ChatMessage {
        ChatMessage {
            id,
            message: body.to_string(),
            username: "alice".to_string(),
            nickname: "Alice".to_string(),
            display_name: None,
            profile_image_url: None,
            is_admin: false,
            created_time: NaiveDate::from_ymd_opt(2024, 5, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            read_count: None,
        }
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut store = MessageStore::new();

        assert!(store.insert(message(101, "hello")));
        assert!(!store.insert(message(101, "hello again")));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(101).map(|m| m.message.as_str()), Some("hello"));
    }

    #[test]
    fn merge_orders_by_id_and_counts_new() {
        let mut store = MessageStore::new();
        store.insert(message(101, "hello"));

        let merged = store.merge(vec![message(102, "again"), message(101, "hello"), message(100, "first")]);

        assert_eq!(merged, Merged { added: 2, refreshed: 0 });
        assert_eq!(store.ids(), vec![100, 101, 102]);
        assert_eq!(store.last().map(|m| m.id), Some(102));
    }

    #[test]
    fn merge_refreshes_read_count() {
        let mut store = MessageStore::new();
        store.insert(message(101, "hello"));

        let mut listed = message(101, "hello");
        listed.read_count = Some(3);
        let merged = store.merge(vec![listed.clone()]);

        assert_eq!(merged, Merged { added: 0, refreshed: 1 });
        assert!(merged.changed());
        assert_eq!(store.get(101).and_then(|m| m.read_count), Some(3));

        // Same listing again changes nothing.
        assert!(!store.merge(vec![listed]).changed());
    }

    #[test]
    fn read_receipt_updates_known_message_only() {
        let mut store = MessageStore::new();
        store.insert(message(101, "hello"));

        assert!(store.apply_read(ReadReceipt { message_id: 101, read_count: 2 }));
        assert!(!store.apply_read(ReadReceipt { message_id: 999, read_count: 1 }));
        assert_eq!(store.get(101).and_then(|m| m.read_count), Some(2));
    }
}
