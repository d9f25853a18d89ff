//! JSON payloads carried in frame bodies.
//!
//! Field names follow the server's camelCase JSON. Inbound types tolerate
//! missing optional fields; outbound types serialize exactly the shape the
//! server's message handlers read.

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Frame, errors::Result};

/// A chat message as delivered on the message feed and by the listing
/// endpoint.
///
/// # Invariants
///
/// - `id` is assigned by the server, unique within a room and increasing in
///   creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned message id.
    pub id: u64,
    /// Plain-text body.
    pub message: String,
    /// Sender's account username.
    pub username: String,
    /// Sender's profile nickname.
    #[serde(default)]
    pub nickname: String,
    /// Per-room display name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Sender's avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    /// Sender administers the group.
    #[serde(default, rename = "isAdmin")]
    pub is_admin: bool,
    /// Creation time (server local time).
    pub created_time: NaiveDateTime,
    /// Number of members who have read the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_count: Option<u32>,
}

impl ChatMessage {
    /// Name to show for the sender: the per-room display name when set,
    /// otherwise the nickname, otherwise the username.
    pub fn sender_label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ if !self.nickname.is_empty() => self.nickname.as_str(),
            _ => self.username.as_str(),
        }
    }
}

/// Typing feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    /// User whose typing state changed.
    pub username: String,
    /// `true` on start, `false` on stop.
    #[serde(rename = "isTyping")]
    pub is_typing: bool,
}

/// Read feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Message that was read.
    pub message_id: u64,
    /// Updated read count for the message.
    pub read_count: u32,
}

/// Read feed event with the reader's name.
///
/// Kept separate from [`ReadReceipt`] so the copyable receipt can be applied
/// to a store without cloning the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEvent {
    /// Message that was read.
    pub message_id: u64,
    /// User who read it.
    pub username: String,
    /// Updated read count for the message.
    pub read_count: u32,
}

impl ReadEvent {
    /// The store-facing part of the event.
    pub fn receipt(&self) -> ReadReceipt {
        ReadReceipt { message_id: self.message_id, read_count: self.read_count }
    }
}

/// Body of a send publish and of the REST create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBody {
    /// Message text.
    pub message: String,
}

/// Body of a mark-read publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadBody {
    /// Message being marked as read.
    pub message_id: u64,
}

/// Empty JSON object body (`{}`), used by typing publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmptyBody {}

/// Error report delivered on the personal error queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Always `true` for error reports.
    #[serde(default)]
    pub error: bool,
    /// Human-readable reason.
    pub message: String,
}

/// Serialize a payload into a frame body.
///
/// # Errors
///
/// - `ProtocolError::Payload` if serialization fails
pub fn encode<T: Serialize>(payload: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(payload)?))
}

impl Frame {
    /// Deserialize the JSON body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Payload` if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, ProtocolError};

    const SERVER_MESSAGE: &str = r#"{
        "id": 101,
        "message": "hello",
        "username": "alice",
        "nickname": "Alice",
        "displayName": null,
        "profileImageUrl": "https://cdn.example/alice.png",
        "isAdmin": true,
        "createdTime": "2024-05-01T12:30:00.123456",
        "readCount": 2
    }"#;

    #[test]
    fn parse_server_message() {
        let msg: ChatMessage = serde_json::from_str(SERVER_MESSAGE).unwrap();
        assert_eq!(msg.id, 101);
        assert_eq!(msg.username, "alice");
        assert!(msg.is_admin);
        assert_eq!(msg.display_name, None);
        assert_eq!(msg.read_count, Some(2));
        assert_eq!(msg.sender_label(), "Alice");
    }

    #[test]
    fn display_name_overrides_nickname() {
        let mut msg: ChatMessage = serde_json::from_str(SERVER_MESSAGE).unwrap();
        msg.display_name = Some("Captain".into());
        assert_eq!(msg.sender_label(), "Captain");

        msg.display_name = Some("  ".into());
        msg.nickname.clear();
        assert_eq!(msg.sender_label(), "alice");
    }

    #[test]
    fn typing_and_read_field_names() {
        let typing: TypingEvent =
            serde_json::from_str(r#"{"username":"bob","isTyping":true}"#).unwrap();
        assert!(typing.is_typing);

        let read: ReadEvent =
            serde_json::from_str(r#"{"messageId":5,"username":"bob","readCount":3}"#).unwrap();
        assert_eq!(read.receipt(), ReadReceipt { message_id: 5, read_count: 3 });
    }

    #[test]
    fn outbound_bodies() {
        assert_eq!(&encode(&EmptyBody {}).unwrap()[..], b"{}");
        assert_eq!(&encode(&MarkReadBody { message_id: 9 }).unwrap()[..], br#"{"messageId":9}"#);
        assert_eq!(
            &encode(&SendBody { message: "hi".into() }).unwrap()[..],
            br#"{"message":"hi"}"#
        );
    }

    #[test]
    fn frame_json_reports_payload_errors() {
        let frame = Frame::new(Command::Message).with_body(&b"not json"[..]);
        let result: Result<TypingEvent> = frame.json();
        assert!(matches!(result, Err(ProtocolError::Payload(_))));
    }
}
