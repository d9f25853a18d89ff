//! Request/response fallback contract.
//!
//! When the live channel is down, messages are persisted through the REST API
//! instead, and the room view re-reads recent messages to pick them up. The
//! same API serves the initial load and the degraded-mode polling.

use std::future::Future;

use agora_proto::{RoomId, payloads::ChatMessage};
use serde::Deserialize;

use crate::error::FallbackError;

/// A page of the message listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePage {
    /// Zero-based page index, newest page first.
    pub page: u32,
    /// Messages per page.
    pub size: u32,
}

impl MessagePage {
    /// The most recent hundred messages.
    pub const RECENT: Self = Self { page: 0, size: 100 };
}

impl Default for MessagePage {
    fn default() -> Self {
        Self::RECENT
    }
}

/// Chat endpoints of the REST API.
pub trait ChatApi: Send + Sync {
    /// Persist a message and return its server-assigned id.
    fn create_message(
        &self,
        room: RoomId,
        body: &str,
    ) -> impl Future<Output = Result<u64, FallbackError>> + Send;

    /// Fetch one page of messages, newest first.
    fn list_messages(
        &self,
        room: RoomId,
        page: MessagePage,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, FallbackError>> + Send;
}

/// Response envelope used by every REST endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the server accepted the request.
    #[serde(default)]
    pub success: bool,
    /// Response payload.
    pub data: Option<T>,
    /// Human-readable reason, mostly set on failure.
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload of a successful response.
    ///
    /// # Errors
    ///
    /// - `FallbackError::Rejected` if `success` is false
    /// - `FallbackError::Decode` if a successful response carries no data
    pub fn into_data(self) -> Result<T, FallbackError> {
        if !self.success {
            return Err(FallbackError::Rejected {
                message: self.message.unwrap_or_else(|| "request rejected".to_string()),
            });
        }

        self.data.ok_or_else(|| FallbackError::Decode("response carries no data".to_string()))
    }
}
