//! REST implementation of the fallback contract.

use agora_proto::{
    RoomId,
    payloads::{ChatMessage, SendBody},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::{
    credential::CredentialSource,
    error::FallbackError,
    fallback::{ApiResponse, ChatApi, MessagePage},
};

/// API base used by the production forum.
pub const DEFAULT_API_BASE: &str = "https://forum.rjsgud.com/api";

/// [`ChatApi`] over HTTP.
pub struct RestChatApi<C> {
    client: Client,
    base: String,
    credentials: C,
}

impl<C: CredentialSource> RestChatApi<C> {
    /// Client for the API rooted at `base` (for example
    /// [`DEFAULT_API_BASE`]).
    pub fn new(base: impl Into<String>, credentials: C) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client: Client::new(), base, credentials }
    }

    fn messages_url(&self, room: RoomId) -> String {
        format!("{}/group/{}/chat-rooms/{}/messages", self.base, room.group(), room.room())
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, FallbackError> {
        let credential = self.credentials.credential().ok_or(FallbackError::MissingCredential)?;
        Ok(request.bearer_auth(credential.token()))
    }
}

impl<C: CredentialSource> ChatApi for RestChatApi<C> {
    async fn create_message(&self, room: RoomId, body: &str) -> Result<u64, FallbackError> {
        let request = self
            .client
            .post(self.messages_url(room))
            .json(&SendBody { message: body.to_string() });
        let response = self.authorized(request)?.send().await.map_err(transport)?;

        let id: u64 = read_envelope(response).await?;
        tracing::debug!(%room, id, "message persisted via fallback");
        Ok(id)
    }

    async fn list_messages(
        &self,
        room: RoomId,
        page: MessagePage,
    ) -> Result<Vec<ChatMessage>, FallbackError> {
        let request = self
            .client
            .get(self.messages_url(room))
            .query(&[("page", page.page), ("size", page.size)]);
        let response = self.authorized(request)?.send().await.map_err(transport)?;

        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, FallbackError> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| status.to_string());
        return Err(FallbackError::Http { status: status.as_u16(), message });
    }

    serde_json::from_str::<ApiResponse<T>>(&text)
        .map_err(|err| FallbackError::Decode(err.to_string()))?
        .into_data()
}

fn transport(err: reqwest::Error) -> FallbackError {
    FallbackError::Transport(err.to_string())
}
