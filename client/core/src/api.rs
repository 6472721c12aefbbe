//! Chat Backend API
//!
//! The [`ChatApi`] trait is the engine's only seam to the outside world:
//! six operations over the chat backend's REST surface. [`HttpChatApi`] is
//! the production implementation; tests substitute a mock.
//!
//! Every request carries an opaque bearer credential obtained from the
//! auth collaborator. This crate never inspects, stores, or refreshes it;
//! a rejected credential surfaces as [`ApiError::Unauthorized`].

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::types::{Conversation, ConversationId, Message, Peer, PeerId, SendAck, ToneSetting};

/// Operations the engine consumes from the chat backend.
///
/// Implementations must be cheap to call concurrently; the engine issues
/// independent polls in parallel tasks.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /api/chat/users`: every addressable peer except the caller
    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError>;

    /// `GET /api/chat/conversations`: summaries for all of the caller's
    /// conversations (`last_message`, `unread_count`, tone)
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// `POST /api/chat/conversation/{peer_id}`: idempotent get-or-create.
    /// The response omits `last_message`/`unread_count`.
    async fn resolve_conversation(&self, peer_id: PeerId) -> Result<Conversation, ApiError>;

    /// `GET /api/chat/conversation/{id}/messages`: full list, ascending
    /// by timestamp. Side effect server-side: marks the caller's unread
    /// messages as read.
    async fn conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError>;

    /// `POST /api/chat/conversation/{id}/send`: the server runs the AI
    /// transformation before acknowledging
    async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<SendAck, ApiError>;

    /// `PUT /api/chat/conversation/{id}/tone`: returns the updated
    /// conversation
    async fn update_tone(
        &self,
        conversation_id: ConversationId,
        tone: ToneSetting,
        custom_prompt: Option<&str>,
    ) -> Result<Conversation, ApiError>;
}

// Allows callers to keep a handle to the implementation (mocks in
// particular) while the client owns its own.
#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for std::sync::Arc<T> {
    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError> {
        (**self).list_peers().await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        (**self).list_conversations().await
    }

    async fn resolve_conversation(&self, peer_id: PeerId) -> Result<Conversation, ApiError> {
        (**self).resolve_conversation(peer_id).await
    }

    async fn conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError> {
        (**self).conversation_messages(conversation_id).await
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<SendAck, ApiError> {
        (**self).send_message(conversation_id, content).await
    }

    async fn update_tone(
        &self,
        conversation_id: ConversationId,
        tone: ToneSetting,
        custom_prompt: Option<&str>,
    ) -> Result<Conversation, ApiError> {
        (**self).update_tone(conversation_id, tone, custom_prompt).await
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct UpdateToneRequest<'a> {
    tone: ToneSetting,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_prompt: Option<&'a str>,
}

/// reqwest-backed [`ChatApi`] implementation
pub struct HttpChatApi {
    base_url: String,
    bearer: String,
    http: reqwest::Client,
}

impl HttpChatApi {
    /// Create a client against `config.server_url` with the given opaque
    /// bearer credential.
    pub fn new(config: &ClientConfig, bearer: impl Into<String>) -> Self {
        Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            bearer: bearer.into(),
            http: reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_peers(&self) -> Result<Vec<Peer>, ApiError> {
        self.get_json("/api/chat/users").await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json("/api/chat/conversations").await
    }

    async fn resolve_conversation(&self, peer_id: PeerId) -> Result<Conversation, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/api/chat/conversation/{peer_id}")))
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, ApiError> {
        self.get_json(&format!("/api/chat/conversation/{conversation_id}/messages"))
            .await
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<SendAck, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/api/chat/conversation/{conversation_id}/send")))
            .bearer_auth(&self.bearer)
            .json(&SendMessageRequest { content })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_tone(
        &self,
        conversation_id: ConversationId,
        tone: ToneSetting,
        custom_prompt: Option<&str>,
    ) -> Result<Conversation, ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/api/chat/conversation/{conversation_id}/tone")))
            .bearer_auth(&self.bearer)
            .json(&UpdateToneRequest {
                tone,
                custom_prompt,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
