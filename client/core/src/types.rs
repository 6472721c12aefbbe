//! Wire and Data Model
//!
//! Serde types mirroring the chat backend's JSON payloads, plus the
//! client-side invariants layered on top of them. The most important one:
//! `original_content` (the pre-transformation text) is only ever visible
//! for the viewer's own messages. The field is private and gated behind an
//! accessor, and the sync layer additionally redacts it on ingest so a
//! leaking backend cannot expose it through this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Peer (addressable user) identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    /// Generate a new random peer ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Generate a new random conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate a new random message ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An addressable peer from the directory.
///
/// Read-only projection: the core never mutates or deletes peers, it only
/// replaces the directory list wholesale on each successful poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Peer identifier
    pub id: PeerId,
    /// Display username
    pub username: String,
}

impl Peer {
    /// Create a peer (primarily for tests and fixtures)
    pub fn new(id: PeerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// How this user's outgoing messages are transformed for the peer.
///
/// Directional: each side of a conversation has an independent tone for
/// their own outgoing messages. This is not a shared conversation-level
/// setting, even though it is stored as a flat field on the conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneSetting {
    /// Rewrite to sound more intelligent
    Smarter,
    /// Rewrite into a professional register
    Professional,
    /// Soften the message
    #[default]
    Nicer,
    /// Harden the message
    Meaner,
    /// Add sarcasm
    Sarcastic,
    /// Make it affectionate
    Loving,
    /// Make it angry
    Angry,
    /// Free-text transformation prompt (requires a non-empty prompt)
    Custom,
}

impl ToneSetting {
    /// Every selectable tone, in display order
    pub const ALL: [ToneSetting; 8] = [
        Self::Smarter,
        Self::Professional,
        Self::Nicer,
        Self::Meaner,
        Self::Sarcastic,
        Self::Loving,
        Self::Angry,
        Self::Custom,
    ];

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Smarter => "Smarter",
            Self::Professional => "Professional",
            Self::Nicer => "Nicer",
            Self::Meaner => "Meaner",
            Self::Sarcastic => "Sarcastic",
            Self::Loving => "Loving",
            Self::Angry => "Angry",
            Self::Custom => "Custom",
        }
    }

    /// Whether this tone requires a free-text prompt
    #[must_use]
    pub fn requires_prompt(&self) -> bool {
        matches!(self, Self::Custom)
    }
}

impl std::fmt::Display for ToneSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Preview of the most recent message in a conversation summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    /// Transformed content of the latest message
    pub content: String,
    /// When it was sent
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Whether the viewing user sent it
    pub is_mine: bool,
}

/// A two-party conversation, as this user sees it.
///
/// Exactly one conversation exists per (current user, peer) pair; the
/// resolver's get-or-create contract enforces that. `my_tone` and
/// `my_custom_prompt` describe how *this* user's outgoing messages are
/// transformed. The get-or-create response omits `last_message` and
/// `unread_count`, so both default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    pub id: ConversationId,
    /// The peer on the other side
    pub other_user: Peer,
    /// Preview of the most recent message (absent until one exists)
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    /// Messages from the peer this user has not yet read
    #[serde(default)]
    pub unread_count: u32,
    /// How this user's outgoing messages are transformed
    pub my_tone: ToneSetting,
    /// Free-text prompt, active only while `my_tone` is `custom`
    #[serde(default)]
    pub my_custom_prompt: Option<String>,
}

/// A message as the viewing user is allowed to see it.
///
/// Immutable once created server-side. `is_mine` is a per-viewer
/// projection (`sender_id == viewing user`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier
    pub id: MessageId,
    /// Who sent it
    pub sender_id: PeerId,
    /// Sender's username at send time
    pub sender_username: String,
    /// Pre-transformation text. Private: only exposed through
    /// [`Message::original_content`], which gates on `is_mine`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_content: Option<String>,
    /// The text the recipient sees
    pub transformed_content: String,
    /// When the message was created
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Whether the viewing user sent it
    pub is_mine: bool,
    /// Whether the recipient has read it
    pub is_read: bool,
}

impl Message {
    /// Create a message (primarily for tests and fixtures)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MessageId,
        sender_id: PeerId,
        sender_username: impl Into<String>,
        original_content: Option<String>,
        transformed_content: impl Into<String>,
        timestamp: DateTime<Utc>,
        is_mine: bool,
        is_read: bool,
    ) -> Self {
        Self {
            id,
            sender_id,
            sender_username: sender_username.into(),
            original_content,
            transformed_content: transformed_content.into(),
            timestamp,
            is_mine,
            is_read,
        }
    }

    /// The pre-transformation text, visible only for the viewer's own
    /// messages. Returns `None` for messages from the peer even if a
    /// leaking backend included the field in the payload.
    #[must_use]
    pub fn original_content(&self) -> Option<&str> {
        if self.is_mine {
            self.original_content.as_deref()
        } else {
            None
        }
    }

    /// Strip the pre-transformation text from messages the viewer did not
    /// send. Called by the sync layer on every ingest.
    pub fn redact(&mut self) {
        if !self.is_mine {
            self.original_content = None;
        }
    }
}

/// Acknowledgment returned by the send endpoint.
///
/// A partial message: the server assigns the id, timestamp, and the
/// transformed content, but the full per-viewer projection (`is_mine`,
/// `is_read`, sender fields) only appears in the message-list fetch. The
/// engine never inserts this into the synchronized list; it re-fetches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendAck {
    /// Server-assigned message identifier
    pub id: MessageId,
    /// The text as submitted
    pub original_content: String,
    /// The text after the AI transformation step
    pub transformed_content: String,
    /// Server-assigned timestamp
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Timestamp codec tolerant of the backend's naive ISO-8601.
///
/// The server emits `datetime.isoformat()` strings which may lack a UTC
/// offset; naive values are interpreted as UTC. RFC 3339 is emitted.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
