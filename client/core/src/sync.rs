//! Sync Cache
//!
//! Last-known-good stores for everything the polling loops refresh: the
//! peer directory, the conversation summaries, and the active
//! conversation's message list. Every commit replaces its store wholesale
//! (polls are pure refreshes, not delta merges) and a transient fetch
//! failure simply leaves the previous contents in place.
//!
//! The cache itself does no staleness checking; the engine guards commits
//! against the current selection before they reach here.

use crate::types::{Conversation, ConversationId, Message, MessageId, Peer, PeerId, ToneSetting};

/// In-memory synchronized state
#[derive(Debug, Default)]
pub struct SyncCache {
    peers: Vec<Peer>,
    summaries: Vec<Conversation>,
    /// Message list for the active conversation only. Keyed so a commit
    /// for a conversation that is no longer displayed can be recognized.
    active_messages: Option<(ConversationId, Vec<Message>)>,
}

impl SyncCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known-good peer directory
    #[must_use]
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Last-known-good conversation summaries
    #[must_use]
    pub fn summaries(&self) -> &[Conversation] {
        &self.summaries
    }

    /// Summary for one conversation, if present
    #[must_use]
    pub fn summary_for(&self, conversation_id: ConversationId) -> Option<&Conversation> {
        self.summaries.iter().find(|c| c.id == conversation_id)
    }

    /// Unread count for the conversation with a given peer (0 if none)
    #[must_use]
    pub fn unread_for_peer(&self, peer_id: PeerId) -> u32 {
        self.summaries
            .iter()
            .find(|c| c.other_user.id == peer_id)
            .map_or(0, |c| c.unread_count)
    }

    /// Unread messages across all conversations
    #[must_use]
    pub fn total_unread(&self) -> u32 {
        self.summaries.iter().map(|c| c.unread_count).sum()
    }

    /// The cached message list, if it belongs to `conversation_id`
    #[must_use]
    pub fn messages_for(&self, conversation_id: ConversationId) -> Option<&[Message]> {
        match &self.active_messages {
            Some((id, messages)) if *id == conversation_id => Some(messages),
            _ => None,
        }
    }

    /// Newest cached message (the scroll anchor)
    #[must_use]
    pub fn latest_message_id(&self) -> Option<MessageId> {
        self.active_messages
            .as_ref()
            .and_then(|(_, messages)| messages.last())
            .map(|m| m.id)
    }

    /// Replace the peer directory
    pub fn commit_peers(&mut self, peers: Vec<Peer>) {
        tracing::debug!(count = peers.len(), "directory refreshed");
        self.peers = peers;
    }

    /// Replace the conversation summaries
    pub fn commit_summaries(&mut self, summaries: Vec<Conversation>) {
        tracing::debug!(count = summaries.len(), "conversation summaries refreshed");
        self.summaries = summaries;
    }

    /// Replace the active message list wholesale. Redacts foreign
    /// `original_content` on the way in and returns the new scroll anchor.
    pub fn commit_messages(
        &mut self,
        conversation_id: ConversationId,
        mut messages: Vec<Message>,
    ) -> Option<MessageId> {
        for message in &mut messages {
            message.redact();
        }
        let latest = messages.last().map(|m| m.id);
        tracing::debug!(
            conversation = %conversation_id,
            count = messages.len(),
            "message list refreshed"
        );
        self.active_messages = Some((conversation_id, messages));
        latest
    }

    /// Drop the cached message list (selection changed)
    pub fn clear_messages(&mut self) {
        self.active_messages = None;
    }

    /// Apply an acknowledged tone change to the summary cache so list
    /// views observe it without waiting for their own poll tick.
    pub fn apply_tone(
        &mut self,
        conversation_id: ConversationId,
        tone: ToneSetting,
        custom_prompt: Option<String>,
    ) {
        if let Some(summary) = self.summaries.iter_mut().find(|c| c.id == conversation_id) {
            summary.my_tone = tone;
            summary.my_custom_prompt = custom_prompt;
        }
    }

    /// Update `last_message`/`unread_count` on a conversation from its
    /// freshly polled summary, preserving local tone fields (a lagging
    /// summary response must not regress an acknowledged tone change).
    pub fn project_summary_onto(&self, conversation: &mut Conversation) {
        if let Some(summary) = self.summary_for(conversation.id) {
            conversation.last_message = summary.last_message.clone();
            conversation.unread_count = summary.unread_count;
        }
    }

    /// Drop everything (logout)
    pub fn clear(&mut self) {
        self.peers.clear();
        self.summaries.clear();
        self.active_messages = None;
    }
}
