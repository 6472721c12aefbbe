//! Chat Client
//!
//! Async facade over the engine. The engine's mutex is a plain blocking
//! lock and every critical section is short and synchronous: the facade
//! locks to *begin* an operation, releases the lock across the network
//! await, then locks again to *commit* the result. Staleness guards inside
//! the engine make the unlocked window safe.
//!
//! The facade also owns the polling loops (directory, summaries, and the
//! active conversation's messages) and cancels them when the state they
//! feed stops existing. Cancellation only stops future ticks; results
//! already in flight are discarded at commit time by the engine's
//! generation and epoch guards.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::ChatApi;
use crate::config::ClientConfig;
use crate::engine::{ChatEngine, ResolveOutcome};
use crate::error::{ClientError, ValidationError};
use crate::poll::{PollPurpose, PollerSet};
use crate::selection::SelectBegin;
use crate::types::{Conversation, ConversationId, Peer, SendAck, ToneSetting};
use crate::updates::EngineUpdate;

/// Async entry point for a chat surface
pub struct ChatClient<A: ChatApi + 'static> {
    engine: Arc<Mutex<ChatEngine>>,
    api: Arc<A>,
    config: ClientConfig,
    pollers: Arc<Mutex<PollerSet>>,
}

// Manual impl: `A` itself does not need to be Clone behind the Arc.
impl<A: ChatApi> Clone for ChatClient<A> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            api: Arc::clone(&self.api),
            config: self.config.clone(),
            pollers: Arc::clone(&self.pollers),
        }
    }
}

impl<A: ChatApi> ChatClient<A> {
    /// Create a client and the update stream a surface renders from
    #[must_use]
    pub fn new(api: A, config: ClientConfig) -> (Self, tokio::sync::mpsc::UnboundedReceiver<EngineUpdate>) {
        let (engine, updates) = ChatEngine::new();
        (
            Self {
                engine: Arc::new(Mutex::new(engine)),
                api: Arc::new(api),
                config,
                pollers: Arc::new(Mutex::new(PollerSet::new())),
            },
            updates,
        )
    }

    /// Shared read access to the engine state
    #[must_use]
    pub fn engine(&self) -> Arc<Mutex<ChatEngine>> {
        Arc::clone(&self.engine)
    }

    /// Start the directory and summary polling loops. Each loop fetches
    /// immediately, then on its configured cadence; a failed tick logs and
    /// keeps the last-known-good data.
    pub fn start(&self) {
        let mut pollers = self.pollers.lock();

        let client = self.clone();
        let period = self.config.peer_poll_interval;
        pollers.register(
            PollPurpose::Peers,
            None,
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    client.refresh_peers().await;
                }
            }),
        );

        let client = self.clone();
        let period = self.config.summary_poll_interval;
        pollers.register(
            PollPurpose::Summaries,
            None,
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    client.refresh_summaries().await;
                }
            }),
        );
    }

    /// Select a peer, resolving its conversation via get-or-create.
    ///
    /// Re-selecting the active peer is a no-op that issues no network call.
    /// If the selection moves on while the resolve is in flight, the late
    /// result is discarded and [`ResolveOutcome::Discarded`] is returned.
    pub async fn select_peer(&self, peer: Peer) -> Result<ResolveOutcome, ClientError> {
        let peer_id = peer.id;
        let epoch = {
            let mut engine = self.engine.lock();
            match engine.begin_select(peer) {
                SelectBegin::AlreadyCurrent => return Ok(ResolveOutcome::AlreadyCurrent),
                SelectBegin::Started { epoch } => epoch,
            }
        };
        // The previous conversation (if any) stopped existing client-side
        // the moment begin_select cleared it.
        self.pollers.lock().cancel_purpose(PollPurpose::Messages);

        let result = self.api.resolve_conversation(peer_id).await;

        let outcome = self.engine.lock().complete_select(epoch, result)?;
        if let ResolveOutcome::Ready(conversation) = &outcome {
            self.start_message_poll(conversation.id);
        }
        Ok(outcome)
    }

    fn start_message_poll(&self, conversation_id: ConversationId) {
        let client = self.clone();
        let period = self.config.message_poll_interval;
        self.pollers.lock().register(
            PollPurpose::Messages,
            Some(conversation_id),
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    client.refresh_messages(conversation_id).await;
                }
            }),
        );
    }

    /// Send a message in the active conversation.
    ///
    /// Validation (non-empty text, active conversation, nothing already in
    /// flight) happens before any network call. On failure the typed text
    /// is preserved and nothing is retried automatically. On success the
    /// message list and summaries are re-fetched immediately, ordered after
    /// the acknowledgment.
    pub async fn send_message(&self, text: &str) -> Result<SendAck, ClientError> {
        let (conversation_id, content, generation) = {
            let mut engine = self.engine.lock();
            let (conversation_id, content) = engine.begin_send(text)?;
            (conversation_id, content, engine.generation())
        };

        match self.api.send_message(conversation_id, &content).await {
            Ok(ack) => {
                let applied = self
                    .engine
                    .lock()
                    .complete_send(generation, conversation_id);
                if applied {
                    // Surface the transformed message without waiting for
                    // the next poll tick.
                    self.refresh_messages(conversation_id).await;
                    self.refresh_summaries().await;
                }
                Ok(ack)
            }
            Err(error) => {
                self.engine
                    .lock()
                    .fail_send(generation, conversation_id, &error);
                Err(ClientError::Send(error))
            }
        }
    }

    /// Change the tone for the active conversation.
    ///
    /// `Custom` requires a non-empty prompt; that is rejected client-side
    /// with no network call. For any other tone the prompt is ignored.
    /// Only messages sent after the acknowledgment are transformed with
    /// the new tone. On success the summary list is re-fetched immediately
    /// so list views observe the change without waiting for their poll
    /// tick.
    pub async fn set_tone(
        &self,
        tone: ToneSetting,
        custom_prompt: Option<&str>,
    ) -> Result<Conversation, ClientError> {
        let custom_prompt = custom_prompt.map(str::trim).filter(|p| !p.is_empty());
        if tone.requires_prompt() && custom_prompt.is_none() {
            return Err(ValidationError::MissingCustomPrompt.into());
        }
        let prompt = if tone.requires_prompt() {
            custom_prompt
        } else {
            None
        };

        let conversation_id = self
            .engine
            .lock()
            .selected_conversation_id()
            .ok_or(ValidationError::NoActiveConversation)?;

        let updated = self
            .api
            .update_tone(conversation_id, tone, prompt)
            .await
            .map_err(ClientError::Tone)?;

        self.engine.lock().apply_tone(
            conversation_id,
            updated.my_tone,
            updated.my_custom_prompt.clone(),
        );
        self.refresh_summaries().await;
        Ok(updated)
    }

    /// Fetch the peer directory once and commit it. A transient failure
    /// keeps the previous directory.
    pub async fn refresh_peers(&self) {
        let generation = self.engine.lock().generation();
        match self.api.list_peers().await {
            Ok(peers) => {
                let dropped = self.engine.lock().commit_peers(generation, peers);
                if dropped {
                    self.pollers.lock().cancel_purpose(PollPurpose::Messages);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "directory poll failed; keeping last-known-good");
            }
        }
    }

    /// Fetch the conversation summaries once and commit them
    pub async fn refresh_summaries(&self) {
        let generation = self.engine.lock().generation();
        match self.api.list_conversations().await {
            Ok(summaries) => self.engine.lock().commit_summaries(generation, summaries),
            Err(error) => {
                tracing::warn!(%error, "summary poll failed; keeping last-known-good");
            }
        }
    }

    /// Fetch the message list for a conversation once and commit it. The
    /// commit is discarded if the conversation is no longer selected.
    pub async fn refresh_messages(&self, conversation_id: ConversationId) {
        let generation = self.engine.lock().generation();
        match self.api.conversation_messages(conversation_id).await {
            Ok(messages) => {
                self.engine
                    .lock()
                    .commit_messages(generation, conversation_id, messages);
            }
            Err(error) => {
                tracing::warn!(
                    conversation = %conversation_id,
                    %error,
                    "message poll failed; keeping last-known-good"
                );
            }
        }
    }

    /// Stop all polling and clear every piece of client state. In-flight
    /// results are discarded on arrival.
    pub fn logout(&self) {
        self.pollers.lock().shutdown();
        self.engine.lock().logout();
    }
}
