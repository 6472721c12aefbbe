//! Chat Engine
//!
//! The single-writer state core. Every piece of mutable client state
//! (selection, sync cache, send pipeline) lives here, and the methods on
//! [`ChatEngine`] are the only mutation entry points. All methods are
//! synchronous: network awaits happen in [`crate::client::ChatClient`]
//! between a "begin" mutation and a "commit" mutation, so the engine's
//! lock is never held across a suspension point.
//!
//! Commits carry the context they were started under (session generation,
//! selection epoch, conversation id) and are discarded when that context
//! is no longer current. That rule, not locking, is what keeps
//! late-arriving responses from corrupting state: the event loop is
//! single-threaded and the caches are single-writer-per-key.

use tokio::sync::mpsc;

use crate::error::{ApiError, ClientError, ValidationError};
use crate::selection::{SelectBegin, Selection, SelectionState};
use crate::send::{SendPipeline, SendState};
use crate::sync::SyncCache;
use crate::types::{Conversation, ConversationId, Message, Peer, ToneSetting};
use crate::updates::{ClearReason, EngineUpdate};

/// Outcome of a completed peer-selection transition
#[derive(Clone, Debug)]
pub enum ResolveOutcome {
    /// The conversation is resolved and now active
    Ready(Conversation),
    /// The peer was already active; no resolve call was made
    AlreadyCurrent,
    /// The selection moved on while the resolve was in flight; the result
    /// was discarded on arrival
    Discarded,
}

/// Central client state and its mutation entry points
pub struct ChatEngine {
    selection: Selection,
    cache: SyncCache,
    sends: SendPipeline,
    /// Bumped on logout. Commits from work begun under an earlier
    /// generation are discarded on arrival.
    generation: u64,
    updates: mpsc::UnboundedSender<EngineUpdate>,
}

impl ChatEngine {
    /// Create an engine and the update stream its consumer reads
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Self {
                selection: Selection::new(),
                cache: SyncCache::new(),
                sends: SendPipeline::new(),
                generation: 0,
                updates,
            },
            rx,
        )
    }

    fn emit(&self, update: EngineUpdate) {
        // The consumer may have gone away (e.g. headless tests); state
        // transitions still apply.
        let _ = self.updates.send(update);
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Current session generation. Async work captures this when it begins
    /// and presents it when committing; a mismatch discards the commit.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current selection machine state
    #[must_use]
    pub fn selection_state(&self) -> SelectionState {
        self.selection.state()
    }

    /// The selected peer, if any
    #[must_use]
    pub fn selected_peer(&self) -> Option<Peer> {
        self.selection.peer().cloned()
    }

    /// The active conversation, if resolved
    #[must_use]
    pub fn selected_conversation(&self) -> Option<Conversation> {
        self.selection.conversation().cloned()
    }

    /// The active conversation id, if resolved
    #[must_use]
    pub fn selected_conversation_id(&self) -> Option<ConversationId> {
        self.selection.conversation_id()
    }

    /// Last-known-good peer directory
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.cache.peers().to_vec()
    }

    /// Last-known-good conversation summaries
    #[must_use]
    pub fn summaries(&self) -> Vec<Conversation> {
        self.cache.summaries().to_vec()
    }

    /// Unread count for the conversation with a peer
    #[must_use]
    pub fn unread_for_peer(&self, peer_id: crate::types::PeerId) -> u32 {
        self.cache.unread_for_peer(peer_id)
    }

    /// Message list for the active conversation, if synchronized
    #[must_use]
    pub fn active_messages(&self) -> Option<Vec<Message>> {
        let id = self.selection.conversation_id()?;
        self.cache.messages_for(id).map(<[Message]>::to_vec)
    }

    /// Send pipeline state for a conversation
    #[must_use]
    pub fn send_state(&self, conversation_id: ConversationId) -> SendState {
        self.sends.state(conversation_id)
    }

    /// Text preserved from a failed send, if any
    #[must_use]
    pub fn preserved_input(&self, conversation_id: ConversationId) -> Option<String> {
        self.sends.preserved_input(conversation_id).map(String::from)
    }

    // ========================================================================
    // Selection / resolve
    // ========================================================================

    /// Begin a peer-selection transition. Clears any previous conversation
    /// synchronously and drops its cached messages. Returns
    /// [`SelectBegin::AlreadyCurrent`] when no resolve call may be issued.
    pub fn begin_select(&mut self, peer: Peer) -> SelectBegin {
        let begin = self.selection.begin_select(peer.clone());
        if let SelectBegin::Started { .. } = begin {
            self.cache.clear_messages();
            tracing::info!(peer = %peer.username, "peer selected");
            self.emit(EngineUpdate::PeerSelected { peer });
        }
        begin
    }

    /// Commit the result of a resolve started under `epoch`.
    ///
    /// A stale result (the selection moved on) is discarded without error.
    /// A failed resolve leaves the selection at `PeerSelected` so
    /// re-selecting the peer retries.
    pub fn complete_select(
        &mut self,
        epoch: u64,
        result: Result<Conversation, ApiError>,
    ) -> Result<ResolveOutcome, ClientError> {
        match result {
            Ok(mut conversation) => {
                // Enrich the bare get-or-create response from the summary
                // cache so unread/last-message are not lost.
                self.cache.project_summary_onto(&mut conversation);
                if self.selection.attach_conversation(epoch, conversation.clone()) {
                    tracing::info!(conversation = %conversation.id, "conversation ready");
                    self.emit(EngineUpdate::ConversationReady {
                        conversation: conversation.clone(),
                    });
                    Ok(ResolveOutcome::Ready(conversation))
                } else {
                    tracing::debug!(
                        conversation = %conversation.id,
                        "discarding stale resolve result"
                    );
                    Ok(ResolveOutcome::Discarded)
                }
            }
            Err(error) => {
                self.selection.resolve_failed(epoch);
                if let Some(peer) = self.selection.peer() {
                    self.emit(EngineUpdate::ResolveFailed {
                        peer: peer.clone(),
                        error: error.to_string(),
                    });
                }
                Err(ClientError::Resolve(error))
            }
        }
    }

    /// Clear selection, caches, and send state (logout). In-flight results
    /// are discarded on arrival: resolves via the epoch bump, every other
    /// commit via the generation bump.
    pub fn logout(&mut self) {
        tracing::info!("logging out; clearing selection and caches");
        self.generation += 1;
        self.selection.clear();
        self.cache.clear();
        self.sends.clear();
        self.emit(EngineUpdate::SelectionCleared {
            reason: ClearReason::Logout,
        });
    }

    // ========================================================================
    // Send pipeline
    // ========================================================================

    /// Validate and begin a send. Returns the conversation id and trimmed
    /// text to submit. All preconditions are checked here, before any
    /// network call: non-empty text, active conversation, no send already
    /// in flight for it.
    pub fn begin_send(&mut self, text: &str) -> Result<(ConversationId, String), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let conversation_id = self
            .selection
            .conversation_id()
            .ok_or(ValidationError::NoActiveConversation)?;
        self.sends.begin(conversation_id, text)?;
        self.emit(EngineUpdate::SendStateChanged {
            conversation_id,
            state: SendState::Submitting,
        });
        Ok((conversation_id, text.to_string()))
    }

    /// Mark a send acknowledged, if the session it began under is still
    /// current. Returns whether the transition applied; when it did, the
    /// caller re-fetches the message list and summaries immediately,
    /// ordered after this ack.
    pub fn complete_send(&mut self, generation: u64, conversation_id: ConversationId) -> bool {
        if generation != self.generation {
            tracing::debug!(
                conversation = %conversation_id,
                "discarding send ack from a previous session"
            );
            return false;
        }
        self.sends.complete(conversation_id);
        self.emit(EngineUpdate::SendStateChanged {
            conversation_id,
            state: SendState::Succeeded,
        });
        true
    }

    /// Mark a send failed, if the session it began under is still current.
    /// The typed text stays preserved for a manual retry and the in-flight
    /// slot is released. Returns whether the transition applied.
    pub fn fail_send(
        &mut self,
        generation: u64,
        conversation_id: ConversationId,
        error: &ApiError,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(
                conversation = %conversation_id,
                "discarding send failure from a previous session"
            );
            return false;
        }
        let error = error.to_string();
        self.sends.fail(conversation_id, error.clone());
        let preserved_input = self
            .sends
            .preserved_input(conversation_id)
            .unwrap_or_default()
            .to_string();
        tracing::warn!(conversation = %conversation_id, %error, "send failed");
        self.emit(EngineUpdate::SendFailed {
            conversation_id,
            error,
            preserved_input,
        });
        true
    }

    // ========================================================================
    // Tone configuration
    // ========================================================================

    /// Apply an acknowledged tone change to the active conversation and the
    /// summary cache. Only messages sent after this point are affected;
    /// nothing already synchronized is rewritten.
    pub fn apply_tone(
        &mut self,
        conversation_id: ConversationId,
        tone: ToneSetting,
        custom_prompt: Option<String>,
    ) {
        self.cache
            .apply_tone(conversation_id, tone, custom_prompt.clone());
        if let Some(conversation) = self.selection.conversation_mut() {
            if conversation.id == conversation_id {
                conversation.my_tone = tone;
                conversation.my_custom_prompt = custom_prompt;
                let conversation = conversation.clone();
                tracing::info!(conversation = %conversation_id, tone = %tone, "tone updated");
                self.emit(EngineUpdate::ToneUpdated { conversation });
            }
        }
    }

    // ========================================================================
    // Poll commits
    // ========================================================================

    /// Commit a refreshed peer directory, if the session the fetch began
    /// under is still current. Returns `true` when the selected peer
    /// vanished from the directory and the selection was dropped; the
    /// caller must then cancel the conversation's poll task.
    pub fn commit_peers(&mut self, generation: u64, peers: Vec<Peer>) -> bool {
        if generation != self.generation {
            tracing::debug!("discarding directory refresh from a previous session");
            return false;
        }
        let dropped = self.selection.drop_missing_peer(&peers);
        self.cache.commit_peers(peers.clone());
        self.emit(EngineUpdate::PeersRefreshed { peers });
        if dropped {
            tracing::info!("selected peer left the directory; selection cleared");
            self.cache.clear_messages();
            self.emit(EngineUpdate::SelectionCleared {
                reason: ClearReason::PeerGone,
            });
        }
        dropped
    }

    /// Commit refreshed conversation summaries, if the session the fetch
    /// began under is still current, and re-project
    /// `last_message`/`unread_count` onto the active conversation.
    pub fn commit_summaries(&mut self, generation: u64, summaries: Vec<Conversation>) {
        if generation != self.generation {
            tracing::debug!("discarding summary refresh from a previous session");
            return;
        }
        self.cache.commit_summaries(summaries.clone());
        if let Some(conversation) = self.selection.conversation_mut() {
            let mut updated = conversation.clone();
            self.cache.project_summary_onto(&mut updated);
            *conversation = updated;
        }
        self.emit(EngineUpdate::SummariesRefreshed {
            conversations: summaries,
        });
    }

    /// Commit a refreshed message list if the session is still current and
    /// it belongs to the currently selected conversation; otherwise discard
    /// it. Returns whether the commit was applied.
    pub fn commit_messages(
        &mut self,
        generation: u64,
        conversation_id: ConversationId,
        messages: Vec<Message>,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(
                conversation = %conversation_id,
                "discarding message refresh from a previous session"
            );
            return false;
        }
        if self.selection.conversation_id() != Some(conversation_id) {
            tracing::debug!(
                conversation = %conversation_id,
                "discarding message refresh for deselected conversation"
            );
            return false;
        }
        let latest = self.cache.commit_messages(conversation_id, messages);
        let messages = self
            .cache
            .messages_for(conversation_id)
            .map(<[Message]>::to_vec)
            .unwrap_or_default();
        self.emit(EngineUpdate::MessagesRefreshed {
            conversation_id,
            messages,
            latest,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageId, PeerId};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn peer(name: &str) -> Peer {
        Peer::new(PeerId::new(), name)
    }

    fn conversation_with(peer: &Peer) -> Conversation {
        Conversation {
            id: ConversationId::new(),
            other_user: peer.clone(),
            last_message: None,
            unread_count: 0,
            my_tone: ToneSetting::Nicer,
            my_custom_prompt: None,
        }
    }

    fn message(is_mine: bool) -> Message {
        Message::new(
            MessageId::new(),
            PeerId::new(),
            "someone",
            Some("raw".to_string()),
            "cooked",
            Utc::now(),
            is_mine,
            false,
        )
    }

    fn ready_engine(peer: &Peer) -> (ChatEngine, Conversation) {
        let (mut engine, _rx) = ChatEngine::new();
        let SelectBegin::Started { epoch } = engine.begin_select(peer.clone()) else {
            panic!("expected a new transition");
        };
        let conv = conversation_with(peer);
        engine.complete_select(epoch, Ok(conv.clone())).unwrap();
        (engine, conv)
    }

    #[test]
    fn test_send_requires_active_conversation() {
        let (mut engine, _rx) = ChatEngine::new();
        let err = engine.begin_send("hello").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::NoActiveConversation)
        ));
    }

    #[test]
    fn test_send_rejects_blank_text() {
        let alice = peer("alice");
        let (mut engine, _) = ready_engine(&alice);
        let err = engine.begin_send("   \n").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyMessage)
        ));
    }

    #[test]
    fn test_send_trims_text() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);
        let (id, text) = engine.begin_send("  hello  ").unwrap();
        assert_eq!(id, conv.id);
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_stale_message_commit_discarded() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);

        // A poll response for some other conversation arrives late.
        let generation = engine.generation();
        let stale_id = ConversationId::new();
        assert!(!engine.commit_messages(generation, stale_id, vec![message(false)]));
        assert!(engine.active_messages().is_none());

        // The matching conversation commits fine.
        assert!(engine.commit_messages(generation, conv.id, vec![message(true)]));
        assert_eq!(engine.active_messages().unwrap().len(), 1);
    }

    #[test]
    fn test_peer_switch_discards_late_resolve() {
        let (mut engine, _rx) = ChatEngine::new();
        let alice = peer("alice");
        let bob = peer("bob");

        let SelectBegin::Started { epoch: alice_epoch } = engine.begin_select(alice.clone())
        else {
            panic!("expected a new transition");
        };
        let SelectBegin::Started { epoch: bob_epoch } = engine.begin_select(bob.clone()) else {
            panic!("expected a new transition");
        };

        // Alice's resolve lands after the switch: discarded.
        let outcome = engine
            .complete_select(alice_epoch, Ok(conversation_with(&alice)))
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::Discarded));
        assert_eq!(engine.selected_conversation_id(), None);

        // Bob's resolve lands: applied.
        let outcome = engine
            .complete_select(bob_epoch, Ok(conversation_with(&bob)))
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::Ready(_)));
        assert_eq!(
            engine.selected_conversation().unwrap().other_user.id,
            bob.id
        );
    }

    #[test]
    fn test_resolve_failure_keeps_peer_selected() {
        let (mut engine, _rx) = ChatEngine::new();
        let alice = peer("alice");

        let SelectBegin::Started { epoch } = engine.begin_select(alice) else {
            panic!("expected a new transition");
        };
        let err = engine
            .complete_select(epoch, Err(ApiError::Status { status: 500, message: String::new() }))
            .unwrap_err();
        assert!(matches!(err, ClientError::Resolve(_)));
        assert_eq!(engine.selection_state(), SelectionState::PeerSelected);
    }

    #[test]
    fn test_directory_loss_drops_selection() {
        let alice = peer("alice");
        let bob = peer("bob");
        let (mut engine, _conv) = ready_engine(&alice);

        let generation = engine.generation();
        assert!(engine.commit_peers(generation, vec![bob.clone()]));
        assert_eq!(engine.selection_state(), SelectionState::NoSelection);
        assert!(engine.active_messages().is_none());
        // The directory itself was still committed.
        assert_eq!(engine.peers(), vec![bob]);
    }

    #[test]
    fn test_tone_apply_is_optimistic_and_scoped() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);

        engine.apply_tone(conv.id, ToneSetting::Custom, Some("be a pirate".to_string()));
        let active = engine.selected_conversation().unwrap();
        assert_eq!(active.my_tone, ToneSetting::Custom);
        assert_eq!(active.my_custom_prompt.as_deref(), Some("be a pirate"));

        // A tone change for some other conversation leaves the active one alone.
        engine.apply_tone(ConversationId::new(), ToneSetting::Angry, None);
        assert_eq!(
            engine.selected_conversation().unwrap().my_tone,
            ToneSetting::Custom
        );
    }

    #[test]
    fn test_summary_commit_projects_onto_active_conversation() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);

        let mut summary = conv.clone();
        summary.unread_count = 4;
        let generation = engine.generation();
        engine.commit_summaries(generation, vec![summary]);

        assert_eq!(engine.selected_conversation().unwrap().unread_count, 4);
    }

    #[test]
    fn test_logout_clears_everything() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);
        let generation = engine.generation();
        engine.commit_peers(generation, vec![alice.clone()]);
        engine.commit_messages(generation, conv.id, vec![message(true)]);
        engine.begin_send("hi").unwrap();

        engine.logout();
        assert_eq!(engine.selection_state(), SelectionState::NoSelection);
        assert!(engine.peers().is_empty());
        assert!(engine.active_messages().is_none());
        assert_eq!(engine.send_state(conv.id), SendState::Idle);
    }

    #[test]
    fn test_update_stream_orders_send_transitions() {
        let alice = peer("alice");
        let (mut engine, _) = {
            // Keep the receiver this time.
            let (mut engine, rx) = ChatEngine::new();
            let SelectBegin::Started { epoch } = engine.begin_select(alice.clone()) else {
                panic!("expected a new transition");
            };
            engine
                .complete_select(epoch, Ok(conversation_with(&alice)))
                .unwrap();
            (engine, rx)
        };
        let conv_id = engine.selected_conversation_id().unwrap();

        let (id, _) = engine.begin_send("hello").unwrap();
        assert_eq!(engine.send_state(id), SendState::Submitting);
        engine.complete_send(engine.generation(), id);
        assert_eq!(engine.send_state(conv_id), SendState::Succeeded);
    }

    #[test]
    fn test_logout_discards_commits_from_previous_session() {
        let alice = peer("alice");
        let (mut engine, conv) = ready_engine(&alice);
        let generation = engine.generation();
        let (send_id, _) = engine.begin_send("hello").unwrap();

        engine.logout();

        // Results from work begun before the logout land afterwards.
        assert!(!engine.commit_peers(generation, vec![alice.clone()]));
        engine.commit_summaries(generation, vec![conversation_with(&alice)]);
        assert!(!engine.commit_messages(generation, conv.id, vec![message(true)]));
        assert!(!engine.complete_send(generation, send_id));

        assert!(engine.peers().is_empty());
        assert!(engine.summaries().is_empty());
        assert!(engine.active_messages().is_none());
        assert_eq!(engine.send_state(send_id), SendState::Idle);
    }
}
