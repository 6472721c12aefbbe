//! Selection State Machine
//!
//! Owns "which peer / which conversation is active" and guarantees the two
//! are never stale-paired: changing the peer synchronously clears the
//! conversation, and every async result that wants to attach a
//! conversation must present the epoch it was started under.
//!
//! ```text
//! NoSelection ──select──▶ PeerSelected ──resolve ok──▶ ConversationReady
//!      ▲                      │  ▲                          │
//!      │                      │  └──resolve failed──────────┘ (retry by
//!      └──logout / peer gone──┴──────────────────────────────  re-select)
//! ```
//!
//! The epoch is a monotonic counter bumped on every peer change and on
//! every clear. A resolve result carrying an older epoch is discarded on
//! arrival: the network call itself may be unabortable, but its effect is.

use crate::types::{Conversation, ConversationId, Peer};

/// Observable states of the selection machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionState {
    /// Nothing selected; message polling is suspended
    NoSelection,
    /// A peer is selected, its conversation not yet resolved
    PeerSelected,
    /// Peer and conversation are active; message polling runs
    ConversationReady,
}

/// Outcome of beginning a peer selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectBegin {
    /// A new selection transition started; resolve under this epoch
    Started {
        /// Epoch to present when committing the resolve result
        epoch: u64,
    },
    /// The peer is already active (resolved or resolving); no-op, and no
    /// second resolve call may be issued
    AlreadyCurrent,
}

/// Transient, client-only selection state
#[derive(Debug, Default)]
pub struct Selection {
    peer: Option<Peer>,
    conversation: Option<Conversation>,
    /// Bumped on every peer change and clear; stale async results are
    /// detected by comparing against it.
    epoch: u64,
    /// A resolve is in flight for the current epoch. Guards rapid
    /// re-selection from issuing duplicate get-or-create calls.
    resolving: bool,
}

impl Selection {
    /// Create an empty selection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current machine state
    #[must_use]
    pub fn state(&self) -> SelectionState {
        match (&self.peer, &self.conversation) {
            (None, _) => SelectionState::NoSelection,
            (Some(_), None) => SelectionState::PeerSelected,
            (Some(_), Some(_)) => SelectionState::ConversationReady,
        }
    }

    /// The selected peer, if any
    #[must_use]
    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    /// The active conversation, if resolved
    #[must_use]
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// The active conversation, mutable (engine-internal)
    pub(crate) fn conversation_mut(&mut self) -> Option<&mut Conversation> {
        self.conversation.as_mut()
    }

    /// The active conversation id, if resolved
    #[must_use]
    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation.as_ref().map(|c| c.id)
    }

    /// Current epoch
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Begin selecting a peer.
    ///
    /// Selecting a different peer clears the conversation in the same call
    /// (atomic pairing invariant) and bumps the epoch so in-flight results
    /// for the previous peer are discarded on arrival. Re-selecting the
    /// active peer is a no-op unless its resolve previously failed, in
    /// which case this starts a retry.
    pub fn begin_select(&mut self, peer: Peer) -> SelectBegin {
        if self.peer.as_ref().map(|p| p.id) == Some(peer.id) {
            if self.conversation.is_some() || self.resolving {
                return SelectBegin::AlreadyCurrent;
            }
            // Same peer, resolve previously failed: retry under the same
            // epoch. Nothing in flight to invalidate.
            self.resolving = true;
            return SelectBegin::Started { epoch: self.epoch };
        }

        self.peer = Some(peer);
        self.conversation = None;
        self.epoch += 1;
        self.resolving = true;
        SelectBegin::Started { epoch: self.epoch }
    }

    /// Commit a resolved conversation, if it is still current.
    ///
    /// Returns `false` (and changes nothing) when the epoch is stale or the
    /// conversation does not belong to the selected peer.
    pub fn attach_conversation(&mut self, epoch: u64, conversation: Conversation) -> bool {
        if epoch != self.epoch {
            return false;
        }
        let Some(peer) = &self.peer else {
            return false;
        };
        if peer.id != conversation.other_user.id {
            return false;
        }
        self.conversation = Some(conversation);
        self.resolving = false;
        true
    }

    /// Record that the resolve under `epoch` failed. Selection stays at
    /// `PeerSelected`; re-selecting the peer retries.
    pub fn resolve_failed(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.resolving = false;
        }
    }

    /// Drop everything (logout). Bumps the epoch so any in-flight result
    /// is discarded on arrival.
    pub fn clear(&mut self) {
        self.peer = None;
        self.conversation = None;
        self.resolving = false;
        self.epoch += 1;
    }

    /// Force `NoSelection` if the directory no longer lists the selected
    /// peer. Returns `true` when the selection was dropped.
    pub fn drop_missing_peer(&mut self, peers: &[Peer]) -> bool {
        let Some(selected) = &self.peer else {
            return false;
        };
        if peers.iter().any(|p| p.id == selected.id) {
            return false;
        }
        self.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PeerId, ToneSetting};

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

    #[test]
    fn test_initial_state() {
        let selection = Selection::new();
        assert_eq!(selection.state(), SelectionState::NoSelection);
        assert!(selection.conversation_id().is_none());
    }

    #[test]
    fn test_select_then_attach() {
        let mut selection = Selection::new();
        let alice = peer("alice");

        let SelectBegin::Started { epoch } = selection.begin_select(alice.clone()) else {
            panic!("expected a new transition");
        };
        assert_eq!(selection.state(), SelectionState::PeerSelected);

        let conv = conversation_with(&alice);
        assert!(selection.attach_conversation(epoch, conv.clone()));
        assert_eq!(selection.state(), SelectionState::ConversationReady);
        assert_eq!(selection.conversation_id(), Some(conv.id));
    }

    #[test]
    fn test_reselect_active_peer_is_noop() {
        let mut selection = Selection::new();
        let alice = peer("alice");

        let SelectBegin::Started { epoch } = selection.begin_select(alice.clone()) else {
            panic!("expected a new transition");
        };
        // Rapid re-selection while the resolve is in flight: no second call.
        assert_eq!(selection.begin_select(alice.clone()), SelectBegin::AlreadyCurrent);

        selection.attach_conversation(epoch, conversation_with(&alice));
        // Re-selection when ready: still a no-op.
        assert_eq!(selection.begin_select(alice), SelectBegin::AlreadyCurrent);
    }

    #[test]
    fn test_reselect_retries_after_failed_resolve() {
        let mut selection = Selection::new();
        let alice = peer("alice");

        let SelectBegin::Started { epoch } = selection.begin_select(alice.clone()) else {
            panic!("expected a new transition");
        };
        selection.resolve_failed(epoch);
        assert_eq!(selection.state(), SelectionState::PeerSelected);

        // Selection did not advance, so re-selecting retries.
        assert!(matches!(
            selection.begin_select(alice),
            SelectBegin::Started { .. }
        ));
    }

    #[test]
    fn test_peer_switch_clears_conversation_and_discards_stale() {
        let mut selection = Selection::new();
        let alice = peer("alice");
        let bob = peer("bob");

        let SelectBegin::Started { epoch: alice_epoch } = selection.begin_select(alice.clone())
        else {
            panic!("expected a new transition");
        };

        // Switch to bob before alice's resolve lands.
        let SelectBegin::Started { epoch: bob_epoch } = selection.begin_select(bob.clone()) else {
            panic!("expected a new transition");
        };
        assert_eq!(selection.state(), SelectionState::PeerSelected);
        assert!(selection.conversation().is_none());

        // Alice's late result must not populate bob's slot.
        assert!(!selection.attach_conversation(alice_epoch, conversation_with(&alice)));
        assert!(selection.conversation().is_none());

        assert!(selection.attach_conversation(bob_epoch, conversation_with(&bob)));
        assert_eq!(selection.conversation().unwrap().other_user.id, bob.id);
    }

    #[test]
    fn test_attach_rejects_wrong_peer_pairing() {
        let mut selection = Selection::new();
        let alice = peer("alice");
        let bob = peer("bob");

        let SelectBegin::Started { epoch } = selection.begin_select(alice) else {
            panic!("expected a new transition");
        };
        // Same epoch but a conversation belonging to a different peer.
        assert!(!selection.attach_conversation(epoch, conversation_with(&bob)));
    }

    #[test]
    fn test_drop_missing_peer() {
        let mut selection = Selection::new();
        let alice = peer("alice");
        let bob = peer("bob");

        let SelectBegin::Started { epoch } = selection.begin_select(alice.clone()) else {
            panic!("expected a new transition");
        };
        selection.attach_conversation(epoch, conversation_with(&alice));

        // Directory still lists alice: nothing happens.
        assert!(!selection.drop_missing_peer(&[alice.clone(), bob.clone()]));
        assert_eq!(selection.state(), SelectionState::ConversationReady);

        // Directory lost alice: forced back to NoSelection.
        assert!(selection.drop_missing_peer(&[bob]));
        assert_eq!(selection.state(), SelectionState::NoSelection);
    }

    #[test]
    fn test_clear_invalidates_inflight_resolve() {
        let mut selection = Selection::new();
        let alice = peer("alice");

        let SelectBegin::Started { epoch } = selection.begin_select(alice.clone()) else {
            panic!("expected a new transition");
        };
        selection.clear();
        assert!(!selection.attach_conversation(epoch, conversation_with(&alice)));
        assert_eq!(selection.state(), SelectionState::NoSelection);
    }
}
