//! Engine Updates
//!
//! Notifications from the engine to whatever surface consumes it. The
//! surface renders what it is told and holds no business logic of its own:
//! the engine decides what changed, the surface decides how to draw it.

use serde::{Deserialize, Serialize};

use crate::send::SendState;
use crate::types::{Conversation, ConversationId, Message, MessageId, Peer};

/// State-change notifications emitted by the engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EngineUpdate {
    /// The directory list was refreshed
    PeersRefreshed {
        /// Current directory, ordered as the server returned it
        peers: Vec<Peer>,
    },

    /// The conversation-summary list was refreshed
    SummariesRefreshed {
        /// All conversations with `last_message`/`unread_count`
        conversations: Vec<Conversation>,
    },

    /// A peer was selected; any previous conversation is already cleared
    PeerSelected {
        /// The newly selected peer
        peer: Peer,
    },

    /// The selected peer's conversation is resolved and active
    ConversationReady {
        /// The resolved conversation
        conversation: Conversation,
    },

    /// Conversation get-or-create failed; selection stays at PeerSelected
    ResolveFailed {
        /// The peer whose conversation could not be resolved
        peer: Peer,
        /// Error description
        error: String,
    },

    /// The active conversation's message list was replaced wholesale
    MessagesRefreshed {
        /// Which conversation the list belongs to
        conversation_id: ConversationId,
        /// Full list, ascending by timestamp
        messages: Vec<Message>,
        /// Newest message, for scroll re-anchoring
        latest: Option<MessageId>,
    },

    /// A send transitioned state (`Submitting` shows the placeholder and
    /// disables the composer; `Succeeded` clears it)
    SendStateChanged {
        /// Which conversation the send belongs to
        conversation_id: ConversationId,
        /// New pipeline state
        state: SendState,
    },

    /// A send failed; surfaced inline, never retried automatically
    SendFailed {
        /// Which conversation the send belonged to
        conversation_id: ConversationId,
        /// Error description
        error: String,
        /// The typed text, preserved so the user can retry
        preserved_input: String,
    },

    /// The active conversation's tone setting changed
    ToneUpdated {
        /// Conversation carrying the new `my_tone`/`my_custom_prompt`
        conversation: Conversation,
    },

    /// Selection was forced back to NoSelection
    SelectionCleared {
        /// Why the selection was dropped
        reason: ClearReason,
    },
}

/// Why a selection was forcibly cleared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearReason {
    /// The user logged out
    Logout,
    /// The directory no longer lists the selected peer
    PeerGone,
}
