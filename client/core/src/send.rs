//! Send Pipeline
//!
//! Per-conversation state machine for outbound messages:
//!
//! ```text
//! Idle ──begin──▶ Submitting ──ack──▶ Succeeded
//!                     │
//!                     └──error──▶ Failed (typed text preserved)
//! ```
//!
//! At most one send may be in flight per conversation; a second submission
//! while one is pending is rejected client-side, not queued. No optimistic
//! message is inserted into the synchronized list: the transformed content
//! is unknown until the server's AI step completes, so the consumer shows a
//! provisional placeholder off the `Submitting` state instead.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::types::ConversationId;

/// State of the send pipeline for one conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendState {
    /// Nothing in flight; sends are accepted
    #[default]
    Idle,
    /// A send is in flight; the composer is disabled and further sends
    /// are rejected
    Submitting,
    /// The last send was acknowledged; the composer clears
    Succeeded,
    /// The last send failed; the typed text is preserved for manual retry
    Failed {
        /// Error description for inline display
        error: String,
    },
}

impl SendState {
    /// Whether a new send is accepted in this state
    #[must_use]
    pub fn can_send(&self) -> bool {
        !matches!(self, Self::Submitting)
    }

    /// Whether a send is currently in flight
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }
}

#[derive(Debug, Default)]
struct SendSlot {
    state: SendState,
    /// The submitted text, kept so a failure can hand it back to the
    /// composer. Cleared on success.
    preserved_input: Option<String>,
}

/// Tracks send state independently per conversation
#[derive(Debug, Default)]
pub struct SendPipeline {
    slots: HashMap<ConversationId, SendSlot>,
}

impl SendPipeline {
    /// Create an empty pipeline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a conversation (`Idle` if it never sent)
    #[must_use]
    pub fn state(&self, conversation_id: ConversationId) -> SendState {
        self.slots
            .get(&conversation_id)
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    /// Begin a send. Rejects with [`ClientError::SendInFlight`] when one is
    /// already submitting for this conversation.
    pub fn begin(
        &mut self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<(), ClientError> {
        let slot = self.slots.entry(conversation_id).or_default();
        if slot.state.is_submitting() {
            return Err(ClientError::SendInFlight);
        }
        slot.state = SendState::Submitting;
        slot.preserved_input = Some(text.to_string());
        Ok(())
    }

    /// Mark the in-flight send acknowledged. Releases the in-flight slot
    /// and drops the preserved text (the composer clears).
    pub fn complete(&mut self, conversation_id: ConversationId) {
        let slot = self.slots.entry(conversation_id).or_default();
        slot.state = SendState::Succeeded;
        slot.preserved_input = None;
    }

    /// Mark the in-flight send failed. The preserved text stays available
    /// for a manual retry; the in-flight slot is released.
    pub fn fail(&mut self, conversation_id: ConversationId, error: impl Into<String>) {
        let slot = self.slots.entry(conversation_id).or_default();
        slot.state = SendState::Failed {
            error: error.into(),
        };
    }

    /// Text preserved from a failed send, if any
    #[must_use]
    pub fn preserved_input(&self, conversation_id: ConversationId) -> Option<&str> {
        self.slots
            .get(&conversation_id)
            .and_then(|s| s.preserved_input.as_deref())
    }

    /// Drop all send state (logout)
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_at_most_one_in_flight() {
        let mut pipeline = SendPipeline::new();
        let conv = ConversationId::new();

        pipeline.begin(conv, "first").unwrap();
        assert!(matches!(
            pipeline.begin(conv, "second"),
            Err(ClientError::SendInFlight)
        ));

        // Terminal state releases the slot.
        pipeline.complete(conv);
        assert!(pipeline.begin(conv, "third").is_ok());
    }

    #[test]
    fn test_in_flight_is_per_conversation() {
        let mut pipeline = SendPipeline::new();
        let a = ConversationId::new();
        let b = ConversationId::new();

        pipeline.begin(a, "to a").unwrap();
        assert!(pipeline.begin(b, "to b").is_ok());
    }

    #[test]
    fn test_failure_preserves_input_and_releases() {
        let mut pipeline = SendPipeline::new();
        let conv = ConversationId::new();

        pipeline.begin(conv, "hello there").unwrap();
        pipeline.fail(conv, "server exploded");

        assert_eq!(pipeline.preserved_input(conv), Some("hello there"));
        assert_eq!(
            pipeline.state(conv),
            SendState::Failed {
                error: "server exploded".to_string()
            }
        );
        // Manual retry is possible.
        assert!(pipeline.begin(conv, "hello there").is_ok());
    }

    #[test]
    fn test_success_clears_preserved_input() {
        let mut pipeline = SendPipeline::new();
        let conv = ConversationId::new();

        pipeline.begin(conv, "hello").unwrap();
        pipeline.complete(conv);
        assert_eq!(pipeline.preserved_input(conv), None);
        assert_eq!(pipeline.state(conv), SendState::Succeeded);
    }

    #[test]
    fn test_unknown_conversation_is_idle() {
        let pipeline = SendPipeline::new();
        assert_eq!(pipeline.state(ConversationId::new()), SendState::Idle);
        assert!(pipeline.state(ConversationId::new()).can_send());
    }
}
