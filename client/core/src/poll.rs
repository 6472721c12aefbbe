//! Poll Task Registry
//!
//! Bookkeeping for the background polling loops. Each loop is a spawned
//! tokio task owned here under a purpose key; registering a new task for a
//! key aborts the previous one, so at most one poller runs per purpose (and
//! per conversation, for message polls). Aborting a poller only stops
//! future ticks; any commit already past the engine lock stands.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use crate::types::ConversationId;

/// What a polling loop refreshes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PollPurpose {
    /// Peer directory (slow cadence)
    Peers,
    /// Conversation summaries (medium cadence)
    Summaries,
    /// Active conversation's messages (fast cadence)
    Messages,
}

type PollKey = (PollPurpose, Option<ConversationId>);

/// Owns the background polling tasks
#[derive(Debug, Default)]
pub struct PollerSet {
    tasks: HashMap<PollKey, JoinHandle<()>>,
}

impl PollerSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a polling task. Any previous task under the same key is
    /// aborted first.
    pub fn register(
        &mut self,
        purpose: PollPurpose,
        conversation: Option<ConversationId>,
        handle: JoinHandle<()>,
    ) {
        if let Some(previous) = self.tasks.insert((purpose, conversation), handle) {
            previous.abort();
        }
    }

    /// Abort every task with the given purpose, regardless of conversation
    pub fn cancel_purpose(&mut self, purpose: PollPurpose) {
        self.tasks.retain(|(p, _), handle| {
            if *p == purpose {
                handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Number of live registrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort everything
    pub fn shutdown(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for PollerSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}
