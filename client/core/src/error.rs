//! Error Taxonomy
//!
//! Three layers, matching how failures are handled rather than where they
//! occur:
//!
//! - [`ValidationError`]: rejected client-side before any network request.
//! - [`ApiError`]: transport/protocol failures from the chat backend.
//! - [`ClientError`]: what engine operations surface to the caller.
//!
//! Transient poll failures never appear here at all: the sync layer logs
//! them and keeps last-known-good state for the next tick. No error in
//! this crate is fatal to the process.

use thiserror::Error;

/// Precondition failures caught before any network call is issued
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Send text was empty after trimming
    #[error("message text is empty")]
    EmptyMessage,

    /// `custom` tone selected without a non-empty prompt
    #[error("custom tone requires a non-empty prompt")]
    MissingCustomPrompt,

    /// Operation requires an active conversation and none is selected
    #[error("no active conversation")]
    NoActiveConversation,
}

/// Failures talking to the chat backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connection, timeout, body decode)
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, best effort
        message: String,
    },

    /// The bearer credential was rejected. Reported upward for the auth
    /// collaborator; this core does not refresh credentials.
    #[error("bearer credential rejected")]
    Unauthorized,
}

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any network request
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A send for this conversation is already in flight; the attempt was
    /// rejected, not queued
    #[error("a send is already in flight for this conversation")]
    SendInFlight,

    /// Conversation get-or-create failed; selection stays at PeerSelected
    /// so re-selecting the peer retries
    #[error("failed to resolve conversation: {0}")]
    Resolve(#[source] ApiError),

    /// Send failed; the typed text is preserved for a manual retry
    #[error("failed to send message: {0}")]
    Send(#[source] ApiError),

    /// Tone update failed; the previous tone stays active
    #[error("failed to update tone: {0}")]
    Tone(#[source] ApiError),
}

impl ClientError {
    /// Whether this was rejected client-side without a network call
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SendInFlight)
    }
}
