//! # Undertone Core
//!
//! Client core for a two-party messaging service whose outbound messages
//! are rewritten server-side by an AI tone transformation before delivery.
//! This crate owns everything between the rendering surface and the REST
//! backend: the peer directory, conversation resolution, per-conversation
//! tone configuration, message synchronization, the send pipeline, and the
//! selection state machine.
//!
//! ## Architecture
//!
//! - [`ChatEngine`] is the single-writer state core. All of its methods are
//!   synchronous; it is never locked across an await.
//! - [`ChatClient`] is the async facade: it begins an operation under the
//!   engine lock, performs the network call unlocked, and commits the
//!   result under the lock again. Epoch and conversation-id guards inside
//!   the engine discard results whose context is no longer current.
//! - [`ChatApi`] is the seam to the backend; [`HttpChatApi`] implements it
//!   over REST, tests substitute mocks.
//! - Surfaces consume [`EngineUpdate`]s from an unbounded channel and
//!   render what they are told.
//!
//! ## Freshness model
//!
//! All data arrives by polling on fixed cadences (directory slow,
//! summaries medium, active messages fast). Commits replace caches
//! wholesale; a failed tick keeps the last-known-good data. Nothing in
//! this crate pushes.
//!
//! ## Example
//!
//! ```no_run
//! use undertone_core::{ChatClient, ClientConfig, HttpChatApi};
//!
//! # async fn run() -> Result<(), undertone_core::ClientError> {
//! let config = ClientConfig::from_env();
//! let api = HttpChatApi::new(&config, "bearer-credential");
//! let (client, mut updates) = ChatClient::new(api, config);
//! client.start();
//!
//! while let Some(update) = updates.recv().await {
//!     // render
//!     let _ = update;
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod poll;
pub mod selection;
pub mod send;
pub mod sync;
pub mod types;
pub mod updates;

pub use api::{ChatApi, HttpChatApi};
pub use client::ChatClient;
pub use config::ClientConfig;
pub use engine::{ChatEngine, ResolveOutcome};
pub use error::{ApiError, ClientError, ValidationError};
pub use poll::{PollPurpose, PollerSet};
pub use selection::{SelectBegin, Selection, SelectionState};
pub use send::{SendPipeline, SendState};
pub use sync::SyncCache;
pub use types::{
    Conversation, ConversationId, LastMessage, Message, MessageId, Peer, PeerId, SendAck,
    ToneSetting,
};
pub use updates::{ClearReason, EngineUpdate};
