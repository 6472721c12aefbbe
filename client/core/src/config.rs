//! Client Configuration
//!
//! Poll cadences and backend location. Values load from the environment
//! with sensible defaults; there is no config file for this crate.
//!
//! # Environment Variables
//!
//! - `UNDERTONE_SERVER_URL`: chat backend base URL (default `http://localhost:8000`)
//! - `UNDERTONE_PEER_POLL_SECS`: directory poll interval (default 30)
//! - `UNDERTONE_SUMMARY_POLL_SECS`: conversation-summary poll interval (default 5)
//! - `UNDERTONE_MESSAGE_POLL_SECS`: active-conversation message poll interval (default 2)

use std::time::Duration;

/// Configuration for the chat client engine
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the chat backend
    pub server_url: String,
    /// Directory (peer list) poll interval. Always enabled.
    pub peer_poll_interval: Duration,
    /// Conversation-summary poll interval, independent of which
    /// conversation is open
    pub summary_poll_interval: Duration,
    /// Message-list poll interval while a conversation is active
    pub message_poll_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            peer_poll_interval: Duration::from_secs(30),
            summary_poll_interval: Duration::from_secs(5),
            message_poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment, falling back to defaults
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("UNDERTONE_SERVER_URL") {
            if !url.is_empty() {
                config.server_url = url;
            }
        }
        config.peer_poll_interval = env_secs("UNDERTONE_PEER_POLL_SECS", config.peer_poll_interval);
        config.summary_poll_interval =
            env_secs("UNDERTONE_SUMMARY_POLL_SECS", config.summary_poll_interval);
        config.message_poll_interval =
            env_secs("UNDERTONE_MESSAGE_POLL_SECS", config.message_poll_interval);

        config
    }

    /// Set the backend base URL
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the directory poll interval
    #[must_use]
    pub fn with_peer_poll_interval(mut self, interval: Duration) -> Self {
        self.peer_poll_interval = interval;
        self
    }

    /// Set the conversation-summary poll interval
    #[must_use]
    pub fn with_summary_poll_interval(mut self, interval: Duration) -> Self {
        self.summary_poll_interval = interval;
        self
    }

    /// Set the message poll interval
    #[must_use]
    pub fn with_message_poll_interval(mut self, interval: Duration) -> Self {
        self.message_poll_interval = interval;
        self
    }

    /// Set the per-request HTTP timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create a config suitable for testing (short intervals)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            server_url: "http://localhost:0".to_string(),
            peer_poll_interval: Duration::from_millis(20),
            summary_poll_interval: Duration::from_millis(10),
            message_poll_interval: Duration::from_millis(5),
            request_timeout: Duration::from_millis(250),
        }
    }
}

fn env_secs(name: &str, fallback: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(fallback, Duration::from_secs)
}
