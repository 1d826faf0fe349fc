//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    256
}

/// Configuration for opening a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Locator of the broker endpoint, e.g. `ws://127.0.0.1:10000`
    pub locator: String,

    /// How long to wait for a broker acknowledgement before a
    /// correlated request fails with `RequestTimeout`
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Default capacity for subscriber/query reply channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl SessionConfig {
    /// Creates a configuration with default timeouts and capacities
    pub fn new(locator: impl Into<String>) -> Self {
        SessionConfig {
            locator: locator.into(),
            request_timeout_ms: default_request_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
