//! Cascade configuration.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Default bound on each remote recompute call.
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 3_000;

/// Configuration for the cascade orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Deadline for each remote recompute call, in milliseconds
    pub remote_timeout_ms: u64,
    /// Deadline for delivering a notification, in milliseconds
    pub notify_timeout_ms: u64,
    /// Whether to publish change events at all
    pub notify: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            notify_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            notify: true,
        }
    }
}

impl CascadeConfig {
    /// Remote recompute deadline.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Notification deadline.
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Set the remote recompute deadline.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
