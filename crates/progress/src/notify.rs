//! Best-effort change notification.
//!
//! Sinks report failures, but the orchestrator only logs them: a notification
//! can never fail the operation that produced it.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bookwork_core::ChangeEvent;
use reqwest::{Client, ClientBuilder};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A failed notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Receiver rejected the event
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// One or more sinks of a fan-out failed
    #[error("{failed} of {total} sinks failed: {first}")]
    Partial {
        /// Sinks that failed
        failed: usize,
        /// Sinks tried
        total: usize,
        /// First failure message
        first: String,
    },
}

/// Destination for change events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one event.
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
}

/// Discards events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn publish(&self, _event: &ChangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        info!(
            kind = event.kind.as_str(),
            booking = %event.booking_id,
            milestone_progress = ?event.milestone_progress,
            booking_progress = ?event.booking_progress,
            "Progress changed"
        );
        Ok(())
    }
}

/// Broadcasts events to in-process subscribers.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChannelSink {
    /// Create a channel holding up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        // No subscribers is not a failure.
        if self.sender.send(event.clone()).is_err() {
            debug!("No subscribers for {} event", event.kind.as_str());
        }
        Ok(())
    }
}

/// POSTs events as JSON to a webhook.
#[derive(Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    /// Create a sink posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Publishes to every inner sink; one failing sink does not stop the others.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                errors.push(e.to_string());
            }
        }

        match errors.first() {
            None => Ok(()),
            Some(first) => Err(NotifyError::Partial {
                failed: errors.len(),
                total: self.sinks.len(),
                first: first.clone(),
            }),
        }
    }
}
