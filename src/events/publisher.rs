use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Outbound channel used by the audit sink in external-bus mode
pub trait ChannelPublisher: Send + Sync + std::fmt::Debug {
    /// Publish a serialized payload on the named channel
    fn publish(&self, channel: &str, payload: String) -> Result<(), PublishError>;
}

/// In-process broadcast bus for audit traffic
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<BusMessage>,
}

/// Message that has been published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl BroadcastBus {
    /// Create a new bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages on every channel
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChannelPublisher for BroadcastBus {
    fn publish(&self, channel: &str, payload: String) -> Result<(), PublishError> {
        let message = BusMessage {
            channel: channel.to_string(),
            payload,
            published_at: chrono::Utc::now(),
        };

        // A record nobody receives is lost, so the caller must fall back
        self.sender
            .send(message)
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers {
                channel: channel.to_string(),
            })
    }
}

/// Error types for publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("No subscribers on channel '{channel}'")]
    NoSubscribers { channel: String },
    #[error("Channel '{channel}' is unavailable: {reason}")]
    Unavailable { channel: String, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1000) // Default capacity of 1000 messages
    }
}
