//! In-process alert event emitter

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::RelayConfig;
use crate::models::AlertEvent;

/// Emits one [`AlertEvent`] per [`Relay::broadcast`] call to every subscriber
///
/// Cloning a relay yields another handle to the same channel.
#[derive(Clone)]
pub struct Relay {
    tx: broadcast::Sender<AlertEvent>,
    event_name: Arc<str>,
}

impl Relay {
    /// Create a relay buffering `capacity` events per subscriber
    pub fn new(event_name: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            event_name: Arc::from(event_name),
        }
    }

    /// Create a relay from configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(&config.event_name, config.channel_capacity)
    }

    /// Emit `payload` as an alert event
    ///
    /// No validation, deduplication or access control is applied; the event
    /// is emitted even when nobody is subscribed.
    pub fn broadcast(&self, payload: Bytes) -> AlertEvent {
        let event = AlertEvent::new(payload);
        // Err only means there are no subscribers right now
        let receivers = self.tx.send(event.clone()).unwrap_or(0);

        metrics::counter!("feewatch_relay_events_total").increment(1);
        info!(
            event = %self.event_name,
            bytes = event.data.len(),
            receivers,
            "Alert event emitted"
        );

        event
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }

    /// Name attached to emitted events
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
