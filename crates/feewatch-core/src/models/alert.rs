//! Alert event models

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;

/// Canonical name of the event the relay emits
pub const DEFAULT_EVENT_NAME: &str = "BasefeeAlert";

/// One relay emission; carries the payload exactly as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    /// Opaque payload
    pub data: Bytes,
}

impl AlertEvent {
    /// Create an event for a payload
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

/// JSON envelope used when an event leaves the process (webhook, Redis, SSE)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEnvelope {
    /// Event name
    pub event: String,

    /// Payload as `0x` hex
    pub data: String,

    /// Payload decoded as an ABI string, when it is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// When the envelope was built
    pub emitted_at: DateTime<Utc>,
}

impl AlertEnvelope {
    /// Wrap an event for delivery
    pub fn new(event_name: &str, event: &AlertEvent) -> Self {
        Self {
            event: event_name.to_string(),
            data: codec::to_hex(&event.data),
            reason: codec::decode_string(&event.data).ok(),
            emitted_at: Utc::now(),
        }
    }
}
