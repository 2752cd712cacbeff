//! Relay: turns payloads into observable alert events
//!
//! [`Relay::broadcast`] is the only entry point and it never filters.
//! A [`RelayDispatcher`] subscribes to the relay and forwards each event to
//! the configured sinks.

mod dispatcher;
mod emitter;
mod sinks;

pub use dispatcher::{DeliveryResult, DispatcherHandle, RelayDispatcher};
pub use emitter::Relay;
pub use sinks::{build_sink, AlertSink, LogSink, RedisSink, WebhookSink};
