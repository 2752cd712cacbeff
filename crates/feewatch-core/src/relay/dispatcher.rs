//! Forwards relay events to sinks

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::models::{AlertEnvelope, AlertEvent};

use super::sinks::{build_sink, AlertSink};

/// Result of delivering one event to one sink
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Sink name
    pub sink: String,
    /// Whether delivery succeeded
    pub success: bool,
    /// Error message if it failed
    pub error: Option<String>,
    /// When delivery finished
    pub delivered_at: DateTime<Utc>,
}

/// Delivers relay events to every configured sink
pub struct RelayDispatcher {
    event_name: String,
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl RelayDispatcher {
    /// Create a dispatcher over explicit sinks
    pub fn new(event_name: impl Into<String>, sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self {
            event_name: event_name.into(),
            sinks,
        }
    }

    /// Create a dispatcher from configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let sinks = config
            .sinks
            .iter()
            .map(build_sink)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(config.event_name.clone(), sinks))
    }

    /// Deliver one event to all sinks; a failing sink does not stop the others
    pub async fn deliver(&self, event: &AlertEvent) -> Vec<DeliveryResult> {
        let envelope = AlertEnvelope::new(&self.event_name, event);
        let mut results = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let outcome = sink.deliver(&envelope).await;
            if let Err(e) = &outcome {
                warn!(sink = sink.name(), error = %e, "Alert delivery failed");
            }

            results.push(DeliveryResult {
                sink: sink.name().to_string(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
                delivered_at: Utc::now(),
            });
        }

        results
    }

    /// Forward events from `rx` until every relay handle is dropped
    pub async fn run(self, mut rx: broadcast::Receiver<AlertEvent>) {
        info!(sinks = self.sinks.len(), "Relay dispatcher started");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let results = self.deliver(&event).await;
                    debug!(
                        delivered = results.iter().filter(|r| r.success).count(),
                        failed = results.iter().filter(|r| !r.success).count(),
                        "Alert event dispatched"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Relay dispatcher lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("Relay dispatcher stopped");
    }

    /// Run on a background task
    pub fn spawn(self, rx: broadcast::Receiver<AlertEvent>) -> DispatcherHandle {
        DispatcherHandle {
            task: tokio::spawn(self.run(rx)),
        }
    }
}

/// Handle to a dispatcher running on a background task
pub struct DispatcherHandle {
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Wait for the dispatcher to deliver what is queued and stop
    ///
    /// The dispatcher only stops once every `Relay` handle is dropped, so
    /// callers drop theirs first. If `grace` elapses the task is aborted and
    /// `false` is returned.
    pub async fn drain(mut self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Relay dispatcher task failed");
                false
            }
            Err(_) => {
                warn!(?grace, "Relay dispatcher still busy, aborting");
                self.task.abort();
                false
            }
        }
    }
}
