//! Relay sinks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use reqwest::Client;
use tracing::info;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::models::AlertEnvelope;

/// Destination for relayed alert events
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name for logs and delivery results
    fn name(&self) -> &str;

    /// Deliver one event
    async fn deliver(&self, envelope: &AlertEnvelope) -> Result<()>;
}

/// Build the sink described by configuration
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn AlertSink>> {
    match config {
        SinkConfig::Log => Ok(Arc::new(LogSink)),
        SinkConfig::Webhook { url, headers } => {
            Ok(Arc::new(WebhookSink::new(url, headers.clone())?))
        }
        SinkConfig::Redis { url, channel } => Ok(Arc::new(RedisSink::new(url, channel)?)),
    }
}

/// Writes each event as a structured log record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, envelope: &AlertEnvelope) -> Result<()> {
        info!(
            target: "feewatch::alert",
            event = %envelope.event,
            data = %envelope.data,
            reason = envelope.reason.as_deref().unwrap_or(""),
            "Alert"
        );
        Ok(())
    }
}

/// POSTs the event envelope as JSON
pub struct WebhookSink {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookSink {
    /// Create a webhook sink
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            url: url.into(),
            headers,
        })
    }
}

#[async_trait::async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, envelope: &AlertEnvelope) -> Result<()> {
        let mut request = self.client.post(&self.url).json(envelope);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::relay(format!("webhook request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::relay(format!("Webhook returned {status}: {body}")));
        }

        info!(url = %self.url, "Webhook alert delivered");
        Ok(())
    }
}

/// PUBLISHes the event envelope on a Redis channel
pub struct RedisSink {
    pool: Pool,
    channel: String,
}

impl RedisSink {
    /// Create a Redis sink; connections are opened lazily
    pub fn new(url: &str, channel: impl Into<String>) -> Result<Self> {
        let pool = RedisPoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Redis(e.to_string()))?;

        Ok(Self {
            pool,
            channel: channel.into(),
        })
    }
}

#[async_trait::async_trait]
impl AlertSink for RedisSink {
    fn name(&self) -> &str {
        "redis"
    }

    async fn deliver(&self, envelope: &AlertEnvelope) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))?;
        let message = serde_json::to_string(envelope)?;

        let receivers: i64 = conn
            .publish(&self.channel, &message)
            .await
            .map_err(|e| Error::Redis(e.to_string()))?;

        info!(channel = %self.channel, receivers, "Redis alert published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertEvent, DEFAULT_EVENT_NAME};
    use bytes::Bytes;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope() -> AlertEnvelope {
        let event = AlertEvent::new(Bytes::from_static(&[0xab, 0xcd]));
        AlertEnvelope::new(DEFAULT_EVENT_NAME, &event)
    }

    #[tokio::test]
    async fn test_webhook_posts_envelope_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "event": "BasefeeAlert",
                "data": "0xabcd"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let headers = HashMap::from([("x-api-key".to_string(), "secret".to_string())]);
        let sink = WebhookSink::new(format!("{}/hook", server.uri()), headers).unwrap();
        sink.deliver(&envelope()).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri(), HashMap::new()).unwrap();
        let err = sink.deliver(&envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Relay(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        assert!(LogSink.deliver(&envelope()).await.is_ok());
    }

    #[tokio::test]
    async fn test_build_sinks() {
        assert_eq!(build_sink(&SinkConfig::Log).unwrap().name(), "log");
        let redis = build_sink(&SinkConfig::Redis {
            url: "redis://127.0.0.1:6379".to_string(),
            channel: "alerts".to_string(),
        })
        .unwrap();
        assert_eq!(redis.name(), "redis");
    }
}
