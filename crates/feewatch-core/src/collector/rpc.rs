//! JSON-RPC metric source

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::BlockSnapshot;

use super::MetricSource;

/// Reads the latest block header from an Ethereum JSON-RPC endpoint
pub struct RpcSource {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl RpcSource {
    /// Create a source for `url`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl MetricSource for RpcSource {
    async fn snapshot(&self) -> Result<BlockSnapshot> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_getBlockByNumber",
            params: ("latest", false),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::metric_source(format!("request to {} failed: {e}", self.url)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::metric_source(format!(
                "RPC returned {status}: {body}"
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::metric_source(format!("invalid RPC response: {e}")))?;

        if let Some(err) = body.error {
            return Err(Error::metric_source(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        let header = body
            .result
            .ok_or_else(|| Error::metric_source("RPC returned no block"))?;
        let number = parse_quantity("number", &header.number)?;
        let base_fee = header
            .base_fee_per_gas
            .as_deref()
            .ok_or_else(|| Error::metric_source("block has no baseFeePerGas (pre-London chain?)"))
            .and_then(|raw| parse_quantity("baseFeePerGas", raw))?;

        debug!(block = number, base_fee, "Fetched block header");

        Ok(BlockSnapshot::new(number, base_fee))
    }

    fn name(&self) -> &str {
        "rpc"
    }
}

/// Parse a JSON-RPC hex quantity such as `0x1a`
fn parse_quantity(field: &str, raw: &str) -> Result<u64> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| Error::metric_source(format!("{field} '{raw}' is not 0x-prefixed")))?;
    if digits.is_empty() {
        return Err(Error::metric_source(format!("{field} is empty")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::metric_source(format!("{field} '{raw}' is invalid: {e}")))
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'static str, bool),
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<BlockHeader>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHeader {
    number: String,
    base_fee_per_gas: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> RpcSource {
        RpcSource::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("n", "0x0").unwrap(), 0);
        assert_eq!(parse_quantity("n", "0x3b9aca00").unwrap(), 1_000_000_000);
        assert!(parse_quantity("n", "3b9aca00").is_err());
        assert!(parse_quantity("n", "0x").is_err());
        assert!(parse_quantity("n", "0xzz").is_err());
    }

    #[tokio::test]
    async fn test_snapshot_reads_latest_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getBlockByNumber",
                "params": ["latest", false]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": { "number": "0x10", "baseFeePerGas": "0x3b9aca00", "hash": "0xabc" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = source_for(&server).await.snapshot().await.unwrap();
        assert_eq!(snapshot.number, 16);
        assert_eq!(snapshot.base_fee, 1_000_000_000);
    }

    #[tokio::test]
    async fn test_snapshot_surfaces_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "header not found" }
            })))
            .mount(&server)
            .await;

        let err = source_for(&server).await.snapshot().await.unwrap_err();
        assert!(matches!(err, Error::Source(_)));
        assert!(err.to_string().contains("header not found"));
    }

    #[tokio::test]
    async fn test_snapshot_requires_basefee() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": { "number": "0x1" }
            })))
            .mount(&server)
            .await;

        let err = source_for(&server).await.snapshot().await.unwrap_err();
        assert!(err.to_string().contains("baseFeePerGas"));
    }

    #[tokio::test]
    async fn test_snapshot_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = source_for(&server).await.snapshot().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
