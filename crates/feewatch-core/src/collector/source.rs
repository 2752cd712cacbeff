//! Metric source construction and the fixed-value source

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Error, Result};
use crate::models::{BlockSnapshot, Sample};

use super::rpc::RpcSource;
use super::MetricSource;

/// Source that reports a basefee set by the host
///
/// Block numbers advance by one on every snapshot.
#[derive(Debug)]
pub struct FixedSource {
    base_fee: AtomicU64,
    next_block: AtomicU64,
}

impl FixedSource {
    /// Create a source reporting `base_fee`
    pub fn new(base_fee: Sample) -> Self {
        Self {
            base_fee: AtomicU64::new(base_fee),
            next_block: AtomicU64::new(1),
        }
    }

    /// Change the value reported by later snapshots
    pub fn set(&self, base_fee: Sample) {
        self.base_fee.store(base_fee, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MetricSource for FixedSource {
    async fn snapshot(&self) -> Result<BlockSnapshot> {
        let number = self.next_block.fetch_add(1, Ordering::SeqCst);
        Ok(BlockSnapshot::new(number, self.base_fee.load(Ordering::SeqCst)))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Build the metric source selected in configuration
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn MetricSource>> {
    match config.kind {
        SourceKind::Fixed => {
            let base_fee = config
                .base_fee
                .ok_or_else(|| Error::config("source.base_fee is required for a fixed source"))?;
            info!(base_fee, "Using fixed metric source");
            Ok(Arc::new(FixedSource::new(base_fee)))
        }
        SourceKind::Rpc => {
            info!(url = %config.url, "Using JSON-RPC metric source");
            Ok(Arc::new(RpcSource::new(&config.url, config.timeout)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source_advances_blocks() {
        let source = FixedSource::new(100);
        let first = source.snapshot().await.unwrap();
        source.set(103);
        let second = source.snapshot().await.unwrap();

        assert_eq!((first.number, first.base_fee), (1, 100));
        assert_eq!((second.number, second.base_fee), (2, 103));
    }

    #[tokio::test]
    async fn test_build_fixed_source() {
        let config = SourceConfig {
            kind: SourceKind::Fixed,
            base_fee: Some(7),
            ..Default::default()
        };
        let source = build_source(&config).unwrap();
        assert_eq!(source.name(), "fixed");
        assert_eq!(source.snapshot().await.unwrap().base_fee, 7);
    }

    #[test]
    fn test_build_default_source_is_rpc() {
        let source = build_source(&SourceConfig::default()).unwrap();
        assert_eq!(source.name(), "rpc");
    }

    #[test]
    fn test_build_fixed_source_without_base_fee() {
        let config = SourceConfig {
            kind: SourceKind::Fixed,
            ..Default::default()
        };
        assert!(matches!(build_source(&config), Err(Error::Config(_))));
    }
}
