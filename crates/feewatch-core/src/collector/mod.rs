//! Collector module - basefee sampling
//!
//! The collector turns a snapshot of chain state into the payload the
//! decision engine consumes. Reading the chain is the job of a
//! [`MetricSource`]; collection itself never touches the network.

mod rpc;
mod source;

pub use rpc::RpcSource;
pub use source::{build_source, FixedSource};

use bytes::Bytes;
use tracing::trace;

use crate::codec;
use crate::error::Result;
use crate::models::{BlockContext, BlockSnapshot};

/// Encodes the basefee of the supplied state as one ABI word
#[derive(Debug, Clone, Copy, Default)]
pub struct BasefeeCollector;

impl BasefeeCollector {
    /// Collect the current sample
    pub fn collect(&self, state: &dyn BlockContext) -> Bytes {
        let base_fee = state.base_fee();
        trace!(block = state.block_number(), base_fee, "Collected basefee sample");
        codec::encode_uint(base_fee)
    }
}

/// Source of chain state snapshots for different backends
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    /// Take a snapshot of the latest block
    async fn snapshot(&self) -> Result<BlockSnapshot>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_is_deterministic() {
        let state = BlockSnapshot::new(19_000_000, 12_345_678_901);
        let first = BasefeeCollector.collect(&state);
        let second = BasefeeCollector.collect(&state);
        assert_eq!(first, second);
        assert_eq!(codec::decode_uint(&first).unwrap(), 12_345_678_901);
    }

    struct PendingBlock;

    impl BlockContext for PendingBlock {
        fn block_number(&self) -> u64 {
            u64::MAX
        }

        fn base_fee(&self) -> u64 {
            7
        }
    }

    #[test]
    fn test_collect_depends_only_on_basefee() {
        let pending = BasefeeCollector.collect(&PendingBlock);
        let mined = BasefeeCollector.collect(&BlockSnapshot::new(1, 7));
        assert_eq!(PendingBlock.block_number(), u64::MAX);
        assert_eq!(pending, mined);
    }

    #[test]
    fn test_collect_zero_basefee() {
        let state = BlockSnapshot::new(1, 0);
        let payload = BasefeeCollector.collect(&state);
        assert_eq!(payload.len(), codec::WORD);
        assert_eq!(codec::decode_uint(&payload).unwrap(), 0);
    }
}
