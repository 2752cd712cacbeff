//! Sample and ambient chain state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A collected metric value (the block basefee, in wei)
pub type Sample = u64;

/// Read-only view of the chain state a collector samples from
pub trait BlockContext {
    /// Number of the block this state belongs to
    fn block_number(&self) -> u64;

    /// Basefee of that block, in wei
    fn base_fee(&self) -> Sample;
}

/// Point-in-time snapshot of chain state, produced by a metric source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    /// Block number
    pub number: u64,

    /// Basefee in wei
    pub base_fee: Sample,

    /// When the snapshot was taken
    pub observed_at: DateTime<Utc>,
}

impl BlockSnapshot {
    /// Create a snapshot observed now
    pub fn new(number: u64, base_fee: Sample) -> Self {
        Self {
            number,
            base_fee,
            observed_at: Utc::now(),
        }
    }
}

impl BlockContext for BlockSnapshot {
    fn block_number(&self) -> u64 {
        self.number
    }

    fn base_fee(&self) -> Sample {
        self.base_fee
    }
}
