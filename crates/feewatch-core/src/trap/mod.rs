//! Trap interface: collect a sample, decide whether to respond
//!
//! A trap is evaluated once per step by the scheduler. Both operations are
//! pure, so independent hosts evaluating the same inputs agree on the result.

mod volatility;

pub use volatility::{percent_change, VolatilityTrap, INSUFFICIENT_DATA, PREVIOUS_ZERO};

use bytes::Bytes;

use crate::error::Result;
use crate::models::{BlockContext, Decision};

/// Combined collect/decide interface invoked by the scheduler
pub trait Trap: Send + Sync {
    /// Encode the monitored metric from the supplied chain state
    fn collect(&self, state: &dyn BlockContext) -> Bytes;

    /// Decide from previously collected payloads, newest first
    fn should_respond(&self, history: &[Bytes]) -> Result<Decision>;
}
