//! # feewatch
//!
//! Basefee volatility trap.
//!
//! Every step the scheduler collects the current basefee, asks the trap
//! whether the change since the previous sample crosses the configured
//! threshold, and relays the decision's reason as an alert event when it
//! does.
//!
//! ## Architecture
//!
//! - **Collector**: encodes the basefee of a chain snapshot as one ABI word
//! - **Trap**: pure decision over the two most recent payloads
//! - **Relay**: emits every payload it receives as an alert event
//! - **Scheduler**: owns the sample history and drives the three per step
//! - **API**: HTTP access to the same operations plus an event stream
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch a node, alert on a 3% move
//! FEEWATCH__SOURCE__URL=http://localhost:8545 feewatch serve
//!
//! # Evaluate two samples offline
//! feewatch check 103 100
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod scheduler;
pub mod trap;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::collector::{BasefeeCollector, MetricSource};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::relay::{Relay, RelayDispatcher};
    pub use crate::scheduler::Scheduler;
    pub use crate::trap::{Trap, VolatilityTrap};
}
