//! Step scheduler
//!
//! The scheduler is the host side of the trap: it owns the sample history,
//! runs collect/decide once per interval, and hands positive decisions to
//! the relay. The trap itself never sees more than the slice it is given.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::collector::MetricSource;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::models::{AlertEvent, Decision, Sample, SampleHistory};
use crate::relay::Relay;
use crate::trap::Trap;

/// What one step observed and did
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Block the sample was taken from
    pub block: u64,
    /// Collected sample
    pub sample: Sample,
    /// Decision over the current history
    pub decision: Decision,
    /// Event emitted by the relay, if the decision triggered
    pub event: Option<AlertEvent>,
}

/// Read-only view of scheduler progress
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    /// Completed steps
    pub steps: u64,
    /// Steps that emitted an alert
    pub alerts: u64,
    /// Steps that failed
    pub errors: u64,
    /// Payloads currently held
    pub history_len: usize,
    /// Block of the latest sample
    pub last_block: Option<u64>,
    /// Latest sample
    pub last_sample: Option<Sample>,
    /// Whether the latest decision triggered
    pub last_triggered: Option<bool>,
    /// Latest decision reason
    pub last_reason: Option<String>,
    /// Latest error message
    pub last_error: Option<String>,
    /// When the latest step finished
    pub last_step_at: Option<DateTime<Utc>>,
}

/// Shortest interval the ticker accepts
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives collect → decide → relay once per interval
pub struct Scheduler {
    trap: Arc<dyn Trap>,
    source: Arc<dyn MetricSource>,
    relay: Relay,
    history: SampleHistory,
    interval: Duration,
    status: Arc<RwLock<SchedulerStatus>>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn new(
        config: &SchedulerConfig,
        trap: Arc<dyn Trap>,
        source: Arc<dyn MetricSource>,
        relay: Relay,
    ) -> Self {
        if config.interval < MIN_INTERVAL {
            warn!(
                interval = ?config.interval,
                min = ?MIN_INTERVAL,
                "Scheduler interval too short, clamping"
            );
        }

        Self {
            trap,
            source,
            relay,
            history: SampleHistory::new(config.history_capacity),
            interval: config.interval.max(MIN_INTERVAL),
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
        }
    }

    /// Time between steps
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Shared handle to the status the scheduler publishes
    pub fn status(&self) -> Arc<RwLock<SchedulerStatus>> {
        self.status.clone()
    }

    /// Run one step
    ///
    /// On a source failure the history is left untouched.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        let result = self.try_step().await;

        let mut status = self.status.write();
        status.history_len = self.history.len();
        status.last_step_at = Some(Utc::now());
        match &result {
            Ok(outcome) => {
                status.steps += 1;
                status.last_block = Some(outcome.block);
                status.last_sample = Some(outcome.sample);
                status.last_triggered = Some(outcome.decision.triggered);
                status.last_reason = outcome.decision.reason_text().ok();
                if outcome.event.is_some() {
                    status.alerts += 1;
                }
            }
            Err(e) => {
                status.errors += 1;
                status.last_error = Some(e.to_string());
                metrics::counter!("feewatch_step_errors_total").increment(1);
            }
        }

        result
    }

    async fn try_step(&mut self) -> Result<StepOutcome> {
        let snapshot = self.source.snapshot().await?;
        let payload = self.trap.collect(&snapshot);
        self.history.push(payload);

        let decision = self.trap.should_respond(self.history.newest_first())?;

        metrics::counter!("feewatch_steps_total").increment(1);
        metrics::gauge!("feewatch_last_sample").set(snapshot.base_fee as f64);

        let event = if decision.triggered {
            metrics::counter!("feewatch_alerts_total").increment(1);
            info!(
                block = snapshot.number,
                base_fee = snapshot.base_fee,
                "Trap triggered, relaying decision"
            );
            Some(self.relay.broadcast(decision.reason.clone()))
        } else {
            debug!(
                block = snapshot.number,
                base_fee = snapshot.base_fee,
                "Trap held"
            );
            None
        };

        Ok(StepOutcome {
            block: snapshot.number,
            sample: snapshot.base_fee,
            decision,
            event,
        })
    }

    /// Step every interval until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            interval = ?self.interval,
            source = self.source.name(),
            history_capacity = self.history.capacity(),
            "Scheduler started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.step().await {
                        if e.is_decode() {
                            error!(error = %e, "Malformed sample payload, decision aborted");
                        } else {
                            warn!(error = %e, "Step failed");
                        }
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
