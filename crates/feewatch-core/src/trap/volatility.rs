//! Basefee volatility decision engine

use bytes::Bytes;
use tracing::debug;

use crate::codec;
use crate::collector::BasefeeCollector;
use crate::config::TrapConfig;
use crate::error::{Error, Result};
use crate::models::{BlockContext, Comparator, Decision, Sample};

use super::Trap;

/// Reason returned when fewer than two samples are available
pub const INSUFFICIENT_DATA: &str = "Insufficient data";

/// Reason returned when the previous sample is zero
pub const PREVIOUS_ZERO: &str = "Previous value is zero";

/// Relative change of `current` against `previous`, in whole percent
///
/// Truncates toward zero. `None` when `previous` is zero.
pub fn percent_change(current: Sample, previous: Sample) -> Option<u128> {
    if previous == 0 {
        return None;
    }
    let delta = u128::from(current.abs_diff(previous));
    Some(delta * 100 / u128::from(previous))
}

/// Triggers when two consecutive basefee samples differ by at least the
/// configured percentage
#[derive(Debug, Clone)]
pub struct VolatilityTrap {
    collector: BasefeeCollector,
    threshold_percent: u32,
    comparator: Comparator,
}

impl VolatilityTrap {
    /// Create a trap with an explicit threshold and comparator
    ///
    /// A zero threshold is rejected: with `gte` it would report every
    /// unchanged pair as a spike.
    pub fn new(threshold_percent: u32, comparator: Comparator) -> Result<Self> {
        if threshold_percent == 0 {
            return Err(Error::config("threshold_percent must be at least 1"));
        }
        Ok(Self {
            collector: BasefeeCollector,
            threshold_percent,
            comparator,
        })
    }

    /// Create a trap from configuration
    pub fn from_config(config: &TrapConfig) -> Result<Self> {
        Self::new(config.threshold_percent, config.comparator)
    }

    /// Threshold in whole percent
    pub fn threshold_percent(&self) -> u32 {
        self.threshold_percent
    }

    /// Comparator applied to the threshold
    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    /// Decide on two already decoded samples
    pub fn evaluate(&self, current: Sample, previous: Sample) -> Decision {
        if previous == 0 {
            return Decision::hold(PREVIOUS_ZERO);
        }

        // delta / previous <op> threshold / 100, cross-multiplied so that
        // integer division never rounds a breach away
        let delta = u128::from(current.abs_diff(previous));
        let scaled_change = delta * 100;
        let scaled_threshold = u128::from(self.threshold_percent) * u128::from(previous);
        let triggered = self.comparator.holds(scaled_change, scaled_threshold);

        let percent = percent_change(current, previous).unwrap_or_default();
        let detail = format!(
            "{previous} -> {current} wei ({percent}% change, threshold {} {}%)",
            self.comparator, self.threshold_percent
        );

        if triggered {
            Decision::trigger(&format!("Basefee spike: {detail}"))
        } else {
            Decision::hold(&format!("Basefee stable: {detail}"))
        }
    }
}

impl Default for VolatilityTrap {
    fn default() -> Self {
        let config = TrapConfig::default();
        Self {
            collector: BasefeeCollector,
            threshold_percent: config.threshold_percent,
            comparator: config.comparator,
        }
    }
}

impl Trap for VolatilityTrap {
    fn collect(&self, state: &dyn BlockContext) -> Bytes {
        self.collector.collect(state)
    }

    fn should_respond(&self, history: &[Bytes]) -> Result<Decision> {
        let [newest, previous, ..] = history else {
            return Ok(Decision::hold(INSUFFICIENT_DATA));
        };

        let current = codec::decode_uint(newest)?;
        let previous = codec::decode_uint(previous)?;
        let decision = self.evaluate(current, previous);

        debug!(
            current,
            previous,
            threshold = self.threshold_percent,
            comparator = %self.comparator,
            triggered = decision.triggered,
            "Evaluated basefee samples"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_uint;
    use crate::models::BlockSnapshot;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn history(values: &[u64]) -> Vec<Bytes> {
        values.iter().copied().map(encode_uint).collect()
    }

    fn reason(decision: &Decision) -> String {
        decision.reason_text().unwrap()
    }

    #[test]
    fn test_empty_history_is_insufficient() {
        let trap = VolatilityTrap::default();
        let decision = trap.should_respond(&[]).unwrap();
        assert!(!decision.triggered);
        assert_eq!(reason(&decision), INSUFFICIENT_DATA);
    }

    #[test]
    fn test_single_sample_is_insufficient() {
        let trap = VolatilityTrap::default();
        let decision = trap.should_respond(&history(&[1_000])).unwrap();
        assert!(!decision.triggered);
        assert_eq!(reason(&decision), INSUFFICIENT_DATA);
    }

    #[test]
    fn test_previous_zero() {
        let trap = VolatilityTrap::default();
        let decision = trap.should_respond(&history(&[500, 0])).unwrap();
        assert!(!decision.triggered);
        assert_eq!(reason(&decision), PREVIOUS_ZERO);
    }

    #[rstest]
    #[case(100, 100, false, 0)]
    #[case(103, 100, true, 3)]
    #[case(102, 100, false, 2)]
    #[case(97, 100, true, 3)]
    fn test_calibration_at_three_percent_inclusive(
        #[case] current: u64,
        #[case] previous: u64,
        #[case] expected: bool,
        #[case] percent: u128,
    ) {
        let trap = VolatilityTrap::new(3, Comparator::Gte).unwrap();
        let decision = trap.should_respond(&history(&[current, previous])).unwrap();
        assert_eq!(decision.triggered, expected);
        assert_eq!(percent_change(current, previous), Some(percent));
        assert!(reason(&decision).contains(&format!("({percent}% change")));
    }

    #[test]
    fn test_strict_comparator_excludes_threshold() {
        let trap = VolatilityTrap::new(3, Comparator::Gt).unwrap();
        assert!(!trap.should_respond(&history(&[103, 100])).unwrap().triggered);
        assert!(trap.should_respond(&history(&[104, 100])).unwrap().triggered);
    }

    #[test]
    fn test_strict_comparator_sees_fractional_excess() {
        // 3.5% floors to 3, which a truncating check would hold at "> 3"
        let trap = VolatilityTrap::new(3, Comparator::Gt).unwrap();
        let decision = trap.should_respond(&history(&[1_035, 1_000])).unwrap();
        assert!(decision.triggered);
        assert_eq!(percent_change(1_035, 1_000), Some(3));
    }

    #[test]
    fn test_swapping_samples_is_not_symmetric() {
        let trap = VolatilityTrap::new(3, Comparator::Gte).unwrap();

        // newest 100, previous 103: 3/103 = 2.91% -> 2
        assert_eq!(percent_change(100, 103), Some(2));
        let falling = trap.should_respond(&history(&[100, 103])).unwrap();
        assert!(!falling.triggered);

        // newest 103, previous 100: 3/100 = 3%
        assert_eq!(percent_change(103, 100), Some(3));
        let rising = trap.should_respond(&history(&[103, 100])).unwrap();
        assert!(rising.triggered);
    }

    #[test]
    fn test_ignores_samples_beyond_second() {
        let trap = VolatilityTrap::default();
        let short = trap.should_respond(&history(&[100, 100])).unwrap();
        let long = trap.should_respond(&history(&[100, 100, 1, 0, 9_999])).unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn test_ignores_malformed_samples_beyond_second() {
        let trap = VolatilityTrap::default();
        let mut payloads = history(&[103, 100]);
        payloads.push(Bytes::from_static(b"garbage"));
        assert!(trap.should_respond(&payloads).unwrap().triggered);
    }

    #[test]
    fn test_malformed_payload_fails_loudly() {
        let trap = VolatilityTrap::default();
        let payloads = vec![Bytes::from_static(&[0u8; 7]), encode_uint(100)];
        let err = trap.should_respond(&payloads).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_trigger_reason_text() {
        let trap = VolatilityTrap::new(2, Comparator::Gte).unwrap();
        let decision = trap.should_respond(&history(&[30_000_000_000, 25_000_000_000])).unwrap();
        assert!(decision.triggered);
        assert_eq!(
            reason(&decision),
            "Basefee spike: 25000000000 -> 30000000000 wei (20% change, threshold >= 2%)"
        );
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let trap = VolatilityTrap::new(u32::MAX, Comparator::Gte).unwrap();
        let decision = trap.should_respond(&history(&[u64::MAX, 1])).unwrap();
        assert_eq!(percent_change(u64::MAX, 1), Some(u128::from(u64::MAX - 1) * 100));
        assert!(decision.triggered);
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        for comparator in [Comparator::Gt, Comparator::Gte] {
            let err = VolatilityTrap::new(0, comparator).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }
        let config = TrapConfig {
            threshold_percent: 0,
            ..Default::default()
        };
        assert!(VolatilityTrap::from_config(&config).is_err());
    }

    #[test]
    fn test_default_matches_config_default() {
        let trap = VolatilityTrap::default();
        let configured = VolatilityTrap::from_config(&TrapConfig::default()).unwrap();
        assert_eq!(trap.threshold_percent(), configured.threshold_percent());
        assert_eq!(trap.comparator(), configured.comparator());
    }

    #[test]
    fn test_collect_matches_collector() {
        let trap = VolatilityTrap::default();
        let state = BlockSnapshot::new(42, 7_000_000_000);
        assert_eq!(trap.collect(&state), BasefeeCollector.collect(&state));
    }

    proptest! {
        #[test]
        fn prop_previous_zero_never_triggers(current in any::<u64>(), threshold in 1u32..1_000) {
            let trap = VolatilityTrap::new(threshold, Comparator::Gte).unwrap();
            let decision = trap.should_respond(&history(&[current, 0])).unwrap();
            prop_assert!(!decision.triggered);
            prop_assert_eq!(decision.reason_text().unwrap(), PREVIOUS_ZERO);
        }

        #[test]
        fn prop_inclusive_matches_floored_percent(
            current in any::<u64>(),
            previous in 1u64..,
            threshold in 1u32..1_000,
        ) {
            // For an integer threshold, floor(x) >= t iff x >= t
            let trap = VolatilityTrap::new(threshold, Comparator::Gte).unwrap();
            let decision = trap.should_respond(&history(&[current, previous])).unwrap();
            let percent = percent_change(current, previous).unwrap();
            prop_assert_eq!(decision.triggered, percent >= u128::from(threshold));
        }

        #[test]
        fn prop_deterministic(current in any::<u64>(), previous in any::<u64>()) {
            let trap = VolatilityTrap::default();
            let payloads = history(&[current, previous]);
            prop_assert_eq!(
                trap.should_respond(&payloads).unwrap(),
                trap.should_respond(&payloads).unwrap()
            );
        }
    }
}
