//! Adaptive data rate decision engine
//!
//! Combines the link quality window, the margin estimate and the parameter
//! constraints into the next parameter set. Decisions are pure: the caller
//! owns the "current" parameters and decides when to apply a result.

use crate::adr::constraints::{ParameterConstraints, ParameterSet};
use crate::adr::history::LinkQualityHistory;
use crate::adr::margin::{MarginEstimate, MarginEstimator};
use crate::adr::AdrError;
use crate::config::{limits, AdrConfig};

/// Direction of a spreading factor change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Parameters left as they were
    Hold,
    /// Excess margin: lower SF, shorter airtime
    Faster,
    /// Insufficient margin: higher SF, more robust
    MoreRobust,
}

/// Result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub params: ParameterSet,
    pub adjustment: Adjustment,
    /// Present whenever the margin estimator ran successfully
    pub margin: Option<MarginEstimate>,
    /// Why the engine fell back to the input parameters, if it did
    pub fault: Option<AdrError>,
}

impl Decision {
    fn hold(params: ParameterSet, fault: Option<AdrError>) -> Self {
        Self {
            params,
            adjustment: Adjustment::Hold,
            margin: None,
            fault,
        }
    }

    /// True when the result differs from `current`
    pub fn is_change(&self, current: &ParameterSet) -> bool {
        self.params != *current
    }
}

/// Decision engine for one link
#[derive(Debug, Clone)]
pub struct AdrEngine {
    constraints: ParameterConstraints,
    estimator: MarginEstimator,
    min_samples: usize,
}

impl AdrEngine {
    pub fn new(config: &AdrConfig) -> Self {
        Self {
            constraints: ParameterConstraints::new(),
            estimator: MarginEstimator::from_config(config),
            min_samples: config.min_samples,
        }
    }

    pub fn constraints(&self) -> &ParameterConstraints {
        &self.constraints
    }

    /// Choose the next parameter set
    ///
    /// Returns `current` unchanged when adaptation is disabled, the window
    /// is too short, `current` is outside the hardware limits, or the margin
    /// computation produced a non-finite value.
    pub fn decide<const N: usize>(
        &self,
        history: &LinkQualityHistory<N>,
        current: &ParameterSet,
        velocity: f32,
        ack_enabled: bool,
    ) -> Decision {
        if !ack_enabled {
            return Decision::hold(*current, None);
        }

        if self.constraints.validate(current).is_err() {
            log::warn!(
                "ADR input outside limits (SF {}, BW {}, CR {}, TP {}), keeping current parameters",
                current.spreading_factor,
                current.bandwidth_hz,
                current.coding_rate,
                current.tx_power_dbm
            );
            return Decision::hold(*current, Some(AdrError::DecisionError));
        }

        if history.len() < self.min_samples {
            log::info!(
                "Insufficient history for ADR adjustment ({} of {} samples)",
                history.len(),
                self.min_samples
            );
            return Decision::hold(*current, Some(AdrError::InsufficientHistory));
        }

        let window = history.snapshot();
        let estimate = match self.estimator.estimate(&window, velocity) {
            Ok(estimate) => estimate,
            Err(e) => {
                log::warn!("ADR margin estimate failed, keeping current parameters");
                return Decision::hold(*current, Some(e));
            }
        };

        let sf = current.spreading_factor;
        let adjustment = if !self.closes_link(sf, &estimate) {
            if sf < limits::MAX_SPREADING_FACTOR {
                Adjustment::MoreRobust
            } else {
                Adjustment::Hold
            }
        } else if sf > limits::MIN_SPREADING_FACTOR && self.closes_link(sf - 1, &estimate) {
            Adjustment::Faster
        } else {
            Adjustment::Hold
        };

        let params = match adjustment {
            Adjustment::Hold => *current,
            Adjustment::Faster => {
                let power = if current.tx_power_dbm > self.constraints.min_tx_power() {
                    current.tx_power_dbm - limits::TX_POWER_STEP_DB
                } else {
                    current.tx_power_dbm
                };
                self.constraints.derive(sf - 1, power)
            }
            Adjustment::MoreRobust => {
                let power = if current.tx_power_dbm < self.constraints.max_tx_power() {
                    current.tx_power_dbm + limits::TX_POWER_STEP_DB
                } else {
                    current.tx_power_dbm
                };
                self.constraints.derive(sf + 1, power)
            }
        };

        if adjustment != Adjustment::Hold {
            log::info!(
                "ADR adjustment: SF {}->{}, BW {}->{}, CR {}->{}, TP {}->{} (margin {:.1} dB)",
                current.spreading_factor,
                params.spreading_factor,
                current.bandwidth_hz,
                params.bandwidth_hz,
                current.coding_rate,
                params.coding_rate,
                current.tx_power_dbm,
                params.tx_power_dbm,
                estimate.margin_db
            );
        }

        Decision {
            params,
            adjustment,
            margin: Some(estimate),
            fault: None,
        }
    }

    /// Whether `sf` still demodulates after the required margin is taken off
    fn closes_link(&self, sf: u8, estimate: &MarginEstimate) -> bool {
        let bandwidth = self.constraints.select_bandwidth_for_sf(sf);
        estimate.snr_required >= self.constraints.snr_floor(sf)
            && estimate.rssi_required >= self.constraints.sensitivity_dbm(sf, bandwidth)
    }
}

impl Default for AdrEngine {
    fn default() -> Self {
        Self::new(&AdrConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_from(samples: &[(f32, f32)]) -> LinkQualityHistory {
        let mut history = LinkQualityHistory::new();
        for &(snr, rssi) in samples {
            history.record_sample(snr, rssi).unwrap();
        }
        history
    }

    fn sf9() -> ParameterSet {
        ParameterSet::new(9, 5, 125_000, 13).unwrap()
    }

    #[test]
    fn test_ack_disabled_holds() {
        let engine = AdrEngine::default();
        let history = history_from(&[(10.0, -60.0); 10]);

        let decision = engine.decide(&history, &sf9(), 0.0, false);
        assert_eq!(decision.params, sf9());
        assert_eq!(decision.adjustment, Adjustment::Hold);
        assert_eq!(decision.fault, None);
    }

    #[test]
    fn test_insufficient_history_holds() {
        let engine = AdrEngine::default();

        for len in 0..5 {
            let history = history_from(&vec![(10.0, -60.0); len]);
            for velocity in [0.0, 2.5, 5.0, 12.0] {
                for ack in [true, false] {
                    let decision = engine.decide(&history, &sf9(), velocity, ack);
                    assert_eq!(decision.params, sf9());
                    assert!(!decision.is_change(&sf9()));
                }
            }

            let decision = engine.decide(&history, &sf9(), 1.0, true);
            assert_eq!(decision.fault, Some(AdrError::InsufficientHistory));
        }
    }

    #[test]
    fn test_strong_link_speeds_up_and_lowers_power() {
        let engine = AdrEngine::default();
        let history = history_from(&[(10.0, -60.0); 10]);

        let decision = engine.decide(&history, &sf9(), 0.0, true);
        assert_eq!(decision.adjustment, Adjustment::Faster);
        assert_eq!(decision.params.spreading_factor, 8);
        assert_eq!(decision.params.bandwidth_hz, 250_000);
        assert_eq!(decision.params.coding_rate, 5);
        assert_eq!(decision.params.tx_power_dbm, 10);
    }

    #[test]
    fn test_weak_link_slows_down_and_raises_power() {
        let engine = AdrEngine::default();
        let history = history_from(&[(-12.0, -125.0), (-14.0, -126.0), (-13.0, -125.5), (-12.5, -125.0), (-13.5, -126.0)]);

        let decision = engine.decide(&history, &sf9(), 1.0, true);
        assert_eq!(decision.adjustment, Adjustment::MoreRobust);
        assert_eq!(decision.params.spreading_factor, 10);
        assert_eq!(decision.params.bandwidth_hz, 125_000);
        assert_eq!(decision.params.coding_rate, 6);
        assert_eq!(decision.params.tx_power_dbm, 16);
    }

    #[test]
    fn test_boundaries_are_sticky() {
        let engine = AdrEngine::default();

        let weak = history_from(&[(-25.0, -135.0); 6]);
        let sf12 = ParameterSet::new(12, 8, 125_000, 20).unwrap();
        let decision = engine.decide(&weak, &sf12, 0.0, true);
        assert_eq!(decision.params, sf12);
        assert_eq!(decision.adjustment, Adjustment::Hold);

        let strong = history_from(&[(10.0, -50.0); 6]);
        let sf7 = ParameterSet::new(7, 5, 500_000, 2).unwrap();
        let decision = engine.decide(&strong, &sf7, 0.0, true);
        assert_eq!(decision.params, sf7);
    }

    #[test]
    fn test_power_never_leaves_limits() {
        let engine = AdrEngine::default();

        let strong = history_from(&[(10.0, -60.0); 6]);
        let low_power = ParameterSet::new(10, 6, 125_000, 3).unwrap();
        let decision = engine.decide(&strong, &low_power, 0.0, true);
        assert_eq!(decision.params.spreading_factor, 9);
        assert_eq!(decision.params.tx_power_dbm, 2);

        let weak = history_from(&[(-12.0, -126.0); 6]);
        let high_power = ParameterSet::new(9, 5, 125_000, 19).unwrap();
        let decision = engine.decide(&weak, &high_power, 0.0, true);
        assert_eq!(decision.params.spreading_factor, 10);
        assert_eq!(decision.params.tx_power_dbm, 20);
    }

    #[test]
    fn test_power_tracks_sf_direction() {
        let engine = AdrEngine::default();
        let windows: [&[(f32, f32)]; 4] = [
            &[(10.0, -60.0); 8],
            &[(-12.0, -126.0); 8],
            &[(8.0, -110.0), (-2.0, -111.0), (8.0, -109.0), (-2.0, -110.0), (8.0, -110.0)],
            &[(0.0, -100.0), (1.0, -101.0), (0.5, -99.0), (0.0, -100.0), (1.0, -100.0)],
        ];

        for samples in windows {
            let history = history_from(samples);
            for sf in 7..=12 {
                let current = ParameterConstraints::new().derive(sf, 11);
                for velocity in [0.0, 3.0, 8.0] {
                    let decision = engine.decide(&history, &current, velocity, true);
                    let new = decision.params;
                    if new.spreading_factor < current.spreading_factor {
                        assert!(new.tx_power_dbm <= current.tx_power_dbm);
                    }
                    if new.spreading_factor > current.spreading_factor {
                        assert!(new.tx_power_dbm >= current.tx_power_dbm);
                    }
                    assert!((7..=12).contains(&new.spreading_factor));
                }
            }
        }
    }

    #[test]
    fn test_oscillating_window_scenario() {
        let engine = AdrEngine::default();
        let mut history = LinkQualityHistory::<20>::new();
        for i in 0..10 {
            let snr = if i % 2 == 0 { 8.0 } else { -2.0 };
            let rssi = -110.0 + (i % 3) as f32 - 1.0;
            history.record_sample(snr, rssi).unwrap();
        }

        let current = sf9();
        let decision = engine.decide(&history, &current, 5.0, true);
        let new = decision.params;
        let estimate = decision.margin.expect("margin should be computed");

        assert!((7..=12).contains(&new.spreading_factor));
        let constraints = engine.constraints();
        assert_eq!(new.bandwidth_hz, constraints.select_bandwidth_for_sf(new.spreading_factor));
        assert_eq!(new.coding_rate, constraints.select_coding_rate_for_sf(new.spreading_factor));

        // Available margin at the current SF versus what the estimator requires
        let available = (estimate.snr_min - constraints.snr_floor(9)).min(
            estimate.rssi_min - constraints.sensitivity_dbm(9, 125_000),
        );
        let deficit = estimate.margin_db - available;
        if deficit > 0.0 {
            assert!(new.spreading_factor > 9);
        } else {
            assert!(new.spreading_factor <= 9);
        }
        if new.spreading_factor < 9 {
            assert!(deficit < 0.0);
        }
    }

    #[test]
    fn test_negative_velocity_is_decision_error() {
        let engine = AdrEngine::default();
        let history = history_from(&[(5.0, -90.0); 6]);

        let decision = engine.decide(&history, &sf9(), -3.0, true);
        assert_eq!(decision.params, sf9());
        assert_eq!(decision.fault, Some(AdrError::DecisionError));
    }

    #[test]
    fn test_out_of_range_current_holds() {
        let engine = AdrEngine::default();
        let weak = history_from(&[(-12.0, -126.0); 6]);
        let boosted = ParameterSet {
            spreading_factor: 9,
            coding_rate: 5,
            bandwidth_hz: 125_000,
            tx_power_dbm: 23,
        };

        let decision = engine.decide(&weak, &boosted, 0.0, true);
        assert_eq!(decision.params, boosted);
        assert_eq!(decision.adjustment, Adjustment::Hold);
        assert_eq!(decision.fault, Some(AdrError::DecisionError));

        // Same window from a legal set still raises SF without lowering power
        let legal = ParameterSet { tx_power_dbm: 20, ..boosted };
        let decision = engine.decide(&weak, &legal, 0.0, true);
        assert_eq!(decision.adjustment, Adjustment::MoreRobust);
        assert_eq!(decision.params.spreading_factor, 10);
        assert!(decision.params.tx_power_dbm >= legal.tx_power_dbm);
    }
}
