//! Required link margin from channel variance and node velocity
//!
//! The margin is a single closed-form evaluation clamped to a ceiling.
//! There is no iteration: nothing in the expression depends on a previous
//! margin value, so repeated evaluation cannot converge to anything else.

use crate::adr::history::LinkSample;
use crate::adr::AdrError;
use crate::config::{adr, AdrConfig};

/// Output of one margin estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginEstimate {
    /// Required SNR/RSSI headroom in dB, within `[0, ceiling]`
    pub margin_db: f32,
    /// Estimated maximum link distance, in units of the reference distance
    pub max_distance: f32,
    /// Averaging window after velocity shrinkage (always >= 1)
    pub effective_samples: u32,
    pub snr_min: f32,
    pub snr_max: f32,
    pub rssi_min: f32,
    /// Lowest SNR the link must still close at: `snr_min - margin_db`
    pub snr_required: f32,
    /// Lowest RSSI the link must still close at: `rssi_min - margin_db`
    pub rssi_required: f32,
}

/// Stateless margin calculator
#[derive(Debug, Clone, PartialEq)]
pub struct MarginEstimator {
    reference_distance: f32,
    min_sensitivity_dbm: f32,
    ceiling_db: f32,
}

impl MarginEstimator {
    pub fn new(reference_distance: f32, min_sensitivity_dbm: f32, ceiling_db: f32) -> Self {
        Self {
            reference_distance,
            min_sensitivity_dbm,
            ceiling_db,
        }
    }

    pub fn from_config(config: &AdrConfig) -> Self {
        Self::new(
            config.reference_distance,
            config.min_sensitivity_dbm,
            config.margin_ceiling_db,
        )
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// Averaging window for a node moving at `velocity`
    ///
    /// Faster nodes see the channel decorrelate sooner, so fewer samples
    /// are representative. Never below one.
    pub fn effective_samples(velocity: f32) -> u32 {
        let m = adr::BASE_EFFECTIVE_SAMPLES * (1.0 - velocity / adr::VELOCITY_SCALE);
        m.round().max(1.0) as u32
    }

    /// Estimate the margin over a sample window
    ///
    /// The caller guarantees the minimum window size; an empty window or
    /// any non-finite intermediate is reported as `DecisionError`.
    pub fn estimate(&self, window: &[LinkSample], velocity: f32) -> Result<MarginEstimate, AdrError> {
        if window.is_empty() || !velocity.is_finite() || velocity < 0.0 {
            return Err(AdrError::DecisionError);
        }

        let effective_samples = Self::effective_samples(velocity);

        let mut snr_min = f32::INFINITY;
        let mut snr_max = f32::NEG_INFINITY;
        let mut rssi_min = f32::INFINITY;
        for sample in window {
            snr_min = snr_min.min(sample.snr);
            snr_max = snr_max.max(sample.snr);
            rssi_min = rssi_min.min(sample.rssi);
        }

        let d0 = self.reference_distance;
        let max_distance = d0
            * 10f32.powf((rssi_min - self.min_sensitivity_dbm) / (10.0 * effective_samples as f32));

        let raw_margin = (1.0 / 3.0)
            * ((d0 / max_distance) * 10.0
                + ((snr_max - snr_min) / 5.0) * 10.0
                + (velocity / adr::VELOCITY_SCALE) * 10.0);
        let margin_db = raw_margin.clamp(0.0, self.ceiling_db);

        let estimate = MarginEstimate {
            margin_db,
            max_distance,
            effective_samples,
            snr_min,
            snr_max,
            rssi_min,
            snr_required: snr_min - margin_db,
            rssi_required: rssi_min - margin_db,
        };

        if !estimate.is_finite() {
            return Err(AdrError::DecisionError);
        }
        Ok(estimate)
    }
}

impl MarginEstimate {
    fn is_finite(&self) -> bool {
        self.margin_db.is_finite()
            && self.max_distance.is_finite()
            && self.snr_required.is_finite()
            && self.rssi_required.is_finite()
    }
}

impl Default for MarginEstimator {
    fn default() -> Self {
        Self::from_config(&AdrConfig::default())
    }
}
