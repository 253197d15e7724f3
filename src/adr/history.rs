//! Rolling window of per-packet link quality samples

use crate::adr::AdrError;
use crate::config::adr::HISTORY_CAPACITY;
use heapless::{Deque, Vec};

/// Link quality of one received packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSample {
    /// Signal-to-Noise Ratio in dB
    pub snr: f32,
    /// Received Signal Strength Indicator in dBm
    pub rssi: f32,
}

/// Summary statistics over one metric of the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
}

/// Fixed-capacity FIFO of recent samples
///
/// Insertion order is the only ordering; once `N` samples are held the
/// oldest one is evicted on every insert.
#[derive(Debug, Clone)]
pub struct LinkQualityHistory<const N: usize = HISTORY_CAPACITY> {
    samples: Deque<LinkSample, N>,
}

impl<const N: usize> LinkQualityHistory<N> {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            samples: Deque::new(),
        }
    }

    /// Append a sample, evicting the oldest when full
    ///
    /// Non-finite metrics are rejected and leave the window untouched.
    pub fn record_sample(&mut self, snr: f32, rssi: f32) -> Result<(), AdrError> {
        if !snr.is_finite() || !rssi.is_finite() {
            log::warn!("Rejected link sample (SNR: {}, RSSI: {})", snr, rssi);
            return Err(AdrError::InvalidSample);
        }

        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was freed above if the deque was full
        let _ = self.samples.push_back(LinkSample { snr, rssi });
        Ok(())
    }

    /// Current samples, oldest first
    pub fn snapshot(&self) -> Vec<LinkSample, N> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<LinkSample> {
        self.samples.back().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn snr_stats(&self) -> Option<MetricStats> {
        Self::stats(self.samples.iter().map(|s| s.snr))
    }

    pub fn rssi_stats(&self) -> Option<MetricStats> {
        Self::stats(self.samples.iter().map(|s| s.rssi))
    }

    fn stats(values: impl Iterator<Item = f32>) -> Option<MetricStats> {
        let mut sorted: Vec<f32, N> = values.collect();
        if sorted.is_empty() {
            return None;
        }
        // Samples are finite, so partial_cmp never fails
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f32>() / count as f32;
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(MetricStats {
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
        })
    }
}

impl<const N: usize> Default for LinkQualityHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}
