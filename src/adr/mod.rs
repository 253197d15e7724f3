//! Adaptive data rate: link history, constraints, margin and decisions

pub mod constraints;
pub mod engine;
pub mod history;
pub mod margin;

pub use constraints::{ParameterConstraints, ParameterSet};
pub use engine::{AdrEngine, Adjustment, Decision};
pub use history::{LinkQualityHistory, LinkSample, MetricStats};
pub use margin::{MarginEstimate, MarginEstimator};

/// Conditions the ADR components absorb with a safe fallback
///
/// None of these end a mission; each one leaves the previous parameters
/// in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdrError {
    /// Non-finite SNR or RSSI offered to the history
    #[error("non-finite link quality sample")]
    InvalidSample,
    /// Too few samples to make a decision
    #[error("insufficient link quality history")]
    InsufficientHistory,
    /// Numeric anomaly while computing margin or decision
    #[error("numeric anomaly in margin or decision computation")]
    DecisionError,
}
