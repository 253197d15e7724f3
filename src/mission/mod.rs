//! Long-running role loops
//!
//! Each role owns its radio, clock and sink for the whole mission and talks
//! to the other role only over the air.

pub mod receiver;
pub mod state;
pub mod transmitter;

pub use receiver::run_receiver;
pub use state::{MissionState, MissionSummary, Role, TerminationReason};
pub use transmitter::run_transmitter;

use crate::lora::traits::LoraError;
use crate::report::{Observation, ObservationSink};

/// Conditions that end a mission early
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MissionError {
    /// Send, configure or init failure from the radio driver
    #[error("radio failure: {0}")]
    Radio(#[from] LoraError),
    /// The transmitter could not agree initial parameters with the receiver
    #[error("initial parameter handshake failed")]
    InitialSyncFailed,
}

/// Hand an observation to the sink; failures are logged, never fatal
fn record<S: ObservationSink>(sink: &mut S, observation: &Observation) {
    if let Err(e) = sink.record(observation) {
        log::warn!("Failed to record observation: {}", e);
    }
}

fn finish<S: ObservationSink>(sink: &mut S, summary: &MissionSummary) {
    log::info!("Mission complete ({:?})", summary.reason);
    log::info!("Total packets sent: {}", summary.packets_sent);
    log::info!("Total packets received: {}", summary.packets_received);
    log::info!("Dropped packets: {}", summary.packets_dropped);

    if let Err(e) = sink.finish(summary) {
        log::warn!("Failed to write mission summary: {}", e);
    }
}
