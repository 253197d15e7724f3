//! Adaptive data rate control for a point-to-point LoRa link
//!
//! The decision engine in [`adr`] turns recent link quality into the next
//! parameter set, [`protocol`] carries the change to the peer, and the role
//! loops in [`mission`] drive both against any [`lora::LoraRadio`].

pub mod adr;
pub mod clock;
pub mod config;
pub mod lora;
pub mod mission;
pub mod protocol;
pub mod report;

pub use adr::{AdrEngine, AdrError, Decision, LinkQualityHistory, ParameterConstraints, ParameterSet};
pub use clock::{Clock, SystemClock};
pub use config::{AdrConfig, MissionConfig, SyncConfig};
pub use lora::{LoraError, LoraRadio, RxPacket};
pub use mission::{run_receiver, run_transmitter, MissionError, MissionSummary};
pub use protocol::{SyncMessage, SyncOutcome};
