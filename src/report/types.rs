//! Observation and report types
//!
//! # Frame Format
//!
//! Reports stream to a host as COBS frames with a zero byte delimiter:
//! ```text
//! [COBS-encoded payload][0x00]
//! ```
//!
//! The payload format (before COBS encoding):
//! ```text
//! [version: u8][report_id: u8][length: u16 LE][payload: [u8; length]][crc16: u16 LE]
//! ```
//!
//! - `version`: Report layout version (currently 1)
//! - `report_id`: [`ReportId`]
//! - `crc16`: CRC-16-XMODEM over all preceding bytes
//!
//! # Observation payload
//!
//! ```text
//! [kind: u8][timestamp_ms: u64][sequence: u32]
//! [sf: u8][cr: u8][bandwidth_hz: u32][tx_power_dbm: i8]
//! [snr: f32][rssi: f32][has_latency: u8][latency_ms: u64]
//! [payload...]
//! ```
//!
//! # Summary payload
//!
//! ```text
//! [role: u8][sent: u32][received: u32][dropped: u32][elapsed_ms: u64]
//! [sf: u8][cr: u8][bandwidth_hz: u32][tx_power_dbm: i8]
//! [syncs_confirmed: u32][syncs_failed: u32][reason: u8]
//! ```
//!
//! All multi-byte fields are little-endian.

use crate::adr::ParameterSet;
use crate::config::protocol::MAX_LORA_PAYLOAD;
use crate::lora::traits::RxPacket;
use crate::mission::state::MissionSummary;
use heapless::Vec;

/// Report IDs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportId {
    Observation = 0x20,
    Summary = 0x21,
}

impl ReportId {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x20 => Some(Self::Observation),
            0x21 => Some(Self::Summary),
            _ => None,
        }
    }
}

/// What an observation records
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    /// A data packet arrived
    Received = 0x01,
    /// The decision engine ran
    Decision = 0x02,
    /// A handshake completed or a proposal was adopted
    Sync = 0x03,
}

impl ObservationKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Received),
            0x02 => Some(Self::Decision),
            0x03 => Some(Self::Sync),
            _ => None,
        }
    }
}

/// One persisted result record
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp_ms: u64,
    pub sequence: u32,
    pub kind: ObservationKind,
    /// Parameters active when the event happened
    pub params: ParameterSet,
    pub snr: f32,
    pub rssi: f32,
    /// Sender-to-receiver latency of timestamped data packets
    pub latency_ms: Option<u64>,
    pub payload: Vec<u8, MAX_LORA_PAYLOAD>,
}

impl Observation {
    /// Record of a received packet
    pub fn received(
        timestamp_ms: u64,
        sequence: u32,
        params: ParameterSet,
        packet: &RxPacket,
        latency_ms: Option<u64>,
    ) -> Self {
        Self {
            timestamp_ms,
            sequence,
            kind: ObservationKind::Received,
            params,
            snr: packet.snr,
            rssi: packet.rssi,
            latency_ms,
            payload: packet.data.clone(),
        }
    }

    /// Record of a parameter event; `note` is stored as the payload
    pub fn event(
        kind: ObservationKind,
        timestamp_ms: u64,
        sequence: u32,
        params: ParameterSet,
        snr: f32,
        rssi: f32,
        note: &str,
    ) -> Self {
        let bytes = note.as_bytes();
        let len = bytes.len().min(MAX_LORA_PAYLOAD);
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(&bytes[..len]);
        Self {
            timestamp_ms,
            sequence,
            kind,
            params,
            snr,
            rssi,
            latency_ms: None,
            payload,
        }
    }

    /// Payload as text, lossy for binary data
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Frame carried on the report stream
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Observation(Observation),
    Summary(MissionSummary),
}

impl Report {
    pub fn id(&self) -> ReportId {
        match self {
            Report::Observation(_) => ReportId::Observation,
            Report::Summary(_) => ReportId::Summary,
        }
    }
}

/// Why a report frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("invalid COBS encoding")]
    InvalidEncoding,
    #[error("frame length does not match its header")]
    InvalidLength,
    #[error("unsupported report version")]
    InvalidVersion,
    #[error("CRC mismatch")]
    CrcError,
    #[error("unknown report id")]
    InvalidReport,
    #[error("field value out of range")]
    InvalidField,
}
