//! Over-the-air message grammar
//!
//! Control messages are UTF-8 text with `|` separated fields:
//!
//! ```text
//! SYNC|<bandwidth_hz>|<coding_rate>|<spreading_factor>
//! READY
//! TERMINATE
//! ```
//!
//! Anything else is a data packet. Data packets sent by the transmitter
//! look like `<label>|<seq>|TS:<unix_ms>`, acknowledgments from the
//! receiver look like `ACK|<seq>`, but any byte string is accepted.

use crate::adr::{ParameterConstraints, ParameterSet};
use crate::config::protocol::MAX_LORA_PAYLOAD;
use core::fmt::Write;
use heapless::String;

const FIELD_SEPARATOR: char = '|';
const SYNC_TAG: &str = "SYNC";
const READY_TAG: &str = "READY";
const TERMINATE_TAG: &str = "TERMINATE";
const TIMESTAMP_PREFIX: &str = "TS:";

/// Label of receiver acknowledgments
pub const ACK_LABEL: &str = "ACK";

/// Longest control message: `SYNC|500000|8|12`
pub const MAX_CONTROL_LEN: usize = 32;

/// Link control messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMessage {
    /// Proposal of new modulation parameters
    Sync {
        bandwidth_hz: u32,
        coding_rate: u8,
        spreading_factor: u8,
    },
    /// Receiver has adopted the proposal
    Ready,
    /// Mission is over
    Terminate,
}

impl SyncMessage {
    /// Proposal carrying the modulation of `params`
    pub fn proposal(params: &ParameterSet) -> Self {
        Self::Sync {
            bandwidth_hz: params.bandwidth_hz,
            coding_rate: params.coding_rate,
            spreading_factor: params.spreading_factor,
        }
    }

    /// Encode to wire text
    pub fn encode(&self) -> String<MAX_CONTROL_LEN> {
        let mut out = String::new();
        // Longest encoding fits MAX_CONTROL_LEN
        let _ = match self {
            Self::Sync {
                bandwidth_hz,
                coding_rate,
                spreading_factor,
            } => write!(
                out,
                "{SYNC_TAG}|{}|{}|{}",
                bandwidth_hz, coding_rate, spreading_factor
            ),
            Self::Ready => out.push_str(READY_TAG).map_err(|_| core::fmt::Error),
            Self::Terminate => out.push_str(TERMINATE_TAG).map_err(|_| core::fmt::Error),
        };
        out
    }

    /// Parse wire bytes; `None` for anything that is not a well-formed control message
    ///
    /// A `SYNC` whose values fall outside the legal parameter sets is not a
    /// control message.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let text = core::str::from_utf8(data).ok()?;
        match text {
            READY_TAG => return Some(Self::Ready),
            TERMINATE_TAG => return Some(Self::Terminate),
            _ => {}
        }

        let mut fields = text.split(FIELD_SEPARATOR);
        if fields.next()? != SYNC_TAG {
            return None;
        }
        let bandwidth_hz: u32 = fields.next()?.parse().ok()?;
        let coding_rate: u8 = fields.next()?.parse().ok()?;
        let spreading_factor: u8 = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }

        let constraints = ParameterConstraints::new();
        if !constraints.valid_bandwidths().contains(&bandwidth_hz)
            || !constraints.valid_coding_rates().contains(&coding_rate)
            || !constraints.valid_spreading_factors().contains(&spreading_factor)
        {
            return None;
        }

        Some(Self::Sync {
            bandwidth_hz,
            coding_rate,
            spreading_factor,
        })
    }

    /// Apply a proposal's modulation on top of `base`, keeping its power
    pub fn apply_to(&self, base: &ParameterSet) -> Option<ParameterSet> {
        match *self {
            Self::Sync {
                bandwidth_hz,
                coding_rate,
                spreading_factor,
            } => Some(ParameterSet {
                spreading_factor,
                coding_rate,
                bandwidth_hz,
                tx_power_dbm: base.tx_power_dbm,
            }),
            _ => None,
        }
    }
}

/// Non-control payload with whatever structure could be recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPacket<'a> {
    pub payload: &'a [u8],
    /// First field, when the payload is text
    pub label: Option<&'a str>,
    pub sequence: Option<u32>,
    /// Sender timestamp from a `TS:` field
    pub timestamp_ms: Option<u64>,
}

impl<'a> DataPacket<'a> {
    pub fn parse(payload: &'a [u8]) -> Self {
        let mut packet = Self {
            payload,
            label: None,
            sequence: None,
            timestamp_ms: None,
        };

        let Ok(text) = core::str::from_utf8(payload) else {
            return packet;
        };

        let mut fields = text.split(FIELD_SEPARATOR);
        packet.label = fields.next();
        // Control tags never carry a sequence, even when malformed
        let sequenced = !matches!(packet.label, Some(SYNC_TAG | READY_TAG | TERMINATE_TAG));
        for (index, field) in fields.enumerate() {
            if let Some(ts) = field.strip_prefix(TIMESTAMP_PREFIX) {
                packet.timestamp_ms = ts.parse().ok();
            } else if index == 0 && sequenced {
                packet.sequence = field.parse().ok();
            }
        }
        packet
    }

    pub fn text(&self) -> Option<&'a str> {
        core::str::from_utf8(self.payload).ok()
    }

    pub fn is_ack(&self) -> bool {
        self.label == Some(ACK_LABEL)
    }

    /// Distance between the sender timestamp and `now_ms`
    pub fn latency_ms(&self, now_ms: u64) -> Option<u64> {
        self.timestamp_ms.map(|ts| now_ms.abs_diff(ts))
    }
}

/// Classified received payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming<'a> {
    Control(SyncMessage),
    Data(DataPacket<'a>),
}

impl<'a> Incoming<'a> {
    /// Control message if the payload matches the grammar, data otherwise
    pub fn classify(payload: &'a [u8]) -> Self {
        match SyncMessage::parse(payload) {
            Some(message) => Self::Control(message),
            None => Self::Data(DataPacket::parse(payload)),
        }
    }
}

/// `<label>|<seq>|TS:<unix_ms>`
pub fn encode_data(label: &str, sequence: u32, timestamp_ms: u64) -> String<MAX_LORA_PAYLOAD> {
    let mut out = String::new();
    let _ = write!(out, "{label}|{sequence}|{TIMESTAMP_PREFIX}{timestamp_ms}");
    out
}

/// `ACK|<seq>`
pub fn encode_ack(sequence: u32) -> String<MAX_CONTROL_LEN> {
    let mut out = String::new();
    let _ = write!(out, "{ACK_LABEL}|{sequence}");
    out
}
