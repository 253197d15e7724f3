//! Host-side report stream decoder
//!
//! Accumulates bytes from a serial line, COBS-decodes complete frames and
//! parses them back into reports.

use crate::adr::ParameterSet;
use crate::config::protocol::{MAX_LORA_PAYLOAD, REPORT_VERSION};
use crate::mission::state::{MissionSummary, Role, TerminationReason};
use crate::protocol::framing::FrameAccumulator;
use crate::report::serialiser::{
    calculate_crc, cobs_decode, CRC_LEN, HEADER_LEN, OBSERVATION_FIXED_LEN, SUMMARY_LEN,
};
use crate::report::types::{Observation, ObservationKind, Report, ReportError, ReportId};
use heapless::Vec;

/// Stream decoder for report frames
pub struct ReportDecoder {
    accumulator: FrameAccumulator,
}

impl ReportDecoder {
    pub fn new() -> Self {
        Self {
            accumulator: FrameAccumulator::new(),
        }
    }

    /// Push one byte from the stream
    ///
    /// Returns a result whenever a delimiter completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<Result<Report, ReportError>> {
        let frame = self.accumulator.push(byte)?;
        let decoded = match cobs_decode(&frame) {
            Ok(d) => d,
            Err(()) => return Some(Err(ReportError::InvalidEncoding)),
        };
        Some(parse_frame(&decoded))
    }

    /// Decode every complete report in `bytes`, skipping corrupt frames
    pub fn feed(&mut self, bytes: &[u8]) -> std::vec::Vec<Report> {
        let mut reports = std::vec::Vec::new();
        for &byte in bytes {
            match self.push(byte) {
                Some(Ok(report)) => reports.push(report),
                Some(Err(e)) => log::warn!("Discarding report frame: {}", e),
                None => {}
            }
        }
        reports
    }

    pub fn reset(&mut self) {
        self.accumulator.reset();
    }
}

impl Default for ReportDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a COBS-decoded frame
///
/// Frame format: [version: u8][report_id: u8][length: u16 LE][payload][crc16: u16 LE]
pub fn parse_frame(data: &[u8]) -> Result<Report, ReportError> {
    if data.len() < HEADER_LEN + CRC_LEN {
        return Err(ReportError::InvalidLength);
    }

    let version = data[0];
    let report_id_byte = data[1];
    let length = u16::from_le_bytes([data[2], data[3]]) as usize;

    if version != REPORT_VERSION {
        return Err(ReportError::InvalidVersion);
    }

    if data.len() != HEADER_LEN + length + CRC_LEN {
        return Err(ReportError::InvalidLength);
    }

    let payload = &data[HEADER_LEN..HEADER_LEN + length];
    let received_crc = u16::from_le_bytes([data[HEADER_LEN + length], data[HEADER_LEN + length + 1]]);
    if calculate_crc(&data[..HEADER_LEN + length]) != received_crc {
        return Err(ReportError::CrcError);
    }

    match ReportId::from_byte(report_id_byte) {
        Some(ReportId::Observation) => parse_observation(payload).map(Report::Observation),
        Some(ReportId::Summary) => parse_summary(payload).map(Report::Summary),
        None => Err(ReportError::InvalidReport),
    }
}

/// Little-endian field reader over a length-checked payload
struct Fields<'a> {
    data: &'a [u8],
}

impl<'a> Fields<'a> {
    fn take<const L: usize>(&mut self) -> Result<[u8; L], ReportError> {
        if self.data.len() < L {
            return Err(ReportError::InvalidLength);
        }
        let (head, rest) = self.data.split_at(L);
        self.data = rest;
        let mut out = [0u8; L];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ReportError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, ReportError> {
        self.take().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, ReportError> {
        self.take().map(u64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, ReportError> {
        self.take().map(f32::from_le_bytes)
    }

    fn params(&mut self) -> Result<ParameterSet, ReportError> {
        let spreading_factor = self.u8()?;
        let coding_rate = self.u8()?;
        let bandwidth_hz = self.u32()?;
        let tx_power_dbm = self.u8()? as i8;
        ParameterSet::new(spreading_factor, coding_rate, bandwidth_hz, tx_power_dbm)
            .map_err(|_| ReportError::InvalidField)
    }

    fn rest(self) -> &'a [u8] {
        self.data
    }
}

fn parse_observation(payload: &[u8]) -> Result<Observation, ReportError> {
    if payload.len() < OBSERVATION_FIXED_LEN
        || payload.len() > OBSERVATION_FIXED_LEN + MAX_LORA_PAYLOAD
    {
        return Err(ReportError::InvalidLength);
    }

    let mut fields = Fields { data: payload };
    let kind = ObservationKind::from_byte(fields.u8()?).ok_or(ReportError::InvalidField)?;
    let timestamp_ms = fields.u64()?;
    let sequence = fields.u32()?;
    let params = fields.params()?;
    let snr = fields.f32()?;
    let rssi = fields.f32()?;
    let has_latency = fields.u8()? != 0;
    let latency = fields.u64()?;

    let mut data = Vec::new();
    data.extend_from_slice(fields.rest())
        .map_err(|_| ReportError::InvalidLength)?;

    Ok(Observation {
        timestamp_ms,
        sequence,
        kind,
        params,
        snr,
        rssi,
        latency_ms: has_latency.then_some(latency),
        payload: data,
    })
}

fn parse_summary(payload: &[u8]) -> Result<MissionSummary, ReportError> {
    if payload.len() != SUMMARY_LEN {
        return Err(ReportError::InvalidLength);
    }

    let mut fields = Fields { data: payload };
    let role = Role::from_byte(fields.u8()?).ok_or(ReportError::InvalidField)?;
    let packets_sent = fields.u32()?;
    let packets_received = fields.u32()?;
    let packets_dropped = fields.u32()?;
    let elapsed_ms = fields.u64()?;
    let final_params = fields.params()?;
    let syncs_confirmed = fields.u32()?;
    let syncs_failed = fields.u32()?;
    let reason = TerminationReason::from_byte(fields.u8()?).ok_or(ReportError::InvalidField)?;

    Ok(MissionSummary {
        role,
        packets_sent,
        packets_received,
        packets_dropped,
        elapsed_ms,
        final_params,
        syncs_confirmed,
        syncs_failed,
        reason,
    })
}
