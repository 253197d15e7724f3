//! Report serialiser with COBS encoding
//!
//! Serialises reports into COBS-encoded frames for streaming to a host.

use crate::adr::ParameterSet;
use crate::config::protocol::{MAX_FRAME_SIZE, REPORT_VERSION};
use crate::report::types::{Observation, Report};
use crate::mission::state::MissionSummary;
use crc::{Crc, CRC_16_XMODEM};
use heapless::Vec;

const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Header bytes before the payload: version, report id, length
pub const HEADER_LEN: usize = 4;
/// Trailing CRC bytes
pub const CRC_LEN: usize = 2;

/// Fixed observation fields ahead of the variable payload
pub const OBSERVATION_FIXED_LEN: usize = 37;
pub const SUMMARY_LEN: usize = 37;

/// Calculate CRC-16-XMODEM
pub fn calculate_crc(data: &[u8]) -> u16 {
    CRC.checksum(data)
}

/// Serialiser for report frames
pub struct ReportSerialiser;

impl ReportSerialiser {
    pub fn new() -> Self {
        Self
    }

    /// Serialise a report to a COBS-encoded frame
    ///
    /// Returns the complete frame including COBS encoding and zero delimiter.
    pub fn serialise(&self, report: &Report) -> Vec<u8, MAX_FRAME_SIZE> {
        let raw = self.build_raw_frame(report);

        // corncobs::encode_buf includes the trailing zero delimiter
        cobs_encode(&raw)
    }

    /// Build the raw (unencoded) frame with CRC
    ///
    /// Frame format: [version: u8][report_id: u8][length: u16 LE][payload][crc16: u16 LE]
    fn build_raw_frame(&self, report: &Report) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut frame: Vec<u8, MAX_FRAME_SIZE> = Vec::new();

        let _ = frame.push(REPORT_VERSION);
        let _ = frame.push(report.id() as u8);

        match report {
            Report::Observation(observation) => {
                let payload_len = OBSERVATION_FIXED_LEN + observation.payload.len();
                let _ = frame.extend_from_slice(&(payload_len as u16).to_le_bytes());
                push_observation(&mut frame, observation);
            }
            Report::Summary(summary) => {
                let _ = frame.extend_from_slice(&(SUMMARY_LEN as u16).to_le_bytes());
                push_summary(&mut frame, summary);
            }
        }

        let crc = calculate_crc(&frame);
        let _ = frame.extend_from_slice(&crc.to_le_bytes());

        frame
    }
}

impl Default for ReportSerialiser {
    fn default() -> Self {
        Self::new()
    }
}

fn push_params(frame: &mut Vec<u8, MAX_FRAME_SIZE>, params: &ParameterSet) {
    let _ = frame.push(params.spreading_factor);
    let _ = frame.push(params.coding_rate);
    let _ = frame.extend_from_slice(&params.bandwidth_hz.to_le_bytes());
    let _ = frame.push(params.tx_power_dbm as u8);
}

fn push_observation(frame: &mut Vec<u8, MAX_FRAME_SIZE>, observation: &Observation) {
    let _ = frame.push(observation.kind as u8);
    let _ = frame.extend_from_slice(&observation.timestamp_ms.to_le_bytes());
    let _ = frame.extend_from_slice(&observation.sequence.to_le_bytes());
    push_params(frame, &observation.params);
    let _ = frame.extend_from_slice(&observation.snr.to_le_bytes());
    let _ = frame.extend_from_slice(&observation.rssi.to_le_bytes());
    let _ = frame.push(observation.latency_ms.is_some() as u8);
    let _ = frame.extend_from_slice(&observation.latency_ms.unwrap_or(0).to_le_bytes());
    let _ = frame.extend_from_slice(&observation.payload);
}

fn push_summary(frame: &mut Vec<u8, MAX_FRAME_SIZE>, summary: &MissionSummary) {
    let _ = frame.push(summary.role as u8);
    let _ = frame.extend_from_slice(&summary.packets_sent.to_le_bytes());
    let _ = frame.extend_from_slice(&summary.packets_received.to_le_bytes());
    let _ = frame.extend_from_slice(&summary.packets_dropped.to_le_bytes());
    let _ = frame.extend_from_slice(&summary.elapsed_ms.to_le_bytes());
    push_params(frame, &summary.final_params);
    let _ = frame.extend_from_slice(&summary.syncs_confirmed.to_le_bytes());
    let _ = frame.extend_from_slice(&summary.syncs_failed.to_le_bytes());
    let _ = frame.push(summary.reason as u8);
}

/// COBS encode a buffer using corncobs
fn cobs_encode(data: &[u8]) -> Vec<u8, MAX_FRAME_SIZE> {
    let mut output: Vec<u8, MAX_FRAME_SIZE> = Vec::new();
    output.resize(corncobs::max_encoded_len(data.len()), 0).ok();
    let len = corncobs::encode_buf(data, &mut output);
    output.truncate(len);
    output
}

/// COBS decode a frame, trailing delimiter included
#[allow(clippy::result_unit_err)]
pub fn cobs_decode(encoded: &[u8]) -> Result<Vec<u8, MAX_FRAME_SIZE>, ()> {
    let mut output: Vec<u8, MAX_FRAME_SIZE> = Vec::new();
    output.resize(encoded.len(), 0).map_err(|_| ())?;
    let len = corncobs::decode_buf(encoded, &mut output).map_err(|_| ())?;
    output.truncate(len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::protocol::{FRAME_DELIMITER, MAX_LORA_PAYLOAD};
    use crate::mission::state::{Role, TerminationReason};
    use crate::report::types::{ObservationKind, ReportId};

    fn observation(payload: &str) -> Observation {
        Observation::event(
            ObservationKind::Received,
            1_700_000_000_000,
            42,
            ParameterSet::default(),
            -3.5,
            -112.0,
            payload,
        )
    }

    #[test]
    fn test_serialise_observation() {
        let serialiser = ReportSerialiser::new();
        let encoded = serialiser.serialise(&Report::Observation(observation("CubeSat|42")));

        assert_eq!(encoded[encoded.len() - 1], FRAME_DELIMITER);
        for &byte in &encoded[..encoded.len() - 1] {
            assert_ne!(byte, 0, "COBS encoded data should not contain zeros");
        }

        let decoded = cobs_decode(&encoded).expect("Should decode");

        // [version][report_id][length LE][payload][crc LE]
        assert_eq!(decoded[0], REPORT_VERSION);
        assert_eq!(decoded[1], ReportId::Observation as u8);
        let length = u16::from_le_bytes([decoded[2], decoded[3]]) as usize;
        assert_eq!(length, OBSERVATION_FIXED_LEN + 10);
        assert_eq!(decoded.len(), HEADER_LEN + length + CRC_LEN);

        // Payload starts with the kind then the timestamp
        assert_eq!(decoded[4], ObservationKind::Received as u8);
        let timestamp = u64::from_le_bytes(decoded[5..13].try_into().unwrap());
        assert_eq!(timestamp, 1_700_000_000_000);
        assert_eq!(&decoded[HEADER_LEN + OBSERVATION_FIXED_LEN..HEADER_LEN + length], b"CubeSat|42");

        let crc = u16::from_le_bytes([decoded[HEADER_LEN + length], decoded[HEADER_LEN + length + 1]]);
        assert_eq!(crc, calculate_crc(&decoded[..HEADER_LEN + length]));
    }

    #[test]
    fn test_serialise_summary() {
        let serialiser = ReportSerialiser::new();
        let summary = MissionSummary {
            role: Role::Transmitter,
            packets_sent: 1000,
            packets_received: 950,
            packets_dropped: 50,
            elapsed_ms: 600_000,
            final_params: ParameterSet::default(),
            syncs_confirmed: 4,
            syncs_failed: 1,
            reason: TerminationReason::PacketLimit,
        };

        let encoded = serialiser.serialise(&Report::Summary(summary));
        let decoded = cobs_decode(&encoded).expect("Should decode");

        assert_eq!(decoded[1], ReportId::Summary as u8);
        assert_eq!(u16::from_le_bytes([decoded[2], decoded[3]]) as usize, SUMMARY_LEN);
        assert_eq!(decoded.len(), HEADER_LEN + SUMMARY_LEN + CRC_LEN);
        assert_eq!(decoded[4], Role::Transmitter as u8);
        assert_eq!(decoded[HEADER_LEN + SUMMARY_LEN - 1], TerminationReason::PacketLimit as u8);
    }

    #[test]
    fn test_largest_observation_fits() {
        let serialiser = ReportSerialiser::new();
        let mut obs = observation("");
        obs.payload.resize(MAX_LORA_PAYLOAD, 0x00).unwrap();

        let encoded = serialiser.serialise(&Report::Observation(obs));
        let decoded = cobs_decode(&encoded).expect("Should decode");
        assert_eq!(decoded.len(), HEADER_LEN + OBSERVATION_FIXED_LEN + MAX_LORA_PAYLOAD + CRC_LEN);
    }
}
