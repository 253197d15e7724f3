//! Mission counters and end-of-mission summary

use crate::adr::ParameterSet;

/// Which end of the link a mission loop drives
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Transmitter = 0x01,
    Receiver = 0x02,
}

impl Role {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Transmitter),
            0x02 => Some(Self::Receiver),
            _ => None,
        }
    }
}

/// Why a mission loop ended
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Mission duration elapsed
    DurationElapsed = 0x01,
    /// Configured packet budget reached
    PacketLimit = 0x02,
    /// Peer sent TERMINATE
    TerminateReceived = 0x03,
}

impl TerminationReason {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::DurationElapsed),
            0x02 => Some(Self::PacketLimit),
            0x03 => Some(Self::TerminateReceived),
            _ => None,
        }
    }
}

/// Final counters reported when a mission ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionSummary {
    pub role: Role,
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packets_dropped: u32,
    pub elapsed_ms: u64,
    /// Parameters active on the local radio at the end
    pub final_params: ParameterSet,
    pub syncs_confirmed: u32,
    pub syncs_failed: u32,
    pub reason: TerminationReason,
}

/// Mutable counters owned by a running mission loop
#[derive(Debug, Clone)]
pub struct MissionState {
    role: Role,
    started_ms: u64,
    pub packets_sent: u32,
    pub packets_received: u32,
    pub packets_dropped: u32,
    pub syncs_confirmed: u32,
    pub syncs_failed: u32,
}

impl MissionState {
    pub fn new(role: Role, started_ms: u64) -> Self {
        Self {
            role,
            started_ms,
            packets_sent: 0,
            packets_received: 0,
            packets_dropped: 0,
            syncs_confirmed: 0,
            syncs_failed: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }

    /// Freeze the counters
    pub fn summary(
        &self,
        now_ms: u64,
        final_params: ParameterSet,
        reason: TerminationReason,
    ) -> MissionSummary {
        MissionSummary {
            role: self.role,
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            packets_dropped: self.packets_dropped,
            elapsed_ms: self.elapsed_ms(now_ms),
            final_params,
            syncs_confirmed: self.syncs_confirmed,
            syncs_failed: self.syncs_failed,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_freezes_counters() {
        let mut state = MissionState::new(Role::Receiver, 1_000);
        state.packets_received = 7;
        state.packets_dropped = 2;

        let summary = state.summary(4_500, ParameterSet::default(), TerminationReason::TerminateReceived);
        state.packets_received += 1;

        assert_eq!(summary.role, Role::Receiver);
        assert_eq!(summary.packets_received, 7);
        assert_eq!(summary.packets_dropped, 2);
        assert_eq!(summary.elapsed_ms, 3_500);
        assert_eq!(summary.reason, TerminationReason::TerminateReceived);
    }

    #[test]
    fn test_byte_codes() {
        for role in [Role::Transmitter, Role::Receiver] {
            assert_eq!(Role::from_byte(role as u8), Some(role));
        }
        for reason in [
            TerminationReason::DurationElapsed,
            TerminationReason::PacketLimit,
            TerminationReason::TerminateReceived,
        ] {
            assert_eq!(TerminationReason::from_byte(reason as u8), Some(reason));
        }
        assert_eq!(Role::from_byte(0), None);
        assert_eq!(TerminationReason::from_byte(0xFF), None);
    }
}
