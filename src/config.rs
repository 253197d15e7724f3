//! Link configuration constants and runtime configuration structs

/// Default LoRa configuration at link startup
pub mod lora_defaults {
    pub const SPREADING_FACTOR: u8 = 7;
    pub const BANDWIDTH_HZ: u32 = 125_000;
    /// Coding rate 4/5
    pub const CODING_RATE: u8 = 5;
    pub const TX_POWER_DBM: i8 = 13;
}

/// Hardware-valid parameter ranges
pub mod limits {
    pub const MIN_SPREADING_FACTOR: u8 = 7;
    pub const MAX_SPREADING_FACTOR: u8 = 12;

    /// Coding rate denominators (4/5 to 4/8)
    pub const MIN_CODING_RATE: u8 = 5;
    pub const MAX_CODING_RATE: u8 = 8;

    /// Legal bandwidths in ascending order
    pub const BANDWIDTHS_HZ: [u32; 3] = [125_000, 250_000, 500_000];

    pub const MIN_TX_POWER_DBM: i8 = 2;
    pub const MAX_TX_POWER_DBM: i8 = 20;

    /// Power change applied alongside a spreading factor step
    pub const TX_POWER_STEP_DB: i8 = 3;
}

/// Adaptive data rate tuning
pub mod adr {
    /// Samples kept in the link quality window
    pub const HISTORY_CAPACITY: usize = 20;

    /// Fewer samples than this and the engine holds the current parameters
    pub const MIN_SAMPLES: usize = 5;

    /// Averaging window at zero velocity
    pub const BASE_EFFECTIVE_SAMPLES: f32 = 20.0;

    /// Velocity at which the averaging window collapses to one sample
    pub const VELOCITY_SCALE: f32 = 10.0;

    /// Reference distance for the path loss estimate
    pub const REFERENCE_DISTANCE: f32 = 1.0;

    /// Minimum receiver sensitivity in dBm (SF12 @ 125 kHz)
    pub const MIN_SENSITIVITY_DBM: f32 = -137.0;

    /// Upper bound on the required margin in dB
    pub const MARGIN_CEILING_DB: f32 = 10.0;

    /// Receiver noise figure in dB used for sensitivity estimates
    pub const NOISE_FIGURE_DB: f32 = 6.0;

    /// Thermal noise density in dBm/Hz
    pub const THERMAL_NOISE_DBM_HZ: f32 = -174.0;
}

/// Parameter renegotiation handshake
pub mod sync {
    /// Handshake attempts before giving up for this cycle
    pub const MAX_ATTEMPTS: u8 = 5;
    pub const REPLY_TIMEOUT_MS: u32 = 2000;
    pub const RETRY_DELAY_MS: u32 = 500;

    /// Number of times TERMINATE is repeated at mission end
    pub const TERMINATE_REPEATS: u8 = 3;
    pub const TERMINATE_SPACING_MS: u32 = 500;
}

/// Mission loop pacing and budgets
pub mod mission {
    /// Re-run the decision engine every this many data packets
    pub const REEVALUATE_EVERY: u32 = 10;

    /// One hour
    pub const DURATION_MS: u64 = 3_600_000;
    pub const MAX_PACKETS: u32 = 1000;
    pub const PACKET_INTERVAL_MS: u32 = 100;

    /// Transmitter listen window for acknowledgments after each send
    pub const ACK_WINDOW_MS: u32 = 1000;

    /// Receiver receive timeout per poll
    pub const RX_POLL_MS: u32 = 5000;

    /// Silent polls after adopting new parameters before the receiver reverts
    pub const REVERT_AFTER_SILENT_POLLS: u8 = 3;

    /// Label carried by transmitter data packets
    pub const DATA_LABEL: &str = "CubeSat";
}

/// Wire and report framing constants
pub mod protocol {
    /// Frame delimiter for COBS encoding
    pub const FRAME_DELIMITER: u8 = 0x00;

    /// Maximum report frame size
    pub const MAX_FRAME_SIZE: usize = 512;

    /// Maximum payload size for the RFM9x FIFO
    pub const MAX_LORA_PAYLOAD: usize = 252;

    /// Report frame version (increment when the report layout changes)
    pub const REPORT_VERSION: u8 = 1;
}

/// Decision engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AdrConfig {
    /// Adapt only when acknowledgment feedback is available
    pub ack_enabled: bool,
    pub min_samples: usize,
    pub reference_distance: f32,
    pub min_sensitivity_dbm: f32,
    pub margin_ceiling_db: f32,
}

impl Default for AdrConfig {
    fn default() -> Self {
        Self {
            ack_enabled: true,
            min_samples: adr::MIN_SAMPLES,
            reference_distance: adr::REFERENCE_DISTANCE,
            min_sensitivity_dbm: adr::MIN_SENSITIVITY_DBM,
            margin_ceiling_db: adr::MARGIN_CEILING_DB,
        }
    }
}

/// Handshake retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_attempts: u8,
    pub reply_timeout_ms: u32,
    pub retry_delay_ms: u32,
    pub terminate_repeats: u8,
    pub terminate_spacing_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: sync::MAX_ATTEMPTS,
            reply_timeout_ms: sync::REPLY_TIMEOUT_MS,
            retry_delay_ms: sync::RETRY_DELAY_MS,
            terminate_repeats: sync::TERMINATE_REPEATS,
            terminate_spacing_ms: sync::TERMINATE_SPACING_MS,
        }
    }
}

/// Mission loop configuration shared by both roles
#[derive(Debug, Clone, PartialEq)]
pub struct MissionConfig {
    pub reevaluate_every: u32,
    pub duration_ms: u64,
    pub max_packets: u32,
    pub packet_interval_ms: u32,
    pub ack_window_ms: u32,
    pub rx_poll_ms: u32,
    pub revert_after_silent_polls: u8,
    /// Node velocity fed to the margin estimator (m/s)
    pub velocity: f32,
    /// Perform a handshake before the first data packet
    pub initial_sync: bool,
    pub adr: AdrConfig,
    pub sync: SyncConfig,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            reevaluate_every: mission::REEVALUATE_EVERY,
            duration_ms: mission::DURATION_MS,
            max_packets: mission::MAX_PACKETS,
            packet_interval_ms: mission::PACKET_INTERVAL_MS,
            ack_window_ms: mission::ACK_WINDOW_MS,
            rx_poll_ms: mission::RX_POLL_MS,
            revert_after_silent_polls: mission::REVERT_AFTER_SILENT_POLLS,
            velocity: 5.0,
            initial_sync: true,
            adr: AdrConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}
