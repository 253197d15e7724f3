//! Legal LoRa parameter ranges and the derived bandwidth/coding rate policy

use crate::config::{adr, limits, lora_defaults};
use crate::lora::traits::LoraError;

/// Preamble length used by both ends of the link
const PREAMBLE_SYMBOLS: u32 = 8;

/// Symbol time above which low data rate optimisation is mandatory
const LDRO_SYMBOL_TIME_US: u32 = 16_000;

/// One complete set of modulation and power parameters
///
/// Immutable once built; the decision engine produces a fresh value for
/// every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSet {
    /// Spreading factor (7-12)
    pub spreading_factor: u8,
    /// Coding rate denominator (5-8 for 4/5 to 4/8)
    pub coding_rate: u8,
    /// Bandwidth in Hz
    pub bandwidth_hz: u32,
    /// Transmit power in dBm
    pub tx_power_dbm: i8,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            spreading_factor: lora_defaults::SPREADING_FACTOR,
            coding_rate: lora_defaults::CODING_RATE,
            bandwidth_hz: lora_defaults::BANDWIDTH_HZ,
            tx_power_dbm: lora_defaults::TX_POWER_DBM,
        }
    }
}

impl ParameterSet {
    /// Build a parameter set, rejecting combinations the radio cannot run
    pub fn new(
        spreading_factor: u8,
        coding_rate: u8,
        bandwidth_hz: u32,
        tx_power_dbm: i8,
    ) -> Result<Self, LoraError> {
        let params = Self {
            spreading_factor,
            coding_rate,
            bandwidth_hz,
            tx_power_dbm,
        };
        ParameterConstraints::new().validate(&params)?;
        Ok(params)
    }

    /// Same modulation, different transmit power
    pub fn with_tx_power(self, tx_power_dbm: i8) -> Self {
        Self {
            tx_power_dbm,
            ..self
        }
    }

    /// True when both sets use the same modulation (power is local to each end)
    pub fn same_modulation(&self, other: &Self) -> bool {
        self.spreading_factor == other.spreading_factor
            && self.coding_rate == other.coding_rate
            && self.bandwidth_hz == other.bandwidth_hz
    }

    /// Symbol duration in microseconds: 2^SF / BW
    pub fn symbol_time_us(&self) -> u32 {
        if self.bandwidth_hz == 0 {
            return 0;
        }
        ((1u64 << self.spreading_factor) * 1_000_000 / self.bandwidth_hz as u64) as u32
    }

    /// Theoretical bit rate in bits per second
    ///
    /// `SF * (4 / CR) / (2^SF / BW)`
    pub fn bit_rate_bps(&self) -> f32 {
        let sf = self.spreading_factor as f32;
        let symbol_rate = self.bandwidth_hz as f32 / (1u32 << self.spreading_factor) as f32;
        sf * (4.0 / self.coding_rate as f32) * symbol_rate
    }

    /// Airtime of a packet in microseconds (explicit header, CRC on)
    pub fn time_on_air_us(&self, payload_len: usize) -> u32 {
        let t_sym = self.symbol_time_us() as u64;
        let sf = self.spreading_factor as i64;
        let de = if self.symbol_time_us() > LDRO_SYMBOL_TIME_US { 1 } else { 0 };

        let t_preamble_x4 = (PREAMBLE_SYMBOLS as u64 * 4 + 17) * t_sym;

        // 8*PL - 4*SF + 28 + 16*CRC - 20*IH
        let numerator = 8 * payload_len as i64 - 4 * sf + 28 + 16;
        let denominator = 4 * (sf - 2 * de);
        let blocks = if numerator > 0 {
            (numerator + denominator - 1) / denominator
        } else {
            0
        };
        let payload_symbols = 8 + blocks as u64 * self.coding_rate as u64;

        (t_preamble_x4 / 4 + payload_symbols * t_sym) as u32
    }
}

/// Enumerated legal ranges and the SF-driven selection policy
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterConstraints {
    spreading_factors: [u8; 6],
    coding_rates: [u8; 4],
    bandwidths: &'static [u32],
    min_tx_power: i8,
    max_tx_power: i8,
}

impl ParameterConstraints {
    pub fn new() -> Self {
        Self {
            spreading_factors: [7, 8, 9, 10, 11, 12],
            coding_rates: [5, 6, 7, 8],
            bandwidths: &limits::BANDWIDTHS_HZ,
            min_tx_power: limits::MIN_TX_POWER_DBM,
            max_tx_power: limits::MAX_TX_POWER_DBM,
        }
    }

    pub fn valid_spreading_factors(&self) -> &[u8] {
        &self.spreading_factors
    }

    pub fn valid_coding_rates(&self) -> &[u8] {
        &self.coding_rates
    }

    pub fn valid_bandwidths(&self) -> &[u32] {
        self.bandwidths
    }

    pub fn min_spreading_factor(&self) -> u8 {
        limits::MIN_SPREADING_FACTOR
    }

    pub fn max_spreading_factor(&self) -> u8 {
        limits::MAX_SPREADING_FACTOR
    }

    pub fn min_tx_power(&self) -> i8 {
        self.min_tx_power
    }

    pub fn max_tx_power(&self) -> i8 {
        self.max_tx_power
    }

    pub fn clamp_spreading_factor(&self, sf: u8) -> u8 {
        sf.clamp(limits::MIN_SPREADING_FACTOR, limits::MAX_SPREADING_FACTOR)
    }

    pub fn clamp_tx_power(&self, power_dbm: i8) -> i8 {
        power_dbm.clamp(self.min_tx_power, self.max_tx_power)
    }

    /// Narrower bandwidth for larger spreading factors
    ///
    /// SF7 takes the widest bandwidth, each SF step moves one entry towards
    /// the narrowest, clamped on both ends of the table.
    pub fn select_bandwidth_for_sf(&self, sf: u8) -> u32 {
        let last = self.bandwidths.len() as i32 - 1;
        let index = (last - (sf as i32 - limits::MIN_SPREADING_FACTOR as i32)).clamp(0, last);
        self.bandwidths[index as usize]
    }

    /// More FEC overhead for larger spreading factors
    pub fn select_coding_rate_for_sf(&self, sf: u8) -> u8 {
        (sf as i32 - 4).clamp(
            limits::MIN_CODING_RATE as i32,
            limits::MAX_CODING_RATE as i32,
        ) as u8
    }

    /// Full modulation derived from a spreading factor
    pub fn derive(&self, sf: u8, tx_power_dbm: i8) -> ParameterSet {
        let sf = self.clamp_spreading_factor(sf);
        ParameterSet {
            spreading_factor: sf,
            coding_rate: self.select_coding_rate_for_sf(sf),
            bandwidth_hz: self.select_bandwidth_for_sf(sf),
            tx_power_dbm: self.clamp_tx_power(tx_power_dbm),
        }
    }

    /// Longest symbol the link may use (largest SF on the narrowest bandwidth)
    pub fn max_symbol_time_us(&self) -> u32 {
        ParameterSet {
            spreading_factor: limits::MAX_SPREADING_FACTOR,
            coding_rate: limits::MAX_CODING_RATE,
            bandwidth_hz: self.bandwidths[0],
            tx_power_dbm: self.min_tx_power,
        }
        .symbol_time_us()
    }

    /// Check every field against the legal sets
    pub fn validate(&self, params: &ParameterSet) -> Result<(), LoraError> {
        if !self.spreading_factors.contains(&params.spreading_factor)
            || !self.coding_rates.contains(&params.coding_rate)
            || !self.bandwidths.contains(&params.bandwidth_hz)
            || params.tx_power_dbm < self.min_tx_power
            || params.tx_power_dbm > self.max_tx_power
        {
            return Err(LoraError::InvalidConfig);
        }
        if params.symbol_time_us() > self.max_symbol_time_us() {
            return Err(LoraError::InvalidConfig);
        }
        Ok(())
    }

    /// SNR needed to demodulate at this spreading factor (dB)
    pub fn snr_floor(&self, sf: u8) -> f32 {
        -7.5 - 2.5 * (sf as f32 - limits::MIN_SPREADING_FACTOR as f32)
    }

    /// Receiver sensitivity in dBm for a spreading factor and bandwidth
    pub fn sensitivity_dbm(&self, sf: u8, bandwidth_hz: u32) -> f32 {
        adr::THERMAL_NOISE_DBM_HZ
            + 10.0 * (bandwidth_hz as f32).log10()
            + adr::NOISE_FIGURE_DB
            + self.snr_floor(sf)
    }
}

impl Default for ParameterConstraints {
    fn default() -> Self {
        Self::new()
    }
}
