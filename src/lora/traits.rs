//! LoRa radio trait for abstraction and testability
//!
//! This trait defines the interface the mission loops need from a radio,
//! allowing the actual hardware driver to be swapped with a mock for testing.

use crate::adr::ParameterSet;
use crate::config::protocol::MAX_LORA_PAYLOAD;
use core::future::Future;
use heapless::Vec;

/// Errors that can occur during LoRa operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoraError {
    /// Driver-level operation timed out (not a quiet receive window)
    #[error("radio operation timed out")]
    Timeout,
    /// CRC error in received packet
    #[error("CRC error in received packet")]
    CrcError,
    /// Transmission failed
    #[error("transmission failed")]
    TransmitFailed,
    /// Reception failed
    #[error("reception failed")]
    ReceiveFailed,
    /// Invalid configuration
    #[error("invalid radio configuration")]
    InvalidConfig,
    /// Radio not initialised
    #[error("radio not initialised")]
    NotInitialised,
}

/// Received packet with link metrics
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    /// Received data
    pub data: Vec<u8, MAX_LORA_PAYLOAD>,
    /// Received Signal Strength Indicator in dBm
    pub rssi: f32,
    /// Signal-to-Noise Ratio in dB
    pub snr: f32,
}

impl RxPacket {
    /// Build a packet from a byte slice, truncating to the radio payload limit
    pub fn new(data: &[u8], snr: f32, rssi: f32) -> Self {
        let len = data.len().min(MAX_LORA_PAYLOAD);
        let mut buf = Vec::new();
        let _ = buf.extend_from_slice(&data[..len]);
        Self {
            data: buf,
            rssi,
            snr,
        }
    }
}

/// Abstract LoRa radio interface
///
/// Calls are issued sequentially by the single role that owns the radio.
pub trait LoraRadio {
    /// Initialise the radio hardware
    fn init(&mut self) -> impl Future<Output = Result<(), LoraError>>;

    /// Transmit data over LoRa
    ///
    /// Blocks until transmission is complete or an error occurs.
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LoraError>>;

    /// Receive data with timeout
    ///
    /// Returns `Ok(None)` when nothing arrived within `timeout_ms`.
    fn receive(
        &mut self,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Option<RxPacket>, LoraError>>;

    /// Write spreading factor, coding rate, bandwidth and power registers
    fn configure(&mut self, params: &ParameterSet) -> impl Future<Output = Result<(), LoraError>>;

    /// Parameters currently programmed into the radio
    fn parameters(&self) -> ParameterSet;
}

#[cfg(test)]
pub mod mock {
    //! Mock LoRa radio for testing

    use super::*;
    use crate::clock::mock::MockClock;
    use core::cell::RefCell;
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    /// Simulated peer: sees each transmitted frame and may answer it
    pub type Responder = Box<dyn FnMut(&[u8], &ParameterSet) -> Option<RxPacket>>;

    /// Mock LoRa radio for unit testing
    pub struct MockLoraRadio {
        /// Packets queued to be returned by receive()
        rx_queue: RefCell<VecDeque<RxPacket>>,
        /// Record of transmitted packets
        tx_history: RefCell<StdVec<StdVec<u8>>>,
        /// Current configuration
        params: RefCell<ParameterSet>,
        /// Every configuration applied, in order
        config_history: RefCell<StdVec<ParameterSet>>,
        /// Error to return on next transmit
        next_tx_error: RefCell<Option<LoraError>>,
        /// Error to return on next receive
        next_rx_error: RefCell<Option<LoraError>>,
        /// Whether init has been called
        initialised: RefCell<bool>,
        /// Receive calls that ended without a packet
        quiet_receives: RefCell<u32>,
        /// Advanced by the timeout of every quiet receive
        clock: Option<MockClock>,
        responder: RefCell<Option<Responder>>,
    }

    impl MockLoraRadio {
        /// Create a new mock radio
        pub fn new() -> Self {
            Self {
                rx_queue: RefCell::new(VecDeque::new()),
                tx_history: RefCell::new(StdVec::new()),
                params: RefCell::new(ParameterSet::default()),
                config_history: RefCell::new(StdVec::new()),
                next_tx_error: RefCell::new(None),
                next_rx_error: RefCell::new(None),
                initialised: RefCell::new(false),
                quiet_receives: RefCell::new(0),
                clock: None,
                responder: RefCell::new(None),
            }
        }

        /// Create a mock radio whose quiet receives consume time on `clock`
        pub fn with_clock(clock: MockClock) -> Self {
            Self {
                clock: Some(clock),
                ..Self::new()
            }
        }

        /// Queue a packet to be returned by the next receive() call
        pub fn queue_rx_packet(&self, packet: RxPacket) {
            self.rx_queue.borrow_mut().push_back(packet);
        }

        /// Queue a text payload with the given metrics
        pub fn queue_rx_text(&self, text: &str, snr: f32, rssi: f32) {
            self.queue_rx_packet(RxPacket::new(text.as_bytes(), snr, rssi));
        }

        /// Install a simulated peer that answers transmitted frames
        pub fn set_responder(&self, responder: Responder) {
            *self.responder.borrow_mut() = Some(responder);
        }

        /// Set an error to be returned by the next transmit() call
        pub fn set_next_tx_error(&self, error: LoraError) {
            *self.next_tx_error.borrow_mut() = Some(error);
        }

        /// Set an error to be returned by the next receive() call
        pub fn set_next_rx_error(&self, error: LoraError) {
            *self.next_rx_error.borrow_mut() = Some(error);
        }

        /// Get all transmitted packets
        pub fn get_tx_history(&self) -> StdVec<StdVec<u8>> {
            self.tx_history.borrow().clone()
        }

        /// Transmitted packets decoded as text
        pub fn get_tx_text(&self) -> StdVec<String> {
            self.tx_history
                .borrow()
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect()
        }

        /// Every configuration applied through configure()
        pub fn get_config_history(&self) -> StdVec<ParameterSet> {
            self.config_history.borrow().clone()
        }

        /// Number of receive() calls that returned nothing
        pub fn quiet_receives(&self) -> u32 {
            *self.quiet_receives.borrow()
        }

        /// Check if the radio has been initialised
        pub fn is_initialised(&self) -> bool {
            *self.initialised.borrow()
        }
    }

    impl Default for MockLoraRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LoraRadio for MockLoraRadio {
        async fn init(&mut self) -> Result<(), LoraError> {
            *self.initialised.borrow_mut() = true;
            Ok(())
        }

        async fn transmit(&mut self, data: &[u8]) -> Result<(), LoraError> {
            if let Some(error) = self.next_tx_error.borrow_mut().take() {
                return Err(error);
            }
            if data.is_empty() || data.len() > MAX_LORA_PAYLOAD {
                return Err(LoraError::InvalidConfig);
            }

            self.tx_history.borrow_mut().push(data.to_vec());

            let params = *self.params.borrow();
            if let Some(responder) = self.responder.borrow_mut().as_mut() {
                if let Some(reply) = responder(data, &params) {
                    self.rx_queue.borrow_mut().push_back(reply);
                }
            }

            Ok(())
        }

        async fn receive(&mut self, timeout_ms: u32) -> Result<Option<RxPacket>, LoraError> {
            if let Some(error) = self.next_rx_error.borrow_mut().take() {
                return Err(error);
            }

            // Pop from front (FIFO order)
            match self.rx_queue.borrow_mut().pop_front() {
                Some(packet) => Ok(Some(packet)),
                None => {
                    *self.quiet_receives.borrow_mut() += 1;
                    if let Some(clock) = &self.clock {
                        clock.advance(timeout_ms as u64);
                    }
                    Ok(None)
                }
            }
        }

        async fn configure(&mut self, params: &ParameterSet) -> Result<(), LoraError> {
            *self.params.borrow_mut() = *params;
            self.config_history.borrow_mut().push(*params);
            Ok(())
        }

        fn parameters(&self) -> ParameterSet {
            *self.params.borrow()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_transmit() {
            let mut radio = MockLoraRadio::new();

            // Use a simple blocking executor for testing
            futures::executor::block_on(async {
                radio.init().await.unwrap();

                let data = [0x01, 0x02, 0x03];
                radio.transmit(&data).await.unwrap();

                let history = radio.get_tx_history();
                assert_eq!(history.len(), 1);
                assert_eq!(history[0].as_slice(), &data);
            });
        }

        #[test]
        fn test_mock_receive_queued() {
            let mut radio = MockLoraRadio::new();

            futures::executor::block_on(async {
                radio.queue_rx_text("Hello", 10.0, -50.0);

                let packet = radio.receive(1000).await.unwrap().unwrap();
                assert_eq!(packet.data.as_slice(), b"Hello");
                assert_eq!(packet.rssi, -50.0);
                assert_eq!(packet.snr, 10.0);
            });
        }

        #[test]
        fn test_mock_receive_timeout_advances_clock() {
            let clock = MockClock::new(0);
            let mut radio = MockLoraRadio::with_clock(clock.clone());

            futures::executor::block_on(async {
                let result = radio.receive(1000).await;
                assert_eq!(result, Ok(None));
                assert_eq!(radio.quiet_receives(), 1);
                assert_eq!(clock.elapsed(), 1000);
            });
        }

        #[test]
        fn test_mock_tx_error() {
            let mut radio = MockLoraRadio::new();

            futures::executor::block_on(async {
                radio.set_next_tx_error(LoraError::TransmitFailed);

                let result = radio.transmit(&[0x01]).await;
                assert_eq!(result, Err(LoraError::TransmitFailed));

                // Error should be cleared, next call should succeed
                radio.transmit(&[0x02]).await.unwrap();
            });
        }

        #[test]
        fn test_mock_responder() {
            let mut radio = MockLoraRadio::new();
            radio.set_responder(Box::new(|data: &[u8], _params: &ParameterSet| {
                (data == b"PING").then(|| RxPacket::new(b"PONG", 5.0, -80.0))
            }));

            futures::executor::block_on(async {
                radio.transmit(b"PING").await.unwrap();
                radio.transmit(b"other").await.unwrap();

                let reply = radio.receive(100).await.unwrap().unwrap();
                assert_eq!(reply.data.as_slice(), b"PONG");
                assert_eq!(radio.receive(100).await, Ok(None));
            });
        }
    }
}
