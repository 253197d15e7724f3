//! Parameter renegotiation handshake
//!
//! The transmitter proposes new modulation with `SYNC` while still on the
//! old configuration and only switches after a `READY`. The receiver
//! answers `READY` on the configuration the proposal arrived on and then
//! switches immediately.
//!
//! ```text
//! Proposing -> AwaitingAck -> Confirmed
//!                          -> TimedOut   (after max_attempts)
//! any state  -> Terminated  (TERMINATE sent or received)
//! ```

use crate::adr::ParameterSet;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::lora::traits::{LoraError, LoraRadio};
use crate::protocol::message::{Incoming, SyncMessage};

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Proposing,
    AwaitingAck,
    Confirmed,
    TimedOut,
    Terminated,
}

/// How a handshake ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Peer adopted the proposal; the local radio now runs it
    Confirmed { attempts: u8 },
    /// Retry budget exhausted; the local radio still runs the old parameters
    TimedOut { attempts: u8 },
    /// Peer ended the mission during the handshake
    Terminated,
}

/// Transmitter side of the handshake
#[derive(Debug, Clone)]
pub struct SyncInitiator {
    config: SyncConfig,
    state: SyncState,
}

impl SyncInitiator {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Propose `proposal` to the peer and switch to it once confirmed
    ///
    /// Each attempt re-sends the proposal and listens for `READY` for up to
    /// `reply_timeout_ms`. Only transmit and configure failures are errors.
    pub async fn propose<R: LoraRadio, C: Clock>(
        &mut self,
        radio: &mut R,
        clock: &mut C,
        proposal: &ParameterSet,
    ) -> Result<SyncOutcome, LoraError> {
        let message = SyncMessage::proposal(proposal);
        let encoded = message.encode();

        for attempt in 1..=self.config.max_attempts {
            self.state = SyncState::Proposing;
            radio.transmit(encoded.as_bytes()).await?;
            log::info!(
                "Sent sync (attempt {}/{}): BW={}, CR={}, SF={}",
                attempt,
                self.config.max_attempts,
                proposal.bandwidth_hz,
                proposal.coding_rate,
                proposal.spreading_factor
            );

            self.state = SyncState::AwaitingAck;
            match self.await_ready(radio, clock).await {
                Some(SyncMessage::Ready) => {
                    radio.configure(proposal).await?;
                    self.state = SyncState::Confirmed;
                    log::info!("Receiver synchronized after {} attempt(s)", attempt);
                    return Ok(SyncOutcome::Confirmed { attempts: attempt });
                }
                Some(SyncMessage::Terminate) => {
                    self.state = SyncState::Terminated;
                    log::info!("Received termination signal during sync");
                    return Ok(SyncOutcome::Terminated);
                }
                _ => {}
            }

            if attempt < self.config.max_attempts {
                clock.delay_ms(self.config.retry_delay_ms).await;
            }
        }

        self.state = SyncState::TimedOut;
        log::warn!(
            "Failed to synchronize with receiver after {} attempts, keeping previous parameters",
            self.config.max_attempts
        );
        Ok(SyncOutcome::TimedOut {
            attempts: self.config.max_attempts,
        })
    }

    /// Listen until READY/TERMINATE arrives or the reply window closes
    async fn await_ready<R: LoraRadio, C: Clock>(
        &self,
        radio: &mut R,
        clock: &mut C,
    ) -> Option<SyncMessage> {
        let deadline = clock.now_ms() + self.config.reply_timeout_ms as u64;

        loop {
            let remaining = deadline.saturating_sub(clock.now_ms());
            if remaining == 0 {
                return None;
            }

            match radio.receive(remaining as u32).await {
                Ok(Some(packet)) => match Incoming::classify(&packet.data) {
                    Incoming::Control(message @ (SyncMessage::Ready | SyncMessage::Terminate)) => {
                        return Some(message);
                    }
                    other => {
                        log::debug!("Ignoring {:?} while awaiting READY", other);
                    }
                },
                Ok(None) => return None,
                Err(e) => {
                    log::warn!("Receive error while awaiting READY: {}", e);
                    return None;
                }
            }
        }
    }

    /// Announce the end of the mission
    pub async fn terminate<R: LoraRadio, C: Clock>(
        &mut self,
        radio: &mut R,
        clock: &mut C,
    ) -> Result<(), LoraError> {
        let encoded = SyncMessage::Terminate.encode();
        for repeat in 0..self.config.terminate_repeats {
            if repeat > 0 {
                clock.delay_ms(self.config.terminate_spacing_ms).await;
            }
            radio.transmit(encoded.as_bytes()).await?;
        }
        self.state = SyncState::Terminated;
        Ok(())
    }
}

/// What the receiver should do after a control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderAction {
    /// Proposal acknowledged; the radio runs these parameters now
    Adopted(ParameterSet),
    /// Proposal acknowledged, parameters were already in use
    AlreadyActive,
    /// Leave the mission loop
    Terminate,
    /// Nothing to do (stray READY)
    Ignored,
}

/// Receiver side of the handshake
///
/// After adopting a proposal the previous parameters are kept as a
/// fallback. If the link stays silent for `revert_after_silent_polls`
/// polls the responder flips to the other candidate, covering both a lost
/// `READY` (transmitter stayed on the old set) and a transmitter that did
/// switch. Hearing any packet settles on the active set.
#[derive(Debug, Clone)]
pub struct SyncResponder {
    state: SyncState,
    fallback: Option<ParameterSet>,
    silent_polls: u8,
    revert_after_silent_polls: u8,
}

impl SyncResponder {
    pub fn new(revert_after_silent_polls: u8) -> Self {
        Self {
            state: SyncState::Idle,
            fallback: None,
            silent_polls: 0,
            revert_after_silent_polls,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Parameters the responder would fall back to, if a switch is unconfirmed
    pub fn fallback(&self) -> Option<ParameterSet> {
        self.fallback
    }

    /// React to a control message received from the transmitter
    pub async fn handle<R: LoraRadio>(
        &mut self,
        radio: &mut R,
        message: SyncMessage,
    ) -> Result<ResponderAction, LoraError> {
        match message {
            SyncMessage::Sync { .. } => {
                let current = radio.parameters();

                // Reply on the configuration the proposal arrived on
                radio.transmit(SyncMessage::Ready.encode().as_bytes()).await?;

                self.state = SyncState::Confirmed;
                self.silent_polls = 0;

                let Some(proposed) = message.apply_to(&current) else {
                    return Ok(ResponderAction::Ignored);
                };
                if proposed.same_modulation(&current) {
                    log::info!("Responded to sync request (parameters unchanged)");
                    return Ok(ResponderAction::AlreadyActive);
                }

                radio.configure(&proposed).await?;
                self.fallback = Some(current);
                log::info!(
                    "Responded to sync request, applied SF={}, CR={}, BW={}",
                    proposed.spreading_factor,
                    proposed.coding_rate,
                    proposed.bandwidth_hz
                );
                Ok(ResponderAction::Adopted(proposed))
            }
            SyncMessage::Terminate => {
                self.state = SyncState::Terminated;
                log::info!("Received termination signal");
                Ok(ResponderAction::Terminate)
            }
            SyncMessage::Ready => {
                log::warn!("Unexpected READY on receiver side");
                Ok(ResponderAction::Ignored)
            }
        }
    }

    /// A packet was heard on the active parameters
    pub fn on_traffic(&mut self) {
        self.fallback = None;
        self.silent_polls = 0;
    }

    /// A receive poll ended without a packet
    ///
    /// Returns the parameters switched to when the silence limit is hit
    /// with an unconfirmed switch outstanding.
    pub async fn on_silence<R: LoraRadio>(
        &mut self,
        radio: &mut R,
    ) -> Result<Option<ParameterSet>, LoraError> {
        let Some(fallback) = self.fallback else {
            return Ok(None);
        };
        if self.revert_after_silent_polls == 0 {
            return Ok(None);
        }

        self.silent_polls += 1;
        if self.silent_polls < self.revert_after_silent_polls {
            return Ok(None);
        }

        let active = radio.parameters();
        radio.configure(&fallback).await?;
        self.fallback = Some(active);
        self.silent_polls = 0;
        log::warn!(
            "No traffic after parameter change, switching to SF={}, CR={}, BW={}",
            fallback.spreading_factor,
            fallback.coding_rate,
            fallback.bandwidth_hz
        );
        Ok(Some(fallback))
    }
}
