//! Transmitter role: sends data, drives the decision engine and proposes changes

use crate::adr::{AdrEngine, Decision, LinkQualityHistory, ParameterSet};
use crate::clock::Clock;
use crate::config::{mission::DATA_LABEL, MissionConfig};
use crate::lora::traits::{LoraRadio, RxPacket};
use crate::mission::state::{MissionState, MissionSummary, Role, TerminationReason};
use crate::mission::{finish, record, MissionError};
use crate::protocol::message::{encode_data, Incoming, SyncMessage};
use crate::protocol::sync::{SyncInitiator, SyncOutcome};
use crate::report::{Observation, ObservationKind, ObservationSink};

/// What the ack window heard
enum AckResult {
    Acked(RxPacket),
    Missing,
    Terminated,
}

/// Run the transmitter mission until its budget runs out or the peer terminates
pub async fn run_transmitter<R, C, S>(
    radio: &mut R,
    clock: &mut C,
    sink: &mut S,
    config: &MissionConfig,
) -> Result<MissionSummary, MissionError>
where
    R: LoraRadio,
    C: Clock,
    S: ObservationSink,
{
    radio.init().await.map_err(|e| {
        log::error!("Radio init failed: {}", e);
        MissionError::Radio(e)
    })?;

    let mut state = MissionState::new(Role::Transmitter, clock.now_ms());
    let mut history: LinkQualityHistory = LinkQualityHistory::new();
    let engine = AdrEngine::new(&config.adr);
    let mut initiator = SyncInitiator::new(config.sync.clone());

    log::info!(
        "Transmitter mission started: {} packets max, {} ms max",
        config.max_packets,
        config.duration_ms
    );

    if config.initial_sync {
        let initial = radio.parameters();
        match initiator.propose(radio, clock, &initial).await? {
            SyncOutcome::Confirmed { .. } => state.syncs_confirmed += 1,
            SyncOutcome::TimedOut { .. } => {
                log::error!("Initial parameter sync failed, aborting mission");
                return Err(MissionError::InitialSyncFailed);
            }
            SyncOutcome::Terminated => {
                let summary =
                    state.summary(clock.now_ms(), radio.parameters(), TerminationReason::TerminateReceived);
                finish(sink, &summary);
                return Ok(summary);
            }
        }
    }

    let reason = loop {
        if state.elapsed_ms(clock.now_ms()) >= config.duration_ms {
            break TerminationReason::DurationElapsed;
        }
        if state.packets_sent >= config.max_packets {
            break TerminationReason::PacketLimit;
        }

        if state.packets_sent > 0 && state.packets_sent % config.reevaluate_every.max(1) == 0 {
            let current = radio.parameters();
            let decision = engine.decide(&history, &current, config.velocity, config.adr.ack_enabled);
            record(sink, &decision_observation(clock.now_ms(), state.packets_sent, &current, &decision, &history));

            if decision.is_change(&current) {
                match initiator.propose(radio, clock, &decision.params).await? {
                    SyncOutcome::Confirmed { attempts } => {
                        state.syncs_confirmed += 1;
                        // Samples describe the previous modulation
                        history.clear();
                        record(
                            sink,
                            &Observation::event(
                                ObservationKind::Sync,
                                clock.now_ms(),
                                state.packets_sent,
                                decision.params,
                                0.0,
                                0.0,
                                if attempts > 1 { "confirmed after retries" } else { "confirmed" },
                            ),
                        );
                    }
                    SyncOutcome::TimedOut { .. } => state.syncs_failed += 1,
                    SyncOutcome::Terminated => break TerminationReason::TerminateReceived,
                }
            }
        }

        let sequence = state.packets_sent + 1;
        let payload = encode_data(DATA_LABEL, sequence, clock.now_ms());
        if let Err(e) = radio.transmit(payload.as_bytes()).await {
            log::error!("Transmit failed for packet {}: {}", sequence, e);
            return Err(MissionError::Radio(e));
        }
        state.packets_sent = sequence;
        log::debug!("Sent packet {}", sequence);

        if config.adr.ack_enabled {
            match await_ack(radio, clock, sequence, config.ack_window_ms).await {
                AckResult::Acked(packet) => {
                    state.packets_received += 1;
                    // Rejected samples are logged by the history
                    let _ = history.record_sample(packet.snr, packet.rssi);
                    record(
                        sink,
                        &Observation::received(clock.now_ms(), sequence, radio.parameters(), &packet, None),
                    );
                }
                AckResult::Missing => {
                    state.packets_dropped += 1;
                    log::debug!("No acknowledgment for packet {}", sequence);
                }
                AckResult::Terminated => break TerminationReason::TerminateReceived,
            }
        }

        clock.delay_ms(config.packet_interval_ms).await;
    };

    if reason != TerminationReason::TerminateReceived {
        if let Err(e) = initiator.terminate(radio, clock).await {
            log::warn!("Failed to send termination signal: {}", e);
        }
    }

    let summary = state.summary(clock.now_ms(), radio.parameters(), reason);
    finish(sink, &summary);
    Ok(summary)
}

/// Listen for `ACK|sequence` until the window closes
async fn await_ack<R: LoraRadio, C: Clock>(
    radio: &mut R,
    clock: &mut C,
    sequence: u32,
    window_ms: u32,
) -> AckResult {
    let deadline = clock.now_ms() + window_ms as u64;

    loop {
        let remaining = deadline.saturating_sub(clock.now_ms());
        if remaining == 0 {
            return AckResult::Missing;
        }

        match radio.receive(remaining as u32).await {
            Ok(Some(packet)) => match Incoming::classify(&packet.data) {
                Incoming::Data(data) if data.is_ack() && data.sequence == Some(sequence) => {
                    return AckResult::Acked(packet);
                }
                Incoming::Control(SyncMessage::Terminate) => {
                    log::info!("Received termination signal");
                    return AckResult::Terminated;
                }
                other => log::debug!("Ignoring {:?} while awaiting ACK {}", other, sequence),
            },
            Ok(None) => return AckResult::Missing,
            Err(e) => {
                log::warn!("Receive error while awaiting ACK {}: {}", sequence, e);
                return AckResult::Missing;
            }
        }
    }
}

fn decision_observation<const N: usize>(
    now_ms: u64,
    sequence: u32,
    current: &ParameterSet,
    decision: &Decision,
    history: &LinkQualityHistory<N>,
) -> Observation {
    let note = match (decision.margin, decision.fault) {
        (Some(margin), _) => format!("{:?} margin={:.2}dB", decision.adjustment, margin.margin_db),
        (None, Some(fault)) => format!("Hold ({})", fault),
        (None, None) => "Hold (adaptation disabled)".to_string(),
    };
    let (snr, rssi) = history
        .snr_stats()
        .zip(history.rssi_stats())
        .map(|(snr, rssi)| (snr.mean, rssi.mean))
        .unwrap_or((0.0, 0.0));

    log::debug!("Decision at packet {} from SF{}: {}", sequence, current.spreading_factor, note);
    Observation::event(ObservationKind::Decision, now_ms, sequence, decision.params, snr, rssi, &note)
}
