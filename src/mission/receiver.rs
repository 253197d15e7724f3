//! Receiver role: records traffic, follows proposals, acknowledges data

use crate::adr::LinkQualityHistory;
use crate::clock::Clock;
use crate::config::MissionConfig;
use crate::lora::traits::LoraRadio;
use crate::mission::state::{MissionState, MissionSummary, Role, TerminationReason};
use crate::mission::{finish, record, MissionError};
use crate::protocol::message::{encode_ack, Incoming};
use crate::protocol::sync::{ResponderAction, SyncResponder};
use crate::report::{Observation, ObservationKind, ObservationSink};

/// Run the receiver mission until TERMINATE arrives or a budget runs out
///
/// Every poll blocks for at most `rx_poll_ms`, so a TERMINATE ends the
/// loop within one polling cycle.
pub async fn run_receiver<R, C, S>(
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

    let mut state = MissionState::new(Role::Receiver, clock.now_ms());
    let mut history: LinkQualityHistory = LinkQualityHistory::new();
    let mut responder = SyncResponder::new(config.revert_after_silent_polls);

    log::info!("Receiver mission started, polling every {} ms", config.rx_poll_ms);

    let reason = loop {
        if state.elapsed_ms(clock.now_ms()) >= config.duration_ms {
            break TerminationReason::DurationElapsed;
        }
        if state.packets_received >= config.max_packets {
            break TerminationReason::PacketLimit;
        }

        let packet = match radio.receive(config.rx_poll_ms).await {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                state.packets_dropped += 1;
                log::warn!("No packet received in timeout window");
                if let Some(params) = responder.on_silence(radio).await? {
                    record(
                        sink,
                        &Observation::event(
                            ObservationKind::Sync,
                            clock.now_ms(),
                            state.packets_received,
                            params,
                            0.0,
                            0.0,
                            "switched after silence",
                        ),
                    );
                }
                continue;
            }
            Err(e) => {
                state.packets_dropped += 1;
                log::warn!("Packet receive error: {}", e);
                continue;
            }
        };

        responder.on_traffic();

        match Incoming::classify(&packet.data) {
            Incoming::Control(message) => match responder.handle(radio, message).await? {
                ResponderAction::Adopted(params) => {
                    state.syncs_confirmed += 1;
                    history.clear();
                    record(
                        sink,
                        &Observation::event(
                            ObservationKind::Sync,
                            clock.now_ms(),
                            state.packets_received,
                            params,
                            packet.snr,
                            packet.rssi,
                            "adopted",
                        ),
                    );
                }
                ResponderAction::Terminate => break TerminationReason::TerminateReceived,
                ResponderAction::AlreadyActive | ResponderAction::Ignored => {}
            },
            Incoming::Data(data) => {
                state.packets_received += 1;
                let now = clock.now_ms();
                let sequence = data.sequence.unwrap_or(state.packets_received);
                let _ = history.record_sample(packet.snr, packet.rssi);

                record(
                    sink,
                    &Observation::received(now, sequence, radio.parameters(), &packet, data.latency_ms(now)),
                );
                log::debug!(
                    "Received packet {} (RSSI: {}, SNR: {})",
                    state.packets_received,
                    packet.rssi,
                    packet.snr
                );

                if config.adr.ack_enabled {
                    if let Some(seq) = data.sequence {
                        radio.transmit(encode_ack(seq).as_bytes()).await?;
                        state.packets_sent += 1;
                    }
                }
            }
        }
    };

    if let (Some(snr), Some(rssi)) = (history.snr_stats(), history.rssi_stats()) {
        log::info!(
            "Link quality over last {} packets: SNR mean {:.1} dB (min {:.1}), RSSI mean {:.1} dBm (min {:.1})",
            history.len(),
            snr.mean,
            snr.min,
            rssi.mean,
            rssi.min
        );
    }

    let summary = state.summary(clock.now_ms(), radio.parameters(), reason);
    finish(sink, &summary);
    Ok(summary)
}
