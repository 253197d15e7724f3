//! Destinations for mission observations

use crate::mission::state::MissionSummary;
use crate::report::serialiser::ReportSerialiser;
use crate::report::types::{Observation, Report};
use std::io::{self, Write};

/// Persistence collaborator fed by the mission loops
///
/// Sink failures never end a mission; the loops log them and carry on.
pub trait ObservationSink {
    fn record(&mut self, observation: &Observation) -> io::Result<()>;

    /// Called once with the frozen counters when the mission ends
    fn finish(&mut self, summary: &MissionSummary) -> io::Result<()>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ObservationSink for NullSink {
    fn record(&mut self, _observation: &Observation) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _summary: &MissionSummary) -> io::Result<()> {
        Ok(())
    }
}

const CSV_HEADER: &str = "Timestamp,Packet Number,SF,CR,Bandwidth,TX Power,SNR,RSSI,Packet Data";

/// Results table, one row per observation
///
/// Decision and sync rows carry their note in the `Packet Data` column.
pub struct CsvSink<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{}", CSV_HEADER)?;
            self.header_written = true;
        }
        Ok(())
    }
}

/// Quote a field when it contains a separator, quote or line break
fn csv_field(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\"")).into()
    } else {
        text.into()
    }
}

impl<W: Write> ObservationSink for CsvSink<W> {
    fn record(&mut self, observation: &Observation) -> io::Result<()> {
        self.write_header()?;

        let params = &observation.params;
        let text = observation.payload_text();
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{}",
            observation.timestamp_ms,
            observation.sequence,
            params.spreading_factor,
            params.coding_rate,
            params.bandwidth_hz,
            params.tx_power_dbm,
            observation.snr,
            observation.rssi,
            csv_field(&text)
        )
    }

    fn finish(&mut self, _summary: &MissionSummary) -> io::Result<()> {
        self.write_header()?;
        self.writer.flush()
    }
}

/// Binary report stream for a host on the other end of a serial line
pub struct FramedSink<W: Write> {
    writer: W,
    serialiser: ReportSerialiser,
}

impl<W: Write> FramedSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            serialiser: ReportSerialiser::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, report: &Report) -> io::Result<()> {
        let frame = self.serialiser.serialise(report);
        self.writer.write_all(&frame)
    }
}

impl<W: Write> ObservationSink for FramedSink<W> {
    fn record(&mut self, observation: &Observation) -> io::Result<()> {
        self.send(&Report::Observation(observation.clone()))
    }

    fn finish(&mut self, summary: &MissionSummary) -> io::Result<()> {
        self.send(&Report::Summary(*summary))?;
        self.writer.flush()
    }
}

impl<S: ObservationSink + ?Sized> ObservationSink for &mut S {
    fn record(&mut self, observation: &Observation) -> io::Result<()> {
        (**self).record(observation)
    }

    fn finish(&mut self, summary: &MissionSummary) -> io::Result<()> {
        (**self).finish(summary)
    }
}
