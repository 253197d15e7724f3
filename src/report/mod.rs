//! Observation records and the sinks that persist them

pub mod decoder;
pub mod serialiser;
pub mod sink;
pub mod types;

pub use decoder::ReportDecoder;
pub use serialiser::ReportSerialiser;
pub use sink::{CsvSink, FramedSink, NullSink, ObservationSink};
pub use types::{Observation, ObservationKind, Report, ReportError, ReportId};
