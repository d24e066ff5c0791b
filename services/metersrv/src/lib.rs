//! metersrv - passive Modbus-RTU meter sniffer
//!
//! Listens to the hex-line output of a bus sniffer attached to a Fronius
//! Smart Meter, decodes the meter's register responses and appends one CSV
//! row per response to a file per local calendar day.
//!
//! ```text
//! serial port / replay file
//!     └── run_stream (chunk by chunk)
//!           └── MeterPipeline (FrameAssembler → FrameDecoder)
//!                 └── DailyRecordWriter
//! ```

pub mod bootstrap;
pub mod config;
pub mod pipeline;
pub mod record;
pub mod runtime;

pub use config::MeterConfig;
pub use pipeline::{MeterPipeline, PipelineStats};
pub use record::{DailyRecordWriter, RecordSink};
pub use runtime::{run_stream, StreamEnd};
