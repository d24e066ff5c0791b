//! Ingest pipeline: raw bytes → frames → records → record sink
//!
//! Every chunk is drained synchronously: all frames it completes are decoded
//! and written before `ingest` returns, in arrival order.

use std::fmt;

use chrono::{DateTime, Local};
use tracing::{debug, error};
use voltage_protocols::modbus::{FrameAssembler, FrameDecoder, MeasurementRecord, RawFrame};

use crate::config::MeterConfig;
use crate::record::RecordSink;

/// Counters over the whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub chunks: u64,
    pub bytes: u64,
    pub frames: u64,
    pub requests: u64,
    pub records: u64,
    pub unrecognized: u64,
    /// Responses whose CRC failed, kept or rejected
    pub crc_mismatches: u64,
    /// Responses dropped by CRC policy, hex error limit or short register bank
    pub rejected: u64,
    pub hex_errors: u64,
    pub overflows: u64,
    pub write_failures: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunks={} bytes={} frames={} requests={} records={} unrecognized={} \
             crc_mismatches={} rejected={} hex_errors={} overflows={} write_failures={}",
            self.chunks,
            self.bytes,
            self.frames,
            self.requests,
            self.records,
            self.unrecognized,
            self.crc_mismatches,
            self.rejected,
            self.hex_errors,
            self.overflows,
            self.write_failures
        )
    }
}

/// Assembler, decoder and sink for one sniffed bus
pub struct MeterPipeline<S> {
    assembler: FrameAssembler,
    decoder: FrameDecoder,
    sink: S,
    chunks: u64,
    write_failures: u64,
}

impl<S: RecordSink> MeterPipeline<S> {
    pub fn new(config: &MeterConfig, sink: S) -> Self {
        Self::with_parts(
            FrameAssembler::with_max_frame_len(config.assembler.max_frame_len),
            FrameDecoder::new(config.decoder.clone()),
            sink,
        )
    }

    pub fn with_parts(assembler: FrameAssembler, decoder: FrameDecoder, sink: S) -> Self {
        Self {
            assembler,
            decoder,
            sink,
            chunks: 0,
            write_failures: 0,
        }
    }

    /// Process one chunk with records stamped at the current local time.
    /// Returns the number of records written.
    pub fn ingest(&mut self, chunk: &[u8]) -> usize {
        self.ingest_at(chunk, Local::now())
    }

    /// Process one chunk with every record stamped `timestamp`
    pub fn ingest_at(&mut self, chunk: &[u8], timestamp: DateTime<Local>) -> usize {
        self.chunks += 1;
        let mut written = 0;
        for frame in self.assembler.feed(chunk) {
            if self.handle_frame(&frame, timestamp) {
                written += 1;
            }
        }
        written
    }

    fn handle_frame(&mut self, frame: &RawFrame, timestamp: DateTime<Local>) -> bool {
        // anomalies are reported by the decoder on the frame_diag target
        let Ok(record) = self.decoder.decode_at(frame, timestamp) else {
            return false;
        };

        log_details(&record);

        match self.sink.append(&record) {
            Ok(path) => {
                debug!(
                    "Record {} written to {}",
                    record.timestamp.format("%H:%M:%S"),
                    path.display()
                );
                true
            },
            Err(e) => {
                self.write_failures += 1;
                error!("Record write failed: {}", e);
                false
            },
        }
    }

    /// Drop a partially assembled frame; returns its length
    pub fn discard_partial(&mut self) -> usize {
        let pending = self.assembler.pending_len();
        self.assembler.reset();
        pending
    }

    pub fn stats(&self) -> PipelineStats {
        let assembler = self.assembler.stats();
        let decoder = self.decoder.stats();
        PipelineStats {
            chunks: self.chunks,
            bytes: assembler.bytes,
            frames: assembler.frames,
            requests: decoder.requests,
            records: decoder.records,
            unrecognized: decoder.unrecognized,
            crc_mismatches: decoder.crc_mismatches,
            rejected: decoder.rejected,
            hex_errors: decoder.hex_errors,
            overflows: assembler.overflows,
            write_failures: self.write_failures,
        }
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Extended register map values, not part of the record file
fn log_details(record: &MeasurementRecord) {
    let Some(d) = &record.details else {
        return;
    };
    debug!(
        "U={:5.1}/{:5.1}/{:5.1}V U12/23/31={:5.1}/{:5.1}/{:5.1}V I={:6.3}/{:6.3}/{:6.3}A \
         PF={:5.2} ({:?}) PF1-3={:5.2}/{:5.2}/{:5.2} Q1-3={:6.2}/{:6.2}/{:6.2}var f={:4.1}Hz",
        d.voltage_v[0],
        d.voltage_v[1],
        d.voltage_v[2],
        d.line_voltage_v[0],
        d.line_voltage_v[1],
        d.line_voltage_v[2],
        d.current_a[0],
        d.current_a[1],
        d.current_a[2],
        d.power_factor,
        d.load,
        d.phase_power_factor[0],
        d.phase_power_factor[1],
        d.phase_power_factor[2],
        d.phase_reactive_var[0],
        d.phase_reactive_var[1],
        d.phase_reactive_var[2],
        record.values.frequency_hz
    );
}
