//! Modbus Meter Frame Pipeline
//!
//! This module provides the leaf components of the meter sniffer:
//! - CRC-16 (Modbus) computation
//! - Line-oriented frame assembly from arbitrary byte chunks
//! - Hex-text frame decoding, classification and session tracking
//! - Holding-register decoding into physical measurements
//!
//! # Architecture
//!
//! ```text
//! raw bytes
//!     └── FrameAssembler (LF-terminated RawFrame, CR dropped)
//!           └── FrameDecoder (hex pairing, Request | Response | Unrecognized, CRC)
//!                 └── RegisterBank → MeasurementRecord
//! ```
//!
//! The record writer and the serial port live in `metersrv`.

mod assembler;
mod crc;
mod frame;
mod measurement;
mod registers;

pub use assembler::{AssemblerStats, FrameAssembler, RawFrame, DEFAULT_MAX_FRAME_LEN};
pub use crc::{compute as crc16_range, crc16};
pub use frame::{
    decode_hex, DecodeOutcome, DecodedFrame, DecoderConfig, DecoderStats, FrameDecoder, FrameKind,
    HexDecoded, Session,
};
pub use measurement::MeasurementRecord;
pub use registers::{
    decode_details, decode_measurements, signed16, signed32, unsigned32, LoadCharacter,
    MeterDetails, MeterValues, RegisterBank, DETAIL_REGISTERS, REQUIRED_REGISTERS,
};

// ============================================================================
// Frame layout constants
// ============================================================================

/// Text prefix of every read-holding-registers frame (slave 1, FC03)
pub const READ_HOLDING_PREFIX: &str = "0103";

/// Text prefix of the meter's response (slave 1, FC03, byte count 0x76)
pub const RESPONSE_PREFIX: &str = "010376";

/// Text lengths of a read request (with and without trailing pad byte)
pub const REQUEST_TEXT_LENGTHS: [usize; 2] = [16, 18];

/// Shortest response text that carries the full register map
pub const MIN_RESPONSE_TEXT_LEN: usize = 246;

/// Byte offset of the first register word in a response (addr, fc, byte count)
pub const RESPONSE_HEADER_BYTES: usize = 3;

/// Trailing CRC bytes of every RTU frame
pub const CRC_BYTES: usize = 2;

/// Policy applied when a response frame fails its CRC check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcPolicy {
    /// Log the mismatch and keep the frame's data
    #[default]
    LogOnly,
    /// Drop the frame
    Reject,
}
