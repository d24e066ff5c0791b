//! Frame decoding and classification
//!
//! A sniffed line is either the master's read request (which tells us where
//! the next response starts and how many registers it carries) or the meter's
//! response. The decoder owns that request/response session state.
//!
//! Decoding is tolerant: malformed hex pairs become zero bytes and are counted,
//! a CRC mismatch is reported according to [`CrcPolicy`], and no frame can stop
//! the stream. Every anomalous frame yields exactly one `frame_diag` event.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::assembler::RawFrame;
use super::crc;
use super::measurement::MeasurementRecord;
use super::registers::{decode_details, decode_measurements, RegisterBank, REQUIRED_REGISTERS};
use super::{
    CrcPolicy, CRC_BYTES, MIN_RESPONSE_TEXT_LEN, READ_HOLDING_PREFIX, REQUEST_TEXT_LENGTHS,
    RESPONSE_HEADER_BYTES, RESPONSE_PREFIX,
};

// ============================================================================
// Hex pairing
// ============================================================================

/// Bytes recovered from hex text plus the count of pairs that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HexDecoded {
    pub bytes: Vec<u8>,
    pub errors: usize,
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Pair consecutive hex characters into bytes.
///
/// The result always holds `text.len() / 2` bytes. A pair with a non-hex
/// character contributes `0x00` and one error; an odd trailing character
/// contributes one error and no byte.
pub fn decode_hex(text: &str) -> HexDecoded {
    let raw = text.as_bytes();
    let mut decoded = HexDecoded {
        bytes: Vec::with_capacity(raw.len() / 2),
        errors: 0,
    };

    for pair in raw.chunks(2) {
        match pair {
            [hi, lo] => match (hex_nibble(*hi), hex_nibble(*lo)) {
                (Some(hi), Some(lo)) => decoded.bytes.push((hi << 4) | lo),
                _ => {
                    decoded.errors += 1;
                    decoded.bytes.push(0);
                },
            },
            _ => decoded.errors += 1,
        }
    }

    decoded
}

fn parse_hex_u16(text: &[u8], offset: usize) -> Option<u16> {
    let field = text.get(offset..offset.checked_add(4)?)?;
    field.iter().try_fold(0u16, |acc, &c| {
        hex_nibble(c).map(|nibble| (acc << 4) | u16::from(nibble))
    })
}

// ============================================================================
// Decoded frame
// ============================================================================

/// Binary view of one frame: `[address, function, payload.., crc_lo, crc_hi]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    bytes: Vec<u8>,
    hex_errors: usize,
}

impl DecodedFrame {
    pub fn from_hex(text: &str) -> Self {
        let HexDecoded { bytes, errors } = decode_hex(text);
        Self {
            bytes,
            hex_errors: errors,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hex_errors(&self) -> usize {
        self.hex_errors
    }

    pub fn slave_address(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn function_code(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// CRC carried in the last two bytes (transmitted low byte first)
    pub fn received_crc(&self) -> Option<u16> {
        let n = self.bytes.len();
        if n < CRC_BYTES {
            return None;
        }
        Some(u16::from_le_bytes([self.bytes[n - 2], self.bytes[n - 1]]))
    }

    /// CRC over everything except the trailing CRC bytes
    pub fn computed_crc(&self) -> u16 {
        crc::compute(&self.bytes, 0, self.bytes.len().saturating_sub(CRC_BYTES))
    }

    pub fn crc_valid(&self) -> bool {
        self.received_crc() == Some(self.computed_crc())
    }

    /// Register words of a read-holding-registers response.
    ///
    /// Takes `quantity` words after the 3-byte header, limited to the bytes
    /// present (the trailing CRC is not excluded, matching the meter's 60-word
    /// read of a 59-word answer).
    pub fn registers(&self, quantity: u16) -> RegisterBank {
        let start = RESPONSE_HEADER_BYTES.min(self.bytes.len());
        let end = (start + usize::from(quantity) * 2).min(self.bytes.len());
        RegisterBank::from_be_bytes(&self.bytes[start..end])
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Remembered fields of the most recent read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub start_address: u16,
    pub quantity: u16,
}

/// Shape of a sniffed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request(Session),
    Response(Session),
    Unrecognized(&'static str),
}

/// Decoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub crc_policy: CrcPolicy,
    /// Reject a frame once this many hex pairs failed; unset tolerates any count
    pub max_hex_errors: Option<usize>,
    /// Hex-character offset of the start address in a request frame.
    /// Defaults to 4, right after `0103`; set 6 for sniffers that print a pad byte first.
    pub request_start_offset: usize,
    /// Hex-character offset of the register quantity in a request frame.
    /// Defaults to 8; the padded layout uses 10.
    pub request_quantity_offset: usize,
    pub min_response_len: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            crc_policy: CrcPolicy::LogOnly,
            max_hex_errors: None,
            request_start_offset: 4,
            request_quantity_offset: 8,
            min_response_len: MIN_RESPONSE_TEXT_LEN,
        }
    }
}

/// Why a frame did not produce a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeOutcome {
    #[error("Read request: start address {start_address}, quantity {quantity}")]
    Request { start_address: u16, quantity: u16 },

    #[error("Unrecognized frame ({reason}), length {len}")]
    Unrecognized {
        len: usize,
        text: String,
        reason: &'static str,
    },

    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    ChecksumMismatch { computed: u16, received: u16 },

    #[error("Too many malformed hex pairs: {errors} (limit {limit})")]
    TooManyHexErrors { errors: usize, limit: usize },

    #[error("Register bank too short: {available} registers, {required} required")]
    ShortRegisterBank { available: usize, required: usize },
}

impl DecodeOutcome {
    /// Whether this outcome must be surfaced as a frame diagnostic
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Self::Request { .. })
    }
}

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub requests: u64,
    pub records: u64,
    pub unrecognized: u64,
    pub crc_mismatches: u64,
    pub rejected: u64,
    pub hex_errors: u64,
}

// ============================================================================
// Frame decoder
// ============================================================================

/// Stateful decoder for one sniffed bus
#[derive(Debug, Default)]
pub struct FrameDecoder {
    config: DecoderConfig,
    session: Option<Session>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            session: None,
            stats: DecoderStats::default(),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Classify frame text against the current session
    pub fn classify(&self, text: &str) -> FrameKind {
        let raw = text.as_bytes();

        if !text.starts_with(READ_HOLDING_PREFIX) {
            return FrameKind::Unrecognized("not a read-holding-registers frame");
        }

        if REQUEST_TEXT_LENGTHS.contains(&raw.len()) {
            let start = parse_hex_u16(raw, self.config.request_start_offset);
            let quantity = parse_hex_u16(raw, self.config.request_quantity_offset);
            return match (start, quantity) {
                (Some(start_address), Some(quantity)) => FrameKind::Request(Session {
                    start_address,
                    quantity,
                }),
                _ => FrameKind::Unrecognized("malformed request fields"),
            };
        }

        if raw.len() < self.config.min_response_len || !text.starts_with(RESPONSE_PREFIX) {
            return FrameKind::Unrecognized("unexpected length or prefix");
        }

        match self.session {
            Some(session) => FrameKind::Response(session),
            None => FrameKind::Unrecognized("response before any request"),
        }
    }

    /// Decode a frame stamped with the current local time
    pub fn decode(&mut self, frame: &RawFrame) -> Result<MeasurementRecord, DecodeOutcome> {
        self.decode_at(frame, Local::now())
    }

    /// Decode a frame; an accepted response becomes a record stamped `timestamp`.
    ///
    /// Given the same session state, the same frame and timestamp always give
    /// the same result.
    pub fn decode_at(
        &mut self,
        frame: &RawFrame,
        timestamp: DateTime<Local>,
    ) -> Result<MeasurementRecord, DecodeOutcome> {
        self.stats.frames += 1;
        let decoded = DecodedFrame::from_hex(frame.as_str());
        let hex_errors = decoded.hex_errors();
        self.stats.hex_errors += hex_errors as u64;
        trace!(
            "Frame CRC: computed 0x{:04X}, {} bytes, {} hex errors",
            decoded.computed_crc(),
            decoded.bytes().len(),
            hex_errors
        );

        let result = self.decode_inner(frame.as_str(), &decoded, timestamp);

        match &result {
            Ok(record) => {
                self.stats.records += 1;
                if !record.crc_valid || hex_errors > 0 {
                    warn!(
                        target: "frame_diag",
                        len = frame.len(),
                        frame = frame.as_str(),
                        hex_errors,
                        crc_valid = record.crc_valid,
                        "Response accepted despite transport errors"
                    );
                }
            },
            Err(DecodeOutcome::Request {
                start_address,
                quantity,
            }) => {
                self.stats.requests += 1;
                debug!(
                    "Read request: start={} quantity={}",
                    start_address, quantity
                );
                if hex_errors > 0 {
                    warn!(
                        target: "frame_diag",
                        len = frame.len(),
                        frame = frame.as_str(),
                        hex_errors,
                        "Request accepted despite malformed hex"
                    );
                }
            },
            Err(outcome) => {
                match outcome {
                    DecodeOutcome::Unrecognized { .. } => self.stats.unrecognized += 1,
                    _ => self.stats.rejected += 1,
                }
                warn!(
                    target: "frame_diag",
                    len = frame.len(),
                    frame = frame.as_str(),
                    hex_errors,
                    "{}",
                    outcome
                );
            },
        }

        result
    }

    fn decode_inner(
        &mut self,
        text: &str,
        decoded: &DecodedFrame,
        timestamp: DateTime<Local>,
    ) -> Result<MeasurementRecord, DecodeOutcome> {
        if let Some(limit) = self.config.max_hex_errors {
            if decoded.hex_errors() > limit {
                return Err(DecodeOutcome::TooManyHexErrors {
                    errors: decoded.hex_errors(),
                    limit,
                });
            }
        }

        let session = match self.classify(text) {
            FrameKind::Request(session) => {
                self.session = Some(session);
                return Err(DecodeOutcome::Request {
                    start_address: session.start_address,
                    quantity: session.quantity,
                });
            },
            FrameKind::Unrecognized(reason) => {
                return Err(DecodeOutcome::Unrecognized {
                    len: text.len(),
                    text: text.to_string(),
                    reason,
                });
            },
            FrameKind::Response(session) => session,
        };

        let crc_valid = decoded.crc_valid();
        if !crc_valid {
            self.stats.crc_mismatches += 1;
            if self.config.crc_policy == CrcPolicy::Reject {
                return Err(DecodeOutcome::ChecksumMismatch {
                    computed: decoded.computed_crc(),
                    received: decoded.received_crc().unwrap_or_default(),
                });
            }
        }

        let registers = decoded.registers(session.quantity);
        let values =
            decode_measurements(&registers).ok_or(DecodeOutcome::ShortRegisterBank {
                available: registers.len(),
                required: REQUIRED_REGISTERS,
            })?;

        Ok(MeasurementRecord {
            timestamp,
            values,
            details: decode_details(&registers),
            crc_valid,
            hex_errors: decoded.hex_errors(),
        })
    }
}
