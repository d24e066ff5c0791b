//! VoltageEMS Protocol Implementations
//!
//! Passive Modbus-RTU meter decoding: a serial sniffer delivers hex-encoded,
//! newline-terminated frames; this library turns the raw byte stream into
//! measurement records. Nothing here performs I/O.
//!
//! # Features
//!
//! - `modbus` - Modbus frame assembly, CRC validation and register decoding

#[cfg(feature = "modbus")]
pub mod modbus;
