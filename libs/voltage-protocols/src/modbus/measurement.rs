//! Measurement record produced for each accepted response frame

use chrono::{DateTime, Local};

use super::registers::{MeterDetails, MeterValues};

/// Decoded values of one response, stamped with local reception time
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Local>,
    pub values: MeterValues,
    /// Present when the response carried the full extended map
    pub details: Option<MeterDetails>,
    /// False when the frame failed its CRC but was kept under `CrcPolicy::LogOnly`
    pub crc_valid: bool,
    /// Malformed hex pairs substituted while decoding the frame
    pub hex_errors: usize,
}

impl MeasurementRecord {
    /// Calendar date the record belongs to
    pub fn date(&self) -> chrono::NaiveDate {
        self.timestamp.date_naive()
    }
}
