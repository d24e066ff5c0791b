//! metersrv configuration
//!
//! Layered with figment: serde defaults, then the YAML file, then
//! `METERSRV_`-prefixed environment variables (nested keys split on `__`,
//! e.g. `METERSRV_SERIAL__PORT=/dev/ttyS1`).

use std::path::Path;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use errors::{VoltageError, VoltageResult};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use voltage_protocols::modbus::{DecoderConfig, DEFAULT_MAX_FRAME_LEN};

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "METERSRV_";

/// Default record file location, one file per local calendar day
pub const DEFAULT_PATH_TEMPLATE: &str = "/var/log/fronius/%Y-%m-%d_fronius.csv";

pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// Serial port
// ============================================================================

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
    pub port: String,
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    pub parity: Parity,
    /// Bytes requested per read
    pub read_buffer: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            read_buffer: 256,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> VoltageError {
    VoltageError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl SerialConfig {
    pub fn validate(&self) -> VoltageResult<()> {
        if self.port.is_empty() {
            return Err(invalid("serial.port", "Port path cannot be empty"));
        }

        if self.baud_rate == 0 {
            return Err(invalid(
                "serial.baud_rate",
                "Baud rate must be greater than zero",
            ));
        }

        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(invalid("serial.data_bits", "Data bits must be 5, 6, 7, or 8"));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(invalid("serial.stop_bits", "Stop bits must be 1 or 2"));
        }

        if self.read_buffer == 0 {
            return Err(invalid(
                "serial.read_buffer",
                "Read buffer must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn tokio_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    pub fn tokio_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }

    pub fn tokio_parity(&self) -> tokio_serial::Parity {
        match self.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

// ============================================================================
// Pipeline sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Longest partial frame kept, in characters; 0 disables the cap
    pub max_frame_len: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// strftime pattern resolved with each record's local timestamp
    pub path_template: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
        }
    }
}

/// Reject empty templates and ones chrono cannot format
pub fn validate_path_template(template: &str) -> VoltageResult<()> {
    if template.trim().is_empty() {
        return Err(invalid(
            "records.path_template",
            "Path template cannot be empty",
        ));
    }
    if StrftimeItems::new(template).any(|item| matches!(item, Item::Error)) {
        return Err(invalid(
            "records.path_template",
            format!("Invalid strftime pattern: {}", template),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log root directory; `VOLTAGE_LOG_DIR` takes precedence
    pub dir: Option<String>,
    pub level: String,
    /// Separate daily file for frame diagnostics
    pub frame_log: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
            frame_log: true,
        }
    }
}

// ============================================================================
// Root configuration
// ============================================================================

/// Complete metersrv configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub serial: SerialConfig,
    pub decoder: DecoderConfig,
    pub assembler: AssemblerConfig,
    pub records: RecordConfig,
    pub logging: LoggingSection,
    /// Stop by itself after this many milliseconds (unset or 0: run until signalled)
    pub shutdown_millis: Option<u64>,
}

impl MeterConfig {
    /// Load from `path` (optional file) and `METERSRV_` environment variables
    pub fn load(path: &Path) -> VoltageResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`load`](Self::load) with a custom environment prefix
    pub fn load_with_prefix(path: &Path, env_prefix: &str) -> VoltageResult<Self> {
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
        } else {
            debug!(
                "Configuration file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Self = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .map_err(|e| {
                VoltageError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> VoltageResult<()> {
        self.serial.validate()?;
        validate_path_template(&self.records.path_template)?;

        let request_fields_end = self
            .decoder
            .request_start_offset
            .max(self.decoder.request_quantity_offset)
            + 4;
        if request_fields_end > 18 {
            return Err(invalid(
                "decoder.request_*_offset",
                "Request fields must lie within an 18-character request frame",
            ));
        }

        if self.assembler.max_frame_len != 0
            && self.assembler.max_frame_len < self.decoder.min_response_len
        {
            return Err(invalid(
                "assembler.max_frame_len",
                format!(
                    "Must be 0 or at least decoder.min_response_len ({})",
                    self.decoder.min_response_len
                ),
            ));
        }

        Ok(())
    }

    /// Effective self-shutdown delay
    pub fn shutdown_after(&self) -> Option<Duration> {
        self.shutdown_millis
            .filter(|&millis| millis > 0)
            .map(Duration::from_millis)
    }

    /// Effective configuration as YAML (printed by `--validate`)
    pub fn to_yaml(&self) -> VoltageResult<String> {
        serde_yaml::to_string(self).map_err(|e| VoltageError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use voltage_protocols::modbus::CrcPolicy;

    #[test]
    fn test_defaults_are_valid() {
        let config = MeterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.decoder.crc_policy, CrcPolicy::LogOnly);
        assert_eq!(config.assembler.max_frame_len, 1024);
        assert_eq!(config.records.path_template, DEFAULT_PATH_TEMPLATE);
        assert!(config.shutdown_after().is_none());
    }

    #[test]
    fn test_serial_validation() {
        let mut serial = SerialConfig::default();
        serial.data_bits = 9;
        assert!(serial.validate().is_err());

        let mut serial = SerialConfig::default();
        serial.stop_bits = 3;
        assert!(serial.validate().is_err());

        let mut serial = SerialConfig::default();
        serial.port.clear();
        let err = serial.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_serial_conversion() {
        let serial = SerialConfig {
            data_bits: 7,
            stop_bits: 2,
            parity: Parity::Even,
            ..Default::default()
        };
        assert_eq!(serial.tokio_data_bits(), tokio_serial::DataBits::Seven);
        assert_eq!(serial.tokio_stop_bits(), tokio_serial::StopBits::Two);
        assert_eq!(serial.tokio_parity(), tokio_serial::Parity::Even);
    }

    #[test]
    fn test_path_template_validation() {
        assert!(validate_path_template("/tmp/%Y-%m-%d.csv").is_ok());
        assert!(validate_path_template("").is_err());
        assert!(validate_path_template("/tmp/%Q.csv").is_err());
    }

    #[test]
    fn test_frame_cap_must_fit_response() {
        let mut config = MeterConfig::default();
        config.assembler.max_frame_len = 100;
        assert!(config.validate().is_err());

        config.assembler.max_frame_len = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shutdown_after() {
        let mut config = MeterConfig::default();
        config.shutdown_millis = Some(0);
        assert!(config.shutdown_after().is_none());
        config.shutdown_millis = Some(1500);
        assert_eq!(config.shutdown_after(), Some(Duration::from_millis(1500)));
    }
}
