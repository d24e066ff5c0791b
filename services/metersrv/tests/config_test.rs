//! Configuration file and environment layering
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::io::Write;
use std::path::Path;

use metersrv::config::Parity;
use metersrv::MeterConfig;
use tempfile::NamedTempFile;
use voltage_protocols::modbus::CrcPolicy;

const PREFIX: &str = "METERSRV_TEST_ENV_";

#[test]
fn test_bundled_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/metersrv.yaml");
    let config = MeterConfig::load_with_prefix(&path, "METERSRV_TEST_UNUSED_").unwrap();
    config.validate().unwrap();
    assert_eq!(config.serial.port, "/dev/ttyUSB0");
    assert_eq!(config.decoder.min_response_len, 246);
}

#[test]
fn test_yaml_and_environment_layering() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "serial:\n  port: /dev/ttyS3\n  baud_rate: 19200\n  parity: Even\n\
         decoder:\n  crc_policy: reject\n  max_hex_errors: 2\n\
         records:\n  path_template: /tmp/meter/%Y%m%d.csv"
    )
    .unwrap();

    std::env::set_var(format!("{}SERIAL__PORT", PREFIX), "/dev/ttyAMA0");
    let config = MeterConfig::load_with_prefix(file.path(), PREFIX).unwrap();
    std::env::remove_var(format!("{}SERIAL__PORT", PREFIX));

    assert_eq!(config.serial.port, "/dev/ttyAMA0");
    assert_eq!(config.serial.baud_rate, 19200);
    assert_eq!(config.serial.parity, Parity::Even);
    assert_eq!(config.serial.data_bits, 8);
    assert_eq!(config.decoder.crc_policy, CrcPolicy::Reject);
    assert_eq!(config.decoder.max_hex_errors, Some(2));
    assert_eq!(config.decoder.request_start_offset, 4);
    assert_eq!(config.records.path_template, "/tmp/meter/%Y%m%d.csv");
    config.validate().unwrap();
}

#[test]
fn test_missing_file_uses_defaults() {
    let config =
        MeterConfig::load_with_prefix(Path::new("/nonexistent/metersrv.yaml"), "METERSRV_TEST_NONE_")
            .unwrap();
    assert_eq!(config.serial.baud_rate, 9600);
    assert!(config.logging.frame_log);
}

#[test]
fn test_invalid_yaml_is_configuration_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "serial:\n  baud_rate: fast").unwrap();
    let err = MeterConfig::load_with_prefix(file.path(), "METERSRV_TEST_BAD_").unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
}

#[test]
fn test_effective_config_round_trips_through_yaml() {
    let yaml = MeterConfig::default().to_yaml().unwrap();
    assert!(yaml.contains("path_template"));
    assert!(yaml.contains("log_only"));
}
