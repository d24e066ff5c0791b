//! Byte stream to measurement record, across chunk boundaries
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use chrono::{Local, TimeZone};
use voltage_protocols::modbus::{
    crc16, CrcPolicy, DecodeOutcome, DecoderConfig, FrameAssembler, FrameDecoder,
    MeasurementRecord, RESPONSE_PREFIX,
};

const READ_REQUEST: &str = "01030000003C45DB";

/// Response text for 59 registers with the frequency register set to 50.0 Hz
fn response_frame(frequency_raw: u16) -> String {
    let mut regs = [0u16; 59];
    regs[38] = frequency_raw;
    regs[28] = 0x0001;
    regs[29] = 0x86A0;

    let mut body = vec![0x01, 0x03, 0x76];
    for reg in regs {
        body.extend_from_slice(&reg.to_be_bytes());
    }
    let crc = crc16(&body);
    body.extend_from_slice(&crc.to_le_bytes());
    body.iter().map(|b| format!("{:02X}", b)).collect()
}

fn run(stream: &[u8], chunk_size: usize, config: DecoderConfig) -> Vec<MeasurementRecord> {
    let timestamp = Local.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap();
    let mut assembler = FrameAssembler::new();
    let mut decoder = FrameDecoder::new(config);
    let mut records = Vec::new();

    for chunk in stream.chunks(chunk_size) {
        for frame in assembler.feed(chunk) {
            if let Ok(record) = decoder.decode_at(&frame, timestamp) {
                records.push(record);
            }
        }
    }
    records
}

#[test]
fn test_request_then_response_yields_one_record() {
    let response = response_frame(500);
    assert_eq!(response.len(), 246);
    assert!(response.starts_with(RESPONSE_PREFIX));

    let stream = format!("{}\r\n{}\r\n", READ_REQUEST, response);
    for chunk_size in [1, 3, 7, 64, stream.len()] {
        let records = run(stream.as_bytes(), chunk_size, DecoderConfig::default());
        assert_eq!(records.len(), 1, "chunk size {}", chunk_size);
        assert_eq!(records[0].values.frequency_hz, 50.0);
        assert_eq!(records[0].values.energy_in_kwh, 100.0);
        assert!(records[0].crc_valid);
    }
}

#[test]
fn test_noise_between_frames_is_skipped() {
    let stream = format!(
        "\r\nGARBAGE\r\n0203FFFF\r\n{}\r\n{}\r\n\r\n{}\r\n",
        READ_REQUEST,
        response_frame(499),
        response_frame(501)
    );
    let records = run(stream.as_bytes(), 16, DecoderConfig::default());
    let frequencies: Vec<f64> = records.iter().map(|r| r.values.frequency_hz).collect();
    assert_eq!(frequencies, vec![49.9, 50.1]);
}

#[test]
fn test_response_without_request_is_dropped() {
    let stream = format!("{}\r\n", response_frame(500));
    assert!(run(stream.as_bytes(), 32, DecoderConfig::default()).is_empty());
}

#[test]
fn test_malformed_pair_is_counted_not_fatal() {
    let mut response = response_frame(500);
    // first byte of register 0
    response.replace_range(6..8, "ZZ");
    let stream = format!("{}\r\n{}\r\n", READ_REQUEST, response);

    let records = run(stream.as_bytes(), 10, DecoderConfig::default());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hex_errors, 1);
    assert_eq!(records[0].values.frequency_hz, 50.0);
}

#[test]
fn test_crc_policy_controls_corrupted_response() {
    let mut response = response_frame(500);
    // flip a data nibble, leave the transmitted CRC as is
    response.replace_range(100..101, if &response[100..101] == "0" { "1" } else { "0" });
    let stream = format!("{}\r\n{}\r\n", READ_REQUEST, response);

    let kept = run(stream.as_bytes(), 50, DecoderConfig::default());
    assert_eq!(kept.len(), 1);
    assert!(!kept[0].crc_valid);

    let strict = DecoderConfig {
        crc_policy: CrcPolicy::Reject,
        ..Default::default()
    };
    assert!(run(stream.as_bytes(), 50, strict).is_empty());
}

#[test]
fn test_anomalies_are_flagged() {
    let mut decoder = FrameDecoder::default();
    let outcome = decoder.decode(&"GARBAGE".into()).unwrap_err();
    assert!(outcome.is_anomaly());
    assert!(matches!(outcome, DecodeOutcome::Unrecognized { len: 7, .. }));

    let outcome = decoder.decode(&READ_REQUEST.into()).unwrap_err();
    assert!(!outcome.is_anomaly());
    assert_eq!(decoder.stats().requests, 1);
    assert_eq!(decoder.stats().unrecognized, 1);
}
