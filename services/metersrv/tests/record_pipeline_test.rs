//! Sniffed byte stream to daily record files
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;

use chrono::{Local, TimeZone};
use metersrv::{run_stream, DailyRecordWriter, MeterConfig, MeterPipeline, StreamEnd};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use voltage_protocols::modbus::crc16;

const READ_REQUEST: &str = "01030000003C45DB";

fn response_frame(active_power_raw: i32, frequency_raw: u16) -> String {
    let mut regs = [0u16; 59];
    regs[38] = frequency_raw;
    let power = active_power_raw.to_be_bytes();
    regs[20] = u16::from_be_bytes([power[0], power[1]]);
    regs[21] = u16::from_be_bytes([power[2], power[3]]);

    let mut body = vec![0x01, 0x03, 0x76];
    for reg in regs {
        body.extend_from_slice(&reg.to_be_bytes());
    }
    body.extend_from_slice(&crc16(&body).to_le_bytes());
    body.iter().map(|b| format!("{:02X}", b)).collect()
}

fn pipeline_in(dir: &TempDir) -> MeterPipeline<DailyRecordWriter> {
    let template = format!("{}/%Y-%m-%d_fronius.csv", dir.path().display());
    let writer = DailyRecordWriter::new(template).unwrap();
    MeterPipeline::new(&MeterConfig::default(), writer)
}

#[test]
fn test_stream_lands_in_daily_file() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline_in(&dir);
    let stream = format!("{}\r\n{}\r\n", READ_REQUEST, response_frame(0, 500));
    let timestamp = Local.with_ymd_and_hms(2024, 6, 10, 14, 5, 9).unwrap();

    for chunk in stream.as_bytes().chunks(13) {
        pipeline.ingest_at(chunk, timestamp);
    }

    let path = dir.path().join("2024-06-10_fronius.csv");
    let content = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("\"Time\",\"E-in/kWh\""));
    assert!(lines[1].starts_with("\"14:05:09\","));
    assert!(lines[1].contains("\"50,0\""));
    assert_eq!(pipeline.stats().records, 1);
}

#[test]
fn test_midnight_rollover_starts_new_file() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline_in(&dir);

    let before = Local.with_ymd_and_hms(2024, 6, 10, 23, 59, 58).unwrap();
    let after = Local.with_ymd_and_hms(2024, 6, 11, 0, 0, 2).unwrap();

    let first = format!("{}\n{}\n", READ_REQUEST, response_frame(0, 500));
    let second = format!("{}\n{}\n", READ_REQUEST, response_frame(0, 499));
    assert_eq!(pipeline.ingest_at(first.as_bytes(), before), 1);
    assert_eq!(pipeline.ingest_at(second.as_bytes(), after), 1);

    for (day, frequency) in [("2024-06-10", "\"50,0\""), ("2024-06-11", "\"49,9\"")] {
        let path = dir.path().join(format!("{}_fronius.csv", day));
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2, "{}", day);
        assert!(lines[0].starts_with("\"Time\""));
        assert!(lines[1].contains(frequency));
    }
}

#[test]
fn test_negative_power_written_with_sign() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline_in(&dir);
    let timestamp = Local.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap();

    // active power scale is 0.01 W
    let stream = format!("{}\n{}\n", READ_REQUEST, response_frame(-15237, 500));
    pipeline.ingest_at(stream.as_bytes(), timestamp);

    let content = fs::read_to_string(dir.path().join("2024-06-12_fronius.csv")).unwrap();
    assert!(content.contains("\"-152,37\""));
}

#[tokio::test]
async fn test_run_stream_writes_records_until_eof() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = pipeline_in(&dir);
    let stream = format!(
        "NOISE\r\n{}\r\n{}\r\n{}\r\n{}\r\n",
        READ_REQUEST,
        response_frame(0, 500),
        READ_REQUEST,
        response_frame(0, 501)
    );

    let end = run_stream(
        stream.as_bytes(),
        &mut pipeline,
        64,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(end, StreamEnd::Eof);
    let stats = pipeline.stats();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.unrecognized, 1);
    assert_eq!(stats.write_failures, 0);

    let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}
