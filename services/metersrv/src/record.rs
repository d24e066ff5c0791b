//! Daily record files
//!
//! One CSV file per local calendar day. Every field is quoted, the header row
//! is written when a file is first created, and numeric fields use a decimal
//! comma. Files are only ever appended to.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use errors::{VoltageError, VoltageResult};
use tracing::{debug, info};
use voltage_protocols::modbus::MeasurementRecord;

use crate::config::validate_path_template;

/// Column names of every record file
pub const HEADER: [&str; 12] = [
    "Time",
    "E-in/kWh",
    "E-out/kWh",
    "f/Hz",
    "P/W",
    "Q/var",
    "S/VA",
    "Q-in/kvarh",
    "Q-out/kvarh",
    "P1/W",
    "P2/W",
    "P3/W",
];

/// Destination for accepted measurement records
pub trait RecordSink {
    /// Persist one record; returns where it went
    fn append(&mut self, record: &MeasurementRecord) -> VoltageResult<PathBuf>;
}

/// Data row fields: fixed precision, radix point replaced by a comma
pub fn format_row(record: &MeasurementRecord) -> [String; 12] {
    let v = &record.values;
    [
        record.timestamp.format("%H:%M:%S").to_string(),
        format!("{:8.3}", v.energy_in_kwh),
        format!("{:8.3}", v.energy_out_kwh),
        format!("{:4.1}", v.frequency_hz),
        format!("{:7.2}", v.active_power_w),
        format!("{:6.2}", v.reactive_power_var),
        format!("{:7.2}", v.apparent_power_va),
        format!("{:8.3}", v.reactive_energy_in_kvarh),
        format!("{:8.3}", v.reactive_energy_out_kvarh),
        format!("{:8.2}", v.phase_power_w[0]),
        format!("{:8.2}", v.phase_power_w[1]),
        format!("{:8.2}", v.phase_power_w[2]),
    ]
    .map(|field| field.replace('.', ","))
}

struct OpenRecordFile {
    path: PathBuf,
    writer: csv::Writer<File>,
}

/// Appends records to the file of their local date
pub struct DailyRecordWriter {
    path_template: String,
    current: Option<OpenRecordFile>,
}

impl DailyRecordWriter {
    pub fn new(path_template: impl Into<String>) -> VoltageResult<Self> {
        let path_template = path_template.into();
        validate_path_template(&path_template)?;
        Ok(Self {
            path_template,
            current: None,
        })
    }

    /// File a record stamped `timestamp` belongs to
    pub fn path_for(&self, timestamp: &DateTime<Local>) -> VoltageResult<PathBuf> {
        let mut path = String::new();
        write!(path, "{}", timestamp.format(&self.path_template)).map_err(|_| {
            VoltageError::InvalidConfig {
                field: "records.path_template".to_string(),
                reason: format!("Cannot format {}", self.path_template),
            }
        })?;
        Ok(PathBuf::from(path))
    }

    /// Path of the file currently held open
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }

    fn open(path: &Path) -> VoltageResult<OpenRecordFile> {
        let record_error = |e: std::io::Error| VoltageError::RecordFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(record_error)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(record_error)?;
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
            info!("Record file created: {}", path.display());
        } else {
            debug!("Appending to record file: {}", path.display());
        }

        Ok(OpenRecordFile {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Write one record, switching files when its date differs from the last
    /// one or the open file was removed.
    pub fn write(&mut self, record: &MeasurementRecord) -> VoltageResult<PathBuf> {
        let path = self.path_for(&record.timestamp)?;

        let reopen = match &self.current {
            Some(open) => open.path != path || !path.exists(),
            None => true,
        };
        if reopen {
            // drop the old handle before opening so a failure leaves nothing stale
            self.current = None;
            self.current = Some(Self::open(&path)?);
        }

        if let Some(open) = self.current.as_mut() {
            open.writer.write_record(format_row(record))?;
            open.writer.flush()?;
        }

        Ok(path)
    }
}

impl RecordSink for DailyRecordWriter {
    fn append(&mut self, record: &MeasurementRecord) -> VoltageResult<PathBuf> {
        self.write(record)
    }
}
