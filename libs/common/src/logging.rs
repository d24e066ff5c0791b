//! Unified logging module for VoltageEMS services
//!
//! Console output plus a daily rolling service log. Frame diagnostics
//! (`frame_diag` target) are additionally copied into their own daily file so
//! an operator can review bus anomalies without wading through the service log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter,
    fmt::{
        self,
        format::Writer,
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Target used for per-frame anomaly diagnostics
pub const FRAME_DIAG_TARGET: &str = "frame_diag";

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Service started`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Global guards for keeping the non-blocking writers alive
static GUARDS: OnceLock<Arc<Mutex<Vec<WorkerGuard>>>> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory (initialized once from config or env)
/// Priority: VOLTAGE_LOG_DIR env > config_dir > default "logs"
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory from config or environment
///
/// Call during bootstrap, before any file logging is set up.
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| resolve_log_root(config_dir));
}

fn resolve_log_root(config_dir: Option<&str>) -> PathBuf {
    std::env::var("VOLTAGE_LOG_DIR")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            config_dir
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
}

/// Get log root directory
///
/// Falls back to the environment or "logs" when `init_log_root` was never
/// called. Test binaries default to the system temp directory.
pub fn get_log_root() -> PathBuf {
    LOG_ROOT.get().cloned().unwrap_or_else(|| {
        if std::env::var("VOLTAGE_LOG_DIR").is_err() && is_test_environment() {
            std::env::temp_dir().join("voltage-test-logs")
        } else {
            resolve_log_root(None)
        }
    })
}

/// Detect if we're running in a test environment
fn is_test_environment() -> bool {
    if std::env::var("CARGO_TARGET_TMPDIR").is_ok() {
        return true;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(path_str) = exe.to_str() {
            if path_str.contains("target/debug/deps") || path_str.contains("target/release/deps") {
                return true;
            }
        }
    }

    false
}

// ============================================================================
// Daily rolling writer
// ============================================================================

/// Default max file size: 100MB
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Daily rolling file writer named `{YYYYMMDD}_{service}{suffix}.log`
///
/// Rolls over when the local date changes or the file disappears, and within a
/// day once the file passes `max_file_size` (`{YYYYMMDD}_{service}{suffix}.N.log`).
struct DailyRollingWriter {
    service_name: String,
    /// Appended to the service name, e.g. `_frames`
    suffix: String,
    log_dir: PathBuf,
    current_date: Arc<Mutex<String>>,
    current_file: Arc<Mutex<Option<File>>>,
    current_size: Arc<AtomicU64>,
    max_file_size: u64,
    /// Rotation counter within the same day (.1, .2, .3)
    rotation_count: Arc<AtomicU32>,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> std::io::Error {
    std::io::Error::other(format!("Mutex poisoned: {}", e))
}

impl DailyRollingWriter {
    fn new(service_name: &str, suffix: &str, log_dir: PathBuf) -> std::io::Result<Self> {
        Self::with_max_size(service_name, suffix, log_dir, DEFAULT_MAX_FILE_SIZE)
    }

    fn with_max_size(
        service_name: &str,
        suffix: &str,
        log_dir: PathBuf,
        max_file_size: u64,
    ) -> std::io::Result<Self> {
        let current_date = chrono::Local::now().format("%Y%m%d").to_string();

        fs::create_dir_all(&log_dir)?;

        let writer = Self {
            service_name: service_name.to_string(),
            suffix: suffix.to_string(),
            log_dir,
            current_date: Arc::new(Mutex::new(current_date.clone())),
            current_file: Arc::new(Mutex::new(None)),
            current_size: Arc::new(AtomicU64::new(0)),
            max_file_size,
            rotation_count: Arc::new(AtomicU32::new(0)),
        };

        let file = writer.open(&writer.file_path(&current_date))?;
        let initial_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        writer.current_size.store(initial_size, Ordering::SeqCst);
        *writer.current_file.lock().map_err(poisoned)? = Some(file);

        Ok(writer)
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}{}.log", date, self.service_name, self.suffix))
    }

    fn open(&self, path: &Path) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Rotate the log file due to size limit
    fn rotate_by_size(&self) -> std::io::Result<()> {
        let current_date = self.current_date.lock().map_err(poisoned)?;

        let count = self.rotation_count.fetch_add(1, Ordering::SeqCst) + 1;
        let new_file_path = self.log_dir.join(format!(
            "{}_{}{}.{}.log",
            *current_date, self.service_name, self.suffix, count
        ));

        let new_file = self.open(&new_file_path)?;
        self.current_size.store(0, Ordering::SeqCst);
        *self.current_file.lock().map_err(poisoned)? = Some(new_file);

        Ok(())
    }

    fn get_writer(&self) -> std::io::Result<std::sync::MutexGuard<'_, Option<File>>> {
        let today = chrono::Local::now().format("%Y%m%d").to_string();
        let mut current_date = self.current_date.lock().map_err(poisoned)?;

        let date_changed = *current_date != today;
        let file_deleted =
            self.rotation_count.load(Ordering::SeqCst) == 0 && !self.file_path(&current_date).exists();

        if date_changed || file_deleted {
            fs::create_dir_all(&self.log_dir)?;

            let new_file = self.open(&self.file_path(&today))?;
            let initial_size = new_file.metadata().map(|m| m.len()).unwrap_or(0);

            if date_changed {
                *current_date = today;
                self.rotation_count.store(0, Ordering::SeqCst);
            }
            self.current_size.store(initial_size, Ordering::SeqCst);
            *self.current_file.lock().map_err(poisoned)? = Some(new_file);
        }

        self.current_file.lock().map_err(poisoned)
    }
}

impl Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let current_size = self.current_size.load(Ordering::Relaxed);
        if current_size > 0 && current_size + buf.len() as u64 > self.max_file_size {
            self.rotate_by_size()?;
        }

        if let Some(ref mut file) = *self.get_writer()? {
            let written = file.write(buf)?;
            self.current_size
                .fetch_add(written as u64, Ordering::Relaxed);
            Ok(written)
        } else {
            Ok(0)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut file) = *self.get_writer()? {
            file.flush()
        } else {
            Ok(())
        }
    }
}

impl Clone for DailyRollingWriter {
    fn clone(&self) -> Self {
        Self {
            service_name: self.service_name.clone(),
            suffix: self.suffix.clone(),
            log_dir: self.log_dir.clone(),
            current_date: Arc::clone(&self.current_date),
            current_file: Arc::clone(&self.current_file),
            current_size: Arc::clone(&self.current_size),
            max_file_size: self.max_file_size,
            rotation_count: Arc::clone(&self.rotation_count),
        }
    }
}

fn keep_guard(guard: WorkerGuard) {
    let guards = GUARDS.get_or_init(|| Arc::new(Mutex::new(Vec::new())));
    match guards.lock() {
        Ok(mut guards) => guards.push(guard),
        Err(poisoned) => {
            eprintln!("Warning: GUARDS lock was poisoned, recovering...");
            poisoned.into_inner().push(guard);
        },
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "metersrv")
    pub service_name: String,
    /// Base directory for logs
    pub log_dir: PathBuf,
    /// Console log level
    pub console_level: Level,
    /// File log level
    pub file_level: Level,
    /// ANSI colors on the console
    pub ansi: bool,
    /// Copy `frame_diag` events into `{YYYYMMDD}_{service}_frames.log`
    pub enable_frame_log: bool,
    /// Frame diagnostics level (default: WARN)
    pub frame_log_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: get_log_root(),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            ansi: true,
            enable_frame_log: true,
            frame_log_level: Level::WARN,
        }
    }
}

/// Filter directives: `RUST_LOG` if set, otherwise the configured levels.
/// `frame_diag` gets its own level unless `RUST_LOG` already names it.
fn filter_directives(config: &LogConfig, rust_log: Option<&str>) -> String {
    let base = match rust_log {
        Some(env_str) if env_str.contains(FRAME_DIAG_TARGET) => return env_str.to_string(),
        Some(env_str) => env_str.to_string(),
        None => {
            let level = if config.file_level > config.console_level {
                config.file_level
            } else {
                config.console_level
            };
            level.as_str().to_string()
        },
    };

    if config.enable_frame_log {
        format!(
            "{},{}={}",
            base,
            FRAME_DIAG_TARGET,
            config.frame_log_level.as_str()
        )
    } else {
        base
    }
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(&config.log_dir)?;

    let service_writer = DailyRollingWriter::new(&config.service_name, "", config.log_dir.clone())?;
    let (non_blocking, guard) = tracing_appender::non_blocking(service_writer);
    keep_guard(guard);

    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = EnvFilter::try_new(filter_directives(&config, rust_log.as_deref()))?;

    let console_level = filter::LevelFilter::from_level(config.console_level);
    let file_level = filter::LevelFilter::from_level(config.file_level);

    // Console layer: 2025-12-02T00:50:44.809Z [INFO] message
    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .with_filter(console_level)
        .boxed();

    let service_file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(BracketedLevelFormat)
        .with_filter(file_level);

    let frame_file_layer = if config.enable_frame_log {
        let frame_writer =
            DailyRollingWriter::new(&config.service_name, "_frames", config.log_dir.clone())?;
        let (frame_non_blocking, frame_guard) = tracing_appender::non_blocking(frame_writer);
        keep_guard(frame_guard);

        Some(
            fmt::layer()
                .with_writer(frame_non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .with_filter(filter::filter_fn(|metadata| {
                    metadata.target() == FRAME_DIAG_TARGET
                }))
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(service_file_layer)
        .with(frame_file_layer)
        .try_init()?;

    tracing::info!("Logging: {} @ {:?}", config.service_name, config.log_dir);

    if config.enable_frame_log {
        let current_date = chrono::Local::now().format("%Y%m%d");
        tracing::debug!(
            "Frame log: {}_{}_frames.log",
            current_date,
            config.service_name
        );
    }

    Ok(())
}
