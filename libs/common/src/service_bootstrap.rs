//! Unified service bootstrap utilities
//!
//! Provides common initialization functionality for VoltageEMS services,
//! including startup banners, logging initialization, and environment setup.

use std::path::PathBuf;

use crate::logging::{self, LogConfig};
use errors::{VoltageError, VoltageResult};
use tracing::{info, Level};

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "metersrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print unified startup banner for any service
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "metersrv" => {
            r#"
 ███╗   ███╗███████╗████████╗███████╗██████╗ ███████╗██████╗ ██╗   ██╗
 ████╗ ████║██╔════╝╚══██╔══╝██╔════╝██╔══██╗██╔════╝██╔══██╗██║   ██║
 ██╔████╔██║█████╗     ██║   █████╗  ██████╔╝███████╗██████╔╝██║   ██║
 ██║╚██╔╝██║██╔══╝     ██║   ██╔══╝  ██╔══██╗╚════██║██╔══██╗╚██╗ ██╔╝
 ██║ ╚═╝ ██║███████╗   ██║   ███████╗██║  ██║███████║██║  ██║ ╚████╔╝
 ╚═╝     ╚═╝╚══════╝   ╚═╝   ╚══════╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => {
            r#"
 ██╗   ██╗ ██████╗ ██╗  ████████╗ █████╗  ██████╗ ███████╗
 ██║   ██║██╔═══██╗██║  ╚══██╔══╝██╔══██╗██╔════╝ ██╔════╝
 ██║   ██║██║   ██║██║     ██║   ███████║██║  ███╗█████╗
 ╚██╗ ██╔╝██║   ██║██║     ██║   ██╔══██║██║   ██║██╔══╝
  ╚████╔╝ ╚██████╔╝███████╗██║   ██║  ██║╚██████╔╝███████╗
   ╚═══╝   ╚═════╝ ╚══════╝╚═╝   ╚═╝  ╚═╝ ╚═════╝ ╚══════╝
            "#
        },
    };

    info!("{}", banner);
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

/// Logging options a service reads from its own configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Log root directory from the config file
    pub dir: Option<String>,
    /// Separate frame diagnostics file
    pub frame_log: bool,
    /// Disable ANSI colors on the console
    pub no_color: bool,
}

/// Initialize logging for a service with standard configuration
///
/// Log root directory priority:
/// 1. VOLTAGE_LOG_DIR environment variable
/// 2. `options.dir` from the service config
/// 3. Default "logs"
pub fn init_logging(
    service: &ServiceInfo,
    console_level: Level,
    options: &LoggingOptions,
) -> VoltageResult<PathBuf> {
    logging::init_log_root(options.dir.as_deref());

    let log_dir = logging::get_log_root().join(&service.name);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir: log_dir.clone(),
        console_level,
        file_level: Level::DEBUG,
        ansi: !options.no_color,
        enable_frame_log: options.frame_log,
        frame_log_level: Level::WARN,
    };

    logging::init_with_config(log_config)
        .map_err(|e| VoltageError::StartupFailed(format!("Failed to init logging: {}", e)))?;

    Ok(log_dir)
}

/// Load environment variables in development mode
///
/// In debug builds, reads a `.env` file without overriding variables that are
/// already set. Release builds expect the environment to be set externally.
pub fn load_development_env() {
    #[cfg(debug_assertions)]
    {
        if let Ok(content) = std::fs::read_to_string(".env") {
            for (key, value) in parse_env_lines(&content) {
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }
}

/// `KEY=VALUE` pairs, skipping comments and blank lines
#[cfg_attr(not(debug_assertions), allow(dead_code))]
fn parse_env_lines(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_service_info_creation() {
        let service = ServiceInfo::new("metersrv", "1.2.3", "Meter sniffer");
        assert_eq!(service.name, "metersrv");
        assert_eq!(service.version, "1.2.3");
        assert_eq!(service.description, "Meter sniffer");
    }

    #[test]
    fn test_parse_env_lines() {
        let content = "# serial\nMETERSRV_SERIAL__PORT=/dev/ttyS1\n\n  RUST_LOG = debug \nnoequals\n";
        assert_eq!(
            parse_env_lines(content),
            vec![
                ("METERSRV_SERIAL__PORT", "/dev/ttyS1"),
                ("RUST_LOG", "debug")
            ]
        );
    }
}
