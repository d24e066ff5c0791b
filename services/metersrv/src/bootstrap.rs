//! Service bootstrap and initialization
//!
//! Command-line arguments, logging setup and configuration loading.
//! Uses common bootstrap utilities for shared functionality.

use std::path::PathBuf;

use clap::Parser;
use common::bootstrap_args::ServiceArgs;
use common::config_loader::get_string_config;
use common::service_bootstrap::{LoggingOptions, ServiceInfo};
use errors::{VoltageError, VoltageResult};
use tracing::debug;

use crate::config::{MeterConfig, DEFAULT_LOG_LEVEL};

pub const SERVICE_NAME: &str = "metersrv";

/// Command-line arguments for metersrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "metersrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fronius meter Modbus sniffer - daily CSV records",
    long_about = None
)]
pub struct Args {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Feed a captured byte log instead of opening the serial port
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
}

impl From<Args> for ServiceArgs {
    fn from(args: Args) -> Self {
        args.service
    }
}

pub fn service_info() -> ServiceInfo {
    ServiceInfo::new(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        "Passive Modbus-RTU meter sniffer - Fronius Smart Meter",
    )
}

/// Load configuration; a file named on the command line must exist
pub fn load_configuration(args: &ServiceArgs) -> VoltageResult<MeterConfig> {
    let path = args.get_config_path(SERVICE_NAME);
    if args.config_path.is_some() && !path.exists() {
        return Err(VoltageError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }
    MeterConfig::load(&path)
}

/// Log level: command line, then config file, then `RUST_LOG`, then "info"
pub fn resolve_log_level(args: &ServiceArgs, config: &MeterConfig) -> tracing::Level {
    if args.log_level.is_some() || args.debug {
        return args.parse_log_level();
    }

    let level = get_string_config(
        Some(config.logging.level.clone()),
        config.logging.level == DEFAULT_LOG_LEVEL,
        "RUST_LOG",
        DEFAULT_LOG_LEVEL.to_string(),
    );
    common::bootstrap_args::parse_level(&level)
}

/// Initialize logging from arguments and the loaded configuration
///
/// Log root directory priority:
/// 1. VOLTAGE_LOG_DIR environment variable
/// 2. `logging.dir` from the config file
/// 3. Default "logs"
pub fn initialize_logging(
    args: &ServiceArgs,
    service_info: &ServiceInfo,
    config: &MeterConfig,
) -> VoltageResult<()> {
    let options = LoggingOptions {
        dir: config.logging.dir.clone(),
        frame_log: config.logging.frame_log,
        no_color: args.no_color,
    };

    let log_dir = common::service_bootstrap::init_logging(
        service_info,
        resolve_log_level(args, config),
        &options,
    )?;
    debug!("Log directory: {}", log_dir.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let args = Args::try_parse_from([
            "metersrv",
            "-c",
            "/etc/metersrv.yaml",
            "-l",
            "debug",
            "--replay",
            "capture.log",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(args.replay, Some(PathBuf::from("capture.log")));
        let service: ServiceArgs = args.into();
        assert_eq!(service.config_path, Some(PathBuf::from("/etc/metersrv.yaml")));
        assert_eq!(service.log_level.as_deref(), Some("debug"));
        assert!(service.no_color);
        assert!(!service.validate);
    }

    #[test]
    fn test_cli_level_overrides_config() {
        let mut config = MeterConfig::default();
        config.logging.level = "warn".to_string();

        let args = ServiceArgs {
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_log_level(&args, &config), tracing::Level::TRACE);

        let args = ServiceArgs::default();
        assert_eq!(resolve_log_level(&args, &config), tracing::Level::WARN);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let args = ServiceArgs {
            config_path: Some(PathBuf::from("/nonexistent/metersrv.yaml")),
            ..Default::default()
        };
        assert!(matches!(
            load_configuration(&args),
            Err(VoltageError::Configuration(_))
        ));
    }
}
