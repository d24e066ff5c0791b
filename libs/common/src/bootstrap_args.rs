//! Common command-line arguments for VoltageEMS services
//!
//! Provides a unified argument structure that individual services extend

use std::path::PathBuf;

/// Common service startup arguments
///
/// With the `cli` feature this is a `clap::Args` group that services flatten
/// into their own parser.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[cfg_attr(feature = "cli", clap(short = 'l', long))]
    pub log_level: Option<String>,

    /// Configuration file override
    #[cfg_attr(feature = "cli", clap(short = 'c', long, env = "CONFIG_PATH"))]
    pub config_path: Option<PathBuf>,

    /// Enable debug mode with verbose output
    #[cfg_attr(feature = "cli", clap(long, env = "DEBUG"))]
    pub debug: bool,

    /// Disable colored output (useful for log files)
    #[cfg_attr(feature = "cli", clap(long))]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[cfg_attr(feature = "cli", clap(long))]
    pub validate: bool,
}

/// Parse log level string to tracing::Level, INFO when unknown
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

impl ServiceArgs {
    /// Console level from the command line; `--debug` wins
    pub fn parse_log_level(&self) -> tracing::Level {
        if self.debug {
            return tracing::Level::DEBUG;
        }
        self.log_level
            .as_deref()
            .map(parse_level)
            .unwrap_or(tracing::Level::INFO)
    }

    /// Configuration file: CLI override, then `{SERVICE}_CONFIG`, then `config/{service}.yaml`
    pub fn get_config_path(&self, service_name: &str) -> PathBuf {
        if let Some(path) = &self.config_path {
            return path.clone();
        }

        let env_var = format!("{}_CONFIG", service_name.to_uppercase());
        if let Ok(path) = std::env::var(&env_var) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        PathBuf::from(format!("config/{}.yaml", service_name))
    }
}
