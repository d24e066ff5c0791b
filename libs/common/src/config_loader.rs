//! Configuration loading helper functions
//! Provides utilities for loading configuration with fallback logic

use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, warn};

/// Get configuration value with priority: Config file > ENV > Default
///
/// # Arguments
/// * `file_value` - Value from the configuration file
/// * `is_default` - Whether the file value is a default value
/// * `env_var` - Environment variable name to check
/// * `default` - Default value to use as fallback
pub fn get_config_value<T>(file_value: Option<T>, is_default: bool, env_var: &str, default: T) -> T
where
    T: FromStr + PartialEq + Clone,
    T::Err: Display,
{
    if let Some(val) = file_value {
        if !is_default {
            debug!("Using {} from configuration file", env_var);
            return val;
        }
    }

    if let Ok(env_str) = std::env::var(env_var) {
        match env_str.parse::<T>() {
            Ok(val) => {
                debug!("Using {} from environment: {}", env_var, env_str);
                return val;
            },
            Err(e) => {
                warn!("Failed to parse {} from environment: {}", env_var, e);
            },
        }
    }

    debug!("Using default value for {}", env_var);
    default
}

/// Get string configuration value with priority: Config file > ENV > Default
pub fn get_string_config(
    file_value: Option<String>,
    is_default: bool,
    env_var: &str,
    default: String,
) -> String {
    if let Some(val) = file_value {
        if !val.is_empty() && !is_default {
            debug!("Using {} from configuration file", env_var);
            return val;
        }
    }

    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.is_empty() {
            debug!("Using {} from environment", env_var);
            return env_val;
        }
    }

    debug!("Using default value for {}", env_var);
    default
}
