//! `VoltageEMS` basic library
//!
//! Provides functions shared by VoltageEMS services:
//! - logging (console, daily rolling files, frame diagnostics)
//! - service bootstrap (arguments, banner, development environment)
//! - configuration value lookup with environment fallback
//! - graceful shutdown

pub mod bootstrap_args;
pub mod config_loader;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;
