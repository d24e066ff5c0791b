//! Meter Sniffer Service (metersrv)
//!
//! Reads the sniffer's serial line (or a replay file) and records every meter
//! response into daily CSV files.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use common::bootstrap_args::ServiceArgs;
use errors::VoltageResult;
use metersrv::{
    bootstrap::{self, Args},
    runtime, DailyRecordWriter, MeterPipeline,
};

#[tokio::main]
async fn main() -> VoltageResult<()> {
    let args = Args::parse();
    let replay = args.replay.clone();
    let service_args: ServiceArgs = args.into();
    let service_info = bootstrap::service_info();

    common::service_bootstrap::load_development_env();
    let config = bootstrap::load_configuration(&service_args)?;

    bootstrap::initialize_logging(&service_args, &service_info, &config)?;
    if !service_args.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    config.validate()?;

    // Validation mode: validate and exit
    if service_args.validate {
        info!("Effective configuration:\n{}", config.to_yaml()?);
        info!("Validation completed successfully");
        return Ok(());
    }

    let writer = DailyRecordWriter::new(config.records.path_template.clone())?;
    let mut pipeline = MeterPipeline::new(&config, writer);
    info!("Records: {}", config.records.path_template);

    let cancel = CancellationToken::new();
    let shutdown = {
        let cancel = cancel.clone();
        let deadline = config.shutdown_after();
        if let Some(deadline) = deadline {
            info!("Shutdown scheduled in {:?}", deadline);
        }
        tokio::spawn(async move {
            common::shutdown::wait_for_shutdown_or(deadline).await;
            info!("Shutdown requested");
            cancel.cancel();
        })
    };

    let read_buffer = config.serial.read_buffer;
    let result = match replay {
        Some(path) => {
            let file = runtime::open_replay(&path).await?;
            runtime::run_stream(file, &mut pipeline, read_buffer, cancel).await
        },
        None => {
            let port = runtime::open_serial(&config.serial)?;
            runtime::run_stream(port, &mut pipeline, read_buffer, cancel).await
        },
    };

    shutdown.abort();
    info!("Pipeline statistics: {}", pipeline.stats());

    match result {
        Ok(end) => {
            info!("metersrv stopped ({:?})", end);
            Ok(())
        },
        Err(e) => {
            error!("metersrv stopped with error [{}]: {}", e.error_code(), e);
            Err(e)
        },
    }
}
