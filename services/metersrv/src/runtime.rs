//! Byte sources and the read loop
//!
//! The loop reads one chunk at a time and hands it to the pipeline before the
//! next read is issued, so decoding never runs concurrently with itself.

use std::path::Path;

use errors::{VoltageError, VoltageResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::pipeline::MeterPipeline;
use crate::record::RecordSink;

/// Why the read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source reported end of file
    Eof,
    Cancelled,
}

/// Drive `reader` into `pipeline` until EOF or cancellation.
///
/// A partial frame still buffered when the loop ends is dropped.
pub async fn run_stream<R, S>(
    mut reader: R,
    pipeline: &mut MeterPipeline<S>,
    read_buffer: usize,
    cancel: CancellationToken,
) -> VoltageResult<StreamEnd>
where
    R: AsyncRead + Unpin,
    S: RecordSink,
{
    let mut buf = vec![0u8; read_buffer.max(1)];

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break StreamEnd::Cancelled,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break StreamEnd::Eof,
                Ok(n) => {
                    pipeline.ingest(&buf[..n]);
                },
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VoltageError::Communication(format!("Read failed: {}", e)));
                },
            },
        }
    };

    let dropped = pipeline.discard_partial();
    if dropped > 0 {
        debug!("Dropped partial frame of {} characters", dropped);
    }
    info!("Stream ended: {:?}", end);

    Ok(end)
}

/// Open the sniffer's serial port; nothing is ever written to it
pub fn open_serial(config: &SerialConfig) -> VoltageResult<SerialStream> {
    config.validate()?;

    debug!("Opening serial port: {}", config.port);

    let port = tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(config.tokio_data_bits())
        .parity(config.tokio_parity())
        .stop_bits(config.tokio_stop_bits())
        .open_native_async()
        .map_err(|e| VoltageError::SerialPort {
            port: config.port.clone(),
            reason: e.to_string(),
        })?;

    info!(
        "Serial port {} opened ({} baud, {}{:?}{})",
        config.port,
        config.baud_rate,
        config.data_bits,
        config.parity,
        config.stop_bits
    );
    Ok(port)
}

/// Open a captured byte log for replay
pub async fn open_replay(path: &Path) -> VoltageResult<tokio::fs::File> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        warn!("Cannot open replay file {}: {}", path.display(), e);
        VoltageError::Io(e)
    })?;
    info!("Replaying {}", path.display());
    Ok(file)
}
