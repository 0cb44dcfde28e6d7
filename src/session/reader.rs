//! Telemetry reader loop - reads sniffer lines and queues decoded frames

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::telemetry::{decode_line, CapturedFrame, DecodeError};

use super::state::{SessionStats, StopSignal};

/// Read the sniffer stream line by line until EOF or stop
///
/// A full channel suspends the loop; frames are never dropped to make room,
/// not even when a stop arrives while one is waiting to be queued. Dropping
/// `tx` on return is what tells the writer no more frames follow.
pub async fn run_reader<R>(
    mut source: R,
    tx: mpsc::Sender<CapturedFrame>,
    mut stop: StopSignal,
    stats: Arc<SessionStats>,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    info!("Waiting for sniffer telemetry...");

    let mut line = Vec::new();
    let mut first_frame = true;

    loop {
        line.clear();

        let read = tokio::select! {
            biased;
            _ = stop.stopped() => {
                debug!("Stop requested, reader exiting");
                break;
            }
            read = source.read_until(b'\n', &mut line) => read,
        };

        match read {
            Ok(0) => {
                info!("Sniffer stream closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error reading sniffer stream: {}", e);
                return Err(e);
            }
        }

        stats.record_line();

        let frame = match decode_line(&line) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                stats.record_skipped();
                debug!("Skipping non-frame line: {}", String::from_utf8_lossy(&line).trim());
                continue;
            }
            Err(e) => {
                match e {
                    DecodeError::Malformed(_) => stats.record_malformed(),
                    DecodeError::InvalidHex(_) => stats.record_invalid_hex(),
                }
                warn!("{}: {}", e, String::from_utf8_lossy(&line).trim());
                continue;
            }
        };

        stats.record_decoded();
        if first_frame {
            info!("First frame received! Sniffer is working.");
            first_frame = false;
        }
        debug!(
            ">>> FRAME: ch={} rssi={} lqi={} | {} bytes | {}",
            frame.channel,
            frame.rssi,
            frame.lqi,
            frame.payload.len(),
            frame.to_hex()
        );

        // A decoded frame is always handed over; stop is only checked at the next read
        if tx.send(frame).await.is_err() {
            warn!("Frame channel closed, stopping reader");
            break;
        }
    }

    Ok(())
}
