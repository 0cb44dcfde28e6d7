//! Zigbee Capture - sniffer telemetry to live pcap stream
//!
//! Reads line-delimited JSON telemetry from an 802.15.4 sniffer over serial,
//! and streams the captured frames into a FIFO that Wireshark reads live.

mod capture;
mod config;
mod session;
mod telemetry;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Config;
use session::Session;

type TelemetrySource = BufReader<Box<dyn AsyncRead + Unpin + Send>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout and the FIFO belong to the capture host
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("===========================================");
    info!("   Zigbee Capture - 802.15.4 sniffer bridge");
    info!("===========================================");

    let config = Config::from_env().context("Invalid configuration")?;

    info!("Configuration:");
    info!("  Device: {}", config.device);
    info!("  Baud rate: {}", config.baud_rate);
    info!("  FIFO: {}", config.fifo.display());
    info!("  Channel: {}", config.channel);
    info!("  Format: {}", config.format);
    info!("  Queue capacity: {}", config.queue_capacity);

    let source = open_source(&config)?;

    // Opening a FIFO for writing waits until the reader side is open
    let sink = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&config.fifo)
        .await
        .with_context(|| format!("Failed to open capture FIFO {}", config.fifo.display()))?;

    let session = Session::new(config.session_config());

    let stop = session.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, stopping capture...");
            stop.stop();
        }
    });

    info!("===========================================");
    info!("  Starting capture...");
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    match session.run(source, sink).await {
        Ok(summary) => {
            info!("Shutdown complete. {}", summary);
            Ok(())
        }
        Err(e) => {
            error!("Capture session ended with error: {}", e);
            Err(e.into())
        }
    }
}

/// Open the sniffer's serial port, or stdin when the device is "-"
fn open_source(config: &Config) -> Result<TelemetrySource> {
    if config.device == "-" {
        info!("Reading telemetry from stdin");
        return Ok(BufReader::new(Box::new(tokio::io::stdin())));
    }

    let port = tokio_serial::new(&config.device, config.baud_rate)
        .open_native_async()
        .with_context(|| format!("Failed to open serial port {}", config.device))?;

    info!("Serial port {} open", config.device);
    Ok(BufReader::new(Box::new(port)))
}
