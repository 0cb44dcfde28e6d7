//! Session manager - wires the reader loop, the frame channel and the writer loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::capture::{CaptureFormat, CaptureWriter, Encoder, SinkError};
use crate::telemetry::CapturedFrame;

use super::reader::run_reader;
use super::state::{SessionStats, StatsSnapshot, StopSignal};
use super::SessionError;

/// How often the writer logs a stats line while running
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Configured radio channel (11-26)
    pub channel: u8,

    /// Output container layout
    pub format: CaptureFormat,

    /// Max captured bytes per record
    pub snaplen: u32,

    /// Frames the channel holds before the reader is made to wait
    pub queue_capacity: usize,

    /// Writer receive timeout; bounds how long a stop can go unnoticed
    pub writer_poll: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: 11,
            format: CaptureFormat::default(),
            snaplen: 262_144,
            queue_capacity: 256,
            writer_poll: Duration::from_secs(1),
        }
    }
}

/// One capture run from a sniffer stream into a capture sink
pub struct Session {
    config: SessionConfig,
    stop: StopSignal,
    stats: Arc<SessionStats>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// Handle for ending the session from elsewhere (e.g. Ctrl+C)
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    #[cfg(test)]
    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    /// Run until the source ends, the session is stopped, or the sink fails
    ///
    /// Every frame decoded before the session stops is still written, including
    /// one the reader was holding while the queue was full. The sink is closed
    /// once at the end unless it failed.
    pub async fn run<R, W>(self, source: R, sink: W) -> Result<StatsSnapshot, SessionError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        info!("Starting capture session:");
        info!("  Channel: {}", self.config.channel);
        info!("  Format: {}", self.config.format);
        info!("  Snap length: {}", self.config.snaplen);
        info!("  Queue capacity: {}", self.config.queue_capacity);

        let encoder = Encoder::new(self.config.format, self.config.snaplen, self.config.channel)
            .map_err(SinkError::from)?;
        let mut writer = CaptureWriter::new(sink, encoder);

        let (frame_tx, mut frame_rx) = mpsc::channel::<CapturedFrame>(self.config.queue_capacity);

        let reader_handle = tokio::spawn(run_reader(
            source,
            frame_tx,
            self.stop.clone(),
            self.stats.clone(),
        ));

        let written = run_writer(
            &mut frame_rx,
            &mut writer,
            &self.stop,
            self.config.writer_poll,
            &self.stats,
        )
        .await;

        // Halt the reader whichever way the writer ended
        self.stop.stop();
        drop(frame_rx);
        let reader_result = reader_handle.await;

        if let Err(e) = written {
            error!("Capture sink failed: {}", e);
            return Err(SessionError::Sink(e));
        }

        writer.close().await?;

        let snapshot = self.stats.snapshot();
        info!("Capture session finished. {}", snapshot);

        match reader_result {
            Ok(Ok(())) => Ok(snapshot),
            Ok(Err(e)) => Err(SessionError::Source(e)),
            Err(e) => Err(SessionError::Task(e)),
        }
    }
}

/// Pull frames off the channel in order and write each as a record
///
/// Returns when the channel closes. Once `stop` is set the reader exits at its
/// next read and drops its sender, so the writer keeps receiving until then;
/// that drains the queue and any frame still being sent. A receive timeout
/// only rechecks `stop`.
pub async fn run_writer<W>(
    frame_rx: &mut mpsc::Receiver<CapturedFrame>,
    writer: &mut CaptureWriter<W>,
    stop: &StopSignal,
    poll: Duration,
    stats: &SessionStats,
) -> Result<(), SinkError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_header().await?;

    let mut last_stats_log = Instant::now();

    loop {
        if stop.is_stopped() {
            let mut drained = 0u64;
            while let Some(frame) = frame_rx.recv().await {
                write_frame(writer, &frame, stats).await?;
                drained += 1;
            }
            info!("Stop requested, drained {} pending frames", drained);
            break;
        }

        match tokio::time::timeout(poll, frame_rx.recv()).await {
            Ok(Some(frame)) => write_frame(writer, &frame, stats).await?,
            Ok(None) => {
                info!("Frame channel closed");
                break;
            }
            Err(_) => {
                // Idle, loop round to recheck the stop flag
            }
        }

        if last_stats_log.elapsed() >= STATS_LOG_INTERVAL {
            info!("[Stats] {}", stats.snapshot());
            last_stats_log = Instant::now();
        }
    }

    Ok(())
}

async fn write_frame<W>(
    writer: &mut CaptureWriter<W>,
    frame: &CapturedFrame,
    stats: &SessionStats,
) -> Result<(), SinkError>
where
    W: AsyncWrite + Unpin,
{
    let size = writer.write_record(frame).await?;
    stats.record_written(size);
    debug!("Wrote record #{} ({} bytes)", writer.records_written(), size);
    Ok(())
}
