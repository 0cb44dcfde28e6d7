//! Shared per-session state: counters and the stop signal

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Counters updated by the reader and writer loops
#[derive(Debug, Default)]
pub struct SessionStats {
    pub lines_read: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub lines_skipped: AtomicU64,
    pub malformed_lines: AtomicU64,
    pub invalid_hex: AtomicU64,
    pub records_written: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_hex(&self) {
        self.invalid_hex.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, bytes: usize) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn get_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn get_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            invalid_hex: self.invalid_hex.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub frames_decoded: u64,
    pub lines_skipped: u64,
    pub malformed_lines: u64,
    pub invalid_hex: u64,
    pub records_written: u64,
    pub bytes_written: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lines: {} | Frames: {} | Skipped: {} | Malformed: {} | Bad hex: {} | Records: {} ({} bytes)",
            self.lines_read,
            self.frames_decoded,
            self.lines_skipped,
            self.malformed_lines,
            self.invalid_hex,
            self.records_written,
            self.bytes_written
        )
    }
}

/// Cooperative stop flag shared by both loops
///
/// Loops either poll [`StopSignal::is_stopped`] or await
/// [`StopSignal::stopped`] at their suspension points.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `stop` has been called on any clone
    pub async fn stopped(&mut self) {
        // The sender lives as long as any clone, so this only returns on stop
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
