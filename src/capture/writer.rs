//! Capture sink writer
//!
//! Writes the container header once, then one record per frame, flushing
//! after each so a live reader on the other end of a FIFO sees it at once.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::telemetry::CapturedFrame;

use super::format::Encoder;

/// Encoding or sink failures. Always fatal to the session.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("capture record could not be encoded: {0}")]
    Encode(#[from] pcap_file::PcapError),

    #[error("capture sink write failed: {0}")]
    Write(#[source] io::Error),

    #[error("capture sink flush failed: {0}")]
    Flush(#[source] io::Error),

    #[error("capture sink close failed: {0}")]
    Close(#[source] io::Error),
}

/// Encodes frames and streams them to an already-open sink
pub struct CaptureWriter<W> {
    sink: W,
    encoder: Encoder,
    header_written: bool,
    records_written: u64,
    bytes_written: u64,
}

impl<W> CaptureWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: W, encoder: Encoder) -> Self {
        Self {
            sink,
            encoder,
            header_written: false,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Write the container header. Later calls are no-ops.
    pub async fn write_header(&mut self) -> Result<(), SinkError> {
        if self.header_written {
            return Ok(());
        }

        let header = self.encoder.header().to_vec();
        self.emit(&header).await?;
        self.header_written = true;

        debug!(
            "Wrote {} header ({} bytes)",
            self.encoder.format(),
            header.len()
        );
        Ok(())
    }

    /// Write one frame as a record, returning the record size in bytes
    pub async fn write_record(&mut self, frame: &CapturedFrame) -> Result<usize, SinkError> {
        if !self.header_written {
            self.write_header().await?;
        }

        let record = self.encoder.record(frame)?;
        self.emit(&record).await?;
        self.records_written += 1;

        Ok(record.len())
    }

    async fn emit(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.sink.write_all(bytes).await.map_err(SinkError::Write)?;
        self.sink.flush().await.map_err(SinkError::Flush)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Flush and shut the sink down, handing it back
    pub async fn close(mut self) -> Result<W, SinkError> {
        self.sink.flush().await.map_err(SinkError::Flush)?;
        self.sink.shutdown().await.map_err(SinkError::Close)?;
        Ok(self.sink)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::format::CaptureFormat;
    use chrono::Utc;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn frame(payload: Vec<u8>) -> CapturedFrame {
        CapturedFrame {
            payload,
            rssi: -60,
            lqi: 110,
            channel: 11,
            length_hint: 0,
            captured_at: Utc::now(),
        }
    }

    /// Sink that counts flushes and can be told to fail writes
    #[derive(Default)]
    struct CountingSink {
        data: Vec<u8>,
        flushes: usize,
        shutdowns: usize,
        fail_writes: bool,
    }

    impl AsyncWrite for CountingSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.fail_writes {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader gone")));
            }
            self.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.shutdowns += 1;
            Poll::Ready(Ok(()))
        }
    }

    fn ethernet_encoder() -> Encoder {
        Encoder::new(CaptureFormat::SyntheticEthernetIp, 65535, 11).unwrap()
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let mut writer = CaptureWriter::new(Vec::new(), ethernet_encoder());
        writer.write_header().await.unwrap();
        writer.write_header().await.unwrap();
        writer.write_record(&frame(vec![1, 2])).await.unwrap();

        let sink = writer.close().await.unwrap();
        let magic_count = sink
            .windows(4)
            .filter(|w| *w == [0xD4, 0xC3, 0xB2, 0xA1])
            .count();
        assert_eq!(magic_count, 1);
        // global header, record header, Ethernet + IPv4, payload
        assert_eq!(sink.len(), 24 + 16 + 34 + 2);
    }

    #[tokio::test]
    async fn test_record_without_explicit_header() {
        let mut writer = CaptureWriter::new(Vec::new(), ethernet_encoder());
        writer.write_record(&frame(vec![9])).await.unwrap();

        let sink = writer.close().await.unwrap();
        assert_eq!(&sink[0..4], &[0xD4, 0xC3, 0xB2, 0xA1]);
    }

    #[tokio::test]
    async fn test_flush_after_every_record() {
        let mut writer = CaptureWriter::new(CountingSink::default(), ethernet_encoder());
        writer.write_header().await.unwrap();
        for i in 0..3u8 {
            writer.write_record(&frame(vec![i])).await.unwrap();
            assert_eq!(writer.sink.flushes, 2 + i as usize);
        }
        assert_eq!(writer.records_written(), 3);
        assert_eq!(writer.bytes_written(), writer.sink.data.len() as u64);

        let sink = writer.close().await.unwrap();
        assert_eq!(sink.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces() {
        let sink = CountingSink {
            fail_writes: true,
            ..Default::default()
        };
        let mut writer = CaptureWriter::new(sink, ethernet_encoder());

        let err = writer.write_record(&frame(vec![1])).await.unwrap_err();
        assert!(matches!(err, SinkError::Write(_)));
        assert_eq!(writer.records_written(), 0);
    }
}
