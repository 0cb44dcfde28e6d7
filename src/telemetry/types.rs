//! Captured frame data types

use std::time::Duration;

use chrono::{DateTime, Utc};

/// One radio frame reported by the sniffer, plus the metadata it was sent with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Raw 802.15.4 payload, passed through untouched
    pub payload: Vec<u8>,

    /// Received signal strength in dBm
    pub rssi: i8,

    /// Link quality indicator
    pub lqi: u8,

    /// Channel the sniffer reported for this frame (0 if not reported)
    pub channel: u8,

    /// On-air length reported by the firmware. Informational only.
    pub length_hint: u8,

    /// Wall-clock time the line was decoded
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    /// Whole seconds since the Unix epoch, clamped to the 32-bit field a
    /// pcap record stores them in
    pub fn ts_sec(&self) -> u32 {
        u32::try_from(self.captured_at.timestamp().max(0)).unwrap_or(u32::MAX)
    }

    /// Sub-second part of the timestamp in microseconds
    pub fn ts_usec(&self) -> u32 {
        self.captured_at.timestamp_subsec_micros()
    }

    /// Time since the Unix epoch at microsecond precision, clamped like `ts_sec`
    pub fn since_epoch(&self) -> Duration {
        Duration::new(u64::from(self.ts_sec()), self.ts_usec() * 1_000)
    }

    /// Microseconds since the Unix epoch, zero before it
    pub fn ts_micros(&self) -> u64 {
        u64::try_from(self.captured_at.timestamp_micros()).unwrap_or(0)
    }

    /// Payload as uppercase hex, for log lines
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame_at(captured_at: DateTime<Utc>) -> CapturedFrame {
        CapturedFrame {
            payload: vec![0x41, 0x88],
            rssi: -40,
            lqi: 200,
            channel: 15,
            length_hint: 0,
            captured_at,
        }
    }

    #[test]
    fn test_timestamp_parts() {
        let frame = frame_at(Utc.timestamp_opt(1_700_000_123, 456_789_000).unwrap());

        assert_eq!(frame.ts_sec(), 1_700_000_123);
        assert_eq!(frame.ts_usec(), 456_789);
        assert_eq!(frame.ts_micros(), 1_700_000_123_456_789);
        assert_eq!(frame.since_epoch(), Duration::new(1_700_000_123, 456_789_000));
    }

    #[test]
    fn test_seconds_clamp_instead_of_wrapping() {
        // 2200-01-01, past the end of the 32-bit seconds field
        let late = frame_at(Utc.timestamp_opt(7_258_118_400, 0).unwrap());
        assert_eq!(late.ts_sec(), u32::MAX);
        assert_eq!(late.since_epoch().as_secs(), u64::from(u32::MAX));

        let early = frame_at(Utc.timestamp_opt(-86_400, 0).unwrap());
        assert_eq!(early.ts_sec(), 0);
        assert_eq!(early.ts_micros(), 0);
    }

    #[test]
    fn test_to_hex() {
        let frame = frame_at(Utc::now());
        assert_eq!(frame.to_hex(), "4188");
    }
}
