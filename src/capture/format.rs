//! Capture output formats

use std::fmt;
use std::str::FromStr;

use pcap_file::{DataLink, PcapResult};

use crate::telemetry::CapturedFrame;

use super::pcap::PcapFramer;
use super::{pcap, pcapng, tap};

/// Container layout written to the sink, chosen once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureFormat {
    /// pcapng, raw 802.15.4 frames, metadata as packet comments
    #[default]
    CommentedRecord,
    /// Legacy pcap, payload disguised as IPv4-over-Ethernet
    SyntheticEthernetIp,
    /// Legacy pcap with the IEEE 802.15.4 TAP pseudo-header
    Ieee802154Tap,
}

impl FromStr for CaptureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcapng" | "commented" => Ok(Self::CommentedRecord),
            "ethernet" | "legacy" => Ok(Self::SyntheticEthernetIp),
            "tap" => Ok(Self::Ieee802154Tap),
            other => Err(format!(
                "unknown capture format '{}' (expected pcapng, ethernet or tap)",
                other
            )),
        }
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CommentedRecord => "pcapng",
            Self::SyntheticEthernetIp => "ethernet",
            Self::Ieee802154Tap => "tap",
        };
        f.write_str(name)
    }
}

/// Turns frames into container bytes for one session
pub struct Encoder {
    format: CaptureFormat,
    channel: u8,
    framing: Framing,
}

enum Framing {
    Pcapng { header: Vec<u8>, snaplen: u32 },
    Ethernet(PcapFramer),
    Tap(PcapFramer),
}

impl Encoder {
    pub fn new(format: CaptureFormat, snaplen: u32, channel: u8) -> PcapResult<Self> {
        let framing = match format {
            CaptureFormat::CommentedRecord => Framing::Pcapng {
                header: pcapng::stream_header(snaplen)?,
                snaplen,
            },
            CaptureFormat::SyntheticEthernetIp => {
                Framing::Ethernet(PcapFramer::new(snaplen, DataLink::ETHERNET)?)
            }
            CaptureFormat::Ieee802154Tap => {
                Framing::Tap(PcapFramer::new(snaplen, DataLink::IEEE802_15_4_TAP)?)
            }
        };

        Ok(Self {
            format,
            channel,
            framing,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Bytes written once at the start of the stream
    pub fn header(&self) -> &[u8] {
        match &self.framing {
            Framing::Pcapng { header, .. } => header.as_slice(),
            Framing::Ethernet(framer) | Framing::Tap(framer) => framer.global_header(),
        }
    }

    /// Bytes for one frame
    pub fn record(&mut self, frame: &CapturedFrame) -> PcapResult<Vec<u8>> {
        match &mut self.framing {
            Framing::Pcapng { snaplen, .. } => Ok(pcapng::enhanced_packet(frame, *snaplen)),
            Framing::Ethernet(framer) => {
                framer.record(frame, &pcap::synthetic_ethernet_ip(&frame.payload))
            }
            Framing::Tap(framer) => framer.record(frame, &tap::encapsulate(frame, self.channel)),
        }
    }
}
