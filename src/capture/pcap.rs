//! Legacy pcap container
//!
//! Global header and per-record framing come from `pcap_file`, staged in
//! memory so the caller can push each record to the sink in one write. The
//! synthetic Ethernet/IPv4 wrapper that lets a generic network reader open
//! link-layer-agnostic payloads is plain packet data; its headers use network
//! order like real wire traffic.

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::{DataLink, Endianness, PcapResult, TsResolution};

use crate::telemetry::CapturedFrame;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Unassigned protocol number (RFC 3692 experimentation)
pub const IP_PROTO_EXPERIMENTAL: u8 = 0xFE;
pub const IP_TTL: u8 = 64;
pub const LOOPBACK: [u8; 4] = [127, 0, 0, 1];

/// Little-endian, microsecond-resolution pcap 2.4 header
fn pcap_header(snaplen: u32, datalink: DataLink) -> PcapHeader {
    PcapHeader {
        snaplen,
        datalink,
        ts_resolution: TsResolution::MicroSecond,
        endianness: Endianness::Little,
        ..Default::default()
    }
}

/// Frames records for one legacy pcap stream
pub struct PcapFramer {
    writer: PcapWriter<Vec<u8>>,
    header: Vec<u8>,
    snaplen: u32,
}

impl PcapFramer {
    pub fn new(snaplen: u32, datalink: DataLink) -> PcapResult<Self> {
        let mut writer = PcapWriter::with_header(Vec::new(), pcap_header(snaplen, datalink))?;
        let header = std::mem::take(writer.get_mut());

        Ok(Self {
            writer,
            header,
            snaplen,
        })
    }

    /// The 24-byte global header
    pub fn global_header(&self) -> &[u8] {
        &self.header
    }

    /// One record: 16-byte header followed by the (possibly snapped) data
    ///
    /// Data beyond the snap length is cut from the captured bytes; the
    /// original length still reports the full size.
    pub fn record(&mut self, frame: &CapturedFrame, data: &[u8]) -> PcapResult<Vec<u8>> {
        let captured = data.len().min(self.snaplen as usize);
        let packet = PcapPacket {
            timestamp: frame.since_epoch(),
            orig_len: u32::try_from(data.len()).unwrap_or(u32::MAX),
            data: data[..captured].into(),
        };

        self.writer.write_packet(&packet)?;
        Ok(std::mem::take(self.writer.get_mut()))
    }
}

/// Wrap a payload in a zero-MAC Ethernet header and a loopback IPv4 header
///
/// The IPv4 checksum is left at zero and the total length saturates at
/// 65535 for payloads that cannot be described by the 16-bit field.
pub fn synthetic_ethernet_ip(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + payload.len());

    // Ethernet: dst, src, ethertype
    bytes.extend_from_slice(&[0u8; 6]);
    bytes.extend_from_slice(&[0u8; 6]);
    bytes.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

    let total_len = u16::try_from(IPV4_HEADER_LEN + payload.len()).unwrap_or(u16::MAX);

    // IPv4
    bytes.push(0x45); // version 4, IHL 5
    bytes.push(0); // DSCP/ECN
    bytes.extend_from_slice(&total_len.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes()); // identification
    bytes.extend_from_slice(&0u16.to_be_bytes()); // flags, fragment offset
    bytes.push(IP_TTL);
    bytes.push(IP_PROTO_EXPERIMENTAL);
    bytes.extend_from_slice(&0u16.to_be_bytes()); // checksum
    bytes.extend_from_slice(&LOOPBACK);
    bytes.extend_from_slice(&LOOPBACK);

    bytes.extend_from_slice(payload);
    bytes
}
