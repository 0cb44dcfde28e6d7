//! pcapng container with per-packet comment options
//!
//! Stream layout: section header block, one interface description block,
//! then one enhanced packet block per frame. Each packet block carries the
//! radio metadata as four one-byte `opt_comment` options in a fixed order:
//! rssi, lqi, channel, length hint.
//!
//! The section and interface blocks come from `pcap_file`. Packet blocks are
//! framed here because the crate's comment option only holds UTF-8 text and
//! these comments are raw bytes.

use pcap_file::pcapng::blocks::interface_description::InterfaceDescriptionBlock;
use pcap_file::pcapng::PcapNgWriter;
use pcap_file::{DataLink, Endianness, PcapResult};

use crate::telemetry::CapturedFrame;

pub const EPB_TYPE: u32 = 0x0000_0006;

pub const OPT_ENDOFOPT: u16 = 0;
pub const OPT_COMMENT: u16 = 1;

/// Frame a block body: type, total length, body, total length again
fn block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (body.len() + 12) as u32;

    let mut bytes = Vec::with_capacity(total_len as usize);
    bytes.extend_from_slice(&block_type.to_le_bytes());
    bytes.extend_from_slice(&total_len.to_le_bytes());
    bytes.extend_from_slice(body);
    bytes.extend_from_slice(&total_len.to_le_bytes());
    bytes
}

fn pad_to_32(bytes: &mut Vec<u8>) {
    let padded = (bytes.len() + 3) & !3;
    bytes.resize(padded, 0);
}

fn push_option(body: &mut Vec<u8>, code: u16, value: &[u8]) {
    body.extend_from_slice(&code.to_le_bytes());
    body.extend_from_slice(&(value.len() as u16).to_le_bytes());
    body.extend_from_slice(value);
    pad_to_32(body);
}

/// Little-endian section header plus the interface description block for
/// raw 802.15.4 frames without FCS, default microsecond resolution
pub fn stream_header(snaplen: u32) -> PcapResult<Vec<u8>> {
    let mut writer = PcapNgWriter::with_endianness(Vec::new(), Endianness::Little)?;
    writer.write_pcapng_block(InterfaceDescriptionBlock {
        linktype: DataLink::IEEE802_15_4_NOFCS,
        snaplen,
        options: vec![],
    })?;
    Ok(writer.into_inner())
}

/// Enhanced packet block on interface 0
pub fn enhanced_packet(frame: &CapturedFrame, snaplen: u32) -> Vec<u8> {
    let captured = frame.payload.len().min(snaplen as usize);
    let ts = frame.ts_micros();

    let mut body = Vec::with_capacity(20 + captured + 40);
    body.extend_from_slice(&0u32.to_le_bytes()); // interface id
    body.extend_from_slice(&((ts >> 32) as u32).to_le_bytes());
    body.extend_from_slice(&(ts as u32).to_le_bytes());
    body.extend_from_slice(&(captured as u32).to_le_bytes());
    body.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    body.extend_from_slice(&frame.payload[..captured]);
    pad_to_32(&mut body);

    push_option(&mut body, OPT_COMMENT, &frame.rssi.to_le_bytes());
    push_option(&mut body, OPT_COMMENT, &frame.lqi.to_le_bytes());
    push_option(&mut body, OPT_COMMENT, &frame.channel.to_le_bytes());
    push_option(&mut body, OPT_COMMENT, &frame.length_hint.to_le_bytes());
    push_option(&mut body, OPT_ENDOFOPT, &[]);

    block(EPB_TYPE, &body)
}
