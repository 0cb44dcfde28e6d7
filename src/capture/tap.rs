//! IEEE 802.15.4 TAP pseudo-header (LINKTYPE 283)
//!
//! Each record starts with a small header followed by 4-byte aligned TLVs
//! carrying the radio metadata, then the raw 802.15.4 frame.

use crate::telemetry::CapturedFrame;

const TAP_VERSION: u8 = 0;
const TAP_HEADER_LEN: u16 = 4;

/// TLV types used by this bridge
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tlv {
    /// Received signal strength, dBm
    Rss(f32),
    /// Channel number, channel page
    ChannelAssignment(u16, u8),
    /// Link quality indicator
    Lqi(u8),
}

impl Tlv {
    fn type_id(&self) -> u16 {
        match self {
            Tlv::Rss(_) => 1,
            Tlv::ChannelAssignment(..) => 3,
            Tlv::Lqi(_) => 10,
        }
    }

    /// Encode as type, length, value, zero padding to 4 bytes
    pub fn as_bytes(&self) -> Vec<u8> {
        let value: Vec<u8> = match self {
            Tlv::Rss(rss) => rss.to_le_bytes().to_vec(),
            Tlv::ChannelAssignment(num, page) => {
                let mut v = num.to_le_bytes().to_vec();
                v.push(*page);
                v
            }
            Tlv::Lqi(lqi) => vec![*lqi],
        };

        let mut bytes = Vec::with_capacity(4 + padded_len(value.len()));
        bytes.extend_from_slice(&self.type_id().to_le_bytes());
        bytes.extend_from_slice(&(value.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&value);
        bytes.resize(4 + padded_len(value.len()), 0);
        bytes
    }
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Build the TAP-framed packet data for one frame
///
/// `fallback_channel` is used when the sniffer did not report a channel.
pub fn encapsulate(frame: &CapturedFrame, fallback_channel: u8) -> Vec<u8> {
    let channel = if frame.channel == 0 {
        fallback_channel
    } else {
        frame.channel
    };

    let tlvs = [
        Tlv::Rss(frame.rssi as f32),
        Tlv::Lqi(frame.lqi),
        Tlv::ChannelAssignment(channel as u16, 0),
    ];
    let tlv_bytes: Vec<u8> = tlvs.iter().flat_map(|tlv| tlv.as_bytes()).collect();
    let header_len = TAP_HEADER_LEN + tlv_bytes.len() as u16;

    let mut bytes = Vec::with_capacity(header_len as usize + frame.payload.len());
    bytes.push(TAP_VERSION);
    bytes.push(0); // reserved
    bytes.extend_from_slice(&header_len.to_le_bytes());
    bytes.extend_from_slice(&tlv_bytes);
    bytes.extend_from_slice(&frame.payload);
    bytes
}
