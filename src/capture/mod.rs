//! Capture file encoding and sink output
//!
//! Three container layouts are supported, selected per session:
//! 1. pcapng with the radio metadata attached as packet comments
//! 2. legacy pcap wrapping each payload in a synthetic Ethernet/IPv4 header
//! 3. legacy pcap with the IEEE 802.15.4 TAP pseudo-header

mod format;
pub mod pcap;
pub mod pcapng;
mod tap;
mod writer;

pub use format::{CaptureFormat, Encoder};
pub use writer::{CaptureWriter, SinkError};
