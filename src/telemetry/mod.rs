//! Sniffer telemetry decoding module

pub mod parser;
mod types;

pub use parser::{decode_line, DecodeError};
pub use types::CapturedFrame;
