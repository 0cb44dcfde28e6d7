//! Sniffer telemetry line parser
//!
//! The firmware prints one JSON object per line. Frame lines carry the payload
//! as a hex string under `S`; everything else (status, boot banners) has no
//! `S` and is skipped.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::CapturedFrame;

/// Errors for a single telemetry line. Never fatal to the stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed telemetry line: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Telemetry keys the firmware uses
const KEY_PAYLOAD: &str = "S";
const KEY_RSSI: &str = "R";
const KEY_LQI: &str = "Q";
const KEY_CHANNEL: &str = "C";
const KEY_LENGTH: &str = "L";

/// Decode one serial line, stamping the frame with the current time
pub fn decode_line(raw: &[u8]) -> Result<Option<CapturedFrame>, DecodeError> {
    decode_line_at(raw, Utc::now())
}

/// Decode one serial line with an explicit capture timestamp
///
/// Returns `Ok(None)` for blank lines and for objects without a payload.
pub fn decode_line_at(
    raw: &[u8],
    captured_at: DateTime<Utc>,
) -> Result<Option<CapturedFrame>, DecodeError> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return Ok(None);
    }

    // Only an object is telemetry. Values stay untyped so a field of the
    // wrong JSON type degrades to its default; a repeated key keeps the last.
    let telemetry: Map<String, Value> = serde_json::from_str(line)?;
    let field = |key: &str| telemetry.get(key).unwrap_or(&Value::Null);

    let hex_str = match field(KEY_PAYLOAD).as_str() {
        Some(s) => s,
        None => return Ok(None),
    };
    let payload = decode_payload(hex_str)?;

    Ok(Some(CapturedFrame {
        payload,
        rssi: int_field(field(KEY_RSSI)),
        lqi: int_field(field(KEY_LQI)),
        channel: int_field(field(KEY_CHANNEL)),
        length_hint: int_field(field(KEY_LENGTH)),
        captured_at,
    }))
}

/// Strip byte separators (`01:02:03`, `01 02 03`) and hex-decode
fn decode_payload(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let cleaned: String = hex_str
        .chars()
        .filter(|c| *c != ' ' && *c != ':')
        .collect();
    hex::decode(cleaned)
}

/// Read an integer field, falling back to the default on a missing,
/// wrong-typed or out-of-range value
fn int_field<T>(value: &Value) -> T
where
    T: TryFrom<i64> + Default,
{
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    };

    n.and_then(|n| T::try_from(n).ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap()
    }

    fn decode(line: &str) -> Result<Option<CapturedFrame>, DecodeError> {
        decode_line_at(line.as_bytes(), ts())
    }

    #[test]
    fn test_decode_colon_separated_frame() {
        let frame = decode(r#"{"S":"01:02:03","R":-40,"Q":200,"C":15}"#)
            .unwrap()
            .unwrap();

        assert_eq!(frame.payload, vec![0x01, 0x02, 0x03]);
        assert_eq!(frame.rssi, -40);
        assert_eq!(frame.lqi, 200);
        assert_eq!(frame.channel, 15);
        assert_eq!(frame.length_hint, 0);
        assert_eq!(frame.captured_at, ts());
    }

    #[test]
    fn test_decode_space_separated_and_plain_hex() {
        let spaced = decode(r#"{"S":"41 88 c5 ff"}"#).unwrap().unwrap();
        let plain = decode(r#"{"S":"4188C5FF"}"#).unwrap().unwrap();

        assert_eq!(spaced.payload, vec![0x41, 0x88, 0xC5, 0xFF]);
        assert_eq!(spaced.payload, plain.payload);
    }

    #[test]
    fn test_decode_length_hint_is_informational() {
        let frame = decode(r#"{"S":"0102","L":127}"#).unwrap().unwrap();
        assert_eq!(frame.length_hint, 127);
        assert_eq!(frame.payload.len(), 2);
    }

    #[test]
    fn test_decode_empty_payload_string() {
        let frame = decode(r#"{"S":""}"#).unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_missing_payload_is_skipped() {
        assert!(decode(r#"{"status":"ready","C":11}"#).unwrap().is_none());
        assert!(decode(r#"{}"#).unwrap().is_none());
    }

    #[test]
    fn test_non_string_payload_is_skipped() {
        assert!(decode(r#"{"S":12}"#).unwrap().is_none());
        assert!(decode(r#"{"S":null}"#).unwrap().is_none());
    }

    #[test]
    fn test_blank_lines() {
        assert!(decode("").unwrap().is_none());
        assert!(decode("   \t").unwrap().is_none());
        assert!(decode("\r\n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(r#"{"S":"0102""#), Err(DecodeError::Malformed(_))));
        // valid JSON but not an object
        assert!(matches!(decode("[1,2,3]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("42"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(r#""0102""#), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("null"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_array_shaped_like_telemetry_is_malformed() {
        // positional values must not be read as S/R/Q/C
        assert!(matches!(
            decode(r#"["0102",-40,200,15]"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(decode("[]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(r#"[{"S":"0102"}]"#), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_duplicate_keys_keep_last_value() {
        let frame = decode(r#"{"S":"01","S":"02","R":-10,"R":-20}"#)
            .unwrap()
            .unwrap();

        assert_eq!(frame.payload, vec![0x02]);
        assert_eq!(frame.rssi, -20);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(decode(r#"{"S":"012"}"#), Err(DecodeError::InvalidHex(_))));
        assert!(matches!(decode(r#"{"S":"zz"}"#), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_wrong_typed_metadata_defaults() {
        let frame = decode(r#"{"S":"AA","R":"-40","Q":[1],"C":true,"L":null}"#)
            .unwrap()
            .unwrap();

        assert_eq!(frame.rssi, 0);
        assert_eq!(frame.lqi, 0);
        assert_eq!(frame.channel, 0);
        assert_eq!(frame.length_hint, 0);
    }

    #[test]
    fn test_out_of_range_metadata_defaults() {
        let frame = decode(r#"{"S":"AA","R":-200,"Q":300,"C":-1}"#)
            .unwrap()
            .unwrap();

        assert_eq!(frame.rssi, 0);
        assert_eq!(frame.lqi, 0);
        assert_eq!(frame.channel, 0);
    }

    #[test]
    fn test_integral_floats_are_accepted() {
        let frame = decode(r#"{"S":"AA","R":-71.0,"Q":180.0,"C":20.5}"#)
            .unwrap()
            .unwrap();

        assert_eq!(frame.rssi, -71);
        assert_eq!(frame.lqi, 180);
        assert_eq!(frame.channel, 0);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let frame = decode(r#"{"S":"AA","T":123456,"fw":"1.2"}"#).unwrap().unwrap();
        assert_eq!(frame.payload, vec![0xAA]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut raw = br#"{"S":"0102","X":""#.to_vec();
        raw.push(0xFF);
        raw.extend_from_slice(b"\"}\n");

        let frame = decode_line_at(&raw, ts()).unwrap().unwrap();
        assert_eq!(frame.payload, vec![0x01, 0x02]);
    }
}
