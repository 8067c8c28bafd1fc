//! CAN Record Decoding
//!
//! With headers on and formatting off, the adapter prints each monitored
//! frame as its arbitration ID in hex followed by the payload bytes in hex.
//! Firmware revisions disagree on spacing, so separators between digits are
//! ignored.

use crate::protocol::IdWidth;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ID reported for lines that are not CAN frames. Wider than any 29-bit ID.
pub const UNRECOGNIZED_ID: u32 = u32::MAX;

/// Maximum payload of a classic CAN frame
pub const MAX_PAYLOAD: usize = 8;

/// Notice printed while the adapter is still hunting for the bus protocol
const SEARCHING: &[u8] = b"SEARCHING";

/// A decoded CAN frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanFrame {
    /// Arbitration ID (11 or 29 significant bits)
    pub id: u32,
    /// Payload, at most 8 bytes
    pub payload: Vec<u8>,
}

impl CanFrame {
    pub fn new(id: u32, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id > IdWidth::Standard.max_id() {
            write!(f, "{:08X}", self.id)?;
        } else {
            write!(f, "{:03X}", self.id)?;
        }
        for byte in &self.payload {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// Adapter output that did not parse as a CAN frame, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(pub Vec<u8>);

impl RawLine {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

/// One unit of monitor output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A CAN frame
    Frame(CanFrame),
    /// A line that is not a CAN frame
    Unrecognized(RawLine),
    /// The adapter is back at its prompt, or still searching for a protocol.
    /// Nothing more will arrive without a new command.
    EndOfStream,
}

impl Record {
    /// Arbitration ID of the record; `UNRECOGNIZED_ID` for passthrough lines
    pub fn id(&self) -> Option<u32> {
        match self {
            Record::Frame(frame) => Some(frame.id),
            Record::Unrecognized(_) => Some(UNRECOGNIZED_ID),
            Record::EndOfStream => None,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Record::EndOfStream)
    }
}

/// Decode a line printed with 11-bit headers
pub fn decode_line(line: &[u8]) -> Record {
    decode_line_with(line, IdWidth::Standard)
}

/// Decode a line whose header is `width` hex digits wide
pub fn decode_line_with(line: &[u8], width: IdWidth) -> Record {
    let trimmed = trim_leading_whitespace(line);

    if let Some(frame) = parse_frame(trimmed, width) {
        return Record::Frame(frame);
    }
    if trimmed.starts_with(SEARCHING) {
        return Record::EndOfStream;
    }
    Record::Unrecognized(RawLine(line.to_vec()))
}

fn trim_leading_whitespace(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    &line[start..]
}

fn parse_frame(line: &[u8], width: IdWidth) -> Option<CanFrame> {
    let digits = width.hex_digits();
    if line.len() < digits {
        return None;
    }
    let (header, rest) = line.split_at(digits);

    let mut id = 0u32;
    for &byte in header {
        id = (id << 4) | u32::from(hex_value(byte)?);
    }

    Some(CanFrame::new(id, parse_payload(rest)?))
}

/// Pair hex digits into bytes, skipping separators. Any other alphanumeric
/// character, an odd digit count or an oversized payload rejects the line.
fn parse_payload(rest: &[u8]) -> Option<Vec<u8>> {
    let mut payload = Vec::with_capacity(MAX_PAYLOAD);
    let mut high: Option<u8> = None;

    for &byte in rest {
        if let Some(nibble) = hex_value(byte) {
            match high.take() {
                Some(h) => payload.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        } else if byte.is_ascii_alphanumeric() || byte == b'_' {
            return None;
        }
    }

    if high.is_some() || payload.len() > MAX_PAYLOAD {
        return None;
    }
    Some(payload)
}

/// Value of an upper-case hex digit; the adapter never prints lower case
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_spaced_frame() {
        let record = decode_line(b"4DA 01 02 03 04 05 06 07 08");
        assert_eq!(
            record,
            Record::Frame(CanFrame::new(0x4DA, vec![1, 2, 3, 4, 5, 6, 7, 8]))
        );
    }

    #[test]
    fn test_decode_unspaced_frame() {
        let record = decode_line(b"7E8064100BE3FA813");
        assert_eq!(
            record,
            Record::Frame(CanFrame::new(0x7E8, vec![0x06, 0x41, 0x00, 0xBE, 0x3F, 0xA8, 0x13]))
        );
    }

    #[test]
    fn test_decode_irregular_separators() {
        let record = decode_line(b"201  0A:0B .0C");
        assert_eq!(record, Record::Frame(CanFrame::new(0x201, vec![0x0A, 0x0B, 0x0C])));
    }

    #[test]
    fn test_decode_header_only() {
        assert_eq!(decode_line(b"433"), Record::Frame(CanFrame::new(0x433, Vec::new())));
    }

    #[test]
    fn test_leading_linefeed_is_skipped() {
        assert_eq!(
            decode_line(b"\n205 FF"),
            Record::Frame(CanFrame::new(0x205, vec![0xFF]))
        );
    }

    #[test]
    fn test_searching_is_end_of_stream() {
        assert_eq!(decode_line(b"SEARCHING..."), Record::EndOfStream);
        assert!(decode_line(b"SEARCHING").is_end_of_stream());
    }

    #[test]
    fn test_adapter_chatter_passes_through() {
        let lines: [&[u8]; 6] = [b"NO DATA", b"BUFFER FULL", b"CAN ERROR", b"?", b"", b"STOPPED"];
        for line in lines {
            let record = decode_line(line);
            assert_eq!(record, Record::Unrecognized(RawLine(line.to_vec())));
            assert_eq!(record.id(), Some(UNRECOGNIZED_ID));
        }
    }

    #[test]
    fn test_malformed_payloads_are_unrecognized() {
        // odd digit count
        assert!(matches!(decode_line(b"4DA 0"), Record::Unrecognized(_)));
        // non-hex letter
        assert!(matches!(decode_line(b"4DA 0G"), Record::Unrecognized(_)));
        // lower case is not adapter output
        assert!(matches!(decode_line(b"4da 01"), Record::Unrecognized(_)));
        // more than 8 bytes
        assert!(matches!(
            decode_line(b"4DA 01 02 03 04 05 06 07 08 09"),
            Record::Unrecognized(_)
        ));
    }

    #[test]
    fn test_passthrough_keeps_line_verbatim() {
        let record = decode_line(b"\nUNABLE TO CONNECT");
        assert_eq!(record, Record::Unrecognized(RawLine(b"\nUNABLE TO CONNECT".to_vec())));
    }

    #[test]
    fn test_extended_header() {
        let record = decode_line_with(b"18DAF110 03 41 0D 32", IdWidth::Extended);
        assert_eq!(
            record,
            Record::Frame(CanFrame::new(0x18DA_F110, vec![0x03, 0x41, 0x0D, 0x32]))
        );
    }

    #[test]
    fn test_id_zero_is_distinct_from_sentinel() {
        let record = decode_line(b"000 00");
        assert_eq!(record.id(), Some(0));
        assert_eq!(Record::EndOfStream.id(), None);
    }

    #[test]
    fn test_frame_display() {
        let frame = CanFrame::new(0x4DA, vec![0x00, 0xAB]);
        assert_eq!(frame.to_string(), "4DA 00 AB");
    }

    #[test]
    fn test_extended_frame_display_is_full_width() {
        let frame = CanFrame::new(0x0CF0_0400, vec![0x01]);
        assert_eq!(frame.to_string(), "0CF00400 01");
        assert_eq!(
            decode_line_with(frame.to_string().as_bytes(), IdWidth::Extended),
            Record::Frame(frame)
        );
    }

    proptest! {
        #[test]
        fn prop_rendered_extended_frame_decodes_to_itself(
            id in 0x800u32..=0x1FFF_FFFF,
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD)
        ) {
            let frame = CanFrame::new(id, payload);
            let line = frame.to_string();
            prop_assert_eq!(decode_line_with(line.as_bytes(), IdWidth::Extended), Record::Frame(frame));
        }

        #[test]
        fn prop_rendered_frame_decodes_to_itself(
            id in 0u32..=0x7FF,
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD)
        ) {
            let frame = CanFrame::new(id, payload);
            let line = frame.to_string();
            prop_assert_eq!(decode_line(line.as_bytes()), Record::Frame(frame));
        }
    }
}
