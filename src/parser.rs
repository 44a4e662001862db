//! Streaming X-record parser
//!
//! An X-record is laid out as:
//!
//! ```text
//! 'X' '1' count addr_hi addr_lo payload[count + 1] checksum
//! 'X' '9'
//! ```
//!
//! The parser consumes one byte at a time and never fails. Bytes outside a
//! record are skipped until the next `X` marker, and an unknown type digit
//! drops the attempt and goes back to waiting for a marker. Anomalies are kept
//! in a single sticky slot, see [`XrecParser::last_soft_error`].

use tracing::{debug, trace, warn};

use crate::core::{checksum, RecordType};
use crate::error::{ConvertError, Result, SoftError};
use crate::format::{MAX_RECORD_LEN, START_MARKER};
use crate::record::{DecodedRecord, RecordSink};

/// Offset of the first payload byte in the scratch buffer
const PAYLOAD_OFFSET: usize = 3;

/// Position of the parser within a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Skipping bytes until an `X` marker
    AwaitStart,
    /// Expecting the record type digit
    ReadType,
    /// Expecting the byte-count field
    ReadCount,
    /// Expecting the high address byte
    ReadAddressHigh,
    /// Expecting the low address byte
    ReadAddressLow,
    /// Collecting payload bytes
    ReadData,
    /// Expecting the trailing checksum byte
    ReadChecksum,
}

/// Bounded buffer holding `[count, addr_hi, addr_lo, payload.., checksum]`
#[derive(Clone)]
struct Scratch {
    bytes: [u8; MAX_RECORD_LEN],
    len: usize,
}

impl Scratch {
    fn new() -> Self {
        Scratch {
            bytes: [0; MAX_RECORD_LEN],
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        if self.len >= MAX_RECORD_LEN {
            return Err(ConvertError::scratch_overflow(format!(
                "record exceeds {} bytes",
                MAX_RECORD_LEN
            )));
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl std::fmt::Debug for Scratch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scratch").field("len", &self.len).finish()
    }
}

/// X-record stream parser.
///
/// One parser owns the state of one input stream. Feed it bytes in any
/// chunking; completed records are pushed to the supplied [`RecordSink`].
#[derive(Debug, Clone)]
pub struct XrecParser {
    phase: Phase,
    record_type: Option<RecordType>,
    remaining: usize,
    payload_len: usize,
    scratch: Scratch,
    last_soft_error: Option<SoftError>,
}

impl XrecParser {
    /// Create a parser ready to read a new stream
    pub fn new() -> Self {
        XrecParser {
            phase: Phase::AwaitStart,
            record_type: None,
            remaining: 0,
            payload_len: 0,
            scratch: Scratch::new(),
            last_soft_error: None,
        }
    }

    /// Reset to the initial state, discarding any partial record and the
    /// sticky error
    pub fn begin(&mut self) {
        self.reset_record();
        self.last_soft_error = None;
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the parser sits between records
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::AwaitStart
    }

    /// Most recent anomaly, if any
    pub fn last_soft_error(&self) -> Option<SoftError> {
        self.last_soft_error
    }

    /// Advance the state machine by one byte.
    ///
    /// Calls `sink` at most once, when this byte completes a record.
    pub fn feed_byte<S: RecordSink + ?Sized>(&mut self, byte: u8, sink: &mut S) {
        match self.phase {
            Phase::AwaitStart => {
                if byte == START_MARKER {
                    self.phase = Phase::ReadType;
                } else {
                    trace!(byte, "skipping byte outside record");
                }
            }
            Phase::ReadType => match RecordType::from_digit(byte) {
                Some(RecordType::Data) => {
                    self.record_type = Some(RecordType::Data);
                    self.phase = Phase::ReadCount;
                }
                Some(RecordType::Termination) => {
                    self.record_type = Some(RecordType::Termination);
                    self.complete(sink);
                }
                None => {
                    warn!(byte, "unknown record type, resynchronizing");
                    self.last_soft_error = Some(SoftError::UnknownRecordType);
                    self.reset_record();
                }
            },
            Phase::ReadCount => {
                self.remaining = usize::from(byte) + 1;
                self.store(byte, Phase::ReadAddressHigh);
            }
            Phase::ReadAddressHigh => self.store(byte, Phase::ReadAddressLow),
            Phase::ReadAddressLow => self.store(byte, Phase::ReadData),
            Phase::ReadData => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.payload_len = self.scratch.len() + 1 - PAYLOAD_OFFSET;
                    self.store(byte, Phase::ReadChecksum);
                } else {
                    self.store(byte, Phase::ReadData);
                }
            }
            Phase::ReadChecksum => {
                if self.push(byte) {
                    self.complete(sink);
                }
            }
        }
    }

    /// Feed every byte of `bytes` in order
    pub fn feed_bytes<S: RecordSink + ?Sized>(&mut self, bytes: &[u8], sink: &mut S) {
        for &byte in bytes {
            self.feed_byte(byte, sink);
        }
    }

    /// Append to the scratch buffer and move to `next`
    fn store(&mut self, byte: u8, next: Phase) {
        if self.push(byte) {
            self.phase = next;
        }
    }

    /// Append to the scratch buffer, dropping the record on overflow
    fn push(&mut self, byte: u8) -> bool {
        match self.scratch.push(byte) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "dropping record");
                self.reset_record();
                false
            }
        }
    }

    fn complete<S: RecordSink + ?Sized>(&mut self, sink: &mut S) {
        let record_type = match self.record_type {
            Some(record_type) => record_type,
            None => {
                self.reset_record();
                return;
            }
        };

        let raw = self.scratch.as_slice();
        let address = match raw {
            [_, high, low, ..] => u16::from_be_bytes([*high, *low]),
            _ => 0,
        };

        let mut checksum_failed = false;
        let mut payload: &[u8] = &[];
        if record_type.has_checksum() {
            if let Some((&expected, body)) = raw.split_last() {
                checksum_failed = checksum(body) != expected;
                payload = &body[PAYLOAD_OFFSET..PAYLOAD_OFFSET + self.payload_len];
            }
        }

        if checksum_failed {
            warn!(address, "data record failed checksum");
            self.last_soft_error = Some(SoftError::InvalidChecksum);
        }
        debug!(%record_type, address, len = payload.len(), "record complete");

        sink.on_record(&DecodedRecord {
            record_type,
            address,
            payload,
            checksum_failed,
        });

        self.reset_record();
    }

    fn reset_record(&mut self) {
        self.phase = Phase::AwaitStart;
        self.record_type = None;
        self.remaining = 0;
        self.payload_len = 0;
        self.scratch.clear();
    }
}

impl Default for XrecParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use proptest::prelude::*;

    /// Build a well-formed data record with a correct checksum
    fn data_record(address: u16, payload: &[u8]) -> Vec<u8> {
        assert!(!payload.is_empty() && payload.len() <= 256);
        let mut body = vec![(payload.len() - 1) as u8];
        body.extend_from_slice(&address.to_be_bytes());
        body.extend_from_slice(payload);
        let sum = checksum(&body);

        let mut bytes = b"X1".to_vec();
        bytes.extend(body);
        bytes.push(sum);
        bytes
    }

    fn parse(bytes: &[u8]) -> (XrecParser, Vec<Record>) {
        let mut parser = XrecParser::new();
        let mut records: Vec<Record> = Vec::new();
        parser.feed_bytes(bytes, &mut records);
        (parser, records)
    }

    #[test]
    fn test_parser_creation() {
        let parser = XrecParser::new();
        assert_eq!(parser.phase(), Phase::AwaitStart);
        assert!(parser.is_idle());
        assert_eq!(parser.last_soft_error(), None);
    }

    #[test]
    fn test_single_byte_record() {
        let (parser, records) = parse(&[b'X', b'1', 0x00, 0x10, 0x00, 0xAA, 0x45]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::Data);
        assert_eq!(records[0].address, 0x1000);
        assert_eq!(records[0].payload, vec![0xAA]);
        assert!(!records[0].checksum_failed);
        assert_eq!(parser.last_soft_error(), None);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_max_count_field() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let (parser, records) = parse(&data_record(0x0000, &payload));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload.len(), 256);
        assert_eq!(records[0].payload, payload);
        assert!(!records[0].checksum_failed);
        assert_eq!(parser.last_soft_error(), None);
    }

    #[test]
    fn test_checksum_bit_flips() {
        for bit in 0..8 {
            let mut bytes = data_record(0x1000, &[0xAA]);
            let last = bytes.len() - 1;
            bytes[last] ^= 1 << bit;

            let (parser, records) = parse(&bytes);
            assert_eq!(records.len(), 1);
            assert!(records[0].checksum_failed);
            assert_eq!(records[0].payload, vec![0xAA]);
            assert_eq!(parser.last_soft_error(), Some(SoftError::InvalidChecksum));
        }
    }

    #[test]
    fn test_termination_record() {
        let (_, records) = parse(b"X9");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, RecordType::Termination);
        assert_eq!(records[0].address, 0);
        assert!(records[0].payload.is_empty());
        assert!(!records[0].checksum_failed);
    }

    #[test]
    fn test_resync_after_unknown_type() {
        let mut bytes = b"XQ".to_vec();
        bytes.extend(data_record(0x2000, &[1, 2, 3]));
        let (parser, records) = parse(&bytes);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x2000);
        assert_eq!(records[0].payload, vec![1, 2, 3]);
        assert_eq!(parser.last_soft_error(), Some(SoftError::UnknownRecordType));
    }

    #[test]
    fn test_garbage_between_records() {
        let mut bytes = b"\x00\xFFjunk".to_vec();
        bytes.extend(data_record(0x0100, &[0x11]));
        bytes.extend_from_slice(b"\r\n\x1A");
        bytes.extend_from_slice(b"X9");
        let (parser, records) = parse(&bytes);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].record_type, RecordType::Termination);
        assert_eq!(parser.last_soft_error(), None);
    }

    #[test]
    fn test_sticky_error_is_overwritten() {
        let mut bad = data_record(0x1000, &[0xAA]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut bytes = bad;
        bytes.extend_from_slice(b"X7");
        let (parser, _) = parse(&bytes);
        assert_eq!(parser.last_soft_error(), Some(SoftError::UnknownRecordType));

        let mut bytes = b"X7".to_vec();
        let mut bad = data_record(0x1000, &[0xAA]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        bytes.extend(bad);
        let (parser, _) = parse(&bytes);
        assert_eq!(parser.last_soft_error(), Some(SoftError::InvalidChecksum));
    }

    #[test]
    fn test_valid_record_keeps_sticky_error() {
        let mut bytes = b"X0".to_vec();
        bytes.extend(data_record(0x1000, &[0xAA]));
        let (parser, _) = parse(&bytes);
        assert_eq!(parser.last_soft_error(), Some(SoftError::UnknownRecordType));
    }

    #[test]
    fn test_begin_discards_partial_record() {
        let mut parser = XrecParser::new();
        let mut records: Vec<Record> = Vec::new();

        // Stop in the middle of a payload
        parser.feed_bytes(&[b'X', b'1', 0x05, 0x30, 0x00, 0xDE, 0xAD], &mut records);
        assert_eq!(parser.phase(), Phase::ReadData);
        parser.feed_bytes(b"XZ", &mut records);

        parser.begin();
        assert_eq!(parser.phase(), Phase::AwaitStart);
        assert_eq!(parser.last_soft_error(), None);

        parser.feed_bytes(&data_record(0x4000, &[0x01, 0x02]), &mut records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, 0x4000);
        assert_eq!(records[0].payload, vec![0x01, 0x02]);
        assert!(!records[0].checksum_failed);
    }

    #[test]
    fn test_marker_inside_payload_is_data() {
        let (_, records) = parse(&data_record(0x0058, b"X9X1"));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, b"X9X1".to_vec());
    }

    #[test]
    fn test_phase_transitions() {
        let mut parser = XrecParser::new();
        let mut sink = |_: &DecodedRecord<'_>| {};
        let expected = [
            (b'X', Phase::ReadType),
            (b'1', Phase::ReadCount),
            (0x01, Phase::ReadAddressHigh),
            (0x12, Phase::ReadAddressLow),
            (0x34, Phase::ReadData),
            (0xAB, Phase::ReadData),
            (0xCD, Phase::ReadChecksum),
            (0x00, Phase::AwaitStart),
        ];
        for (byte, phase) in expected {
            parser.feed_byte(byte, &mut sink);
            assert_eq!(parser.phase(), phase);
        }
    }

    #[test]
    fn test_truncated_stream_leaves_partial_phase() {
        let (parser, records) = parse(&[b'X', b'1', 0x03, 0x00]);
        assert!(records.is_empty());
        assert_eq!(parser.phase(), Phase::ReadAddressLow);
        assert!(!parser.is_idle());
    }

    #[test]
    fn test_scratch_rejects_overflow() {
        let mut scratch = Scratch::new();
        for _ in 0..MAX_RECORD_LEN {
            assert!(scratch.push(0).is_ok());
        }
        assert!(scratch.push(0).is_err());
        assert_eq!(scratch.len(), MAX_RECORD_LEN);
    }

    proptest! {
        #[test]
        fn chunked_feeding_matches_bytewise(
            bytes in proptest::collection::vec(any::<u8>(), 0..600),
            split in 0usize..600,
        ) {
            let (whole, whole_records) = parse(&bytes);

            let split = split.min(bytes.len());
            let mut parser = XrecParser::new();
            let mut records: Vec<Record> = Vec::new();
            for &byte in &bytes[..split] {
                parser.feed_byte(byte, &mut records);
            }
            parser.feed_bytes(&bytes[split..], &mut records);

            prop_assert_eq!(records, whole_records);
            prop_assert_eq!(parser.phase(), whole.phase());
            prop_assert_eq!(parser.last_soft_error(), whole.last_soft_error());
        }

        #[test]
        fn valid_record_survives_leading_garbage(
            garbage in proptest::collection::vec(any::<u8>().prop_filter("no marker", |b| *b != b'X'), 0..64),
            address in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 1..=256),
        ) {
            let mut bytes = garbage;
            bytes.extend(data_record(address, &payload));
            let (_, records) = parse(&bytes);

            prop_assert_eq!(records.len(), 1);
            prop_assert_eq!(records[0].address, address);
            prop_assert_eq!(&records[0].payload, &payload);
            prop_assert!(!records[0].checksum_failed);
        }
    }
}
