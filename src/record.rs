//! Decoded record events and the sink that receives them

use crate::core::RecordType;

/// A record as handed to a [`RecordSink`] by the parser.
///
/// The payload borrows the parser's scratch buffer and is only valid for the
/// duration of the sink call. Use [`DecodedRecord::to_record`] to retain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    /// Type of the record
    pub record_type: RecordType,
    /// Big-endian 16-bit load address (0 for termination records)
    pub address: u16,
    /// Payload bytes, without count, address and checksum framing
    pub payload: &'a [u8],
    /// The trailing checksum did not match the record contents
    pub checksum_failed: bool,
}

impl<'a> DecodedRecord<'a> {
    /// Number of payload bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the record carries no payload
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Copy the event into an owned [`Record`]
    pub fn to_record(&self) -> Record {
        Record {
            record_type: self.record_type,
            address: self.address,
            payload: self.payload.to_vec(),
            checksum_failed: self.checksum_failed,
        }
    }
}

/// Owned copy of a decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub record_type: RecordType,
    pub address: u16,
    pub payload: Vec<u8>,
    pub checksum_failed: bool,
}

/// Consumer of decoded records.
///
/// The parser calls `on_record` synchronously, at most once per input byte.
pub trait RecordSink {
    /// Receive one completed record
    fn on_record(&mut self, record: &DecodedRecord<'_>);
}

impl<F> RecordSink for F
where
    F: FnMut(&DecodedRecord<'_>),
{
    fn on_record(&mut self, record: &DecodedRecord<'_>) {
        self(record)
    }
}

impl RecordSink for Vec<Record> {
    fn on_record(&mut self, record: &DecodedRecord<'_>) {
        self.push(record.to_record());
    }
}
