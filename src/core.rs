//! Core types shared by the X-record parser and the S-record encoder

/// Record type carried by the digit following the `X` start marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordType {
    /// 16-bit addressed data record (`X1`)
    Data,
    /// 16-bit termination record (`X9`)
    Termination,
}

impl RecordType {
    /// Numeric record type (1 or 9)
    pub fn value(&self) -> u8 {
        match self {
            RecordType::Data => 1,
            RecordType::Termination => 9,
        }
    }

    /// Decode the ASCII type digit that follows the start marker
    pub fn from_digit(byte: u8) -> Option<Self> {
        match byte {
            b'1' => Some(RecordType::Data),
            b'9' => Some(RecordType::Termination),
            _ => None,
        }
    }

    /// Whether records of this type carry a trailing checksum byte
    pub fn has_checksum(&self) -> bool {
        matches!(self, RecordType::Data)
    }
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    /// Convert a numeric record type (not the ASCII digit)
    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            1 => Ok(RecordType::Data),
            9 => Ok(RecordType::Termination),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::Data => write!(f, "Data"),
            RecordType::Termination => write!(f, "Termination"),
        }
    }
}

/// Unsigned sum of `bytes`, truncated to 8 bits
pub fn sum_bytes(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// One's complement of the truncated byte sum.
///
/// Both X-record and S1 records use this checksum; they differ only in
/// which bytes are summed.
pub fn checksum(bytes: &[u8]) -> u8 {
    !sum_bytes(bytes)
}
