//! Error types for X-record decoding and S-record encoding

use thiserror::Error;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Non-fatal anomaly observed while parsing an X-record stream.
///
/// The parser keeps only the most recent one; a later anomaly overwrites an
/// earlier one regardless of kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SoftError {
    /// A byte following the start marker was not a known record type digit
    #[error("unknown record type")]
    UnknownRecordType,

    /// The trailing checksum byte of a data record did not match its contents
    #[error("invalid data checksum")]
    InvalidChecksum,
}

/// Errors raised outside the (total) record parser
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Encoder configuration is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The record scratch buffer is full
    #[error("Scratch overflow: {0}")]
    ScratchOverflow(String),

    /// Writing the S-record output failed
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl ConvertError {
    /// Create a new InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ConvertError::InvalidConfig(msg.into())
    }

    /// Create a new ScratchOverflow error
    pub fn scratch_overflow(msg: impl Into<String>) -> Self {
        ConvertError::ScratchOverflow(msg.into())
    }
}
