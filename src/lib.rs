//! # X-record to S-record converter
//!
//! A Rust library for decoding the compact binary "X-record" load format
//! written by SWTPC cassette tape tools, and re-encoding it as Motorola
//! S-records.
//!
//! The library provides:
//!
//! - A streaming, byte-at-a-time X-record parser that resynchronizes on
//!   garbage and never aborts
//! - Checksum validation with a sticky error indicator
//! - An S1/S9 encoder that regroups payload bytes into fixed-width lines
//! - A whole-buffer driver producing a conversion report
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use xrec_srec::{convert, EncoderConfig};
//!
//! let input = [b'X', b'1', 0x00, 0x10, 0x00, 0xAA, 0x45, b'X', b'9'];
//! let mut out = Vec::new();
//! let report = convert(&input, &mut out, EncoderConfig::default())?;
//!
//! assert!(report.is_strict_clean());
//! assert_eq!(String::from_utf8(out)?, "S1041000AA41\nS9030000FC\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod convert;
pub mod core;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod record;

pub use crate::core::RecordType;
pub use convert::{convert, ConversionReport, Warning};
pub use encoding::{EncoderConfig, EncoderStats, SrecEncoder, SrecLine};
pub use error::{ConvertError, Result, SoftError};
pub use parser::{Phase, XrecParser};
pub use record::{DecodedRecord, Record, RecordSink};

/// Wire constants of the X-record and S-record formats
pub mod format {
    /// Byte that opens every X-record
    pub const START_MARKER: u8 = b'X';

    /// Largest X-record body: count, two address bytes, 256 payload bytes, checksum
    pub const MAX_RECORD_LEN: usize = 1 + 2 + 256 + 1;

    /// Payload bytes per S1 line written by the original tape tools
    pub const DEFAULT_LINE_WIDTH: usize = 16;

    /// Widest S1 payload whose count byte (address + payload + checksum) fits in a byte
    pub const MAX_LINE_WIDTH: usize = 0xFF - 2 - 1;

    /// Fixed S9 termination line
    pub const TERMINATION_LINE: &str = "S9030000FC";
}
