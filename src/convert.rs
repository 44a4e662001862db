//! Whole-buffer conversion and the post-hoc report used for strict mode

use std::io::Write;

use tracing::info;

use crate::core::RecordType;
use crate::encoding::{EncoderConfig, SrecEncoder};
use crate::error::{Result, SoftError};
use crate::parser::XrecParser;

/// Outcome of converting one input stream
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionReport {
    /// Most recent anomaly seen by the parser
    pub last_soft_error: Option<SoftError>,
    /// Type of the final record processed
    pub last_record_type: Option<RecordType>,
    /// The input ended in the middle of a record
    pub truncated: bool,
    /// Data records decoded
    pub data_records: usize,
    /// Termination records decoded
    pub termination_records: usize,
    /// Data records that failed their checksum
    pub checksum_failures: usize,
    /// Output lines written, S9 included
    pub lines_written: usize,
    /// Payload bytes written
    pub bytes_written: usize,
}

/// Condition worth telling the user about after a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// At least one record had an unrecognized type digit
    UnknownRecordType,
    /// At least one data record failed its checksum
    InvalidChecksum,
    /// The stream did not end with a termination record
    MissingTermination,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownRecordType => {
                write!(f, "input contained at least one unknown record type.")
            }
            Warning::InvalidChecksum => write!(
                f,
                "input contained at least one failed data checksum. Beware corruption!"
            ),
            Warning::MissingTermination => {
                write!(f, "did not encounter (or emit) closing termination record.")
            }
        }
    }
}

impl ConversionReport {
    /// The last record processed was a termination record
    pub fn saw_termination(&self) -> bool {
        self.last_record_type == Some(RecordType::Termination)
    }

    /// Warnings to report, sticky error first
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        match self.last_soft_error {
            Some(SoftError::UnknownRecordType) => warnings.push(Warning::UnknownRecordType),
            Some(SoftError::InvalidChecksum) => warnings.push(Warning::InvalidChecksum),
            None => {}
        }
        if !self.saw_termination() {
            warnings.push(Warning::MissingTermination);
        }
        warnings
    }

    /// No anomaly, ended on a termination record and no partial record left over
    pub fn is_strict_clean(&self) -> bool {
        self.last_soft_error.is_none() && self.saw_termination() && !self.truncated
    }
}

/// Convert a complete X-record buffer to S-record text on `writer`
pub fn convert<W: Write>(input: &[u8], writer: W, config: EncoderConfig) -> Result<ConversionReport> {
    let mut parser = XrecParser::new();
    let mut encoder = SrecEncoder::new(writer, config);

    parser.begin();
    parser.feed_bytes(input, &mut encoder);
    encoder.finish()?;

    let stats = encoder.stats();
    let report = ConversionReport {
        last_soft_error: parser.last_soft_error(),
        last_record_type: encoder.last_record_type(),
        truncated: !parser.is_idle(),
        data_records: stats.data_records,
        termination_records: stats.termination_records,
        checksum_failures: stats.checksum_failures,
        lines_written: stats.lines_written,
        bytes_written: stats.bytes_written,
    };

    info!(
        input_len = input.len(),
        data_records = report.data_records,
        lines = report.lines_written,
        "conversion complete"
    );
    Ok(report)
}
