//! Motorola S-record encoding and line re-framing

use std::io::Write;

use tracing::{debug, warn};

use crate::core::{sum_bytes, RecordType};
use crate::error::{ConvertError, Result};
use crate::format::{DEFAULT_LINE_WIDTH, MAX_LINE_WIDTH, TERMINATION_LINE};
use crate::record::{DecodedRecord, RecordSink};

/// Encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    max_line_width: usize,
}

impl EncoderConfig {
    /// Create a configuration emitting at most `max_line_width` payload bytes per line
    pub fn new(max_line_width: usize) -> Result<Self> {
        if max_line_width == 0 || max_line_width > MAX_LINE_WIDTH {
            return Err(ConvertError::invalid_config(format!(
                "line width {} out of range [1, {}]",
                max_line_width, MAX_LINE_WIDTH
            )));
        }
        Ok(EncoderConfig { max_line_width })
    }

    /// Maximum payload bytes per S1 line
    pub fn max_line_width(&self) -> usize {
        self.max_line_width
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            max_line_width: DEFAULT_LINE_WIDTH,
        }
    }
}

/// A single S1 data line
///
/// Format: `S1` count address data.. checksum, all as uppercase hex, where
/// count covers the two address bytes, the data and the checksum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrecLine<'a> {
    /// Load address of the first data byte
    pub address: u16,
    /// Data bytes (at most [`MAX_LINE_WIDTH`])
    pub data: &'a [u8],
}

impl<'a> SrecLine<'a> {
    /// Create a new line
    pub fn new(address: u16, data: &'a [u8]) -> Result<Self> {
        if data.len() > MAX_LINE_WIDTH {
            return Err(ConvertError::invalid_config(format!(
                "S1 line of {} bytes exceeds {}",
                data.len(),
                MAX_LINE_WIDTH
            )));
        }
        Ok(SrecLine { address, data })
    }

    /// Value of the count field
    pub fn count(&self) -> u8 {
        (2 + self.data.len() + 1) as u8
    }

    /// One's complement of the sum of count, address and data bytes
    pub fn checksum(&self) -> u8 {
        let [high, low] = self.address.to_be_bytes();
        let sum = sum_bytes(&[self.count(), high, low]).wrapping_add(sum_bytes(self.data));
        !sum
    }
}

impl std::fmt::Display for SrecLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S1{:02X}{:04X}", self.count(), self.address)?;
        for byte in self.data {
            write!(f, "{:02X}", byte)?;
        }
        write!(f, "{:02X}", self.checksum())
    }
}

/// Running totals kept by the encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Data records received
    pub data_records: usize,
    /// Termination records received
    pub termination_records: usize,
    /// Data records whose checksum failed (still written)
    pub checksum_failures: usize,
    /// S1 and S9 lines written
    pub lines_written: usize,
    /// Payload bytes written in S1 lines
    pub bytes_written: usize,
}

/// Re-frames decoded records into S-record lines on `W`.
///
/// Payload bytes from address-contiguous records are packed into lines of up
/// to [`EncoderConfig::max_line_width`] bytes. A gap in addresses closes the
/// current line. Call [`SrecEncoder::finish`] at the end of the input to
/// write any partial line.
#[derive(Debug)]
pub struct SrecEncoder<W: Write> {
    writer: W,
    config: EncoderConfig,
    /// Address of the first byte in `line`
    line_address: u16,
    line: Vec<u8>,
    last_record_type: Option<RecordType>,
    stats: EncoderStats,
    deferred: Option<std::io::Error>,
}

impl<W: Write> SrecEncoder<W> {
    /// Create an encoder writing to `writer`
    pub fn new(writer: W, config: EncoderConfig) -> Self {
        SrecEncoder {
            writer,
            config,
            line_address: 0,
            line: Vec::with_capacity(config.max_line_width()),
            last_record_type: None,
            stats: EncoderStats::default(),
            deferred: None,
        }
    }

    /// Address the next contiguous byte would be loaded at
    pub fn next_address(&self) -> u32 {
        u32::from(self.line_address) + self.line.len() as u32
    }

    /// Bytes waiting for the current line to fill
    pub fn pending(&self) -> &[u8] {
        &self.line
    }

    /// Type of the most recent record received
    pub fn last_record_type(&self) -> Option<RecordType> {
        self.last_record_type
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Consume one decoded record
    pub fn write_record(&mut self, record: &DecodedRecord<'_>) -> Result<()> {
        self.last_record_type = Some(record.record_type);

        match record.record_type {
            RecordType::Data => {
                self.stats.data_records += 1;
                if record.checksum_failed {
                    self.stats.checksum_failures += 1;
                }

                if u32::from(record.address) != self.next_address() {
                    self.flush()?;
                    self.line_address = record.address;
                }

                for &byte in record.payload {
                    self.line.push(byte);
                    if self.line.len() == self.config.max_line_width() {
                        self.flush()?;
                    }
                }
            }
            RecordType::Termination => {
                self.stats.termination_records += 1;
                self.flush()?;
                writeln!(self.writer, "{}", TERMINATION_LINE)?;
                self.stats.lines_written += 1;
                self.line_address = 0;
            }
        }
        Ok(())
    }

    /// Write the buffered line, if any, and advance the line address past it
    pub fn flush(&mut self) -> Result<()> {
        if self.line.is_empty() {
            return Ok(());
        }

        let line = SrecLine::new(self.line_address, &self.line)?;
        debug!(address = line.address, len = line.data.len(), "writing S1 line");
        writeln!(self.writer, "{}", line)?;

        self.stats.lines_written += 1;
        self.stats.bytes_written += self.line.len();
        self.line_address = self.line_address.wrapping_add(self.line.len() as u16);
        self.line.clear();
        Ok(())
    }

    /// Write the partial line and flush the writer. Call once the input is
    /// exhausted.
    ///
    /// Returns the first output error hit while acting as a [`RecordSink`].
    pub fn finish(&mut self) -> Result<()> {
        if let Some(err) = self.deferred.take() {
            return Err(err.into());
        }
        self.flush()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Hand back the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for SrecEncoder<W> {
    fn on_record(&mut self, record: &DecodedRecord<'_>) {
        if self.deferred.is_some() {
            return;
        }
        match self.write_record(record) {
            Ok(()) => {}
            Err(ConvertError::Output(err)) => {
                warn!(%err, "output failed, discarding further records");
                self.deferred = Some(err);
            }
            Err(err) => warn!(%err, "record not encoded"),
        }
    }
}
