//! Line framing for the command channel.
//!
//! Records are newline-terminated UTF-8. A trailing `\r` is stripped and
//! blank lines are ignored. A record longer than [`MAX_LINE_LEN`] is
//! reported once and then skipped up to the next newline, so the stream
//! resynchronizes without closing the connection.

use heapless::Vec;
use thiserror::Error;

/// Record terminator
pub const LINE_END: u8 = b'\n';

/// Maximum record length in bytes, excluding the terminator
pub const MAX_LINE_LEN: usize = 8192;

/// Errors that can occur during line parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineError {
    /// Record exceeds the maximum length
    #[error("line exceeds the maximum record length")]
    TooLong,
    /// Record is not valid UTF-8
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// State machine for splitting a byte stream into records
#[derive(Debug, Clone)]
pub struct LineParser {
    state: ParseState,
    buffer: Vec<u8, MAX_LINE_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Accumulating a record
    Reading,
    /// Dropping an oversized record until its terminator
    Discarding,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Reading,
            buffer: Vec::new(),
        }
    }

    /// Drop any partial record
    pub fn reset(&mut self) {
        self.state = ParseState::Reading;
        self.buffer.clear();
    }

    /// Bytes buffered towards the next record
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(line))` when a record completes, `Ok(None)` when
    /// more bytes are needed, or `Err` for a record that must be dropped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<String>, LineError> {
        match self.state {
            ParseState::Discarding => {
                if byte == LINE_END {
                    self.state = ParseState::Reading;
                }
                Ok(None)
            }
            ParseState::Reading if byte == LINE_END => {
                let mut record: &[u8] = &self.buffer;
                if let [head @ .., b'\r'] = record {
                    record = head;
                }
                let line = core::str::from_utf8(record)
                    .map(str::to_owned)
                    .map_err(|_| LineError::InvalidUtf8);
                self.buffer.clear();
                match line? {
                    l if l.trim().is_empty() => Ok(None),
                    l => Ok(Some(l)),
                }
            }
            ParseState::Reading => {
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.state = ParseState::Discarding;
                    return Err(LineError::TooLong);
                }
                Ok(None)
            }
        }
    }

    /// Feed a chunk of bytes, returning every record it completes in order
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> std::vec::Vec<Result<String, LineError>> {
        bytes
            .iter()
            .filter_map(|&byte| self.feed(byte).transpose())
            .collect()
    }
}
