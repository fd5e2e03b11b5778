//! Sequential decoding of recordings.
//!
//! Recordings have no index and no resynchronisation markers, so decoding
//! is strictly sequential from offset 0 and stops at the first malformed
//! entry.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::format::{Entry, HEADER_LEN, decode_header};
use crate::error::RecordError;

/// Default upper bound on a single payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Sequential reader of recording entries.
///
/// The declared payload length is checked against `max_payload`, and against
/// the bytes left in the input when its total length is known, before any
/// payload buffer is allocated.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    offset: u64,
    total_len: Option<u64>,
    max_payload: usize,
    finished: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open a recording file. Its size bounds every declared length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(BufReader::new(file)).with_total_len(len))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader positioned at the start of a recording.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            total_len: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
            finished: false,
        }
    }

    /// Set the largest payload accepted.
    #[must_use]
    pub const fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max;
        self
    }

    /// Declare the total input length.
    #[must_use]
    pub const fn with_total_len(mut self, len: u64) -> Self {
        self.total_len = Some(len);
        self
    }

    /// Byte offset of the next entry.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Decode the next entry.
    ///
    /// `Ok(None)` means a clean end of log: no bytes at all where a header
    /// would start. Any partial header or payload is an error, after which
    /// the reader yields nothing more.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, RecordError> {
        if self.finished {
            return Ok(None);
        }

        let result = self.decode_next();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn decode_next(&mut self) -> Result<Option<Entry>, RecordError> {
        let start = self.offset;

        let mut raw = [0u8; HEADER_LEN];
        let got = read_full(&mut self.inner, &mut raw)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(RecordError::Truncated {
                offset: start,
                expected: HEADER_LEN as u64,
                actual: got as u64,
            });
        }
        self.offset += HEADER_LEN as u64;

        let header = decode_header(&raw);

        if header.len > self.max_payload as u64 {
            return Err(RecordError::Oversized {
                offset: start,
                declared: header.len,
                limit: self.max_payload as u64,
            });
        }
        if let Some(total) = self.total_len {
            let remaining = total.saturating_sub(self.offset);
            if header.len > remaining {
                return Err(RecordError::Truncated {
                    offset: start,
                    expected: header.len,
                    actual: remaining,
                });
            }
        }

        let mut payload = vec![0u8; header.len as usize];
        let got = read_full(&mut self.inner, &mut payload)?;
        if got < payload.len() {
            return Err(RecordError::Truncated {
                offset: start,
                expected: header.len,
                actual: got as u64,
            });
        }
        self.offset += header.len;

        Ok(Some(Entry {
            timestamp: header.timestamp,
            kind: header.kind,
            payload,
        }))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Entry, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Fill `buf` as far as the input allows; returns the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
