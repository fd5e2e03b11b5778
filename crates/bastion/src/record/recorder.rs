//! Session recording.

use std::io::Write;

use super::format::{EntryKind, HEADER_LEN, Timestamp, encode_header};
use super::metadata::SessionMetadata;
use crate::error::RecordError;

/// Append-only writer of recording entries.
///
/// Each entry is emitted with a single `write_all`, header and payload
/// together, so a reader never observes a header without its payload unless
/// the write itself failed. Assumes a single writer.
#[derive(Debug)]
pub struct Recorder<W: Write> {
    inner: W,
    entries: u64,
    bytes: u64,
    scratch: Vec<u8>,
}

impl<W: Write> Recorder<W> {
    /// Wrap a writer positioned where the next entry goes.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
            entries: 0,
            bytes: 0,
            scratch: Vec::new(),
        }
    }

    /// Append an entry stamped with the current wall-clock time.
    pub fn write_entry(&mut self, kind: EntryKind, payload: &[u8]) -> Result<(), RecordError> {
        self.write_entry_at(Timestamp::now(), kind, payload)
    }

    /// Append an entry with an explicit timestamp.
    pub fn write_entry_at(
        &mut self,
        timestamp: Timestamp,
        kind: EntryKind,
        payload: &[u8],
    ) -> Result<(), RecordError> {
        self.scratch.clear();
        self.scratch.reserve(HEADER_LEN + payload.len());
        self.scratch
            .extend_from_slice(&encode_header(timestamp, kind, payload.len()));
        self.scratch.extend_from_slice(payload);

        self.inner.write_all(&self.scratch)?;
        self.entries += 1;
        self.bytes += self.scratch.len() as u64;
        Ok(())
    }

    /// Append a heartbeat.
    pub fn heartbeat(&mut self) -> Result<(), RecordError> {
        self.write_entry(EntryKind::None, &[])
    }

    /// Append a control entry carrying `key: value` text.
    pub fn write_metadata(
        &mut self,
        kind: EntryKind,
        metadata: &SessionMetadata,
    ) -> Result<(), RecordError> {
        self.write_entry(kind, metadata.render().as_bytes())
    }

    /// Number of entries written so far.
    #[must_use]
    pub const fn entry_count(&self) -> u64 {
        self.entries
    }

    /// Number of bytes written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.inner.flush()?;
        Ok(())
    }

    /// Get a reference to the underlying writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W, RecordError> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Return the underlying writer without flushing it.
    pub fn into_writer(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::format::decode_header;

    #[test]
    fn entry_is_header_then_payload() {
        let mut recorder = Recorder::new(Vec::new());
        let ts = Timestamp::new(10, 20);
        recorder
            .write_entry_at(ts, EntryKind::ServerToClient, b"hello")
            .unwrap();

        let bytes = recorder.into_inner().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 5);

        let header: [u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().unwrap();
        let header = decode_header(&header);
        assert_eq!(header.timestamp, ts);
        assert_eq!(header.kind, EntryKind::ServerToClient);
        assert_eq!(header.len, 5);
        assert_eq!(&bytes[HEADER_LEN..], b"hello");
    }

    #[test]
    fn heartbeat_has_no_payload() {
        let mut recorder = Recorder::new(Vec::new());
        recorder.heartbeat().unwrap();

        assert_eq!(recorder.entry_count(), 1);
        assert_eq!(recorder.bytes_written(), HEADER_LEN as u64);
    }

    #[test]
    fn counters_accumulate() {
        let mut recorder = Recorder::new(Vec::new());
        recorder.write_entry(EntryKind::ClientToServer, b"ls\n").unwrap();
        recorder.write_entry(EntryKind::ServerToClient, b"a b c\r\n").unwrap();

        assert_eq!(recorder.entry_count(), 2);
        assert_eq!(recorder.bytes_written(), (2 * HEADER_LEN + 3 + 7) as u64);
        assert_eq!(recorder.get_ref().len(), 2 * HEADER_LEN + 10);
    }
}
