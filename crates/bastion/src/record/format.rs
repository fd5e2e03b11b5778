//! Recording format definitions.
//!
//! A recording is a flat sequence of entries. Each entry is a fixed-size
//! header followed by `len` payload bytes. The header has exactly the layout
//! of this C struct on the host:
//!
//! ```c
//! struct entry_header {
//!     time_t      tv_sec;
//!     suseconds_t tv_usec;
//!     int         type;
//!     size_t      len;
//! };
//! ```
//!
//! Native byte order, native widths and native padding: 32 bytes on 64-bit
//! Linux. Recordings are therefore not portable across architectures.

use std::mem::{offset_of, size_of};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, TimeZone};

/// Layout of the on-disk header. Never constructed; used for sizes and offsets.
#[allow(dead_code)]
#[repr(C)]
struct RawHeader {
    tv_sec: libc::time_t,
    tv_usec: libc::suseconds_t,
    kind: libc::c_int,
    len: libc::size_t,
}

/// Size of an entry header in bytes.
pub const HEADER_LEN: usize = size_of::<RawHeader>();

const SEC_AT: usize = offset_of!(RawHeader, tv_sec);
const USEC_AT: usize = offset_of!(RawHeader, tv_usec);
const KIND_AT: usize = offset_of!(RawHeader, kind);
const LEN_AT: usize = offset_of!(RawHeader, len);

/// Kind of a recording entry. The numeric codes are part of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Reserved, never written.
    Stdin,
    /// Reserved, never written.
    Stdout,
    /// Reserved, never written.
    Stderr,
    /// Bytes from the shell to the client.
    ServerToClient,
    /// Bytes from the client to the shell.
    ClientToServer,
    /// Heartbeat; empty payload.
    None,
    /// Reserved for protocol-aware upload extraction.
    FileUpload,
    /// Reserved for protocol-aware download extraction.
    FileDownload,
    /// Session metadata written before the relay starts.
    SessionStart,
    /// Exit status and final counters.
    SessionExit,
    /// A code this build does not know.
    Unknown(i32),
}

impl EntryKind {
    /// Every kind with a defined code, in code order.
    pub const KNOWN: [Self; 10] = [
        Self::Stdin,
        Self::Stdout,
        Self::Stderr,
        Self::ServerToClient,
        Self::ClientToServer,
        Self::None,
        Self::FileUpload,
        Self::FileDownload,
        Self::SessionStart,
        Self::SessionExit,
    ];

    /// The wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
            Self::ServerToClient => 3,
            Self::ClientToServer => 4,
            Self::None => 5,
            Self::FileUpload => 11,
            Self::FileDownload => 12,
            Self::SessionStart => 21,
            Self::SessionExit => 22,
            Self::Unknown(code) => code,
        }
    }

    /// Decode a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Stdin,
            1 => Self::Stdout,
            2 => Self::Stderr,
            3 => Self::ServerToClient,
            4 => Self::ClientToServer,
            5 => Self::None,
            11 => Self::FileUpload,
            12 => Self::FileDownload,
            21 => Self::SessionStart,
            22 => Self::SessionExit,
            other => Self::Unknown(other),
        }
    }

    /// Whether the payload carries relayed terminal bytes.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::ServerToClient | Self::ClientToServer)
    }
}

/// Wall-clock time of an event, split like `struct timeval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub secs: i64,
    /// Microseconds within the second.
    pub micros: i64,
}

impl Timestamp {
    /// Create a timestamp.
    #[must_use]
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Convert to local time; `None` when out of chrono's range.
    #[must_use]
    pub fn to_local(self) -> Option<DateTime<Local>> {
        let nanos = u32::try_from(self.micros.clamp(0, 999_999) * 1_000).ok()?;
        Local.timestamp_opt(self.secs, nanos).single()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, i64::from(d.subsec_micros())),
            Err(e) => {
                // Before the epoch: floor the seconds, keep micros positive.
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut micros = -i64::from(d.subsec_micros());
                if micros < 0 {
                    secs -= 1;
                    micros += 1_000_000;
                }
                Self::new(secs, micros)
            }
        }
    }
}

/// A decoded recording entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// When the event was observed.
    pub timestamp: Timestamp,
    /// Entry kind.
    pub kind: EntryKind,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Entry {
    /// Create an entry.
    #[must_use]
    pub fn new(timestamp: Timestamp, kind: EntryKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp,
            kind,
            payload: payload.into(),
        }
    }

    /// The payload as text, replacing invalid UTF-8.
    #[must_use]
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Size of this entry on disk.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// A decoded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Event time.
    pub timestamp: Timestamp,
    /// Entry kind.
    pub kind: EntryKind,
    /// Declared payload length.
    pub len: u64,
}

fn put(buf: &mut [u8; HEADER_LEN], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

fn take<const N: usize>(buf: &[u8; HEADER_LEN], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

/// Encode a header. Padding bytes are zero.
#[must_use]
pub fn encode_header(timestamp: Timestamp, kind: EntryKind, len: usize) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    put(&mut buf, SEC_AT, &(timestamp.secs as libc::time_t).to_ne_bytes());
    put(&mut buf, USEC_AT, &(timestamp.micros as libc::suseconds_t).to_ne_bytes());
    put(&mut buf, KIND_AT, &(kind.code() as libc::c_int).to_ne_bytes());
    put(&mut buf, LEN_AT, &(len as libc::size_t).to_ne_bytes());
    buf
}

/// Decode a header.
#[must_use]
pub fn decode_header(buf: &[u8; HEADER_LEN]) -> Header {
    let secs = libc::time_t::from_ne_bytes(take(buf, SEC_AT));
    let micros = libc::suseconds_t::from_ne_bytes(take(buf, USEC_AT));
    let kind = libc::c_int::from_ne_bytes(take(buf, KIND_AT));
    let len = libc::size_t::from_ne_bytes(take(buf, LEN_AT));

    Header {
        timestamp: Timestamp::new(i64::from(secs), i64::from(micros)),
        kind: EntryKind::from_code(kind),
        len: len as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<i32> = EntryKind::KNOWN.iter().map(|k| k.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 11, 12, 21, 22]);
        for kind in EntryKind::KNOWN {
            assert_eq!(EntryKind::from_code(kind.code()), kind);
        }
        assert_eq!(EntryKind::from_code(99), EntryKind::Unknown(99));
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn header_matches_c_layout() {
        assert_eq!(HEADER_LEN, 32);
        assert_eq!((SEC_AT, USEC_AT, KIND_AT, LEN_AT), (0, 8, 16, 24));
    }

    #[test]
    fn header_round_trip() {
        let ts = Timestamp::new(1_727_000_000, 123_456);
        let raw = encode_header(ts, EntryKind::ClientToServer, 3);
        let header = decode_header(&raw);

        assert_eq!(header.timestamp, ts);
        assert_eq!(header.kind, EntryKind::ClientToServer);
        assert_eq!(header.len, 3);
    }

    #[test]
    fn padding_is_zeroed() {
        let raw = encode_header(Timestamp::new(-1, 999_999), EntryKind::Unknown(-1), usize::MAX);
        let used = KIND_AT + size_of::<libc::c_int>();
        assert!(raw[used..LEN_AT].iter().all(|b| *b == 0));
    }

    #[test]
    fn timestamp_before_epoch() {
        let t = UNIX_EPOCH - std::time::Duration::from_micros(1_500_000);
        assert_eq!(Timestamp::from(t), Timestamp::new(-2, 500_000));
    }

    #[test]
    fn timestamp_to_local() {
        let ts = Timestamp::new(0, 250_000);
        let local = ts.to_local().unwrap();
        assert_eq!(local.timestamp(), 0);
        assert_eq!(local.timestamp_subsec_micros(), 250_000);
    }
}
