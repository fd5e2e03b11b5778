//! Session recording format.
//!
//! This module provides:
//!
//! - The entry header layout and entry kinds ([`format`])
//! - An append-only writer ([`Recorder`])
//! - A sequential, length-checked reader ([`RecordReader`])
//! - `key: value` metadata for control entries ([`SessionMetadata`])
//! - Recording file naming ([`recording_path`])
//!
//! # Example
//!
//! ```ignore
//! use bastion::record::{EntryKind, RecordReader, Recorder};
//!
//! let mut recorder = Recorder::new(Vec::new());
//! recorder.write_entry(EntryKind::ClientToServer, b"ls\n")?;
//! let bytes = recorder.into_inner()?;
//!
//! for entry in RecordReader::new(bytes.as_slice()) {
//!     println!("{:?}", entry?.kind);
//! }
//! ```

pub mod format;
pub mod metadata;
pub mod path;
pub mod reader;
pub mod recorder;

pub use format::{Entry, EntryKind, HEADER_LEN, Header, Timestamp, decode_header, encode_header};
pub use metadata::{ProcessIdentity, SESSION_ENV_VARS, SessionMetadata, TransferCounters};
pub use path::{open_recording, recording_path};
pub use reader::{DEFAULT_MAX_PAYLOAD, RecordReader};
pub use recorder::Recorder;

pub use crate::error::RecordError;
