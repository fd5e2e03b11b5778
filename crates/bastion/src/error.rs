//! Error types for the bastion and its replay tool.
//!
//! [`RecordError`] covers the recording format on its own, so the codec can
//! be used without the rest of the session machinery. [`BastionError`] is
//! what the binaries surface from `main`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from writing or decoding a recording.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The underlying reader or writer failed.
    #[error("recording I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes were available than the entry requires.
    #[error("truncated entry at offset {offset}: expected {expected} bytes, found {actual}")]
    Truncated {
        /// Offset of the entry's header.
        offset: u64,
        /// Bytes the header or payload needed.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// The declared payload length exceeds the configured maximum.
    #[error("entry at offset {offset} declares {declared} payload bytes, limit is {limit}")]
    Oversized {
        /// Offset of the entry's header.
        offset: u64,
        /// Declared payload length.
        declared: u64,
        /// Configured maximum.
        limit: u64,
    },
}

impl RecordError {
    /// Whether the error describes malformed data rather than an I/O failure.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::Oversized { .. })
    }
}

/// Errors that end a bastion session or a replay.
#[derive(Debug, Error)]
pub enum BastionError {
    /// PTY allocation, child launch or terminal control failed.
    #[error("pty error: {0}")]
    Pty(#[from] bastion_pty::PtyError),

    /// The recording could not be written or read.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The caller's terminal could not be configured.
    #[error("terminal error: {0}")]
    Terminal(#[source] io::Error),

    /// The recording file could not be opened.
    #[error("cannot open recording {}: {source}", path.display())]
    RecordingOpen {
        /// Path that was attempted.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BastionError {
    /// Wrap an error from configuring the caller's terminal.
    #[must_use]
    pub const fn terminal(source: io::Error) -> Self {
        Self::Terminal(source)
    }
}

/// Result type for bastion operations.
pub type Result<T> = std::result::Result<T, BastionError>;
