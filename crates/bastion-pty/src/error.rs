//! Error types for the bastion-pty crate.
//!
//! [`PtyError`] covers every failure mode of allocating a terminal pair,
//! launching the child on it and controlling it afterwards.

use std::io;

/// The error type for PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate or name a new PTY.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to launch the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred during PTY operations.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to open the slave side for a control operation.
    #[error("failed to open PTY slave {path}: {source}")]
    OpenSlave {
        /// The slave pathname.
        path: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Failed to get terminal attributes.
    #[error("failed to get terminal attributes: {0}")]
    GetAttributes(#[source] io::Error),

    /// Failed to resize the PTY.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The terminal has no foreground process group.
    #[error("failed to find foreground process group: {0}")]
    ForegroundGroup(#[source] io::Error),

    /// Failed to send a signal.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to reap the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),

    /// Failed to register a signal handler or event source.
    #[error("failed to register signal handling: {0}")]
    SignalSetup(#[source] io::Error),
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(errno_to_io(errno))
    }
}

/// Convert a rustix errno into a std I/O error.
pub(crate) fn errno_to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PtyError::OpenSlave {
            path: "/dev/pts/7".into(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.to_string().starts_with("failed to open PTY slave /dev/pts/7"));
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let pty_err: PtyError = io_err.into();
        assert!(matches!(pty_err, PtyError::Io(_)));
    }

    #[test]
    fn error_from_errno() {
        let pty_err: PtyError = rustix::io::Errno::IO.into();
        match pty_err {
            PtyError::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::EIO)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
