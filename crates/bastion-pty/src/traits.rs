//! Core traits for PTY abstraction.
//!
//! - [`PtyChild`]: handle for the launched child process.
//! - [`TerminalControl`]: control of a terminal (window size, foreground
//!   process group). The resize propagator and the interrupt forwarder are
//!   written against this trait.

use crate::config::{PtySignal, WindowSize};
use crate::error::Result;

/// Handle for a child process launched on a PTY.
pub trait PtyChild {
    /// Get the process ID of the child.
    fn pid(&self) -> u32;

    /// Check whether the child is still believed to be running.
    fn is_running(&self) -> bool;

    /// Reap the child without blocking.
    ///
    /// Returns `None` while the process has not exited.
    fn try_wait(&mut self) -> Result<Option<ExitStatus>>;
}

/// Control operations on a terminal.
pub trait TerminalControl {
    /// Apply a window size to the terminal.
    fn set_window_size(&self, size: WindowSize) -> Result<()>;

    /// Deliver a signal to the terminal's current foreground process group.
    ///
    /// Returns the process group id that was signalled.
    fn signal_foreground(&self, signal: PtySignal) -> Result<u32>;

    /// Apply a window size and notify the foreground group with SIGWINCH,
    /// the way a terminal emulator propagates a resize.
    fn resize_and_notify(&self, size: WindowSize) -> Result<u32> {
        self.set_window_size(size)?;
        self.signal_foreground(PtySignal::WindowChange)
    }
}

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Get the signal number that terminated the process.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(*sig),
            Self::Exited(_) => None,
        }
    }

    /// The status as a shell would report it: the exit code, or 128 plus
    /// the terminating signal.
    #[must_use]
    pub const fn shell_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(sig) => 128 + *sig,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}
