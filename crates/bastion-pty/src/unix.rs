//! Unix platform implementation for PTY operations.
//!
//! This module provides:
//!
//! - PTY master allocation via openpt/grantpt/unlockpt
//! - Readiness-driven I/O on the master through tokio's `AsyncFd`
//! - Child launch with a new session and the slave as controlling terminal
//! - Terminal control through the master (window size, foreground group signalling)
//! - SIGWINCH / SIGCHLD as an awaitable event source
//!
//! # Example
//!
//! ```ignore
//! use bastion_pty::unix::UnixPtySystem;
//! use bastion_pty::PtyConfig;
//!
//! let session = UnixPtySystem::spawn("/bin/bash", std::iter::empty::<&str>(), &PtyConfig::default())?;
//! println!("child {} on {}", session.child.pid(), session.slave_path);
//! ```

mod child;
mod pty;
mod signals;

use std::ffi::OsStr;

pub use child::{UnixPtyChild, spawn_child};
pub use pty::{UnixPtyMaster, open_slave};
pub use signals::{PtySignalEvent, SignalEvents, register_flag};

use crate::config::PtyConfig;
use crate::error::Result;

/// A launched session: the master the caller relays through, the child
/// running on the slave, and the slave's pathname.
#[derive(Debug)]
pub struct PtySession {
    /// Master side of the terminal pair.
    pub master: UnixPtyMaster,
    /// The launched child.
    pub child: UnixPtyChild,
    /// Pathname of the slave side.
    pub slave_path: String,
}

/// Unix PTY system implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPtySystem;

impl UnixPtySystem {
    /// Allocate a PTY and launch `program` on its slave side.
    ///
    /// The parent's copy of the slave descriptor is closed before this
    /// returns, so the master reports hang-up once every process holding the
    /// slave has closed it.
    pub fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<PtySession>
    where
        S: AsRef<OsStr>,
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let (master, slave_path) = UnixPtyMaster::open()?;

        if let Some(size) = config.window_size {
            master.set_window_size(size)?;
        }

        let slave_fd = open_slave(&slave_path)?;
        let child = spawn_child(slave_fd, program, args, config)?;

        tracing::debug!(pid = child.pid(), slave = %slave_path, "child launched on pty");

        Ok(PtySession {
            master,
            child,
            slave_path,
        })
    }
}
