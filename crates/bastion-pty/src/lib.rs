//! bastion-pty: pseudo-terminal plumbing for a recording SSH bastion
//!
//! This crate owns everything the bastion needs from the kernel's terminal
//! layer:
//!
//! - Allocating a PTY master and naming its slave ([`UnixPtyMaster`])
//! - Launching the target shell as a session leader on the slave ([`spawn_child`])
//! - Terminal control: window size and foreground process group signalling
//!   ([`TerminalControl`], implemented by the master)
//! - Turning SIGWINCH / SIGCHLD into an awaitable event source ([`SignalEvents`])
//!
//! # Example
//!
//! ```ignore
//! use bastion_pty::{PtyConfig, UnixPtySystem};
//! use tokio::io::AsyncReadExt;
//!
//! let config = PtyConfig::builder().arg0("/bin/bash").build();
//! let session = UnixPtySystem::spawn("/bin/bash", ["-l"], &config)?;
//! let mut master = session.master;
//! let mut buf = [0u8; 1024];
//! let n = master.read(&mut buf).await?;
//! ```
//!
//! Only Unix is supported; the bastion sits behind `sshd`.

#![cfg(unix)]

pub mod config;
pub mod error;
pub mod traits;
pub mod unix;

pub use config::{PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use traits::{ExitStatus, PtyChild, TerminalControl};
pub use unix::{
    PtySession, PtySignalEvent, SignalEvents, UnixPtyChild, UnixPtyMaster,
    UnixPtySystem, open_slave, register_flag, spawn_child,
};
