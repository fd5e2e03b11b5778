//! Signal handling for PTY sessions.
//!
//! SIGWINCH (window size change) and SIGCHLD (child state change) are turned
//! into an awaitable event source so that a relay loop can wait on them in
//! the same place it waits on descriptors. Handlers themselves never touch
//! session state; at most they set an atomic flag ([`register_flag`]).

use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use futures::StreamExt;
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGCHLD, SIGWINCH};
use signal_hook_tokio::{Handle, Signals};

use crate::error::{PtyError, Result};

/// Signal types relevant to PTY operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtySignalEvent {
    /// Window size changed (SIGWINCH).
    WindowChanged,
    /// Child process state changed (SIGCHLD).
    ChildStateChanged,
}

impl PtySignalEvent {
    /// Map a raw signal number to an event.
    #[must_use]
    pub const fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGWINCH => Some(Self::WindowChanged),
            SIGCHLD => Some(Self::ChildStateChanged),
            _ => None,
        }
    }
}

/// SIGWINCH and SIGCHLD as an async event source.
///
/// Registration is undone when the value is dropped.
pub struct SignalEvents {
    signals: Signals,
    handle: Handle,
}

impl std::fmt::Debug for SignalEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEvents")
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}

impl SignalEvents {
    /// Register for SIGWINCH and SIGCHLD.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let signals = Signals::new([SIGWINCH, SIGCHLD]).map_err(PtyError::SignalSetup)?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next relevant signal.
    ///
    /// Returns `None` once the source has been closed. Cancel safe.
    pub async fn next_event(&mut self) -> Option<PtySignalEvent> {
        loop {
            let signal = self.signals.next().await?;
            if let Some(event) = PtySignalEvent::from_signal(signal) {
                return Some(event);
            }
        }
    }

    /// Stop delivering events.
    pub fn close(&self) {
        self.handle.close();
    }
}

impl Drop for SignalEvents {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Register `flag` to be set whenever `signal` arrives.
///
/// The installed handler only stores `true` into the flag, which is
/// async-signal-safe. Unregister with [`signal_hook::low_level::unregister`].
pub fn register_flag(signal: i32, flag: Arc<AtomicBool>) -> io::Result<SigId> {
    signal_hook::flag::register(signal, flag)
}
