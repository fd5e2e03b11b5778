//! Window size propagation from the caller's terminal to the session pty.
//!
//! SIGWINCH only raises a flag. The relay loop checks the flag once per
//! iteration and, when it was raised, copies the caller's window size to the
//! slave and notifies the slave's foreground process group. Any number of
//! notifications between two checks collapse into one resize.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bastion_pty::{TerminalControl, WindowSize};
use signal_hook::SigId;
use signal_hook::consts::signal::SIGWINCH;

/// Source of the caller's current window size.
pub trait WindowSource {
    /// Query the current size.
    fn window_size(&self) -> io::Result<WindowSize>;
}

impl<T: WindowSource + ?Sized> WindowSource for &T {
    fn window_size(&self) -> io::Result<WindowSize> {
        (**self).window_size()
    }
}

/// A fixed size, for callers without a terminal of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow(pub WindowSize);

impl WindowSource for FixedWindow {
    fn window_size(&self) -> io::Result<WindowSize> {
        Ok(self.0)
    }
}

/// Level-triggered resize-pending flag.
///
/// Starts raised so the first loop iteration sizes the slave.
#[derive(Debug)]
pub struct ResizeState {
    pending: Arc<AtomicBool>,
    registration: Option<SigId>,
}

impl Default for ResizeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ResizeState {
    /// Create a raised flag with no signal handler attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(true)),
            registration: None,
        }
    }

    /// Create a raised flag that SIGWINCH raises again.
    pub fn register() -> io::Result<Self> {
        let mut state = Self::new();
        let id = bastion_pty::register_flag(SIGWINCH, Arc::clone(&state.pending))?;
        state.registration = Some(id);
        Ok(state)
    }

    /// Raise the flag.
    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Lower the flag, returning whether it was raised.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// Whether the flag is raised, without lowering it.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Drop for ResizeState {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// What a propagation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Nothing was pending.
    Idle,
    /// The size was applied and the group with this id notified.
    Applied {
        /// Size applied to the slave.
        size: WindowSize,
        /// Foreground process group that received SIGWINCH.
        pgid: u32,
    },
    /// The caller's size could not be read; the slave was left unchanged.
    QueryFailed,
    /// The size could not be applied or the group could not be notified.
    ApplyFailed,
}

/// Copies the caller's window size to the session pty when a resize is
/// pending.
#[derive(Debug)]
pub struct ResizePropagator<W> {
    state: ResizeState,
    window: W,
}

impl<W: WindowSource> ResizePropagator<W> {
    /// Create a propagator.
    pub const fn new(state: ResizeState, window: W) -> Self {
        Self { state, window }
    }

    /// The pending flag.
    pub const fn state(&self) -> &ResizeState {
        &self.state
    }

    /// Run one resize cycle against `terminal` if one is pending.
    /// Failures are logged.
    pub fn propagate<T: TerminalControl + ?Sized>(&self, terminal: &T) -> ResizeOutcome {
        if !self.state.take_pending() {
            return ResizeOutcome::Idle;
        }

        let size = match self.window.window_size() {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read caller window size");
                return ResizeOutcome::QueryFailed;
            }
        };

        match terminal.resize_and_notify(size) {
            Ok(pgid) => {
                tracing::debug!(cols = size.cols, rows = size.rows, pgid, "window size propagated");
                ResizeOutcome::Applied { size, pgid }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot propagate window size");
                ResizeOutcome::ApplyFailed
            }
        }
    }
}
