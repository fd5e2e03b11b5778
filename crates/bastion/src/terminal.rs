//! The caller's terminal: raw mode, non-blocking client descriptors and
//! window size queries.
//!
//! `sshd` hands the bastion a pty of its own on stdin/stdout. For the
//! duration of a session that terminal is put into raw mode so every byte,
//! control characters included, reaches the relay untouched. Both guards in
//! this module put things back when dropped.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use bastion_pty::WindowSize;
use rustix::fs::{OFlags, fcntl_getfl, fcntl_setfl};
use rustix::termios::{
    ControlModes, InputModes, LocalModes, OptionalActions, OutputModes, SpecialCodeIndex, Termios,
    isatty, tcgetattr, tcgetwinsize, tcsetattr,
};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::resize::WindowSource;

/// Inter-byte timer for raw reads, in tenths of a second.
const RAW_VTIME: u8 = 8;

/// Compute the raw-mode settings derived from `saved`.
///
/// No break, CR-to-NL, parity check, stripping or flow control on input; no
/// output post-processing; 8-bit characters; no echo, canonical editing,
/// extended functions or signal characters. Reads return after one byte or
/// 0.8 s.
#[must_use]
pub fn raw_termios(saved: &Termios) -> Termios {
    let mut raw = saved.clone();
    raw.input_modes.remove(
        InputModes::BRKINT | InputModes::ICRNL | InputModes::INPCK | InputModes::ISTRIP | InputModes::IXON,
    );
    raw.output_modes.remove(OutputModes::OPOST);
    raw.control_modes.insert(ControlModes::CS8);
    raw.local_modes
        .remove(LocalModes::ECHO | LocalModes::ICANON | LocalModes::IEXTEN | LocalModes::ISIG);
    raw.special_codes[SpecialCodeIndex::VMIN] = 0;
    raw.special_codes[SpecialCodeIndex::VTIME] = RAW_VTIME;
    raw
}

/// Snapshot of a terminal's settings, restored on drop.
pub struct RawModeGuard {
    fd: OwnedFd,
    saved: Termios,
    restored: bool,
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("fd", &self.fd.as_raw_fd())
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl RawModeGuard {
    /// Put the terminal on `fd` into raw mode.
    ///
    /// Returns `Ok(None)` when `fd` is not a terminal.
    pub fn enter(fd: BorrowedFd<'_>) -> io::Result<Option<Self>> {
        if !isatty(fd) {
            return Ok(None);
        }

        let fd = fd.try_clone_to_owned()?;
        let saved = tcgetattr(&fd)?;
        tcsetattr(&fd, OptionalActions::Flush, &raw_termios(&saved))?;
        tracing::debug!(fd = fd.as_raw_fd(), "terminal in raw mode");

        Ok(Some(Self {
            fd,
            saved,
            restored: false,
        }))
    }

    /// The settings in effect before raw mode.
    #[must_use]
    pub const fn saved(&self) -> &Termios {
        &self.saved
    }

    /// Restore the saved settings, discarding pending input.
    pub fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        tcsetattr(&self.fd, OptionalActions::Flush, &self.saved)?;
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "failed to restore terminal settings");
        }
    }
}

/// A client descriptor switched to non-blocking mode for readiness-driven
/// I/O. Its original file status flags come back on drop.
///
/// The descriptor is a duplicate, so the caller's own stdin/stdout stay
/// open; the flags live on the shared open file description and are
/// therefore visible through both.
pub struct ClientStream {
    async_fd: AsyncFd<OwnedFd>,
    saved_flags: OFlags,
}

impl std::fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStream")
            .field("fd", &self.async_fd.as_raw_fd())
            .finish_non_exhaustive()
    }
}

impl ClientStream {
    /// Duplicate `fd`, make it non-blocking and register it with the
    /// runtime. Must be called from within a tokio runtime.
    pub fn new(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let owned = fd.try_clone_to_owned()?;
        let saved_flags = fcntl_getfl(&owned)?;
        fcntl_setfl(&owned, saved_flags | OFlags::NONBLOCK)?;

        match AsyncFd::new(owned) {
            Ok(async_fd) => Ok(Self {
                async_fd,
                saved_flags,
            }),
            Err(e) => {
                // The dup is gone; restore through the original.
                let _ = fcntl_setfl(fd, saved_flags);
                Err(e)
            }
        }
    }

    /// Client input (stdin).
    pub fn stdin() -> io::Result<Self> {
        Self::new(io::stdin().as_fd())
    }

    /// Client output (stdout).
    pub fn stdout() -> io::Result<Self> {
        Self::new(io::stdout().as_fd())
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        if let Err(e) = fcntl_setfl(self.async_fd.get_ref(), self.saved_flags) {
            tracing::warn!(error = %e, "failed to restore client descriptor flags");
        }
    }
}

impl AsRawFd for ClientStream {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => guard.clear_ready(),
                // The caller's terminal went away.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => guard.clear_ready(),
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Window size of the caller's terminal, queried on demand.
#[derive(Debug)]
pub struct TerminalWindow {
    fd: OwnedFd,
}

impl TerminalWindow {
    /// Query the terminal on `fd`.
    pub fn new(fd: BorrowedFd<'_>) -> io::Result<Self> {
        Ok(Self {
            fd: fd.try_clone_to_owned()?,
        })
    }

    /// Query the terminal on stdin.
    pub fn stdin() -> io::Result<Self> {
        Self::new(io::stdin().as_fd())
    }
}

impl WindowSource for TerminalWindow {
    fn window_size(&self) -> io::Result<WindowSize> {
        Ok(tcgetwinsize(&self.fd)?.into())
    }
}
