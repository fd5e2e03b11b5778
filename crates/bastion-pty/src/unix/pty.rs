//! Unix PTY allocation and terminal control.
//!
//! [`UnixPtyMaster`] wraps the master descriptor for readiness-driven I/O
//! and answers control operations (window size, foreground process group)
//! for the slave. The slave itself is only opened to hand it to the child.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_getfl, fcntl_setfl};
use rustix::process::{Pid, Signal, kill_process_group};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{tcgetpgrp, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::{PtySignal, WindowSize};
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::TerminalControl;

/// Unix PTY master.
///
/// Reads report end of file once every holder of the slave has closed it;
/// Linux signals that condition with `EIO`, which is folded into EOF here.
pub struct UnixPtyMaster {
    /// The master file descriptor wrapped for async I/O.
    async_fd: AsyncFd<OwnedFd>,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.async_fd.as_raw_fd())
            .finish()
    }
}

impl UnixPtyMaster {
    /// Open a new PTY master.
    ///
    /// Allocates a pseudo-terminal pair, grants and unlocks the slave, and
    /// returns the master together with the slave's pathname. The master is
    /// close-on-exec, so no launched program inherits it.
    pub fn open() -> Result<(Self, String)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY | OpenptFlags::CLOEXEC)
            .map_err(|e| PtyError::Create(errno_to_io(e)))?;

        grantpt(&master_fd).map_err(|e| PtyError::Create(errno_to_io(e)))?;
        unlockpt(&master_fd).map_err(|e| PtyError::Create(errno_to_io(e)))?;

        let slave_name = ptsname(&master_fd, Vec::new()).map_err(|e| PtyError::Create(errno_to_io(e)))?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        let flags = fcntl_getfl(&master_fd).map_err(|e| PtyError::Create(errno_to_io(e)))?;
        fcntl_setfl(&master_fd, flags | OFlags::NONBLOCK)
            .map_err(|e| PtyError::Create(errno_to_io(e)))?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((Self { async_fd }, slave_path))
    }

    /// Set the window size through the master.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        tcsetwinsize(self.async_fd.get_ref(), size.into())
            .map_err(|e| PtyError::Resize(errno_to_io(e)))
    }

    /// Get the current window size.
    pub fn get_window_size(&self) -> Result<WindowSize> {
        let winsize = tcgetwinsize(self.async_fd.get_ref())
            .map_err(|e| PtyError::GetAttributes(errno_to_io(e)))?;
        Ok(winsize.into())
    }

    /// The slave's current foreground process group.
    pub fn foreground_group(&self) -> Result<Pid> {
        tcgetpgrp(self.async_fd.get_ref()).map_err(|e| PtyError::ForegroundGroup(errno_to_io(e)))
    }

    /// Close the master. The child's terminal sees hang-up.
    pub fn close(self) {
        tracing::debug!(fd = self.async_fd.as_raw_fd(), "closing pty master");
        drop(self);
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for UnixPtyMaster {
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
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Last slave holder closed: hang-up, reported as EOF.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
            }
        }
    }
}

impl AsyncWrite for UnixPtyMaster {
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
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
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

/// Open the slave side of a PTY without making it a controlling terminal.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    rustix::fs::open(
        Path::new(path),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::OpenSlave {
        path: path.to_string(),
        source: errno_to_io(e),
    })
}

fn deliver(pgid: Pid, signal: PtySignal) -> Result<()> {
    let sig = Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| {
        PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid signal"))
    })?;
    kill_process_group(pgid, sig).map_err(|e| PtyError::Signal(errno_to_io(e)))
}

// Linux answers TIOCGPGRP on a slave only for processes whose controlling
// terminal it is; through the master it answers for anyone.
impl TerminalControl for UnixPtyMaster {
    fn set_window_size(&self, size: WindowSize) -> Result<()> {
        Self::set_window_size(self, size)
    }

    fn signal_foreground(&self, signal: PtySignal) -> Result<u32> {
        let pgid = self.foreground_group()?;
        deliver(pgid, signal)?;
        Ok(pgid.as_raw_nonzero().get() as u32)
    }
}
