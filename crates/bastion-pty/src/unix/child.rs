//! Unix child process management for PTY.
//!
//! The child is launched with its standard streams on the slave, as a new
//! session leader whose controlling terminal is the slave. The parent keeps
//! only the process id and reaps it with `waitpid`.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use rustix::process::{Pid, WaitOptions, WaitStatus, waitpid};

use crate::config::PtyConfig;
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::{ExitStatus, PtyChild};

/// Unix child process handle.
#[derive(Debug)]
pub struct UnixPtyChild {
    /// The process ID.
    pid: u32,
    /// Cached exit status, set once the child has been reaped.
    exit_status: Option<ExitStatus>,
}

impl UnixPtyChild {
    /// Create a child handle from a PID.
    #[must_use]
    pub const fn from_pid(pid: u32) -> Self {
        Self {
            pid,
            exit_status: None,
        }
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Check if the process is still running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.exit_status.is_none()
    }

    /// The exit status captured by an earlier reap, if any.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn raw_pid(&self) -> Result<Pid> {
        Pid::from_raw(self.pid as i32).ok_or_else(|| {
            PtyError::Wait(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))
        })
    }

    /// Reap the child without blocking.
    ///
    /// Returns `Ok(None)` when the child is still running or merely stopped.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        let pid = self.raw_pid()?;
        match waitpid(Some(pid), WaitOptions::NOHANG) {
            Ok(Some((_pid, wait_status))) => {
                let status = convert_wait_status(wait_status);
                self.exit_status = status;
                Ok(status)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(PtyError::Wait(errno_to_io(e))),
        }
    }
}

impl PtyChild for UnixPtyChild {
    fn pid(&self) -> u32 {
        Self::pid(self)
    }

    fn is_running(&self) -> bool {
        Self::is_running(self)
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Self::try_wait(self)
    }
}

/// Convert a rustix `WaitStatus`; stopped or continued children have not exited.
fn convert_wait_status(status: WaitStatus) -> Option<ExitStatus> {
    if status.exited() {
        Some(ExitStatus::Exited(status.exit_status().unwrap_or(0)))
    } else if status.signaled() {
        Some(ExitStatus::Signaled(status.terminating_signal().unwrap_or(0)))
    } else {
        None
    }
}

/// Launch a child process on a PTY slave.
///
/// The slave is installed as stdin, stdout and stderr; before exec the child
/// starts a new session and claims the slave as its controlling terminal.
/// Argument 0 is `config.arg0` when set, the program path otherwise.
/// `slave_fd` is closed in the parent when this returns.
pub fn spawn_child<S, I>(
    slave_fd: OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let program = program.as_ref();
    let slave_raw = slave_fd.as_raw_fd();

    let mut cmd = Command::new(program);
    cmd.arg0(config.arg0.as_deref().unwrap_or(program));
    cmd.args(args);

    cmd.stdin(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stdout(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));
    cmd.stderr(Stdio::from(slave_fd.try_clone().map_err(PtyError::Spawn)?));

    let new_session = config.new_session;
    let controlling_terminal = config.controlling_terminal;

    // SAFETY: only async-signal-safe calls between fork and exec.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(move || {
            if new_session && libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            if controlling_terminal && libc::ioctl(slave_raw, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }

            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    drop(slave_fd);

    Ok(UnixPtyChild::from_pid(child.id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_from_pid() {
        let child = UnixPtyChild::from_pid(1234);
        assert_eq!(child.pid(), 1234);
        assert!(child.is_running());
        assert!(child.exit_status().is_none());
    }

    #[tokio::test]
    async fn reaped_status_is_cached() {
        let Ok((_master, slave_path)) = crate::unix::UnixPtyMaster::open() else {
            return;
        };
        let slave = crate::unix::open_slave(&slave_path).unwrap();
        let mut child = spawn_child(slave, "/bin/sh", ["-c", "exit 7"], &PtyConfig::default()).unwrap();

        let mut status = None;
        for _ in 0..200 {
            status = child.try_wait().unwrap();
            if status.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(status, Some(ExitStatus::Exited(7)));
        assert_eq!(child.try_wait().unwrap(), Some(ExitStatus::Exited(7)));
        assert!(!child.is_running());
    }
}
