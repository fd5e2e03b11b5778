//! Interrupt forwarding.
//!
//! The caller's terminal is in raw mode, so Ctrl-C arrives as a plain ETX
//! byte. It is relayed like any other byte; in addition the slave's
//! foreground process group gets SIGINT for every ETX seen.

use bastion_pty::{PtySignal, TerminalControl};

/// End-of-text, the byte Ctrl-C produces.
pub const ETX: u8 = 0x03;

/// Number of ETX bytes in `bytes`.
#[must_use]
pub fn count_interrupts(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == ETX).count()
}

/// Send SIGINT to the foreground group of `terminal` once per ETX byte in
/// `bytes`. Returns how many signals were delivered; failures are logged.
pub fn forward_interrupts<T: TerminalControl + ?Sized>(terminal: &T, bytes: &[u8]) -> usize {
    let wanted = count_interrupts(bytes);
    let mut delivered = 0;

    for _ in 0..wanted {
        match terminal.signal_foreground(PtySignal::Interrupt) {
            Ok(pgid) => {
                tracing::debug!(pgid, "interrupt forwarded");
                delivered += 1;
            }
            Err(e) => tracing::warn!(error = %e, "cannot forward interrupt"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_pty::{PtyError, WindowSize};
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        interrupts: Cell<usize>,
        fail: bool,
    }

    impl TerminalControl for Counter {
        fn set_window_size(&self, _size: WindowSize) -> bastion_pty::Result<()> {
            Ok(())
        }

        fn signal_foreground(&self, signal: PtySignal) -> bastion_pty::Result<u32> {
            assert_eq!(signal, PtySignal::Interrupt);
            if self.fail {
                return Err(PtyError::ForegroundGroup(std::io::Error::other("no tty")));
            }
            self.interrupts.set(self.interrupts.get() + 1);
            Ok(1234)
        }
    }

    #[test]
    fn one_signal_per_etx() {
        let terminal = Counter::default();
        assert_eq!(forward_interrupts(&terminal, b"\x03ab\x03\x03"), 3);
        assert_eq!(terminal.interrupts.get(), 3);
    }

    #[test]
    fn plain_bytes_send_nothing() {
        let terminal = Counter::default();
        assert_eq!(forward_interrupts(&terminal, b"ls -l\r"), 0);
        assert_eq!(terminal.interrupts.get(), 0);
    }

    #[test]
    fn failures_are_not_counted() {
        let terminal = Counter {
            fail: true,
            ..Counter::default()
        };
        assert_eq!(forward_interrupts(&terminal, b"\x03"), 0);
    }
}
