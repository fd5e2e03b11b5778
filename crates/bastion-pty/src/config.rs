//! Launch options, forwarded signals and terminal dimensions.

use std::ffi::OsString;

/// How the child is started on the slave.
///
/// The child inherits the caller's environment and working directory.
///
/// ```
/// use bastion_pty::PtyConfig;
///
/// let config = PtyConfig::builder().arg0("/bin/bash").window_size(80, 24).build();
/// assert_eq!(config.arg0.as_deref(), Some(std::ffi::OsStr::new("/bin/bash")));
/// assert!(config.new_session);
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Argument 0 of the child; the program path when `None`.
    pub arg0: Option<OsString>,
    /// Size applied to the pair before the child starts.
    pub window_size: Option<WindowSize>,
    /// Call `setsid` in the child.
    pub new_session: bool,
    /// Make the slave the child's controlling terminal (`TIOCSCTTY`).
    pub controlling_terminal: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            arg0: None,
            window_size: None,
            new_session: true,
            controlling_terminal: true,
        }
    }
}

impl PtyConfig {
    /// Start from the defaults: new session, slave as controlling terminal.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::default()
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    inner: PtyConfig,
}

impl PtyConfigBuilder {
    /// Override argument 0.
    #[must_use]
    pub fn arg0(mut self, arg0: impl Into<OsString>) -> Self {
        self.inner.arg0 = Some(arg0.into());
        self
    }

    /// Initial window size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.inner.window_size = Some(WindowSize::new(cols, rows));
        self
    }

    /// Whether the child leads a new session.
    #[must_use]
    pub const fn new_session(mut self, enabled: bool) -> Self {
        self.inner.new_session = enabled;
        self
    }

    /// Whether the slave becomes the controlling terminal.
    #[must_use]
    pub const fn controlling_terminal(mut self, enabled: bool) -> Self {
        self.inner.controlling_terminal = enabled;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.inner
    }
}

/// Signals the bastion sends to the slave's foreground process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PtySignal {
    /// SIGINT, for each ETX typed by the client.
    Interrupt,
    /// SIGWINCH, after a window size change.
    WindowChange,
}

impl PtySignal {
    /// The Unix signal number.
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::WindowChange => libc::SIGWINCH,
        }
    }
}

/// Terminal dimensions in character cells, plus the rarely used pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Columns.
    pub cols: u16,
    /// Rows.
    pub rows: u16,
    /// Width in pixels, usually 0.
    pub xpixel: u16,
    /// Height in pixels, usually 0.
    pub ypixel: u16,
}

impl WindowSize {
    /// A size in cells with no pixel dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            xpixel: 0,
            ypixel: 0,
        }
    }
}

impl From<rustix::termios::Winsize> for WindowSize {
    fn from(ws: rustix::termios::Winsize) -> Self {
        Self {
            cols: ws.ws_col,
            rows: ws.ws_row,
            xpixel: ws.ws_xpixel,
            ypixel: ws.ws_ypixel,
        }
    }
}

impl From<WindowSize> for rustix::termios::Winsize {
    fn from(size: WindowSize) -> Self {
        Self {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: size.xpixel,
            ws_ypixel: size.ypixel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides() {
        let config = PtyConfig::builder()
            .arg0("/bin/sh")
            .window_size(120, 40)
            .controlling_terminal(false)
            .build();

        assert_eq!(config.arg0, Some(OsString::from("/bin/sh")));
        assert_eq!(config.window_size, Some(WindowSize::new(120, 40)));
        assert!(config.new_session);
        assert!(!config.controlling_terminal);
    }

    #[test]
    fn signal_numbers() {
        assert_eq!(PtySignal::Interrupt.as_unix_signal(), libc::SIGINT);
        assert_eq!(PtySignal::WindowChange.as_unix_signal(), libc::SIGWINCH);
    }

    #[test]
    fn pixel_dimensions_survive_conversion() {
        let size = WindowSize {
            cols: 132,
            rows: 43,
            xpixel: 8,
            ypixel: 16,
        };
        let ws: rustix::termios::Winsize = size.into();
        assert_eq!(WindowSize::from(ws), size);
    }
}
