//! Session setup and teardown.
//!
//! This module provides:
//!
//! - [`SessionRequest`]: what to launch, derived from the bastion's argv
//! - [`SessionContext`]: per-session state and its one-time teardown
//! - [`RelayLoop`]: the multiplexed relay between the client and the pty
//! - [`run`]: a complete session on the caller's own terminal
//!
//! # Example
//!
//! ```ignore
//! use bastion::config::BastionConfig;
//! use bastion::session::{self, SessionRequest};
//!
//! let config = BastionConfig::from_env();
//! let request = SessionRequest::from_args(&config, std::env::args_os());
//! let outcome = session::run(&config, &request).await?;
//! std::process::exit(outcome.exit_code());
//! ```

pub mod context;
pub mod relay;

use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::os::fd::AsFd;
use std::path::PathBuf;

use bastion_pty::{PtyConfig, UnixPtySystem};
use tokio::io::{AsyncRead, AsyncWrite};

pub use context::{SessionContext, SessionOutcome};
pub use relay::RelayLoop;

use crate::config::BastionConfig;
use crate::error::{BastionError, Result};
use crate::record::{ProcessIdentity, Recorder, SessionMetadata, open_recording, recording_path};
use crate::resize::WindowSource;
use crate::terminal::{ClientStream, RawModeGuard, TerminalWindow};

/// What a session launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// The bastion's own argument 0, recorded as metadata.
    pub argv0: String,
    /// Program run on the pty; also its argument 0.
    pub shell: PathBuf,
    /// Arguments forwarded to the shell.
    pub args: Vec<OsString>,
}

impl SessionRequest {
    /// Build from the bastion's argv: the first element names the bastion,
    /// the rest is forwarded to the configured shell unchanged.
    pub fn from_args<I>(config: &BastionConfig, argv: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut argv = argv.into_iter();
        let argv0 = argv
            .next()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            argv0,
            shell: config.shell.clone(),
            args: argv.collect(),
        }
    }

    /// The session-start metadata for this request, with the calling
    /// process's identity and environment.
    #[must_use]
    pub fn start_metadata(&self) -> SessionMetadata {
        SessionMetadata::session_start(
            &ProcessIdentity::current(),
            &self.argv0,
            &self.shell.to_string_lossy(),
            |name| std::env::var(name).ok(),
        )
    }
}

/// The client side of a session.
#[derive(Debug)]
pub struct ClientEnd<I, O, S> {
    /// Bytes typed by the client.
    pub input: I,
    /// Bytes shown to the client.
    pub output: O,
    /// The client's window size.
    pub window: S,
    /// The client's saved terminal mode, restored at teardown.
    pub raw_mode: Option<RawModeGuard>,
}

/// Launch the shell, record to `recording` and relay between `client` and
/// the pty until hang-up.
pub async fn run_with<I, O, S, W>(
    config: &BastionConfig,
    request: &SessionRequest,
    client: ClientEnd<I, O, S>,
    recording: W,
) -> Result<SessionOutcome<W>>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    S: WindowSource,
    W: Write,
{
    config.validate()?;

    let pty_config = PtyConfig::builder().arg0(request.shell.as_os_str()).build();
    let session = UnixPtySystem::spawn(&request.shell, &request.args, &pty_config)?;
    tracing::info!(
        pid = session.child.pid(),
        slave = %session.slave_path,
        shell = %request.shell.display(),
        "shell launched"
    );

    let mut context =
        SessionContext::new(session, Recorder::new(recording)).with_raw_mode(client.raw_mode);
    context.record_start(&request.start_metadata());

    let relay = RelayLoop::new(context, client.input, client.output, client.window, config)?;
    Ok(relay.run().await)
}

/// Run a session on the caller's own terminal (stdin/stdout), recording to
/// a timestamped file under the configured directory.
pub async fn run(config: &BastionConfig, request: &SessionRequest) -> Result<SessionOutcome<File>> {
    config.validate()?;

    let path = recording_path(&config.record_dir, &chrono::Local::now());
    let file = open_recording(&path)?;
    tracing::info!(path = %path.display(), pid = std::process::id(), "recording session");

    let raw_mode = RawModeGuard::enter(std::io::stdin().as_fd()).map_err(BastionError::terminal)?;
    if raw_mode.is_none() {
        tracing::info!("stdin is not a terminal; leaving its mode alone");
    }

    let client = ClientEnd {
        input: ClientStream::stdin()?,
        output: ClientStream::stdout()?,
        window: TerminalWindow::stdin()?,
        raw_mode,
    };

    run_with(config, request, client, file).await
}
