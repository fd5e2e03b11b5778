//! Per-session state owned by the relay loop.

use std::io::Write;
use std::time::Duration;

use bastion_pty::{ExitStatus, PtySession, UnixPtyChild, UnixPtyMaster};

use crate::record::{EntryKind, Recorder, SessionMetadata, TransferCounters};
use crate::terminal::RawModeGuard;

/// Interval between reap attempts during teardown.
const REAP_POLL: Duration = Duration::from_millis(10);

/// Everything one session owns: the pty, the child, the recording, the
/// byte counters and the caller's saved terminal mode.
///
/// Torn down exactly once by [`SessionContext::finish`].
#[derive(Debug)]
pub struct SessionContext<W: Write> {
    pub(crate) master: UnixPtyMaster,
    child: UnixPtyChild,
    slave_path: String,
    recorder: Recorder<W>,
    counters: TransferCounters,
    exit_status: Option<ExitStatus>,
    raw_mode: Option<RawModeGuard>,
}

impl<W: Write> SessionContext<W> {
    /// Take ownership of a launched session and its recording.
    pub fn new(session: PtySession, recorder: Recorder<W>) -> Self {
        Self {
            master: session.master,
            child: session.child,
            slave_path: session.slave_path,
            recorder,
            counters: TransferCounters::default(),
            exit_status: None,
            raw_mode: None,
        }
    }

    /// Keep the caller's terminal snapshot until teardown.
    #[must_use]
    pub fn with_raw_mode(mut self, guard: Option<RawModeGuard>) -> Self {
        self.raw_mode = guard;
        self
    }

    fn record(&mut self, kind: EntryKind, payload: &[u8]) {
        if let Err(e) = self.recorder.write_entry(kind, payload) {
            tracing::warn!(error = %e, kind = kind.code(), bytes = payload.len(), "recording write failed");
        }
    }

    /// Append the session-start entry.
    pub fn record_start(&mut self, metadata: &SessionMetadata) {
        self.record(EntryKind::SessionStart, metadata.render().as_bytes());
    }

    /// Account for and record bytes relayed from the shell to the client.
    pub fn record_server_output(&mut self, bytes: &[u8]) {
        self.counters.server_to_client += bytes.len() as u64;
        self.record(EntryKind::ServerToClient, bytes);
    }

    /// Account for and record bytes relayed from the client to the shell.
    pub fn record_client_input(&mut self, bytes: &[u8]) {
        self.counters.client_to_server += bytes.len() as u64;
        self.record(EntryKind::ClientToServer, bytes);
    }

    /// Record a heartbeat.
    pub fn record_heartbeat(&mut self) {
        self.record(EntryKind::None, &[]);
    }

    /// Reap the child if it has exited. Other state changes are logged.
    pub fn poll_child(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_some() {
            return self.exit_status;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::info!(pid = self.child.pid(), %status, "child exited");
                self.exit_status = Some(status);
            }
            Ok(None) => {
                tracing::debug!(pid = self.child.pid(), "child state changed without exiting");
            }
            Err(e) => {
                tracing::warn!(pid = self.child.pid(), error = %e, "cannot reap child");
            }
        }
        self.exit_status
    }

    /// Tear the session down: close the master, give the child `grace` to
    /// report its status, append the session-exit entry, close the
    /// recording and restore the caller's terminal.
    pub async fn finish(self, grace: Duration) -> SessionOutcome<W> {
        let Self {
            master,
            mut child,
            slave_path,
            mut recorder,
            counters,
            mut exit_status,
            raw_mode,
        } = self;

        master.close();

        let deadline = tokio::time::Instant::now() + grace;
        while exit_status.is_none() {
            match child.try_wait() {
                Ok(Some(status)) => exit_status = Some(status),
                Ok(None) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(REAP_POLL).await;
                }
                Ok(None) => {
                    tracing::warn!(pid = child.pid(), "child still running after hang-up");
                    break;
                }
                Err(e) => {
                    tracing::warn!(pid = child.pid(), error = %e, "cannot reap child");
                    break;
                }
            }
        }

        let metadata = SessionMetadata::session_exit(exit_status, counters);
        if let Err(e) = recorder.write_metadata(EntryKind::SessionExit, &metadata) {
            tracing::warn!(error = %e, "cannot record session exit");
        }
        if let Err(e) = recorder.flush() {
            tracing::warn!(error = %e, "cannot flush recording");
        }
        let entries = recorder.entry_count();
        let recording = recorder.into_writer();

        if let Some(mut guard) = raw_mode {
            if let Err(e) = guard.restore() {
                tracing::warn!(error = %e, "failed to restore terminal settings");
            }
        }

        tracing::info!(
            slave = %slave_path,
            entries,
            server_to_client = counters.server_to_client,
            client_to_server = counters.client_to_server,
            "session closed"
        );

        SessionOutcome {
            exit_status,
            counters,
            recording,
        }
    }
}

/// Result of a finished session.
#[derive(Debug)]
pub struct SessionOutcome<W> {
    /// Child exit status; `None` when it could not be collected.
    pub exit_status: Option<ExitStatus>,
    /// Final byte counters.
    pub counters: TransferCounters,
    /// The recording sink.
    pub recording: W,
}

impl<W> SessionOutcome<W> {
    /// Status for the bastion's own exit: the child's code, 128 plus the
    /// signal for a killed child, 0 when unknown.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_status.map_or(0, |status| status.shell_code())
    }
}
