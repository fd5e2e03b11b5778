//! The session relay loop.
//!
//! One `select!` waits on the child-state signal stream, the pty master,
//! the client input and a heartbeat timer. Each wake-up handles exactly one
//! of them; the pending resize is checked before every wait. The loop ends
//! when either the pty master or the client input hangs up.

use std::io::{self, Write};
use std::time::Duration;

use bastion_pty::{PtySignalEvent, SignalEvents};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::context::{SessionContext, SessionOutcome};
use crate::config::BastionConfig;
use crate::interrupt::forward_interrupts;
use crate::resize::{ResizePropagator, ResizeState, WindowSource};

/// What woke the loop.
enum Wake {
    Signal(PtySignalEvent),
    Pty(io::Result<usize>),
    Client(io::Result<usize>),
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayState {
    /// Both ends are open.
    Running,
    /// One end hung up.
    Terminated,
}

/// Drives one session from the first relayed byte to teardown.
#[derive(Debug)]
pub struct RelayLoop<I, O, W: Write, S> {
    context: SessionContext<W>,
    input: I,
    output: O,
    events: SignalEvents,
    resize: ResizePropagator<S>,
    heartbeat: Duration,
    reap_grace: Duration,
    pty_buf: Vec<u8>,
    client_buf: Vec<u8>,
    state: RelayState,
}

impl<I, O, W, S> RelayLoop<I, O, W, S>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    W: Write,
    S: WindowSource,
{
    /// Build a relay for `context` between the client `input`/`output` and
    /// the pty. `window` supplies the caller's size on resize. Must be
    /// called from within a tokio runtime.
    pub fn new(
        context: SessionContext<W>,
        input: I,
        output: O,
        window: S,
        config: &BastionConfig,
    ) -> crate::Result<Self> {
        let events = SignalEvents::new()?;
        let resize = ResizeState::register()?;

        Ok(Self {
            context,
            input,
            output,
            events,
            resize: ResizePropagator::new(resize, window),
            heartbeat: config.heartbeat,
            reap_grace: config.reap_grace,
            pty_buf: vec![0; config.buffer_size],
            client_buf: vec![0; config.buffer_size],
            state: RelayState::Running,
        })
    }

    /// Relay until hang-up, then tear the session down.
    pub async fn run(mut self) -> SessionOutcome<W> {
        while self.state == RelayState::Running {
            self.step().await;
        }

        self.events.close();
        let Self {
            context, reap_grace, ..
        } = self;
        context.finish(reap_grace).await
    }

    /// Run one iteration.
    pub async fn step(&mut self) {
        self.resize.propagate(&self.context.master);

        let wake = tokio::select! {
            Some(event) = self.events.next_event() => Wake::Signal(event),
            res = self.context.master.read(&mut self.pty_buf) => Wake::Pty(res),
            res = self.input.read(&mut self.client_buf) => Wake::Client(res),
            () = tokio::time::sleep(self.heartbeat) => Wake::Heartbeat,
        };

        match wake {
            Wake::Signal(PtySignalEvent::ChildStateChanged) => {
                self.context.poll_child();
            }
            Wake::Signal(PtySignalEvent::WindowChanged) => {
                self.resize.state().mark_pending();
            }
            Wake::Pty(Ok(0)) => self.hang_up("pty"),
            Wake::Pty(Ok(n)) => self.relay_server_output(n).await,
            Wake::Pty(Err(e)) => {
                tracing::warn!(error = %e, "pty read failed");
                self.hang_up("pty");
            }
            Wake::Client(Ok(0)) => self.hang_up("client"),
            Wake::Client(Ok(n)) => self.relay_client_input(n).await,
            Wake::Client(Err(e)) => {
                tracing::warn!(error = %e, "client read failed");
                self.hang_up("client");
            }
            Wake::Heartbeat => self.context.record_heartbeat(),
        }
    }

    fn hang_up(&mut self, side: &'static str) {
        tracing::debug!(side, "hang-up");
        self.state = RelayState::Terminated;
    }

    async fn relay_server_output(&mut self, n: usize) {
        let bytes = &self.pty_buf[..n];
        match self.output.write(bytes).await {
            Ok(written) if written < n => {
                tracing::warn!(bytes = n, written, "short write to client");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, bytes = n, "write to client failed"),
        }
        if let Err(e) = self.output.flush().await {
            tracing::warn!(error = %e, "flush to client failed");
        }
        self.context.record_server_output(bytes);
    }

    async fn relay_client_input(&mut self, n: usize) {
        let bytes = &self.client_buf[..n];
        match self.context.master.write(bytes).await {
            Ok(written) if written < n => {
                tracing::warn!(bytes = n, written, "short write to pty");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, bytes = n, "write to pty failed"),
        }
        self.context.record_client_input(bytes);
        forward_interrupts(&self.context.master, bytes);
    }
}
