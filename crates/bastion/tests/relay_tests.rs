//! End-to-end sessions through a real pty with in-memory client streams.

use std::ffi::OsString;
use std::time::{Duration, Instant};

use bastion::record::{EntryKind, RecordReader, SessionMetadata, Timestamp};
use bastion::resize::FixedWindow;
use bastion::session::{ClientEnd, SessionOutcome, SessionRequest, run_with};
use bastion::{BastionConfig, BastionError, Entry};
use bastion_pty::{ExitStatus, WindowSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

struct Client {
    /// Feeds the session's input.
    keyboard: DuplexStream,
    /// Receives the session's output.
    screen: DuplexStream,
    seen: Vec<u8>,
}

impl Client {
    /// Read output until `needle` shows up. False if the output closed or
    /// stayed quiet for too long.
    async fn wait_for(&mut self, needle: &str) -> bool {
        let mut buf = [0u8; 1024];
        let found = timeout(WAIT, async {
            while !String::from_utf8_lossy(&self.seen).contains(needle) {
                match self.screen.read(&mut buf).await {
                    Ok(0) | Err(_) => return false,
                    Ok(n) => self.seen.extend_from_slice(&buf[..n]),
                }
            }
            true
        })
        .await;
        found.unwrap_or(false)
    }

    async fn type_bytes(&mut self, bytes: &[u8]) {
        let _ = self.keyboard.write_all(bytes).await;
    }
}

fn client_end() -> (ClientEnd<DuplexStream, DuplexStream, FixedWindow>, Client) {
    let (input, keyboard) = duplex(64 * 1024);
    let (output, screen) = duplex(64 * 1024);
    let end = ClientEnd {
        input,
        output,
        window: FixedWindow(WindowSize::new(80, 24)),
        raw_mode: None,
    };
    let client = Client {
        keyboard,
        screen,
        seen: Vec::new(),
    };
    (end, client)
}

fn request(shell: &str, args: &[&str]) -> SessionRequest {
    SessionRequest {
        argv0: "ssh-bastion".to_string(),
        shell: shell.into(),
        args: args.iter().map(OsString::from).collect(),
    }
}

/// Run a session to completion. `None` where no pty can be allocated.
async fn session(
    config: &BastionConfig,
    request: &SessionRequest,
    end: ClientEnd<DuplexStream, DuplexStream, FixedWindow>,
) -> Option<SessionOutcome<Vec<u8>>> {
    let run = run_with(config, request, end, Vec::new());
    match timeout(WAIT, run).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(BastionError::Pty(e))) => {
            eprintln!("skipping: pty unavailable: {e}");
            None
        }
        Ok(Err(e)) => panic!("session failed: {e}"),
        Err(_) => panic!("session did not end"),
    }
}

fn entries(outcome: &SessionOutcome<Vec<u8>>) -> Vec<Entry> {
    RecordReader::new(outcome.recording.as_slice())
        .map(Result::unwrap)
        .collect()
}

fn data_total(entries: &[Entry], kind: EntryKind) -> u64 {
    entries
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.payload.len() as u64)
        .sum()
}

fn micros_between(earlier: Timestamp, later: Timestamp) -> i64 {
    (later.secs - earlier.secs) * 1_000_000 + (later.micros - earlier.micros)
}

#[tokio::test]
async fn typed_command_is_recorded_before_its_echo() {
    let config = BastionConfig::default();
    let request = request("/bin/cat", &[]);
    let (end, mut client) = client_end();

    let driver = async {
        client.type_bytes(b"ls\n").await;
        let echoed = client.wait_for("ls").await;
        client.type_bytes(b"\x04").await;
        echoed
    };
    let (outcome, echoed) = tokio::join!(session(&config, &request, end), driver);
    let Some(outcome) = outcome else {
        return;
    };
    assert!(echoed);

    let entries = entries(&outcome);
    assert_eq!(entries.first().map(|e| e.kind), Some(EntryKind::SessionStart));
    assert_eq!(entries.last().map(|e| e.kind), Some(EntryKind::SessionExit));

    let first_input = entries
        .iter()
        .position(|e| e.kind == EntryKind::ClientToServer)
        .unwrap();
    let first_output = entries
        .iter()
        .position(|e| e.kind == EntryKind::ServerToClient)
        .unwrap();
    assert!(first_input < first_output);
    assert_eq!(entries[first_input].payload, b"ls\n");
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn exit_entry_matches_the_counters() {
    let config = BastionConfig::default();
    let request = request("/bin/sh", &["-c", "printf hello"]);
    let (end, mut client) = client_end();

    let Some(outcome) = session(&config, &request, end).await else {
        return;
    };

    let mut shown = Vec::new();
    client.screen.read_to_end(&mut shown).await.unwrap();
    assert!(String::from_utf8_lossy(&shown).contains("hello"));

    let entries = entries(&outcome);
    let start = SessionMetadata::parse(&entries[0].payload_text());
    assert_eq!(start.get("argv0"), Some("ssh-bastion"));
    assert_eq!(start.get("childShell"), Some("/bin/sh"));

    let exit = entries.last().unwrap();
    assert_eq!(exit.kind, EntryKind::SessionExit);
    let exit = SessionMetadata::parse(&exit.payload_text());

    let served = data_total(&entries, EntryKind::ServerToClient);
    let typed = data_total(&entries, EntryKind::ClientToServer);
    assert_eq!(served, outcome.counters.server_to_client);
    assert_eq!(typed, outcome.counters.client_to_server);
    assert_eq!(served, shown.len() as u64);
    assert_eq!(typed, 0);

    assert_eq!(exit.get("exitStatus"), Some("0"));
    assert_eq!(exit.get("bytesServerToClient"), Some(served.to_string().as_str()));
    assert_eq!(exit.get("bytesClientToServer"), Some("0"));
    assert_eq!(exit.get("signal"), None);
}

#[tokio::test]
async fn idle_session_records_one_heartbeat_per_period() {
    let period = Duration::from_millis(200);
    let config = BastionConfig::default().with_heartbeat(period);
    let request = request("/bin/sh", &["-c", "sleep 1"]);
    let (end, _client) = client_end();

    let started = Instant::now();
    let Some(outcome) = session(&config, &request, end).await else {
        return;
    };
    let elapsed = started.elapsed();

    let heartbeats: Vec<Entry> = entries(&outcome)
        .into_iter()
        .filter(|e| e.kind == EntryKind::None)
        .collect();
    let most = elapsed.as_millis() / period.as_millis();
    assert!(heartbeats.len() >= 2, "only {} heartbeats", heartbeats.len());
    assert!(
        heartbeats.len() as u128 <= most,
        "{} heartbeats in {elapsed:?}",
        heartbeats.len()
    );
    assert!(heartbeats.iter().all(|e| e.payload.is_empty()));

    // Nothing else happens while the shell sleeps, so heartbeats are a
    // full period apart. Allow for wall-clock granularity.
    for pair in heartbeats.windows(2) {
        let gap = micros_between(pair[0].timestamp, pair[1].timestamp);
        assert!(gap >= 190_000, "heartbeats {gap}us apart");
    }
}

#[tokio::test]
async fn interrupt_is_forwarded_with_terminal_signals_off() {
    let config = BastionConfig::default();
    // Without ISIG the line discipline never turns ETX into SIGINT; only
    // the bastion's own signal can fire the trap.
    let request = request(
        "/bin/sh",
        &[
            "-c",
            "stty -isig; trap 'exit 5' INT; echo ready; while :; do sleep 0.1; done",
        ],
    );
    let (end, mut client) = client_end();

    let driver = async {
        let ready = client.wait_for("ready").await;
        client.type_bytes(b"\x03").await;
        ready
    };
    let (outcome, ready) = tokio::join!(session(&config, &request, end), driver);
    let Some(outcome) = outcome else {
        return;
    };
    assert!(ready);

    assert_eq!(outcome.exit_code(), 5);
    assert!(
        entries(&outcome)
            .iter()
            .any(|e| e.kind == EntryKind::ClientToServer && e.payload == b"\x03")
    );
}

#[tokio::test]
async fn client_window_size_reaches_the_shell() {
    let config = BastionConfig::default();
    let request = request(
        "/bin/sh",
        &[
            "-c",
            "i=0; while [ \"$(stty size)\" = '0 0' ] && [ $i -lt 100 ]; do sleep 0.05; i=$((i+1)); done; echo size=$(stty size)",
        ],
    );
    let (end, mut client) = client_end();

    let (outcome, sized) = tokio::join!(
        session(&config, &request, end),
        client.wait_for("size=24 80")
    );
    let Some(outcome) = outcome else {
        return;
    };
    assert!(sized, "output: {:?}", String::from_utf8_lossy(&client.seen));
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn client_hang_up_ends_the_session() {
    let config = BastionConfig::default();
    let request = request("/bin/sh", &["-c", "echo ready; sleep 20"]);
    let (end, mut client) = client_end();

    let driver = async move {
        let ready = client.wait_for("ready").await;
        let Client { keyboard, screen, .. } = client;
        drop(keyboard);
        (ready, screen)
    };
    let started = Instant::now();
    let (outcome, (ready, _screen)) = tokio::join!(session(&config, &request, end), driver);
    let Some(outcome) = outcome else {
        return;
    };
    assert!(ready);
    assert!(started.elapsed() < Duration::from_secs(10));

    // Closing the master hangs up the slave, and its session leader with it.
    assert_eq!(outcome.exit_status, Some(ExitStatus::Signaled(libc::SIGHUP)));

    let entries = entries(&outcome);
    let exit = entries.last().unwrap();
    assert_eq!(exit.kind, EntryKind::SessionExit);
    let exit = SessionMetadata::parse(&exit.payload_text());
    assert_eq!(exit.get("exitStatus"), Some("129"));
    assert_eq!(exit.get("signal"), Some("1"));
}
