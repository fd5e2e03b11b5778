//! `key: value` text blobs for control entries.
//!
//! [`SessionMetadata`] accumulates ordered fields and renders them one per
//! line. It is used for the `SessionStart` and `SessionExit` payloads and
//! parses them back for replay and tests.

use std::fmt;

use bastion_pty::ExitStatus;

/// Environment variables copied into the session-start entry, in order.
pub const SESSION_ENV_VARS: [&str; 10] = [
    "SSH_CONNECTION",
    "SSH_TTY",
    "SSH_CLIENT",
    "WAYLAND_DISPLAY",
    "DISPLAY",
    "USERNAME",
    "LOGNAME",
    "USER",
    "SHELL",
    "HOME",
];

/// Ordered `key: value` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    fields: Vec<(String, String)>,
}

impl SessionMetadata {
    /// Create an empty set of fields.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.push(key, value);
        self
    }

    /// Append a field in place.
    pub fn push(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.fields.push((key.into(), value.to_string()));
    }

    /// Append a field only when a value is present.
    pub fn push_opt(&mut self, key: impl Into<String>, value: Option<impl fmt::Display>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as `key: value\n` lines.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Parse rendered text. Lines without `": "` are skipped; trailing NULs
    /// from older writers are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let fields = text
            .trim_end_matches('\0')
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { fields }
    }

    /// Fields describing a new session: process identity, executables and
    /// the session-identifying environment variables that are set.
    #[must_use]
    pub fn session_start<F>(
        identity: &ProcessIdentity,
        argv0: &str,
        child_shell: &str,
        env: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut meta = Self::new()
            .field("pid", identity.pid)
            .field("ppid", identity.ppid)
            .field("uid", identity.uid)
            .field("sid", identity.sid)
            .field("pgid", identity.pgid)
            .field("argv0", argv0)
            .field("childShell", child_shell);

        for name in SESSION_ENV_VARS {
            meta.push_opt(name, env(name));
        }
        meta
    }

    /// Fields closing a session.
    #[must_use]
    pub fn session_exit(status: Option<ExitStatus>, counters: TransferCounters) -> Self {
        let mut meta = Self::new().field("exitStatus", status.map_or(0, |s| s.shell_code()));
        meta.push("bytesServerToClient", counters.server_to_client);
        meta.push("bytesClientToServer", counters.client_to_server);
        meta.push_opt("signal", status.and_then(|s| s.signal()));
        meta
    }
}

impl fmt::Display for SessionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

/// Byte counters for both relay directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounters {
    /// Bytes read from the pty master and relayed to the client.
    pub server_to_client: u64,
    /// Bytes read from the client and relayed to the pty master.
    pub client_to_server: u64,
}

/// Identity of the bastion process at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Process id.
    pub pid: i32,
    /// Parent process id.
    pub ppid: i32,
    /// Real user id.
    pub uid: u32,
    /// Session id.
    pub sid: i32,
    /// Process group id.
    pub pgid: i32,
}

impl ProcessIdentity {
    /// Identity of the calling process. Unavailable ids are reported as -1.
    #[must_use]
    pub fn current() -> Self {
        let raw = |pid: rustix::process::Pid| pid.as_raw_nonzero().get();
        Self {
            pid: std::process::id() as i32,
            ppid: std::os::unix::process::parent_id() as i32,
            uid: rustix::process::getuid().as_raw(),
            sid: rustix::process::getsid(None).map_or(-1, raw),
            pgid: rustix::process::getpgid(None).map_or(-1, raw),
        }
    }
}
