//! Configuration for the bastion and the replay tool.
//!
//! Everything is read from the environment: `sshd` starts the bastion as a
//! login shell, so there is no command line to carry options.

pub mod env;

use std::path::PathBuf;
use std::time::Duration;

pub use env::EnvConfig;

use crate::error::{BastionError, Result};
use crate::record::DEFAULT_MAX_PAYLOAD;

/// Shell launched when `SHELL` is unset.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Default directory for recordings.
pub const DEFAULT_RECORD_DIR: &str = "/tmp";

/// Default heartbeat period (10 seconds).
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);

/// Default transfer buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Default time to wait for the child's status after hang-up.
pub const DEFAULT_REAP_GRACE: Duration = Duration::from_millis(500);

/// Default log filter.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Bastion configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionConfig {
    /// Program launched on the pty.
    pub shell: PathBuf,
    /// Directory receiving recordings.
    pub record_dir: PathBuf,
    /// Idle period after which a heartbeat is recorded.
    pub heartbeat: Duration,
    /// Size of each transfer buffer.
    pub buffer_size: usize,
    /// How long to wait for the child's status once the pty hangs up.
    pub reap_grace: Duration,
    /// Diagnostics file; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    /// Largest payload the replay accepts.
    pub max_entry: usize,
}

impl Default for BastionConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            record_dir: PathBuf::from(DEFAULT_RECORD_DIR),
            heartbeat: DEFAULT_HEARTBEAT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            reap_grace: DEFAULT_REAP_GRACE,
            log_file: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_entry: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl BastionConfig {
    /// Load from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_config(&EnvConfig::default())
    }

    /// Load through an environment reader. Missing, empty, unparsable or
    /// zero values fall back to the defaults.
    #[must_use]
    pub fn from_env_config(env: &EnvConfig) -> Self {
        let defaults = Self::default();

        Self {
            shell: env
                .raw(env::vars::SHELL)
                .filter(|s| !s.is_empty())
                .map_or(defaults.shell, PathBuf::from),
            record_dir: env
                .get(env::vars::RECORD_DIR)
                .map_or(defaults.record_dir, PathBuf::from),
            heartbeat: env
                .duration_secs(env::vars::HEARTBEAT_SECS)
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.heartbeat),
            buffer_size: env
                .parse(env::vars::BUFFER_SIZE)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.buffer_size),
            reap_grace: env
                .duration_millis(env::vars::REAP_GRACE_MS)
                .unwrap_or(defaults.reap_grace),
            log_file: env.get(env::vars::LOG_FILE).map(PathBuf::from),
            log_filter: env.get_or(env::vars::LOG, DEFAULT_LOG_FILTER),
            max_entry: env
                .parse(env::vars::MAX_ENTRY)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_entry),
        }
    }

    /// Set the shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the recording directory.
    #[must_use]
    pub fn with_record_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.record_dir = dir.into();
        self
    }

    /// Set the heartbeat period.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Set the transfer buffer size.
    #[must_use]
    pub const fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the reap grace period.
    #[must_use]
    pub const fn with_reap_grace(mut self, grace: Duration) -> Self {
        self.reap_grace = grace;
        self
    }

    /// Set the diagnostics file.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Check values the session cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(BastionError::Config("transfer buffer size must be positive".into()));
        }
        if self.heartbeat.is_zero() {
            return Err(BastionError::Config("heartbeat period must be positive".into()));
        }
        if self.shell.as_os_str().is_empty() {
            return Err(BastionError::Config("no shell to launch".into()));
        }
        Ok(())
    }
}
