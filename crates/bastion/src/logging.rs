//! Diagnostics setup.
//!
//! The user's terminal is in raw mode for the whole session, so diagnostics
//! go to a file when one is configured and to stderr otherwise, never with
//! ANSI colours.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::BastionConfig;
use crate::error::{BastionError, Result};

/// Install the global subscriber described by `config`.
///
/// An invalid filter falls back to `warn`. A subscriber that is already
/// installed is left in place.
pub fn init(config: &BastionConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| {
                    BastionError::Config(format!("cannot open log file {}: {source}", path.display()))
                })?;
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    if installed.is_err() {
        tracing::debug!("subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_log_file_is_a_config_error() {
        let config = BastionConfig::default().with_log_file("/nonexistent-dir/bastion.log");
        assert!(matches!(init(&config), Err(BastionError::Config(_))));
    }

    #[test]
    fn init_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let config = BastionConfig::default().with_log_file(dir.path().join("bastion.log"));
        init(&config).unwrap();
        init(&config).unwrap();
        assert!(dir.path().join("bastion.log").exists());
    }
}
