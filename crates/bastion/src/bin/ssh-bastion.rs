//! Recording login shell for SSH sessions.
//!
//! Configured as the user's shell in `sshd`, it launches `$SHELL` (or
//! `/bin/bash`) on a new pseudo-terminal with the remaining arguments,
//! relays and records the session, and exits with the shell's status.

use std::process::ExitCode;

use bastion::config::BastionConfig;
use bastion::session::{self, SessionRequest};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = BastionConfig::from_env();
    if let Err(e) = bastion::logging::init(&config) {
        eprintln!("ssh-bastion: {e}");
        return ExitCode::FAILURE;
    }

    let request = SessionRequest::from_args(&config, std::env::args_os());
    match session::run(&config, &request).await {
        Ok(outcome) => {
            let code = outcome.exit_code();
            tracing::debug!(code, "bastion exiting");
            ExitCode::from(code.clamp(0, 255) as u8)
        }
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            eprintln!("ssh-bastion: {e}");
            ExitCode::FAILURE
        }
    }
}
